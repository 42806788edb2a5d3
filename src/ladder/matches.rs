//! Match and encounter records.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ladder::PlayerId;

/// Match identifier, allocated from a process-wide counter.
pub type MatchId = u64;

/// Lifecycle of a match: `Pending -> Active -> Completed`.
///
/// A match becomes `Active` once both clients acknowledge the start,
/// and `Completed` exactly once; after that the record is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Created by pairing, awaiting both start acknowledgements.
    Pending,
    /// Both clients acknowledged; the encounter is being played.
    Active,
    /// Resolved (or voided). Terminal.
    Completed,
}

/// A paired competitive session between two same-level players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Match identifier.
    pub id: MatchId,
    /// First paired player (longest-waiting at pairing time).
    pub player1: PlayerId,
    /// Second paired player.
    pub player2: PlayerId,
    /// The level both players occupied when paired.
    pub level: u8,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Reference to the external gameplay round, once assigned.
    pub encounter_id: Option<String>,
    /// The winner, set only when `Completed`; `None` on a voided match.
    pub winner: Option<PlayerId>,
    /// Creation time of the pairing.
    pub start_time: SystemTime,
    /// Completion time, set when the match resolves or voids.
    pub end_time: Option<SystemTime>,
    /// Start acknowledgement from `player1`.
    pub ack1: bool,
    /// Start acknowledgement from `player2`.
    pub ack2: bool,
}

impl Match {
    /// Create a fresh `Pending` match between two paired players.
    #[must_use]
    pub fn new(id: MatchId, player1: PlayerId, player2: PlayerId, level: u8) -> Self {
        Self {
            id,
            player1,
            player2,
            level,
            status: MatchStatus::Pending,
            encounter_id: None,
            winner: None,
            start_time: SystemTime::now(),
            end_time: None,
            ack1: false,
            ack2: false,
        }
    }

    /// Whether `player_id` is one of the two participants.
    #[must_use]
    pub fn involves(&self, player_id: &str) -> bool {
        self.player1 == player_id || self.player2 == player_id
    }

    /// The participant opposing `player_id`, if `player_id` participates.
    #[must_use]
    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        if self.player1 == player_id {
            Some(&self.player2)
        } else if self.player2 == player_id {
            Some(&self.player1)
        } else {
            None
        }
    }
}

/// The external gameplay round consumed at the boundary.
///
/// Scoring rules are opaque to the allocator: only the declared outcome
/// matters here. The engine checks structural fit (level requirement),
/// nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    /// Encounter identifier, owned by the external simulator.
    pub id: String,
    /// Encounter kind, e.g. a mini-game name.
    pub kind: String,
    /// Difficulty rating.
    pub difficulty: u32,
    /// Minimum level eligible to play this encounter.
    pub level_requirement: u8,
    /// Opaque scoring rules, passed through untouched.
    pub scoring: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match::new(7, "a".to_owned(), "b".to_owned(), 3)
    }

    #[test]
    fn test_new_match_is_pending() {
        let m = sample_match();
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.winner, None);
        assert_eq!(m.encounter_id, None);
        assert!(!m.ack1 && !m.ack2);
    }

    #[test]
    fn test_involves_and_opponent() {
        let m = sample_match();
        assert!(m.involves("a"));
        assert!(m.involves("b"));
        assert!(!m.involves("c"));
        assert_eq!(m.opponent_of("a").map(String::as_str), Some("b"));
        assert_eq!(m.opponent_of("b").map(String::as_str), Some("a"));
        assert_eq!(m.opponent_of("c"), None);
    }
}
