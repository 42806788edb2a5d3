//! Player records and match-availability state.

use serde::{Deserialize, Serialize};

/// Opaque player identifier, owned by the external identity system.
pub type PlayerId = String;

/// Gene balance in whole genes. Non-negativity is enforced by the type;
/// all mutation goes through the registry.
pub type Genes = u64;

/// Match-availability state of a player.
///
/// Legal transitions: `Idle -> Queued -> InMatch -> Idle`, plus the
/// cancellation edge `Queued -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    /// Not waiting and not playing.
    Idle,
    /// Waiting in a level's pairing queue.
    Queued,
    /// Playing a match.
    InMatch,
}

impl MatchState {
    /// Whether `self -> to` is an edge of the legal transition graph.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Queued)
                | (Self::Queued, Self::InMatch)
                | (Self::InMatch, Self::Idle)
                | (Self::Queued, Self::Idle)
        )
    }
}

/// A ladder participant.
///
/// Players are never destroyed: deactivation keeps the record as
/// history and frees the level slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Opaque identifier from the external identity system.
    pub id: PlayerId,
    /// Current level, `1..=table.max_level()`.
    pub level: u8,
    /// Gene balance.
    pub genes: Genes,
    /// Lifetime wins.
    pub wins: u64,
    /// Lifetime losses.
    pub losses: u64,
    /// Consecutive wins since the last loss or promotion.
    pub win_streak: u32,
    /// Consecutive losses since the last win or demotion.
    pub loss_streak: u32,
    /// Match-availability state.
    pub match_state: MatchState,
    /// Whether the player currently occupies a level slot.
    pub active: bool,
}

impl Player {
    /// Create a freshly admitted player at level 1.
    #[must_use]
    pub fn new(id: PlayerId, initial_genes: Genes) -> Self {
        Self {
            id,
            level: 1,
            genes: initial_genes,
            wins: 0,
            losses: 0,
            win_streak: 0,
            loss_streak: 0,
            match_state: MatchState::Idle,
            active: true,
        }
    }

    /// Read-only standing view of this player.
    #[must_use]
    pub fn standing(&self) -> Standing {
        Standing {
            level: self.level,
            genes: self.genes,
            wins: self.wins,
            losses: self.losses,
        }
    }
}

/// The externally queryable standing of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// Current level.
    pub level: u8,
    /// Gene balance.
    pub genes: Genes,
    /// Lifetime wins.
    pub wins: u64,
    /// Lifetime losses.
    pub losses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player() {
        let player = Player::new("p1".to_owned(), 2500);
        assert_eq!(player.level, 1);
        assert_eq!(player.genes, 2500);
        assert_eq!(player.match_state, MatchState::Idle);
        assert!(player.active);
    }

    #[test]
    fn test_transition_graph() {
        use MatchState::{Idle, InMatch, Queued};

        assert!(Idle.can_transition(Queued));
        assert!(Queued.can_transition(InMatch));
        assert!(InMatch.can_transition(Idle));
        // Cancellation before pairing completes
        assert!(Queued.can_transition(Idle));

        assert!(!Idle.can_transition(InMatch));
        assert!(!Idle.can_transition(Idle));
        assert!(!InMatch.can_transition(Queued));
        assert!(!InMatch.can_transition(InMatch));
        assert!(!Queued.can_transition(Queued));
    }

    #[test]
    fn test_standing_view() {
        let mut player = Player::new("p1".to_owned(), 1000);
        player.wins = 3;
        player.losses = 1;
        player.level = 2;
        let standing = player.standing();
        assert_eq!(standing.level, 2);
        assert_eq!(standing.genes, 1000);
        assert_eq!(standing.wins, 3);
        assert_eq!(standing.losses, 1);
    }
}
