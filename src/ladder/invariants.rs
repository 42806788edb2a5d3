//! Ladder invariants - sanity checks that detect bugs.
//!
//! With the locking discipline in the registry and pairing engine these
//! should NEVER trigger. If they do, it indicates a bug, not a gameplay
//! condition: capacity and state races are handled at the operation
//! level, so a violation here means an update escaped the discipline.

use std::collections::HashMap;

use crate::ladder::{LevelTable, Match, MatchState, MatchStatus, Player};

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check all ladder invariants over a consistent snapshot.
///
/// Returns the violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(
    levels: &LevelTable,
    players: &[Player],
    matches: &[Match],
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    // Per-level occupancy never exceeds capacity
    let mut occupancy: HashMap<u8, u32> = HashMap::new();
    for player in players {
        if !levels.is_valid_level(player.level) {
            violations.push(InvariantViolation {
                message: format!("player {} is at invalid level {}", player.id, player.level),
            });
            continue;
        }
        if player.active {
            *occupancy.entry(player.level).or_insert(0) += 1;
        }
    }
    for (level, count) in &occupancy {
        if let Ok(capacity) = levels.capacity_of(*level)
            && *count > capacity
        {
            violations.push(InvariantViolation {
                message: format!("level {level} holds {count} players > capacity {capacity}"),
            });
        }
    }

    // Deactivated players hold no queue or match position
    for player in players {
        if !player.active && player.match_state != MatchState::Idle {
            violations.push(InvariantViolation {
                message: format!(
                    "deactivated player {} is {:?}",
                    player.id, player.match_state
                ),
            });
        }
    }

    // No two in-progress matches share a player
    let mut live_count: HashMap<&str, u32> = HashMap::new();
    for m in matches {
        if m.player1 == m.player2 {
            violations.push(InvariantViolation {
                message: format!("match {} pairs player {} with themselves", m.id, m.player1),
            });
        }
        if m.status == MatchStatus::Completed {
            if let Some(winner) = &m.winner
                && !m.involves(winner)
            {
                violations.push(InvariantViolation {
                    message: format!("match {} winner {winner} did not participate", m.id),
                });
            }
            continue;
        }
        *live_count.entry(m.player1.as_str()).or_insert(0) += 1;
        *live_count.entry(m.player2.as_str()).or_insert(0) += 1;
    }
    for (player_id, count) in &live_count {
        if *count > 1 {
            violations.push(InvariantViolation {
                message: format!("player {player_id} is in {count} in-progress matches"),
            });
        }
    }

    // Participants of an in-progress match are InMatch at its level
    let by_id: HashMap<&str, &Player> = players.iter().map(|p| (p.id.as_str(), p)).collect();
    for m in matches {
        if m.status == MatchStatus::Completed {
            continue;
        }
        for participant in [&m.player1, &m.player2] {
            match by_id.get(participant.as_str()) {
                None => violations.push(InvariantViolation {
                    message: format!("match {} references unknown player {participant}", m.id),
                }),
                Some(player) => {
                    if player.match_state != MatchState::InMatch {
                        violations.push(InvariantViolation {
                            message: format!(
                                "match {} participant {participant} is {:?}, not InMatch",
                                m.id, player.match_state
                            ),
                        });
                    }
                    if player.level != m.level {
                        violations.push(InvariantViolation {
                            message: format!(
                                "match {} at level {} has participant {participant} at level {}",
                                m.id, m.level, player.level
                            ),
                        });
                    }
                }
            }
        }
    }

    violations
}
