//! Ladder layer for the Darwin Principle engine.
//!
//! Implements the competitive ladder and gene economy:
//! - Ten capacity-bounded levels
//! - Player registry (genes, counters, match-availability state)
//! - FIFO match pairing per level
//! - Encounter resolution (gene transfers, promotion/demotion)
//! - Invariant checks over ladder snapshots

mod invariants;
mod levels;
mod matches;
mod pairing;
mod player;
mod registry;
mod resolver;

pub use invariants::{InvariantViolation, check_invariants};
pub use levels::{DEFAULT_CAPACITIES, LevelTable};
pub use matches::{Encounter, Match, MatchId, MatchStatus};
pub use pairing::{MatchPairingEngine, MatchRequest};
pub use player::{Genes, MatchState, Player, PlayerId, Standing};
pub use registry::PlayerRegistry;
pub use resolver::{MatchResult, PlayerOutcome, Resolution, resolve_outcome};

use serde::{Deserialize, Serialize};

/// Genes debited from each participant per encounter.
pub const ENCOUNTER_ENTRY_COST: Genes = 100;

/// Genes credited to the winner of a resolved match.
pub const WINNER_GENE_REWARD: Genes = 75;

/// Genes deducted from the loser of a resolved match (clamped at zero).
pub const LOSER_GENE_PENALTY: Genes = 100;

/// Gene grant applied on first ladder admission.
pub const INITIAL_GENE_GRANT: Genes = 2500;

/// Gene-economy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Entry cost debited from both players at resolution.
    pub entry_cost: Genes,
    /// Reward credited to the winner.
    pub winner_reward: Genes,
    /// Penalty deducted from the loser, clamped at zero.
    pub loser_penalty: Genes,
    /// Grant applied on first admission.
    pub initial_genes: Genes,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            entry_cost: ENCOUNTER_ENTRY_COST,
            winner_reward: WINNER_GENE_REWARD,
            loser_penalty: LOSER_GENE_PENALTY,
            initial_genes: INITIAL_GENE_GRANT,
        }
    }
}

/// The injectable promotion/demotion rule.
///
/// A winner whose consecutive-win streak reaches `promote_streak`
/// attempts a move one level up (capped at the table ceiling); a loser
/// whose consecutive-loss streak reaches `demote_streak` moves one
/// level down (floored at level 1). Streaks reset when the move
/// commits, and survive a capacity-blocked move so the next result
/// retries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionPolicy {
    /// Consecutive wins required to attempt a promotion.
    pub promote_streak: u32,
    /// Consecutive losses required to trigger a demotion.
    pub demote_streak: u32,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            promote_streak: 3,
            demote_streak: 3,
        }
    }
}
