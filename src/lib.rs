// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Darwin Ladder: the competitive-ladder and gene-economy engine for
//! The Darwin Principle.
//!
//! This crate provides the allocator behind the game's ladder:
//! - Ten capacity-bounded skill levels with atomic occupancy enforcement
//! - FIFO match pairing without double-booking
//! - Encounter resolution into gene transfers and rank changes
//! - Safe operation under many concurrent client requests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Ladder Coordinator           │
//! ├─────────────────────────────────────┤
//! │  Pairing Engine │ Encounter Resolver│
//! ├─────────────────────────────────────┤
//! │   Player Registry / Level Table     │
//! └─────────────────────────────────────┘
//! ```
//!
//! Identity, encounter gameplay and persistence are external
//! collaborators: the engine consumes pre-authenticated player ids and
//! declared outcomes, and exposes its state as serializable records.

pub mod coordinator;
pub mod error;
pub mod ladder;
pub mod snapshot;

pub use coordinator::LadderCoordinator;
pub use error::{LadderError, LadderResult};
pub use snapshot::LadderSnapshot;

// Re-export key ladder types at crate root for convenience
pub use ladder::{
    Encounter, Genes, LadderConfig, LevelTable, Match, MatchId, MatchRequest, MatchState,
    MatchStatus, Player, PlayerId, PromotionPolicy, Resolution, Standing,
};
