//! Error types for the ladder engine.

use std::fmt;

use crate::ladder::{Genes, MatchId, MatchState, PlayerId};

/// Errors produced by ladder operations.
///
/// `LevelFull` and `AlreadyPairing` are expected steady-state conditions
/// under concurrency, not failures: callers should treat them as
/// retryable or informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LadderError {
    /// A match-state change that is not an edge of the legal
    /// `Idle -> Queued -> InMatch -> Idle` graph.
    InvalidStateTransition {
        /// State the player was in.
        from: MatchState,
        /// State the transition attempted.
        to: MatchState,
    },
    /// The player already has a pending match request.
    AlreadyQueued,
    /// The player is already playing a match.
    AlreadyInMatch,
    /// A withdrawal lost the race against pairing; the player is in the
    /// match that pairing just created.
    AlreadyPairing {
        /// The match the player was paired into.
        match_id: MatchId,
    },
    /// The target level has no free player slot.
    LevelFull {
        /// The saturated level.
        level: u8,
        /// That level's capacity.
        capacity: u32,
    },
    /// A voluntary spend would drive the gene balance negative.
    InsufficientFunds {
        /// Balance at the time of the attempt.
        balance: Genes,
        /// Amount the operation required.
        required: Genes,
    },
    /// A structurally invalid outcome report: unknown or already
    /// resolved match, a declared winner who did not participate, or an
    /// encounter that does not fit the match.
    InvalidOutcome(String),
    /// Level number outside the configured table.
    NoSuchLevel(u8),
    /// The player identifier has never been admitted to the ladder.
    UnknownPlayer(PlayerId),
    /// No match exists with this identifier.
    UnknownMatch(MatchId),
    /// A lock was poisoned by a panicking thread.
    Poisoned,
}

impl fmt::Display for LadderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStateTransition { from, to } => {
                write!(f, "illegal match-state transition: {from:?} -> {to:?}")
            }
            Self::AlreadyQueued => write!(f, "player is already queued for a match"),
            Self::AlreadyInMatch => write!(f, "player is already in a match"),
            Self::AlreadyPairing { match_id } => {
                write!(f, "pairing already captured the player into match {match_id}")
            }
            Self::LevelFull { level, capacity } => {
                write!(f, "level {level} is full ({capacity} slots)")
            }
            Self::InsufficientFunds { balance, required } => {
                write!(f, "insufficient genes: balance {balance}, required {required}")
            }
            Self::InvalidOutcome(reason) => write!(f, "invalid outcome: {reason}"),
            Self::NoSuchLevel(level) => write!(f, "no such level: {level}"),
            Self::UnknownPlayer(id) => write!(f, "unknown player: {id}"),
            Self::UnknownMatch(id) => write!(f, "unknown match: {id}"),
            Self::Poisoned => write!(f, "internal lock poisoned"),
        }
    }
}

impl std::error::Error for LadderError {}

/// Result type for ladder operations.
pub type LadderResult<T> = Result<T, LadderError>;
