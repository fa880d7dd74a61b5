//! Error types for the battle engine.
//!
//! A running battle never fails mid-tick; errors only surface at the API
//! boundary (clock transitions, strategy validation, data loading).

use thiserror::Error;

use crate::clock::ClockState;
use crate::squad::SquadId;

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for the battle engine.
#[derive(Debug, Error)]
pub enum BattleError {
    /// A clock action was requested in a state that does not allow it.
    #[error("Cannot {action} while the battle clock is {from:?}")]
    InvalidTransition {
        /// State the clock was in.
        from: ClockState,
        /// Action that was attempted.
        action: &'static str,
    },

    /// Speed multiplier outside of the supported set.
    #[error("Unsupported battle speed multiplier: {0} (expected 1, 2 or 4)")]
    InvalidSpeed(u8),

    /// Retreat threshold outside of 1..=100.
    #[error("Retreat threshold must be within 1..=100 percent, got {0}")]
    InvalidRetreatThreshold(u8),

    /// Squad id not present in the battle.
    #[error("Squad not found: {0:?}")]
    UnknownSquad(SquadId),

    /// Data file parsing error.
    #[error("Failed to parse {what}: {message}")]
    DataParse {
        /// What was being parsed (rules, troop table, ...).
        what: &'static str,
        /// Error message.
        message: String,
    },
}
