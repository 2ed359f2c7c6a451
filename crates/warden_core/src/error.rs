//! Error types for the decision core.

use thiserror::Error;

use crate::catalog::{RaceId, TechId, UnitTypeId, UpgradeId};
use crate::state::Action;

/// Result type alias using [`WardenError`].
pub type Result<T> = std::result::Result<T, WardenError>;

/// Top-level error type for the decision core.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Planning request or transition error.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Configuration loading error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Game state could not be encoded or decoded.
    #[error("Failed to encode game state: {0}")]
    Encoding(String),
}

/// Errors raised while building a planner or applying a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The goal names a unit type the catalog does not know.
    #[error("Unknown unit type {0:?}")]
    UnknownUnitType(UnitTypeId),

    /// The goal names a tech the catalog does not know.
    #[error("Unknown tech {0:?}")]
    UnknownTech(TechId),

    /// The request names an upgrade the catalog does not know.
    #[error("Unknown upgrade {0:?}")]
    UnknownUpgrade(UpgradeId),

    /// A goal entry belongs to another race.
    #[error("Unit type {unit_type:?} belongs to {actual:?}, not {expected:?}")]
    WrongRace {
        /// Offending unit type.
        unit_type: UnitTypeId,
        /// Race the request plans for.
        expected: RaceId,
        /// Race the type belongs to.
        actual: RaceId,
    },

    /// The request race does not match the initial state.
    #[error("Request race {request:?} does not match state race {state:?}")]
    RaceMismatch {
        /// Race named by the request.
        request: RaceId,
        /// Race of the initial state.
        state: RaceId,
    },

    /// The goal asks for nothing.
    #[error("Goal is empty")]
    EmptyGoal,

    /// A goal entry can never be produced from the initial state.
    #[error("Unit type {0:?} is unreachable from the initial state")]
    Unreachable(UnitTypeId),

    /// An action was applied that the state does not currently allow.
    #[error("Illegal action {0:?}")]
    IllegalAction(Action),

    /// A state invariant was violated.
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),
}

/// Errors raised while loading configuration or scenario files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// Failed to read file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse RON.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// A value is outside its allowed range.
    #[error("Invalid config value for '{field}': {message}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}
