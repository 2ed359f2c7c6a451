//! # Warden Core
//!
//! Decision core for an agent that controls many units in a real-time
//! strategy contest.
//!
//! Two coupled problems are solved here:
//! - Per-unit action arbitration every simulation step, through utility-scored
//!   behavior trees.
//! - Production planning, through DFS and MCTS search over a simulated
//!   economy and army.
//!
//! Both rest on the same [`unit::SimUnit`] snapshot and the same
//! [`combat::CombatSimulator`]. The crate does no IO beyond loading
//! configuration and never touches system randomness: every planner run is
//! reproducible from its inputs and seed.
//!
//! ## Crate Structure
//!
//! - [`behavior`] - Behavior tree nodes, leaves, boards and the tick engine
//! - [`utility`] - Utility scoring functions
//! - [`combat`] - Target scoring and battle estimates
//! - [`state`] - Simulated production state and transitions
//! - [`search`] - DFS and MCTS planners
//! - [`catalog`] - Unit, tech and upgrade tables
//! - [`environment`] - Boundary to the running game
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod catalog;
pub mod combat;
pub mod config;
pub mod environment;
pub mod error;
pub mod math;
pub mod search;
pub mod state;
pub mod unit;
pub mod utility;

pub use error::{Result, WardenError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::{
        default_tree, ActionOutcome, BehaviorEngine, Board, Goal, Leaf, Node, Utility, UtilityTask,
    };
    pub use crate::catalog::{
        Cost, RaceId, TechId, TechInfo, TypeCatalog, TypeKind, UnitTypeId, UnitTypeInfo, UpgradeId,
        UpgradeInfo,
    };
    pub use crate::combat::{BattleOutcome, CombatSimulator, DamageType, UnitSize};
    pub use crate::config::{SearchConfig, WardenConfig};
    pub use crate::environment::{Command, Environment, WorldState};
    pub use crate::error::{ConfigError, PlanError, Result, WardenError};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::search::{BestPlan, DfsPlanner, MctsPlanner, PlanRequest, SearchLimits};
    pub use crate::state::{Action, GameState, TechContext};
    pub use crate::unit::{Capabilities, Owner, SimUnit, UnitHandle, Weapon};
    pub use crate::utility::{UtilityConfig, UtilityScorer};
}
