//! Utility-scored behavior trees.
//!
//! Each managed unit owns a [`Board`]. Every simulation step the
//! [`BehaviorEngine`] ticks one shared tree against each board; utility
//! selectors rescore their children from scratch on every tick, and only
//! leaves issue commands.

mod board;
mod engine;
mod leaf;
mod node;

pub use board::{Board, Goal};
pub use engine::{default_tree, BehaviorEngine};
pub use leaf::{Leaf, LeafFn, ARRIVE_RADIUS, KITE_DISTANCE};
pub use node::{Custom, Node, TickContext, Utility, UtilityFn, UtilityTask};

use serde::{Deserialize, Serialize};

/// Result of ticking a node.
///
/// `Done` and `Succeeded` are both successful terminal results. Leaves use
/// `Done` for work finished within the tick and `Succeeded` for work that
/// took several ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// Still working.
    Running,
    /// Finished this tick.
    Done,
    /// Finished after several ticks.
    Succeeded,
    /// Could not act.
    Failed,
}

impl ActionOutcome {
    /// Whether this is `Done` or `Succeeded`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, ActionOutcome::Done | ActionOutcome::Succeeded)
    }
}
