//! Per-unit decision context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::UnitTypeId;
use crate::math::Vec2Fixed;
use crate::unit::UnitHandle;

/// What a unit has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Goal {
    /// Destroy a specific unit.
    Attack {
        /// Unit to attack.
        target: UnitHandle,
    },
    /// Hold a position.
    Defend {
        /// Position to hold.
        position: Vec2Fixed,
    },
    /// Place a structure.
    Construct {
        /// Structure type.
        structure: UnitTypeId,
        /// Placement.
        position: Vec2Fixed,
    },
    /// Harvest a resource.
    Gather {
        /// Resource unit.
        resource: UnitHandle,
    },
    /// Look at a position.
    Scout {
        /// Position to look at.
        position: Vec2Fixed,
    },
    /// Flee to a position.
    Runaway {
        /// Where to flee.
        position: Vec2Fixed,
    },
    /// Nothing assigned.
    #[default]
    Idle,
}

impl Goal {
    /// Position the goal points at, if any.
    #[must_use]
    pub const fn position(&self) -> Option<Vec2Fixed> {
        match self {
            Goal::Defend { position }
            | Goal::Construct { position, .. }
            | Goal::Scout { position }
            | Goal::Runaway { position } => Some(*position),
            Goal::Attack { .. } | Goal::Gather { .. } | Goal::Idle => None,
        }
    }
}

/// Decision context for one managed unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    unit: UnitHandle,
    goal: Goal,
    home: Vec2Fixed,
    utilities: BTreeMap<String, f64>,
}

impl Board {
    /// Create an idle board for `unit` that retreats to `home`.
    #[must_use]
    pub fn new(unit: UnitHandle, home: Vec2Fixed) -> Self {
        Self {
            unit,
            goal: Goal::Idle,
            home,
            utilities: BTreeMap::new(),
        }
    }

    /// Builder method to set the goal.
    #[must_use]
    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goal = goal;
        self
    }

    /// Managed unit.
    #[must_use]
    pub const fn unit(&self) -> UnitHandle {
        self.unit
    }

    /// Current goal.
    #[must_use]
    pub const fn goal(&self) -> &Goal {
        &self.goal
    }

    /// Replace the goal.
    pub fn set_goal(&mut self, goal: Goal) {
        self.goal = goal;
    }

    /// Retreat position.
    #[must_use]
    pub const fn home(&self) -> Vec2Fixed {
        self.home
    }

    /// Move the retreat position.
    pub fn set_home(&mut self, home: Vec2Fixed) {
        self.home = home;
    }

    /// Utilities computed by the last selector tick, by task name.
    ///
    /// For inspection only; nothing reads these back.
    #[must_use]
    pub fn utilities(&self) -> &BTreeMap<String, f64> {
        &self.utilities
    }

    /// Last utility recorded for `task`.
    #[must_use]
    pub fn utility(&self, task: &str) -> Option<f64> {
        self.utilities.get(task).copied()
    }

    pub(crate) fn record_utility(&mut self, task: &str, value: f64) {
        self.utilities.insert(task.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_idle() {
        let board = Board::new(7, Vec2Fixed::from_ints(10, 10));
        assert_eq!(board.unit(), 7);
        assert_eq!(*board.goal(), Goal::Idle);
        assert!(board.utilities().is_empty());
    }

    #[test]
    fn test_goal_position() {
        let at = Vec2Fixed::from_ints(5, 6);
        assert_eq!(Goal::Scout { position: at }.position(), Some(at));
        assert_eq!(Goal::Attack { target: 3 }.position(), None);
        assert_eq!(
            Goal::Construct {
                structure: UnitTypeId(1),
                position: at
            }
            .position(),
            Some(at)
        );
    }

    #[test]
    fn test_record_utility_overwrites() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        board.record_utility("attack", 0.25);
        board.record_utility("attack", 0.5);
        assert_eq!(board.utility("attack"), Some(0.5));
        assert_eq!(board.utility("scout"), None);
    }
}
