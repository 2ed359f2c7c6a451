//! Boundary to the game environment.
//!
//! The agent never touches live engine objects. Each tick it captures a
//! [`WorldState`] snapshot through [`Environment`], decides, and sends
//! [`Command`]s back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::UnitTypeId;
use crate::math::{Fixed, Vec2Fixed};
use crate::unit::{Owner, SimUnit, UnitHandle};

/// Order sent to one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Move to a position.
    Move(Vec2Fixed),
    /// Harvest from a resource.
    Gather(UnitHandle),
    /// Train a unit at this producer.
    Train(UnitTypeId),
    /// Place a structure.
    Build(UnitTypeId, Vec2Fixed),
    /// Attack a unit.
    Attack(UnitHandle),
}

/// The game as seen by the agent.
pub trait Environment {
    /// Every visible unit, keyed by its engine handle.
    fn snapshot_units(&self) -> Vec<(UnitHandle, SimUnit)>;

    /// Send an order. Fire-and-forget.
    fn issue_command(&mut self, handle: UnitHandle, command: Command);

    /// Current game frame.
    fn current_frame(&self) -> u32;
}

/// Snapshot of every visible unit at one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    frame: u32,
    units: BTreeMap<UnitHandle, SimUnit>,
}

impl WorldState {
    /// Capture the current environment.
    #[must_use]
    pub fn capture(env: &dyn Environment) -> Self {
        Self::from_units(env.current_frame(), env.snapshot_units())
    }

    /// Build a snapshot from explicit units.
    #[must_use]
    pub fn from_units(frame: u32, units: impl IntoIterator<Item = (UnitHandle, SimUnit)>) -> Self {
        Self {
            frame,
            units: units.into_iter().collect(),
        }
    }

    /// Frame of the snapshot.
    #[must_use]
    pub const fn frame(&self) -> u32 {
        self.frame
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, handle: UnitHandle) -> Option<&SimUnit> {
        self.units.get(&handle)
    }

    /// All units in handle order.
    pub fn units(&self) -> impl Iterator<Item = (UnitHandle, &SimUnit)> {
        self.units.iter().map(|(h, u)| (*h, u))
    }

    /// Units with the given owner.
    pub fn owned_by(&self, owner: Owner) -> impl Iterator<Item = (UnitHandle, &SimUnit)> {
        self.units().filter(move |(_, u)| u.owner() == owner)
    }

    /// Units within `radius` of `position`, inclusive.
    pub fn nearby(
        &self,
        position: Vec2Fixed,
        radius: Fixed,
    ) -> impl Iterator<Item = (UnitHandle, &SimUnit)> {
        self.units()
            .filter(move |(_, u)| u.position().within(position, radius))
    }

    /// Number of units in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticEnv {
        units: Vec<(UnitHandle, SimUnit)>,
    }

    impl Environment for StaticEnv {
        fn snapshot_units(&self) -> Vec<(UnitHandle, SimUnit)> {
            self.units.clone()
        }

        fn issue_command(&mut self, _handle: UnitHandle, _command: Command) {}

        fn current_frame(&self) -> u32 {
            42
        }
    }

    fn unit(owner: Owner, x: i32) -> SimUnit {
        SimUnit::new(UnitTypeId(1), owner, Vec2Fixed::from_ints(x, 0), 40)
    }

    #[test]
    fn test_capture_copies_snapshot() {
        let env = StaticEnv {
            units: vec![(3, unit(Owner::Own, 0)), (1, unit(Owner::Enemy, 500))],
        };
        let world = WorldState::capture(&env);
        assert_eq!(world.frame(), 42);
        assert_eq!(world.len(), 2);
        let handles: Vec<_> = world.units().map(|(h, _)| h).collect();
        assert_eq!(handles, vec![1, 3]);
    }

    #[test]
    fn test_nearby_and_owner_filters() {
        let world = WorldState::from_units(
            0,
            vec![
                (1, unit(Owner::Own, 0)),
                (2, unit(Owner::Own, 299)),
                (3, unit(Owner::Enemy, 300)),
                (4, unit(Owner::Enemy, 301)),
            ],
        );
        let near: Vec<_> = world
            .nearby(Vec2Fixed::ZERO, Fixed::from_num(300))
            .map(|(h, _)| h)
            .collect();
        assert_eq!(near, vec![1, 2, 3]);
        assert_eq!(world.owned_by(Owner::Enemy).count(), 2);
    }
}
