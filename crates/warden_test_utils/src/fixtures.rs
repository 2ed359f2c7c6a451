//! Test fixtures and helpers.
//!
//! A small sample race, starting states, unit rosters and a mock
//! environment for consistent testing.

use std::collections::BTreeMap;

use fixed::types::I32F32;

use warden_core::catalog::{
    CombatProfile, Cost, EconomyRules, RaceId, TechId, TechInfo, TypeCatalog, TypeKind, UnitTypeId,
    UnitTypeInfo, UpgradeId, UpgradeInfo, WeaponProfile,
};
use warden_core::combat::{DamageType, UnitSize};
use warden_core::environment::{Command, Environment, WorldState};
use warden_core::math::Vec2Fixed;
use warden_core::state::GameState;
use warden_core::unit::{Capabilities, Owner, SimUnit, UnitHandle, Weapon};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Race of the sample catalog.
pub const SAMPLE_RACE: RaceId = RaceId(1);
/// A race with no types in the sample catalog.
pub const OTHER_RACE: RaceId = RaceId(2);

/// Main base: supply and workers.
pub const HUB: UnitTypeId = UnitTypeId(1);
/// Gathers resources and places structures.
pub const WORKER: UnitTypeId = UnitTypeId(2);
/// Supply provider.
pub const DEPOT: UnitTypeId = UnitTypeId(3);
/// Secondary resource extractor.
pub const REFINERY: UnitTypeId = UnitTypeId(4);
/// Trains riflemen.
pub const BARRACKS: UnitTypeId = UnitTypeId(5);
/// Basic ranged infantry.
pub const RIFLEMAN: UnitTypeId = UnitTypeId(6);
/// Research building for infantry.
pub const ACADEMY: UnitTypeId = UnitTypeId(7);
/// Builds tanks.
pub const FACTORY: UnitTypeId = UnitTypeId(8);
/// Heavy ground unit; needs the secondary resource.
pub const TANK: UnitTypeId = UnitTypeId(9);
/// Builds flyers.
pub const STARPORT: UnitTypeId = UnitTypeId(10);
/// Fast ranged flyer.
pub const INTERCEPTOR: UnitTypeId = UnitTypeId(11);
/// A unit type of [`OTHER_RACE`].
pub const FOREIGN_UNIT: UnitTypeId = UnitTypeId(90);

/// Combat stimulant, researched at the academy.
pub const STIM: TechId = TechId(1);
/// Levelled infantry armor, researched at the academy.
pub const INFANTRY_ARMOR: UpgradeId = UpgradeId(1);

fn weapon(damage: u32, range: i32, cooldown: u32) -> WeaponProfile {
    WeaponProfile {
        damage,
        hits: 1,
        damage_type: DamageType::Normal,
        range,
        cooldown,
    }
}

fn combat(hit_points: u32, size: UnitSize, top_speed_milli: u32) -> CombatProfile {
    CombatProfile {
        hit_points,
        shields: 0,
        armor: 0,
        size,
        ground_weapon: None,
        air_weapon: None,
        top_speed_milli,
        flyer: false,
        detector: false,
    }
}

/// Economy tuned so plans finish in a few thousand frames.
#[must_use]
pub fn sample_economy() -> EconomyRules {
    EconomyRules {
        primary_income_milli: 1000,
        secondary_income_milli: 500,
        workers_per_refinery: 3,
        max_supply: 60,
    }
}

/// A complete small race: economy, three producers, three army units, one
/// tech and one upgrade. Also registers one type of [`OTHER_RACE`].
#[must_use]
pub fn sample_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new(sample_economy());
    let race = SAMPLE_RACE;

    catalog.register_unit(
        UnitTypeInfo::new(HUB, "Hub", race, TypeKind::Structure, Cost::new(400, 0), 1000)
            .with_producer(WORKER)
            .with_supply_provided(10)
            .with_combat(combat(1500, UnitSize::Large, 0)),
    );
    catalog.register_unit(
        UnitTypeInfo::new(WORKER, "Worker", race, TypeKind::Unit, Cost::new(50, 0), 100)
            .with_producer(HUB)
            .with_supply_cost(1)
            .as_worker()
            .with_combat(CombatProfile {
                ground_weapon: Some(weapon(5, 16, 22)),
                ..combat(45, UnitSize::Small, 2800)
            }),
    );
    catalog.register_unit(
        UnitTypeInfo::new(DEPOT, "Depot", race, TypeKind::Structure, Cost::new(100, 0), 200)
            .with_producer(WORKER)
            .with_supply_provided(8)
            .with_combat(combat(500, UnitSize::Large, 0)),
    );
    catalog.register_unit(
        UnitTypeInfo::new(REFINERY, "Refinery", race, TypeKind::Structure, Cost::new(75, 0), 150)
            .with_producer(WORKER)
            .as_refinery(),
    );
    catalog.register_unit(
        UnitTypeInfo::new(BARRACKS, "Barracks", race, TypeKind::Structure, Cost::new(150, 0), 300)
            .with_producer(WORKER)
            .with_requires(vec![HUB]),
    );
    catalog.register_unit(
        UnitTypeInfo::new(RIFLEMAN, "Rifleman", race, TypeKind::Unit, Cost::new(50, 0), 150)
            .with_producer(BARRACKS)
            .with_supply_cost(1)
            .with_combat(CombatProfile {
                ground_weapon: Some(weapon(6, 128, 15)),
                air_weapon: Some(weapon(6, 128, 15)),
                ..combat(40, UnitSize::Small, 4000)
            }),
    );
    catalog.register_unit(
        UnitTypeInfo::new(ACADEMY, "Academy", race, TypeKind::Structure, Cost::new(150, 0), 300)
            .with_producer(WORKER)
            .with_requires(vec![BARRACKS]),
    );
    catalog.register_unit(
        UnitTypeInfo::new(FACTORY, "Factory", race, TypeKind::Structure, Cost::new(200, 100), 400)
            .with_producer(WORKER)
            .with_requires(vec![BARRACKS]),
    );
    catalog.register_unit(
        UnitTypeInfo::new(TANK, "Tank", race, TypeKind::Unit, Cost::new(150, 100), 300)
            .with_producer(FACTORY)
            .with_supply_cost(2)
            .with_combat(CombatProfile {
                armor: 1,
                ground_weapon: Some(WeaponProfile {
                    damage_type: DamageType::Explosive,
                    ..weapon(30, 224, 37)
                }),
                ..combat(150, UnitSize::Large, 4000)
            }),
    );
    catalog.register_unit(
        UnitTypeInfo::new(STARPORT, "Starport", race, TypeKind::Structure, Cost::new(150, 100), 400)
            .with_producer(WORKER)
            .with_requires(vec![FACTORY]),
    );
    catalog.register_unit(
        UnitTypeInfo::new(INTERCEPTOR, "Interceptor", race, TypeKind::Unit, Cost::new(150, 100), 400)
            .with_producer(STARPORT)
            .with_supply_cost(2)
            .with_combat(CombatProfile {
                ground_weapon: Some(weapon(8, 160, 30)),
                air_weapon: Some(weapon(20, 160, 22)),
                flyer: true,
                ..combat(120, UnitSize::Large, 6670)
            }),
    );
    catalog.register_unit(
        UnitTypeInfo::new(FOREIGN_UNIT, "Foreign", OTHER_RACE, TypeKind::Unit, Cost::new(50, 0), 100)
            .with_supply_cost(1),
    );

    catalog.register_tech(TechInfo {
        id: STIM,
        name: "Stim".into(),
        race,
        cost: Cost::new(100, 100),
        research_frames: 500,
        researched_at: ACADEMY,
        requires: Vec::new(),
    });
    catalog.register_upgrade(UpgradeInfo {
        id: INFANTRY_ARMOR,
        name: "Infantry Armor".into(),
        race,
        cost: Cost::new(100, 100),
        cost_per_level: Cost::new(50, 50),
        research_frames: 400,
        frames_per_level: 100,
        max_level: 3,
        researched_at: ACADEMY,
    });

    catalog
}

/// One hub, four workers and 50 of the primary resource at frame zero.
#[must_use]
pub fn starting_state(catalog: &TypeCatalog) -> GameState {
    GameState::new(SAMPLE_RACE)
        .with_units(catalog, HUB, 1)
        .with_units(catalog, WORKER, 4)
        .with_resources(50, 0)
}

/// [`starting_state`] plus a finished barracks.
#[must_use]
pub fn barracks_state(catalog: &TypeCatalog) -> GameState {
    starting_state(catalog).with_units(catalog, BARRACKS, 1)
}

/// Ranged infantry at `(x, y)`.
#[must_use]
pub fn rifleman(owner: Owner, x: i32, y: i32) -> SimUnit {
    SimUnit::new(RIFLEMAN, owner, pos(x, y), 40)
        .with_size(UnitSize::Small)
        .with_ground_weapon(Weapon::new(6, 128, 15))
        .with_air_weapon(Weapon::new(6, 128, 15))
        .with_speed(fixed(4))
        .with_value(50)
}

/// Melee infantry with a shield at `(x, y)`.
#[must_use]
pub fn brawler(owner: Owner, x: i32, y: i32) -> SimUnit {
    SimUnit::new(UnitTypeId(20), owner, pos(x, y), 100)
        .with_max_shields(60)
        .with_armor(1)
        .with_size(UnitSize::Small)
        .with_ground_weapon(Weapon::new(8, 16, 22).with_hits(2))
        .with_speed(fixed(4))
        .with_value(100)
}

/// Long-range siege unit at `(x, y)`.
#[must_use]
pub fn tank(owner: Owner, x: i32, y: i32) -> SimUnit {
    SimUnit::new(TANK, owner, pos(x, y), 150)
        .with_armor(1)
        .with_size(UnitSize::Large)
        .with_ground_weapon(Weapon::new(30, 224, 37).with_damage_type(DamageType::Explosive))
        .with_speed(fixed(4))
        .with_value(250)
}

/// Fast ranged flyer at `(x, y)`.
#[must_use]
pub fn interceptor(owner: Owner, x: i32, y: i32) -> SimUnit {
    SimUnit::new(INTERCEPTOR, owner, pos(x, y), 120)
        .with_size(UnitSize::Large)
        .with_ground_weapon(Weapon::new(8, 160, 30))
        .with_air_weapon(Weapon::new(20, 160, 22))
        .with_speed(fixed_f(6.67))
        .with_value(250)
        .with_capabilities(Capabilities {
            flyer: true,
            ..Capabilities::default()
        })
}

/// Unarmed gatherer at `(x, y)`.
#[must_use]
pub fn worker(owner: Owner, x: i32, y: i32) -> SimUnit {
    SimUnit::new(WORKER, owner, pos(x, y), 45)
        .with_size(UnitSize::Small)
        .with_speed(fixed_f(2.8))
        .with_value(50)
        .with_capabilities(Capabilities {
            worker: true,
            ..Capabilities::default()
        })
}

/// Mobile detector at `(x, y)`.
#[must_use]
pub fn detector(owner: Owner, x: i32, y: i32) -> SimUnit {
    SimUnit::new(UnitTypeId(21), owner, pos(x, y), 60)
        .with_speed(fixed(3))
        .with_value(75)
        .with_capabilities(Capabilities {
            flyer: true,
            detector: true,
            ..Capabilities::default()
        })
}

/// Resource field at `(x, y)`.
#[must_use]
pub fn resource_field(x: i32, y: i32) -> SimUnit {
    SimUnit::new(UnitTypeId(30), Owner::Neutral, pos(x, y), 1)
}

/// `count` riflemen in a row starting at `(x, y)`, 20 units apart.
#[must_use]
pub fn rifle_squad(owner: Owner, count: u32, x: i32, y: i32) -> Vec<SimUnit> {
    (0..count)
        .map(|i| rifleman(owner, x + 20 * i32::try_from(i).unwrap_or(i32::MAX / 40), y))
        .collect()
}

/// Scriptable environment that records issued commands.
///
/// Commands are not applied to the units; tests move units explicitly.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    frame: u32,
    units: BTreeMap<UnitHandle, SimUnit>,
    commands: Vec<(UnitHandle, Command)>,
}

impl MockEnvironment {
    /// Create an empty environment at frame zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a unit.
    #[must_use]
    pub fn with_unit(mut self, handle: UnitHandle, unit: SimUnit) -> Self {
        self.units.insert(handle, unit);
        self
    }

    /// Add or replace a unit.
    pub fn insert_unit(&mut self, handle: UnitHandle, unit: SimUnit) {
        self.units.insert(handle, unit);
    }

    /// Remove a unit, returning it.
    pub fn remove_unit(&mut self, handle: UnitHandle) -> Option<SimUnit> {
        self.units.remove(&handle)
    }

    /// Advance the clock.
    pub fn advance(&mut self, frames: u32) {
        self.frame = self.frame.saturating_add(frames);
    }

    /// Commands issued so far, in order.
    #[must_use]
    pub fn commands(&self) -> &[(UnitHandle, Command)] {
        &self.commands
    }

    /// Commands issued to one unit.
    #[must_use]
    pub fn commands_for(&self, handle: UnitHandle) -> Vec<Command> {
        self.commands
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, c)| *c)
            .collect()
    }

    /// Drain the command log.
    pub fn take_commands(&mut self) -> Vec<(UnitHandle, Command)> {
        std::mem::take(&mut self.commands)
    }

    /// Snapshot of the current units.
    #[must_use]
    pub fn world(&self) -> WorldState {
        WorldState::capture(self)
    }
}

impl Environment for MockEnvironment {
    fn snapshot_units(&self) -> Vec<(UnitHandle, SimUnit)> {
        self.units.iter().map(|(h, u)| (*h, u.clone())).collect()
    }

    fn issue_command(&mut self, handle: UnitHandle, command: Command) {
        self.commands.push((handle, command));
    }

    fn current_frame(&self) -> u32 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_catalog_is_valid() {
        let catalog = sample_catalog();
        catalog.validate().unwrap();
        assert_eq!(catalog.unit_by_name("Tank").map(|u| u.id), Some(TANK));
    }

    #[test]
    fn test_starting_state() {
        let catalog = sample_catalog();
        let state = starting_state(&catalog);
        assert_eq!(state.supply_used(), 4);
        assert_eq!(state.supply_total(), 10);
        assert_eq!(state.completed_count(WORKER), 4);
    }

    #[test]
    fn test_catalog_projection_matches_roster() {
        let catalog = sample_catalog();
        let projected = catalog.instantiate(RIFLEMAN, Owner::Own, pos(0, 0)).unwrap();
        let roster = rifleman(Owner::Own, 0, 0);
        assert_eq!(projected.max_hit_points(), roster.max_hit_points());
        assert_eq!(projected.ground_weapon(), roster.ground_weapon());
    }

    #[test]
    fn test_mock_environment_records_commands() {
        let mut env = MockEnvironment::new().with_unit(1, rifleman(Owner::Own, 0, 0));
        env.issue_command(1, Command::Move(pos(5, 5)));
        env.advance(3);
        assert_eq!(env.current_frame(), 3);
        assert_eq!(env.commands_for(1), vec![Command::Move(pos(5, 5))]);
        assert_eq!(env.world().len(), 1);
        assert_eq!(env.take_commands().len(), 1);
        assert!(env.commands().is_empty());
    }
}
