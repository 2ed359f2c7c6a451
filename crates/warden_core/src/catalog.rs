//! Unit, structure, tech and upgrade tables.
//!
//! The catalog is lookup data supplied by the environment (or a scenario
//! file). Nothing in here is specific to one game; ids are opaque integers and
//! all costs and times are authored as integers so RON files stay readable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::combat::{DamageType, UnitSize};
use crate::error::PlanError;
use crate::math::{from_milli, Vec2Fixed};
use crate::unit::{Capabilities, Owner, SimUnit, Weapon};

/// Identifier for unit and structure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

/// Identifier for a race; every type belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RaceId(pub u8);

/// Identifier for one-shot technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechId(pub u32);

/// Identifier for levelled upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UpgradeId(pub u32);

/// Resource cost of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Primary resource.
    pub primary: u32,
    /// Secondary resource.
    pub secondary: u32,
}

impl Cost {
    /// Create a cost.
    #[must_use]
    pub const fn new(primary: u32, secondary: u32) -> Self {
        Self { primary, secondary }
    }

    /// Replacement value used by combat scoring.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.primary.saturating_add(self.secondary)
    }
}

/// Whether a type is trained from a producer or built by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Trained at a producer structure.
    Unit,
    /// Placed by a worker.
    Structure,
}

/// Weapon stats as authored in catalog data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponProfile {
    /// Damage per hit.
    pub damage: u32,
    /// Hits per attack.
    #[serde(default = "one")]
    pub hits: u32,
    /// Damage type.
    #[serde(default)]
    pub damage_type: DamageType,
    /// Range in distance units.
    pub range: i32,
    /// Frames between attacks.
    pub cooldown: u32,
}

fn one() -> u32 {
    1
}

impl WeaponProfile {
    fn to_weapon(self) -> Weapon {
        Weapon::new(self.damage, self.range, self.cooldown)
            .with_hits(self.hits)
            .with_damage_type(self.damage_type)
    }
}

/// Combat stats used to project a catalog type into a [`SimUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatProfile {
    /// Maximum hit points.
    pub hit_points: u32,
    /// Maximum shields.
    #[serde(default)]
    pub shields: u32,
    /// Flat armor.
    #[serde(default)]
    pub armor: u32,
    /// Size class.
    #[serde(default)]
    pub size: UnitSize,
    /// Weapon against ground targets.
    #[serde(default)]
    pub ground_weapon: Option<WeaponProfile>,
    /// Weapon against air targets.
    #[serde(default)]
    pub air_weapon: Option<WeaponProfile>,
    /// Top speed in thousandths of a distance unit per frame.
    #[serde(default)]
    pub top_speed_milli: u32,
    /// Airborne.
    #[serde(default)]
    pub flyer: bool,
    /// Reveals cloaked units.
    #[serde(default)]
    pub detector: bool,
}

/// Static description of a unit or structure type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeInfo {
    /// Unique identifier.
    pub id: UnitTypeId,
    /// Display name.
    pub name: String,
    /// Owning race.
    pub race: RaceId,
    /// Trained or built.
    pub kind: TypeKind,
    /// Resource cost.
    pub cost: Cost,
    /// Frames to train or build.
    pub build_frames: u32,
    /// Supply consumed.
    #[serde(default)]
    pub supply_cost: u32,
    /// Supply provided once complete.
    #[serde(default)]
    pub supply_provided: u32,
    /// Structure that trains it, or worker type that builds it.
    #[serde(default)]
    pub producer: Option<UnitTypeId>,
    /// Structures that must exist first.
    #[serde(default)]
    pub requires: Vec<UnitTypeId>,
    /// Techs that must be researched first.
    #[serde(default)]
    pub requires_tech: Vec<TechId>,
    /// Gathers resources.
    #[serde(default)]
    pub worker: bool,
    /// Enables secondary resource gathering.
    #[serde(default)]
    pub refinery: bool,
    /// Combat stats, for types that fight or can be fought.
    #[serde(default)]
    pub combat: Option<CombatProfile>,
}

impl UnitTypeInfo {
    /// Create a type with no prerequisites.
    #[must_use]
    pub fn new(
        id: UnitTypeId,
        name: impl Into<String>,
        race: RaceId,
        kind: TypeKind,
        cost: Cost,
        build_frames: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            race,
            kind,
            cost,
            build_frames,
            supply_cost: 0,
            supply_provided: 0,
            producer: None,
            requires: Vec::new(),
            requires_tech: Vec::new(),
            worker: false,
            refinery: false,
            combat: None,
        }
    }

    /// Set supply consumed.
    #[must_use]
    pub fn with_supply_cost(mut self, supply: u32) -> Self {
        self.supply_cost = supply;
        self
    }

    /// Set supply provided.
    #[must_use]
    pub fn with_supply_provided(mut self, supply: u32) -> Self {
        self.supply_provided = supply;
        self
    }

    /// Set the producer.
    #[must_use]
    pub fn with_producer(mut self, producer: UnitTypeId) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Set required structures.
    #[must_use]
    pub fn with_requires(mut self, requires: Vec<UnitTypeId>) -> Self {
        self.requires = requires;
        self
    }

    /// Set required techs.
    #[must_use]
    pub fn with_requires_tech(mut self, techs: Vec<TechId>) -> Self {
        self.requires_tech = techs;
        self
    }

    /// Mark as a worker.
    #[must_use]
    pub fn as_worker(mut self) -> Self {
        self.worker = true;
        self
    }

    /// Mark as a refinery.
    #[must_use]
    pub fn as_refinery(mut self) -> Self {
        self.refinery = true;
        self
    }

    /// Attach combat stats.
    #[must_use]
    pub fn with_combat(mut self, combat: CombatProfile) -> Self {
        self.combat = Some(combat);
        self
    }
}

/// One-shot technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechInfo {
    /// Unique identifier.
    pub id: TechId,
    /// Display name.
    pub name: String,
    /// Owning race.
    pub race: RaceId,
    /// Resource cost.
    pub cost: Cost,
    /// Frames to research.
    pub research_frames: u32,
    /// Structure that researches it.
    pub researched_at: UnitTypeId,
    /// Other structures that must exist first.
    #[serde(default)]
    pub requires: Vec<UnitTypeId>,
}

/// Levelled upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeInfo {
    /// Unique identifier.
    pub id: UpgradeId,
    /// Display name.
    pub name: String,
    /// Owning race.
    pub race: RaceId,
    /// Cost of the first level.
    pub cost: Cost,
    /// Extra cost per level already owned.
    #[serde(default)]
    pub cost_per_level: Cost,
    /// Frames for the first level.
    pub research_frames: u32,
    /// Extra frames per level already owned.
    #[serde(default)]
    pub frames_per_level: u32,
    /// Highest level.
    pub max_level: u8,
    /// Structure that researches it.
    pub researched_at: UnitTypeId,
}

impl UpgradeInfo {
    /// Cost of going from `level` to `level + 1`.
    #[must_use]
    pub fn cost_at(&self, level: u8) -> Cost {
        let level = u32::from(level);
        Cost::new(
            self.cost.primary + self.cost_per_level.primary * level,
            self.cost.secondary + self.cost_per_level.secondary * level,
        )
    }

    /// Frames to go from `level` to `level + 1`.
    #[must_use]
    pub fn frames_at(&self, level: u8) -> u32 {
        self.research_frames + self.frames_per_level * u32::from(level)
    }
}

/// Economy constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyRules {
    /// Primary income per worker per frame, in thousandths.
    pub primary_income_milli: u32,
    /// Secondary income per assigned worker per frame, in thousandths.
    pub secondary_income_milli: u32,
    /// Workers a completed refinery can take.
    pub workers_per_refinery: u32,
    /// Supply cap.
    pub max_supply: u32,
}

impl Default for EconomyRules {
    fn default() -> Self {
        Self {
            primary_income_milli: 45,
            secondary_income_milli: 40,
            workers_per_refinery: 3,
            max_supply: 400,
        }
    }
}

/// Everything a planner may transitively need before it can make a type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prerequisites {
    /// Unit and structure types.
    pub units: BTreeSet<UnitTypeId>,
    /// Techs.
    pub techs: BTreeSet<TechId>,
}

/// Serialized form of [`TypeCatalog`]: flat lists instead of maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    economy: EconomyRules,
    units: Vec<UnitTypeInfo>,
    #[serde(default)]
    techs: Vec<TechInfo>,
    #[serde(default)]
    upgrades: Vec<UpgradeInfo>,
}

/// Registry of all type data, indexed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CatalogData", into = "CatalogData")]
pub struct TypeCatalog {
    economy: EconomyRules,
    units: BTreeMap<UnitTypeId, UnitTypeInfo>,
    techs: BTreeMap<TechId, TechInfo>,
    upgrades: BTreeMap<UpgradeId, UpgradeInfo>,
}

impl From<CatalogData> for TypeCatalog {
    fn from(data: CatalogData) -> Self {
        let mut catalog = TypeCatalog::new(data.economy);
        for unit in data.units {
            catalog.register_unit(unit);
        }
        for tech in data.techs {
            catalog.register_tech(tech);
        }
        for upgrade in data.upgrades {
            catalog.register_upgrade(upgrade);
        }
        catalog
    }
}

impl From<TypeCatalog> for CatalogData {
    fn from(catalog: TypeCatalog) -> Self {
        Self {
            economy: catalog.economy,
            units: catalog.units.into_values().collect(),
            techs: catalog.techs.into_values().collect(),
            upgrades: catalog.upgrades.into_values().collect(),
        }
    }
}

impl TypeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new(economy: EconomyRules) -> Self {
        Self {
            economy,
            units: BTreeMap::new(),
            techs: BTreeMap::new(),
            upgrades: BTreeMap::new(),
        }
    }

    /// Register a unit or structure type.
    pub fn register_unit(&mut self, info: UnitTypeInfo) {
        self.units.insert(info.id, info);
    }

    /// Register a tech.
    pub fn register_tech(&mut self, info: TechInfo) {
        self.techs.insert(info.id, info);
    }

    /// Register an upgrade.
    pub fn register_upgrade(&mut self, info: UpgradeInfo) {
        self.upgrades.insert(info.id, info);
    }

    /// Economy constants.
    #[must_use]
    pub const fn economy(&self) -> &EconomyRules {
        &self.economy
    }

    /// Look up a unit or structure type.
    #[must_use]
    pub fn unit(&self, id: UnitTypeId) -> Option<&UnitTypeInfo> {
        self.units.get(&id)
    }

    /// Look up a tech.
    #[must_use]
    pub fn tech(&self, id: TechId) -> Option<&TechInfo> {
        self.techs.get(&id)
    }

    /// Look up an upgrade.
    #[must_use]
    pub fn upgrade(&self, id: UpgradeId) -> Option<&UpgradeInfo> {
        self.upgrades.get(&id)
    }

    /// All unit and structure types in id order.
    pub fn units(&self) -> impl Iterator<Item = &UnitTypeInfo> {
        self.units.values()
    }

    /// All techs in id order.
    pub fn techs(&self) -> impl Iterator<Item = &TechInfo> {
        self.techs.values()
    }

    /// All upgrades in id order.
    pub fn upgrades(&self) -> impl Iterator<Item = &UpgradeInfo> {
        self.upgrades.values()
    }

    /// Look up a type by display name.
    #[must_use]
    pub fn unit_by_name(&self, name: &str) -> Option<&UnitTypeInfo> {
        self.units.values().find(|u| u.name == name)
    }

    /// Whether any other type, tech or upgrade depends on `id`.
    #[must_use]
    pub fn is_depended_on(&self, id: UnitTypeId) -> bool {
        self.units
            .values()
            .any(|u| u.producer == Some(id) || u.requires.contains(&id))
            || self
                .techs
                .values()
                .any(|t| t.researched_at == id || t.requires.contains(&id))
            || self.upgrades.values().any(|u| u.researched_at == id)
    }

    /// Everything needed, transitively, before `id` can be made.
    ///
    /// Does not include `id` itself unless it is its own prerequisite.
    #[must_use]
    pub fn prerequisites(&self, id: UnitTypeId) -> Prerequisites {
        let mut result = Prerequisites::default();
        let mut pending = vec![id];
        let mut seen = BTreeSet::new();

        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(info) = self.unit(current) else {
                continue;
            };
            for next in info.producer.iter().chain(info.requires.iter()) {
                result.units.insert(*next);
                pending.push(*next);
            }
            for tech_id in &info.requires_tech {
                result.techs.insert(*tech_id);
                if let Some(tech) = self.tech(*tech_id) {
                    for next in std::iter::once(&tech.researched_at).chain(tech.requires.iter()) {
                        result.units.insert(*next);
                        pending.push(*next);
                    }
                }
            }
        }

        result
    }

    /// Project a completed instance of `id` into a [`SimUnit`].
    ///
    /// `None` for unknown types or types without combat stats.
    #[must_use]
    pub fn instantiate(&self, id: UnitTypeId, owner: Owner, position: Vec2Fixed) -> Option<SimUnit> {
        let info = self.unit(id)?;
        let combat = info.combat?;

        let mut unit = SimUnit::new(id, owner, position, combat.hit_points)
            .with_max_shields(combat.shields)
            .with_armor(combat.armor)
            .with_size(combat.size)
            .with_speed(from_milli(combat.top_speed_milli))
            .with_value(info.cost.value())
            .with_capabilities(Capabilities {
                flyer: combat.flyer,
                worker: info.worker,
                detector: combat.detector,
                ..Capabilities::default()
            });
        if let Some(weapon) = combat.ground_weapon {
            unit = unit.with_ground_weapon(weapon.to_weapon());
        }
        if let Some(weapon) = combat.air_weapon {
            unit = unit.with_air_weapon(weapon.to_weapon());
        }
        Some(unit)
    }

    /// Check that every id the catalog references exists and races agree.
    pub fn validate(&self) -> Result<(), PlanError> {
        for info in self.units.values() {
            for dep in info.producer.iter().chain(info.requires.iter()) {
                let dep_info = self.unit(*dep).ok_or(PlanError::UnknownUnitType(*dep))?;
                if dep_info.race != info.race {
                    return Err(PlanError::WrongRace {
                        unit_type: *dep,
                        expected: info.race,
                        actual: dep_info.race,
                    });
                }
            }
            for tech in &info.requires_tech {
                self.tech(*tech).ok_or(PlanError::UnknownTech(*tech))?;
            }
        }
        for tech in self.techs.values() {
            for dep in std::iter::once(&tech.researched_at).chain(tech.requires.iter()) {
                self.unit(*dep).ok_or(PlanError::UnknownUnitType(*dep))?;
            }
        }
        for upgrade in self.upgrades.values() {
            self.unit(upgrade.researched_at)
                .ok_or(PlanError::UnknownUnitType(upgrade.researched_at))?;
        }
        Ok(())
    }
}
