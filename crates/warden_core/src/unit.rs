//! Immutable combat snapshots of units.
//!
//! A [`SimUnit`] is projected once from the environment and never mutated.
//! Every state change (`with_*`) returns a fresh value, so search branches and
//! battle estimates can share a snapshot freely.

use serde::{Deserialize, Serialize};

use crate::catalog::UnitTypeId;
use crate::combat::{DamageType, UnitSize};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Stable identity of a live unit, owned by the environment.
pub type UnitHandle = u64;

/// Weapons with at most this range are melee weapons.
pub const MELEE_RANGE: i32 = 32;

/// Which side a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Owner {
    /// Controlled by this agent.
    #[default]
    Own,
    /// Controlled by the opponent.
    Enemy,
    /// Map features, resources, critters.
    Neutral,
}

impl Owner {
    /// Whether two owners are opposing players.
    #[must_use]
    pub const fn is_hostile_to(self, other: Owner) -> bool {
        matches!(
            (self, other),
            (Owner::Own, Owner::Enemy) | (Owner::Enemy, Owner::Own)
        )
    }
}

/// One weapon system of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Base damage per hit.
    pub damage: u32,
    /// Hits per attack.
    pub hits: u32,
    /// Damage type, scaled against the target's size.
    pub damage_type: DamageType,
    /// Maximum range in distance units.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Frames between attacks.
    pub cooldown_period: u32,
    /// Frames until the weapon can fire again.
    pub cooldown_remaining: u32,
}

impl Weapon {
    /// Create a ready weapon dealing `damage` once per attack.
    #[must_use]
    pub fn new(damage: u32, range: i32, cooldown_period: u32) -> Self {
        Self {
            damage,
            hits: 1,
            damage_type: DamageType::Normal,
            range: Fixed::from_num(range),
            cooldown_period,
            cooldown_remaining: 0,
        }
    }

    /// Builder method to set the damage type.
    #[must_use]
    pub const fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    /// Builder method to set hits per attack.
    #[must_use]
    pub const fn with_hits(mut self, hits: u32) -> Self {
        self.hits = if hits == 0 { 1 } else { hits };
        self
    }

    /// Builder method to set the remaining cooldown (clamped to the period).
    #[must_use]
    pub fn with_cooldown_remaining(mut self, frames: u32) -> Self {
        self.cooldown_remaining = frames.min(self.cooldown_period);
        self
    }

    /// Whether this is a melee weapon.
    #[must_use]
    pub fn is_melee(&self) -> bool {
        self.range <= Fixed::from_num(MELEE_RANGE)
    }

    /// Whether the weapon can fire this frame.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.cooldown_remaining == 0
    }

    /// Readiness fraction: 1 when ready, 0 right after firing.
    #[must_use]
    pub fn readiness(&self) -> f64 {
        if self.cooldown_period == 0 {
            return 1.0;
        }
        let remaining = self.cooldown_remaining.min(self.cooldown_period);
        f64::from(self.cooldown_period - remaining) / f64::from(self.cooldown_period)
    }
}

/// Capability flags resolved when the snapshot is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Airborne; only anti-air weapons can hit it.
    pub flyer: bool,
    /// Resource gatherer.
    pub worker: bool,
    /// Reveals cloaked units.
    pub detector: bool,
    /// Cloaked or burrowed.
    pub cloaked: bool,
    /// Currently revealed by a detector.
    pub detected: bool,
    /// Still under construction.
    pub incomplete: bool,
}

/// Serialized form of [`SimUnit`]; current values are clamped on load.
#[derive(Deserialize)]
struct SimUnitData {
    unit_type: UnitTypeId,
    owner: Owner,
    position: Vec2Fixed,
    hit_points: u32,
    max_hit_points: u32,
    shields: u32,
    max_shields: u32,
    armor: u32,
    size: UnitSize,
    ground_weapon: Option<Weapon>,
    air_weapon: Option<Weapon>,
    #[serde(with = "fixed_serde")]
    top_speed: Fixed,
    value: u32,
    capabilities: Capabilities,
}

impl From<SimUnitData> for SimUnit {
    fn from(data: SimUnitData) -> Self {
        Self {
            unit_type: data.unit_type,
            owner: data.owner,
            position: data.position,
            hit_points: data.hit_points.min(data.max_hit_points),
            max_hit_points: data.max_hit_points,
            shields: data.shields.min(data.max_shields),
            max_shields: data.max_shields,
            armor: data.armor,
            size: data.size,
            ground_weapon: data.ground_weapon,
            air_weapon: data.air_weapon,
            top_speed: data.top_speed,
            value: data.value,
            capabilities: data.capabilities,
        }
    }
}

/// Immutable snapshot of one unit's combat-relevant attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SimUnitData")]
pub struct SimUnit {
    unit_type: UnitTypeId,
    owner: Owner,
    position: Vec2Fixed,
    hit_points: u32,
    max_hit_points: u32,
    shields: u32,
    max_shields: u32,
    armor: u32,
    size: UnitSize,
    ground_weapon: Option<Weapon>,
    air_weapon: Option<Weapon>,
    #[serde(with = "fixed_serde")]
    top_speed: Fixed,
    value: u32,
    capabilities: Capabilities,
}

impl SimUnit {
    /// Create an unarmed, immobile unit at full health.
    #[must_use]
    pub fn new(
        unit_type: UnitTypeId,
        owner: Owner,
        position: Vec2Fixed,
        max_hit_points: u32,
    ) -> Self {
        Self {
            unit_type,
            owner,
            position,
            hit_points: max_hit_points,
            max_hit_points,
            shields: 0,
            max_shields: 0,
            armor: 0,
            size: UnitSize::default(),
            ground_weapon: None,
            air_weapon: None,
            top_speed: Fixed::ZERO,
            value: 0,
            capabilities: Capabilities::default(),
        }
    }

    /// Set maximum shields and refill them.
    #[must_use]
    pub fn with_max_shields(mut self, max_shields: u32) -> Self {
        self.max_shields = max_shields;
        self.shields = max_shields;
        self
    }

    /// Set current hit points, clamped to `[0, max]`.
    #[must_use]
    pub fn with_hit_points(mut self, hit_points: u32) -> Self {
        self.hit_points = hit_points.min(self.max_hit_points);
        self
    }

    /// Set current shields, clamped to `[0, max]`.
    #[must_use]
    pub fn with_shields(mut self, shields: u32) -> Self {
        self.shields = shields.min(self.max_shields);
        self
    }

    /// Set flat armor.
    #[must_use]
    pub fn with_armor(mut self, armor: u32) -> Self {
        self.armor = armor;
        self
    }

    /// Set size class.
    #[must_use]
    pub fn with_size(mut self, size: UnitSize) -> Self {
        self.size = size;
        self
    }

    /// Set the weapon used against ground targets.
    #[must_use]
    pub fn with_ground_weapon(mut self, weapon: Weapon) -> Self {
        self.ground_weapon = Some(weapon);
        self
    }

    /// Set the weapon used against air targets.
    #[must_use]
    pub fn with_air_weapon(mut self, weapon: Weapon) -> Self {
        self.air_weapon = Some(weapon);
        self
    }

    /// Set top speed in distance units per frame.
    #[must_use]
    pub fn with_speed(mut self, top_speed: Fixed) -> Self {
        self.top_speed = top_speed.max(Fixed::ZERO);
        self
    }

    /// Set replacement value.
    #[must_use]
    pub fn with_value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }

    /// Set capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Move to a new position.
    #[must_use]
    pub fn with_position(mut self, position: Vec2Fixed) -> Self {
        self.position = position;
        self
    }

    /// Change owner (e.g. projecting a catalog template for the enemy).
    #[must_use]
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    /// Apply damage: shields absorb first, the rest goes to hit points.
    #[must_use]
    pub fn with_damage(&self, shield_damage: u32, hull_damage: u32) -> Self {
        let mut next = self.clone();
        next.shields = self.shields.saturating_sub(shield_damage);
        next.hit_points = self.hit_points.saturating_sub(hull_damage);
        next
    }

    /// Put the weapon used against `target` on cooldown.
    #[must_use]
    pub fn with_weapon_fired(&self, against_air: bool) -> Self {
        let mut next = self.clone();
        let slot = if against_air {
            &mut next.air_weapon
        } else {
            &mut next.ground_weapon
        };
        if let Some(weapon) = slot.as_mut() {
            weapon.cooldown_remaining = weapon.cooldown_period;
        }
        next
    }

    /// Advance every weapon's cooldown by `frames`.
    #[must_use]
    pub fn with_cooldown_elapsed(&self, frames: u32) -> Self {
        let mut next = self.clone();
        for weapon in [next.ground_weapon.as_mut(), next.air_weapon.as_mut()]
            .into_iter()
            .flatten()
        {
            weapon.cooldown_remaining = weapon.cooldown_remaining.saturating_sub(frames);
        }
        next
    }

    /// Unit type.
    #[must_use]
    pub const fn unit_type(&self) -> UnitTypeId {
        self.unit_type
    }

    /// Owner.
    #[must_use]
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Current hit points.
    #[must_use]
    pub const fn hit_points(&self) -> u32 {
        self.hit_points
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max_hit_points(&self) -> u32 {
        self.max_hit_points
    }

    /// Current shields.
    #[must_use]
    pub const fn shields(&self) -> u32 {
        self.shields
    }

    /// Maximum shields.
    #[must_use]
    pub const fn max_shields(&self) -> u32 {
        self.max_shields
    }

    /// Flat armor.
    #[must_use]
    pub const fn armor(&self) -> u32 {
        self.armor
    }

    /// Size class.
    #[must_use]
    pub const fn size(&self) -> UnitSize {
        self.size
    }

    /// Ground weapon, if any.
    #[must_use]
    pub const fn ground_weapon(&self) -> Option<&Weapon> {
        self.ground_weapon.as_ref()
    }

    /// Air weapon, if any.
    #[must_use]
    pub const fn air_weapon(&self) -> Option<&Weapon> {
        self.air_weapon.as_ref()
    }

    /// All weapons, ground first.
    pub fn weapons(&self) -> impl Iterator<Item = &Weapon> {
        self.ground_weapon.iter().chain(self.air_weapon.iter())
    }

    /// Top speed in distance units per frame.
    #[must_use]
    pub const fn top_speed(&self) -> Fixed {
        self.top_speed
    }

    /// Replacement value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Capability flags.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Airborne.
    #[must_use]
    pub const fn is_flyer(&self) -> bool {
        self.capabilities.flyer
    }

    /// Resource gatherer.
    #[must_use]
    pub const fn is_worker(&self) -> bool {
        self.capabilities.worker
    }

    /// Detector.
    #[must_use]
    pub const fn is_detector(&self) -> bool {
        self.capabilities.detector
    }

    /// Cloaked and not revealed.
    #[must_use]
    pub const fn is_invisible(&self) -> bool {
        self.capabilities.cloaked && !self.capabilities.detected
    }

    /// Construction finished.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        !self.capabilities.incomplete
    }

    /// Hit points above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hit_points > 0
    }

    /// Has at least one weapon.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.ground_weapon.is_some() || self.air_weapon.is_some()
    }

    /// Hit points plus shields.
    #[must_use]
    pub const fn effective_hit_points(&self) -> u32 {
        self.hit_points.saturating_add(self.shields)
    }

    /// Fraction of hit points remaining (1 for a unit with no maximum).
    #[must_use]
    pub fn hp_fraction(&self) -> f64 {
        if self.max_hit_points == 0 {
            return 1.0;
        }
        f64::from(self.hit_points) / f64::from(self.max_hit_points)
    }

    /// The weapon this unit would use against `target`.
    ///
    /// `None` when the target is out of reach of every weapon or invisible.
    #[must_use]
    pub fn weapon_against(&self, target: &SimUnit) -> Option<&Weapon> {
        if target.is_invisible() {
            return None;
        }
        if target.is_flyer() {
            self.air_weapon.as_ref()
        } else {
            self.ground_weapon.as_ref()
        }
    }

    /// Whether this unit can damage `target` at all.
    #[must_use]
    pub fn can_attack(&self, target: &SimUnit) -> bool {
        self.weapon_against(target).is_some_and(|w| w.damage > 0)
    }

    /// The weapon that fired most recently (largest remaining cooldown).
    #[must_use]
    pub fn engaged_weapon(&self) -> Option<&Weapon> {
        self.weapons().fold(None, |best: Option<&Weapon>, w| match best {
            Some(b) if b.cooldown_remaining >= w.cooldown_remaining => Some(b),
            _ => Some(w),
        })
    }

    /// Distance to another unit.
    #[must_use]
    pub fn distance_to(&self, other: &SimUnit) -> Fixed {
        self.position.distance(other.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marine() -> SimUnit {
        SimUnit::new(UnitTypeId(1), Owner::Own, Vec2Fixed::ZERO, 40)
            .with_ground_weapon(Weapon::new(6, 128, 15))
            .with_air_weapon(Weapon::new(6, 128, 15))
            .with_speed(Fixed::from_num(4))
            .with_size(UnitSize::Small)
            .with_value(50)
    }

    #[test]
    fn test_hit_points_clamped() {
        let unit = marine().with_hit_points(500);
        assert_eq!(unit.hit_points(), 40);

        let shielded = marine().with_max_shields(20).with_shields(99);
        assert_eq!(shielded.shields(), 20);
    }

    #[test]
    fn test_deserialize_clamps_current_values() {
        let text = ron::to_string(&marine().with_max_shields(20)).unwrap();
        let tampered = text
            .replace(",hit_points:40,", ",hit_points:900,")
            .replace(",shields:20,", ",shields:75,");
        assert!(tampered.contains("hit_points:900") && tampered.contains(",shields:75,"));

        let unit: SimUnit = ron::from_str(&tampered).unwrap();
        assert_eq!(unit.max_hit_points(), 40);
        assert_eq!(unit.hit_points(), 40);
        assert_eq!(unit.max_shields(), 20);
        assert_eq!(unit.shields(), 20);
        assert!(unit.hp_fraction() <= 1.0);
    }

    #[test]
    fn test_damage_returns_new_snapshot() {
        let original = marine().with_max_shields(10);
        let hurt = original.with_damage(15, 50);

        assert_eq!(original.hit_points(), 40);
        assert_eq!(original.shields(), 10);
        assert_eq!(hurt.shields(), 0);
        assert_eq!(hurt.hit_points(), 0);
        assert!(!hurt.is_alive());
    }

    #[test]
    fn test_weapon_cooldown_cycle() {
        let fired = marine().with_weapon_fired(false);
        let ground = fired.ground_weapon().unwrap();
        assert_eq!(ground.cooldown_remaining, 15);
        assert_eq!(ground.readiness(), 0.0);
        assert!(fired.air_weapon().unwrap().is_ready());

        let later = fired.with_cooldown_elapsed(5);
        let readiness = later.ground_weapon().unwrap().readiness();
        assert!((readiness - 5.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_engaged_weapon_is_most_recent() {
        let fired = marine().with_weapon_fired(true);
        let engaged = fired.engaged_weapon().unwrap();
        assert_eq!(engaged.cooldown_remaining, 15);
    }

    #[test]
    fn test_weapon_against_respects_air_and_cloak() {
        let zealot = SimUnit::new(UnitTypeId(2), Owner::Enemy, Vec2Fixed::ZERO, 100)
            .with_ground_weapon(Weapon::new(8, 15, 22).with_hits(2));
        let flyer = SimUnit::new(UnitTypeId(3), Owner::Own, Vec2Fixed::ZERO, 120)
            .with_capabilities(Capabilities {
                flyer: true,
                ..Capabilities::default()
            });
        assert!(!zealot.can_attack(&flyer));
        assert!(marine().can_attack(&flyer));

        let cloaked = zealot.clone().with_capabilities(Capabilities {
            cloaked: true,
            ..Capabilities::default()
        });
        assert!(!marine().can_attack(&cloaked));
        assert!(zealot.ground_weapon().unwrap().is_melee());
    }

    #[test]
    fn test_owner_hostility() {
        assert!(Owner::Own.is_hostile_to(Owner::Enemy));
        assert!(!Owner::Own.is_hostile_to(Owner::Neutral));
        assert!(!Owner::Enemy.is_hostile_to(Owner::Enemy));
    }
}
