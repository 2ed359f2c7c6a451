//! Utility scores for per-unit behavior arbitration.
//!
//! Every score is a pure function of a [`Board`] and a [`WorldState`] and
//! lies in `[0, 1]`. A board whose unit is missing from the world scores 0.

use serde::{Deserialize, Serialize};

use crate::behavior::{Board, Goal};
use crate::environment::WorldState;
use crate::math::Fixed;
use crate::unit::{Owner, SimUnit};

/// Tuning constants for the scorers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityConfig {
    /// Radius for nearby-unit counts.
    pub nearby_radius: i32,
    /// Scales threat into danger and danger into runaway.
    pub caution: f64,
    /// Saturation count for friendly force.
    pub force_range: f64,
    /// Curve exponent for friendly force.
    pub force_exponent: f64,
    /// Saturation count for threat.
    pub threat_range: f64,
    /// Curve exponent for threat.
    pub threat_exponent: f64,
    /// Saturation count for friendly value.
    pub value_range: f64,
    /// Curve exponent for friendly value.
    pub value_exponent: f64,
    /// Range advantage an enemy needs before the unit falls back.
    pub outrange_margin: i32,
    /// Armed units one detector is expected to cover.
    pub detector_coverage: u32,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            nearby_radius: 300,
            caution: 0.5,
            force_range: 10.0,
            force_exponent: 3.0,
            threat_range: 10.0,
            threat_exponent: 0.8,
            value_range: 10.0,
            value_exponent: 3.0,
            outrange_margin: 16,
            detector_coverage: 40,
        }
    }
}

/// Increasing saturation curve `min(1, (x / range)^k)`.
#[must_use]
pub fn exp_i(range: f64, x: f64, k: f64) -> f64 {
    if range <= 0.0 || x <= 0.0 {
        return 0.0;
    }
    (x / range).powf(k).min(1.0)
}

/// Stateless scorer holding the tuning constants.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UtilityScorer {
    config: UtilityConfig,
}

impl UtilityScorer {
    /// Create a scorer.
    #[must_use]
    pub const fn new(config: UtilityConfig) -> Self {
        Self { config }
    }

    /// Tuning constants.
    #[must_use]
    pub const fn config(&self) -> &UtilityConfig {
        &self.config
    }

    /// Nearby completed friendly armed units, excluding the managed unit.
    #[must_use]
    pub fn force(&self, board: &Board, world: &WorldState) -> f64 {
        let count = self.count_nearby(board, world, |u| {
            u.owner() == Owner::Own && u.is_completed() && u.is_armed()
        });
        exp_i(self.config.force_range, count, self.config.force_exponent)
    }

    /// Nearby armed enemies.
    #[must_use]
    pub fn threat(&self, board: &Board, world: &WorldState) -> f64 {
        let count = self.count_nearby(board, world, |u| u.owner() == Owner::Enemy && u.is_armed());
        exp_i(self.config.threat_range, count, self.config.threat_exponent)
    }

    /// Nearby friendly units of any kind, excluding the managed unit.
    #[must_use]
    pub fn value(&self, board: &Board, world: &WorldState) -> f64 {
        let count = self.count_nearby(board, world, |u| u.owner() == Owner::Own);
        exp_i(self.config.value_range, count, self.config.value_exponent)
    }

    /// Threat relative to friendly force.
    #[must_use]
    pub fn danger(&self, board: &Board, world: &WorldState) -> f64 {
        if world.unit(board.unit()).is_none() {
            return 0.0;
        }
        let threat = self.threat(board, world);
        let force = self.force(board, world);
        (self.config.caution * threat / (0.1 + force)).clamp(0.0, 1.0)
    }

    /// Urge to flee; doubled for workers.
    #[must_use]
    pub fn runaway(&self, board: &Board, world: &WorldState) -> f64 {
        let Some(unit) = world.unit(board.unit()) else {
            return 0.0;
        };
        let eagerness = if unit.is_worker() { 2.0 } else { 1.0 };
        (self.danger(board, world) * self.config.caution * eagerness).min(1.0)
    }

    /// Urge to protect nearby friendly value.
    #[must_use]
    pub fn defend(&self, board: &Board, world: &WorldState) -> f64 {
        (3.0 * self.danger(board, world) * self.value(board, world)).min(1.0)
    }

    /// Readiness of the most ready weapon; 0 when unarmed.
    #[must_use]
    pub fn attack(&self, board: &Board, world: &WorldState) -> f64 {
        world
            .unit(board.unit())
            .map_or(0.0, |unit| unit.weapons().map(|w| w.readiness()).fold(0.0, f64::max))
    }

    /// Urge to step back from enemies that out-range the unit.
    ///
    /// Melee units never fall back.
    #[must_use]
    pub fn fallback(&self, board: &Board, world: &WorldState) -> f64 {
        let Some(unit) = world.unit(board.unit()) else {
            return 0.0;
        };
        let Some(engaged) = unit.engaged_weapon() else {
            return 0.0;
        };
        if engaged.is_melee() {
            return 0.0;
        }
        let applicable = unit.weapons().any(|w| w.is_ready()) || !engaged.is_ready();
        if !applicable {
            return 0.0;
        }

        let cooldown = Fixed::from_num(engaged.cooldown_remaining);
        let margin = Fixed::from_num(self.config.outrange_margin);
        let attackers = world
            .owned_by(Owner::Enemy)
            .filter(|(_, enemy)| enemy.is_alive())
            .filter(|(_, enemy)| self.outranges(unit, enemy, cooldown, margin))
            .count();

        let near_death = (1.0 - unit.hp_fraction()).max(0.0).sqrt();
        (attackers as f64 / 2.0 + near_death).min(1.0)
    }

    /// Indicator of a construction goal, damped by threat.
    #[must_use]
    pub fn construct(&self, board: &Board, world: &WorldState) -> f64 {
        if world.unit(board.unit()).is_none() {
            return 0.0;
        }
        match board.goal() {
            Goal::Construct { .. } => 1.0 - self.threat(board, world),
            _ => 0.0,
        }
    }

    /// Indicator of a scouting goal.
    #[must_use]
    pub fn scout(&self, board: &Board, world: &WorldState) -> f64 {
        let active = world.unit(board.unit()).is_some() && matches!(board.goal(), Goal::Scout { .. });
        f64::from(u8::from(active))
    }

    /// Indicator of a gathering goal.
    #[must_use]
    pub fn gather(&self, board: &Board, world: &WorldState) -> f64 {
        let active = world.unit(board.unit()).is_some() && matches!(board.goal(), Goal::Gather { .. });
        f64::from(u8::from(active))
    }

    /// Need for a mobile detector across the whole army.
    ///
    /// 0 unless an invisible enemy is known; grows with the number of armed
    /// friendly units and shrinks with detectors already fielded.
    #[must_use]
    pub fn need_mobile_detection(&self, world: &WorldState) -> f64 {
        let invisible_enemy = world.owned_by(Owner::Enemy).any(|(_, u)| u.is_invisible());
        if !invisible_enemy {
            return 0.0;
        }
        let own: Vec<&SimUnit> = world.owned_by(Owner::Own).map(|(_, u)| u).collect();
        let armed = own.iter().filter(|u| u.is_armed()).count() as f64;
        let detectors = own.iter().filter(|u| u.is_detector()).count() as f64;
        let coverage = f64::from(self.config.detector_coverage);
        (armed / (detectors * coverage + coverage)).min(1.0)
    }

    fn count_nearby(&self, board: &Board, world: &WorldState, filter: impl Fn(&SimUnit) -> bool) -> f64 {
        let Some(unit) = world.unit(board.unit()) else {
            return 0.0;
        };
        world
            .nearby(unit.position(), Fixed::from_num(self.config.nearby_radius))
            .filter(|(handle, _)| *handle != board.unit())
            .filter(|(_, u)| filter(u))
            .count() as f64
    }

    /// Whether `enemy` can hit `unit`, close the gap before `unit`'s weapon
    /// cools down, and out-range `unit` by more than `margin`.
    fn outranges(&self, unit: &SimUnit, enemy: &SimUnit, cooldown: Fixed, margin: Fixed) -> bool {
        let Some(their_weapon) = enemy.weapon_against(unit) else {
            return false;
        };
        if their_weapon.damage == 0 {
            return false;
        }
        let our_range = unit.weapon_against(enemy).map_or(Fixed::ZERO, |w| w.range);
        if their_weapon.range <= our_range + margin {
            return false;
        }
        let gap = (enemy.distance_to(unit) - their_weapon.range).max(Fixed::ZERO);
        gap <= enemy.top_speed().saturating_mul(cooldown)
    }
}
