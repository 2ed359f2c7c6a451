//! Lightweight combat simulation over [`SimUnit`] snapshots.
//!
//! This module implements:
//! - Damage-type vs size modifiers with flat armor and a minimum damage floor
//! - Shields that absorb raw damage before hull damage is reduced
//! - [`CombatSimulator::attack_score`], the shared target-ranking primitive
//! - [`CombatSimulator::simulate_battle`], an aggregate outcome estimate used
//!   by the planner when a goal includes beating an opposing army

use serde::{Deserialize, Serialize};

use crate::math::Fixed;
use crate::unit::{SimUnit, Weapon};

/// Size class of a unit; scales incoming damage by damage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UnitSize {
    /// Infantry, small flyers.
    Small,
    /// Light vehicles.
    #[default]
    Medium,
    /// Heavy vehicles, large flyers, structures.
    Large,
}

/// How a weapon's damage interacts with target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageType {
    /// Full damage against every size.
    #[default]
    Normal,
    /// Good against small targets, poor against large ones.
    Concussive,
    /// Good against large targets, poor against small ones.
    Explosive,
}

impl DamageType {
    /// Damage modifier for this damage type against a target size.
    #[must_use]
    pub fn modifier_vs(self, size: UnitSize) -> Fixed {
        let percent = match (self, size) {
            (Self::Normal, _) => 100,

            (Self::Concussive, UnitSize::Small) => 100,
            (Self::Concussive, UnitSize::Medium) => 50,
            (Self::Concussive, UnitSize::Large) => 25,

            (Self::Explosive, UnitSize::Small) => 50,
            (Self::Explosive, UnitSize::Medium) => 75,
            (Self::Explosive, UnitSize::Large) => 100,
        };

        Fixed::from_num(percent) / Fixed::from_num(100)
    }
}

/// Minimum hull damage per hit.
pub const MIN_DAMAGE: u32 = 1;

/// Hull damage of one hit after armor and size modifiers (never below [`MIN_DAMAGE`]).
#[must_use]
pub fn hull_damage(raw: u32, damage_type: DamageType, target: &SimUnit) -> u32 {
    if raw == 0 {
        return 0;
    }
    let after_armor = raw.saturating_sub(target.armor());
    let scaled = Fixed::from_num(after_armor) * damage_type.modifier_vs(target.size());
    scaled.to_num::<u32>().max(MIN_DAMAGE)
}

/// Apply one attack (all of its hits) from `weapon` to `target`.
///
/// Shields soak raw damage; whatever gets through is reduced by armor and size.
#[must_use]
pub fn apply_attack(weapon: &Weapon, target: &SimUnit) -> SimUnit {
    let mut shields = target.shields();
    let mut hull = 0u32;

    for _ in 0..weapon.hits {
        if weapon.damage == 0 {
            break;
        }
        if shields >= weapon.damage {
            shields -= weapon.damage;
        } else {
            let leftover = weapon.damage - shields;
            shields = 0;
            hull = hull.saturating_add(hull_damage(leftover, weapon.damage_type, target));
        }
    }

    target.with_damage(target.shields() - shields, hull)
}

/// Number of attacks `weapon` needs to kill `target`, or `None` if it cannot.
///
/// Counts hits the same way [`apply_attack`] resolves them.
#[must_use]
pub fn attacks_to_kill(weapon: &Weapon, target: &SimUnit) -> Option<u32> {
    let damage = weapon.damage;
    if damage == 0 || !target.is_alive() {
        return if target.is_alive() { None } else { Some(0) };
    }

    let mut hits = 0u32;
    let mut hit_points = target.hit_points();
    let mut shields = target.shields();

    if shields > 0 {
        let absorbed = shields / damage;
        hits += absorbed;
        shields -= absorbed * damage;
        if shields > 0 {
            hits += 1;
            let leftover = damage - shields;
            hit_points =
                hit_points.saturating_sub(hull_damage(leftover, weapon.damage_type, target));
        }
    }

    if hit_points > 0 {
        let per_hit = hull_damage(damage, weapon.damage_type, target);
        hits += hit_points.div_ceil(per_hit);
    }

    Some(hits.div_ceil(weapon.hits.max(1)))
}

/// Result of [`CombatSimulator::simulate_battle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Own units still alive when the fight ended.
    pub own_survivors: Vec<SimUnit>,
    /// Enemy units still alive when the fight ended.
    pub enemy_survivors: Vec<SimUnit>,
    /// Frames simulated.
    pub frames: u32,
}

impl BattleOutcome {
    /// Total replacement value of surviving own units.
    #[must_use]
    pub fn own_value(&self) -> u64 {
        self.own_survivors.iter().map(|u| u64::from(u.value())).sum()
    }

    /// Total replacement value of surviving enemy units.
    #[must_use]
    pub fn enemy_value(&self) -> u64 {
        self.enemy_survivors.iter().map(|u| u64::from(u.value())).sum()
    }

    /// Whether our side won.
    ///
    /// A side that has no armed survivors while the other has any loses;
    /// otherwise the side with more surviving value wins.
    #[must_use]
    pub fn own_wins(&self) -> bool {
        let own_armed = self.own_survivors.iter().any(SimUnit::is_armed);
        let enemy_armed = self.enemy_survivors.iter().any(SimUnit::is_armed);
        match (own_armed, enemy_armed) {
            (true, false) => true,
            (false, true) => false,
            (false, false) => self.enemy_survivors.is_empty() && !self.own_survivors.is_empty(),
            (true, true) => self.own_value() > self.enemy_value(),
        }
    }
}

/// Pairwise and aggregate combat estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatSimulator;

impl CombatSimulator {
    /// Rank `target` for `attacker`; lower is more preferred.
    ///
    /// Combines the time to close into range and kill the target, the
    /// fraction of the attacker's health the target takes back meanwhile,
    /// and the target's replacement value (doubled when it can hit back).
    /// Returns `f64::INFINITY` when the attacker cannot damage the target
    /// or can never reach it.
    #[must_use]
    pub fn attack_score(attacker: &SimUnit, target: &SimUnit) -> f64 {
        let Some(weapon) = attacker.weapon_against(target) else {
            return f64::INFINITY;
        };
        let Some(attacks) = attacks_to_kill(weapon, target) else {
            return f64::INFINITY;
        };

        let gap = attacker.distance_to(target) - weapon.range;
        let closing = if gap <= Fixed::ZERO {
            0.0
        } else if attacker.top_speed() <= Fixed::ZERO {
            return f64::INFINITY;
        } else {
            (gap / attacker.top_speed()).to_num::<f64>()
        };

        let kill = f64::from(weapon.cooldown_remaining)
            + f64::from(attacks.saturating_sub(1)) * f64::from(weapon.cooldown_period)
            + 1.0;
        let engagement = closing + kill;

        let counter_fraction = match target.weapon_against(attacker) {
            Some(counter) if attacker.effective_hit_points() > 0 => {
                let per_attack = f64::from(
                    attacker.effective_hit_points()
                        - apply_attack(counter, attacker).effective_hit_points(),
                );
                let period = f64::from(counter.cooldown_period.max(1));
                let received = per_attack / period * engagement;
                (received / f64::from(attacker.effective_hit_points())).min(1.0)
            }
            _ => 0.0,
        };

        let threat_multiplier = if target.can_attack(attacker) { 2.0 } else { 1.0 };
        let gain = f64::from(target.value().max(1)) * threat_multiplier;

        engagement * (1.0 + counter_fraction) / gain
    }

    /// Index of the most preferred target among `candidates`.
    ///
    /// Ties keep the earliest candidate; unattackable candidates are skipped.
    #[must_use]
    pub fn best_target(attacker: &SimUnit, candidates: &[SimUnit]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if !candidate.is_alive() {
                continue;
            }
            let score = Self::attack_score(attacker, candidate);
            if !score.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Estimate a stand-up fight between two groups.
    ///
    /// Both sides fire simultaneously whenever a weapon comes off cooldown;
    /// each ready unit shoots its [`best_target`](Self::best_target). The fight
    /// ends when a side is wiped out, nobody can hurt anybody, or
    /// `max_frames` elapse.
    #[must_use]
    pub fn simulate_battle(own: &[SimUnit], enemy: &[SimUnit], max_frames: u32) -> BattleOutcome {
        let mut own: Vec<SimUnit> = own.iter().filter(|u| u.is_alive()).cloned().collect();
        let mut enemy: Vec<SimUnit> = enemy.iter().filter(|u| u.is_alive()).cloned().collect();
        let mut frames = 0u32;

        while frames < max_frames && !own.is_empty() && !enemy.is_empty() {
            let own_volley = volley(&own, &enemy);
            let enemy_volley = volley(&enemy, &own);
            if own_volley.is_empty() && enemy_volley.is_empty() {
                let step = earliest(next_ready(&own, &enemy), next_ready(&enemy, &own));
                if step == 0 {
                    break;
                }
                frames = frames.saturating_add(step);
                own = own.iter().map(|u| u.with_cooldown_elapsed(step)).collect();
                enemy = enemy.iter().map(|u| u.with_cooldown_elapsed(step)).collect();
                continue;
            }

            resolve_volley(&mut own, &mut enemy, &own_volley);
            resolve_volley(&mut enemy, &mut own, &enemy_volley);
            own.retain(SimUnit::is_alive);
            enemy.retain(SimUnit::is_alive);

            let step = earliest(next_ready(&own, &enemy), next_ready(&enemy, &own)).max(1);
            frames = frames.saturating_add(step);
            own = own.iter().map(|u| u.with_cooldown_elapsed(step)).collect();
            enemy = enemy.iter().map(|u| u.with_cooldown_elapsed(step)).collect();
        }

        tracing::trace!(
            frames,
            own_left = own.len(),
            enemy_left = enemy.len(),
            "battle estimate finished"
        );

        BattleOutcome {
            own_survivors: own,
            enemy_survivors: enemy,
            frames: frames.min(max_frames),
        }
    }
}

/// Attacks fired this frame: (shooter index, target index).
fn volley(shooters: &[SimUnit], targets: &[SimUnit]) -> Vec<(usize, usize)> {
    shooters
        .iter()
        .enumerate()
        .filter_map(|(index, shooter)| {
            let target = CombatSimulator::best_target(shooter, targets)?;
            let weapon = shooter.weapon_against(&targets[target])?;
            weapon.is_ready().then_some((index, target))
        })
        .collect()
}

fn resolve_volley(shooters: &mut [SimUnit], targets: &mut [SimUnit], attacks: &[(usize, usize)]) {
    for &(shooter, target) in attacks {
        let against_air = targets[target].is_flyer();
        if let Some(weapon) = shooters[shooter].weapon_against(&targets[target]).copied() {
            targets[target] = apply_attack(&weapon, &targets[target]);
            shooters[shooter] = shooters[shooter].with_weapon_fired(against_air);
        }
    }
}

/// Frames until the next shooter that has something to shoot at is ready.
///
/// Returns 0 when no shooter can damage any target.
fn next_ready(shooters: &[SimUnit], targets: &[SimUnit]) -> u32 {
    shooters
        .iter()
        .filter_map(|shooter| {
            targets
                .iter()
                .filter_map(|t| shooter.weapon_against(t))
                .filter(|w| w.damage > 0)
                .map(|w| w.cooldown_remaining.max(1))
                .min()
        })
        .min()
        .unwrap_or(0)
}

/// Smaller of two waits, ignoring sides that have nothing to wait for (0).
fn earliest(a: u32, b: u32) -> u32 {
    match (a, b) {
        (0, other) | (other, 0) => other,
        (a, b) => a.min(b),
    }
}
