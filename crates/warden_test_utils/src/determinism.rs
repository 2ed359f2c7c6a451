//! Determinism testing utilities.
//!
//! Provides a harness for verifying that planners and state transitions
//! produce identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A plan must be reproducible from the catalog, the starting state, the
//! budget and the seed. Sources of non-determinism include:
//!
//! - **Floating-point math**: resources and positions use fixed-point
//!   arithmetic via [`warden_core::math::Fixed`]. Utility scores are floats
//!   but never feed back into state.
//!
//! - **HashMap iteration order**: every keyed collection in the core is a
//!   `BTreeMap` or `BTreeSet`.
//!
//! - **System randomness**: MCTS rollouts draw from a `StdRng` seeded by the
//!   caller.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: transitions, scores and planners in isolation
//! 2. **Property tests**: random legal action sequences keep state invariants
//! 3. **Parallel tests**: running N planners on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use warden_core::catalog::TypeCatalog;
use warden_core::search::BestPlan;
use warden_core::state::GameState;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Steps performed per run.
    pub steps: u64,
}

impl DeterminismResult {
    fn from_hashes(hashes: Vec<u64>, steps: u64) -> Self {
        Self {
            is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
            hashes,
            steps,
        }
    }

    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Runs are non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a stepped computation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..steps {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    DeterminismResult::from_hashes(hashes, steps)
}

/// Hash of everything a caller can observe in a plan.
#[must_use]
pub fn plan_hash(plan: &BestPlan) -> u64 {
    compute_hash(&(
        &plan.actions,
        plan.frames,
        plan.goal_reached,
        plan.iterations,
        plan.final_state.state_hash(),
    ))
}

/// Run a planner on `runs` scoped threads and compare the plans.
///
/// ```ignore
/// let result = run_parallel_plans(4, || {
///     let catalog = sample_catalog();
///     let planner = DfsPlanner::new(&catalog, request(), SearchLimits::default()).unwrap();
///     planner.run(&starting_state(&catalog), 500).unwrap()
/// });
/// result.assert_deterministic();
/// ```
pub fn run_parallel_plans<F>(runs: usize, plan_fn: F) -> DeterminismResult
where
    F: Fn() -> BestPlan + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..runs).map(|_| s.spawn(|| plan_hash(&plan_fn()))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("planner thread panicked"))
            .collect()
    });

    DeterminismResult::from_hashes(hashes, 1)
}

/// Apply `actions` to two copies of `initial`, returning the index of the
/// first action after which the states differ.
///
/// Actions that are illegal at their position end the comparison.
pub fn find_first_divergence(
    catalog: &TypeCatalog,
    initial: &GameState,
    actions: &[warden_core::state::Action],
) -> Option<usize> {
    let mut a = initial.clone();
    let mut b = initial.clone();
    if a.state_hash() != b.state_hash() {
        return Some(0);
    }
    for (index, action) in actions.iter().enumerate() {
        let (Ok(next_a), Ok(next_b)) = (a.apply(*action, catalog), b.apply(*action, catalog)) else {
            return None;
        };
        if next_a.state_hash() != next_b.state_hash() {
            return Some(index + 1);
        }
        a = next_a;
        b = next_b;
    }
    None
}

/// Verify that a bincode round trip preserves the state exactly.
#[must_use]
pub fn verify_serialization_determinism(state: &GameState) -> bool {
    let Ok(bytes) = state.to_bytes() else {
        return false;
    };
    let Ok(restored) = GameState::from_bytes(&bytes) else {
        return false;
    };
    restored == *state && restored.state_hash() == state.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of scores, combat and transitions.
pub mod strategies {
    use proptest::prelude::*;
    use warden_core::catalog::{TypeCatalog, UnitTypeId};
    use warden_core::environment::WorldState;
    use warden_core::math::{Fixed, Vec2Fixed};
    use warden_core::state::{Action, GameState};
    use warden_core::unit::{Capabilities, Owner, SimUnit, UnitHandle, Weapon};

    /// Generate a fixed-point coordinate.
    ///
    /// Range: -2000 to 2000
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-2000i32..2000i32).prop_map(Fixed::from_num)
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate an owner.
    pub fn arb_owner() -> impl Strategy<Value = Owner> {
        prop_oneof![Just(Owner::Own), Just(Owner::Enemy), Just(Owner::Neutral)]
    }

    /// Generate a weapon, possibly partway through its cooldown.
    pub fn arb_weapon() -> impl Strategy<Value = Weapon> {
        (1u32..40, 1u32..3, 16i32..300, 5u32..60, 0u32..60).prop_map(
            |(damage, hits, range, cooldown, remaining)| {
                Weapon::new(damage, range, cooldown)
                    .with_hits(hits)
                    .with_cooldown_remaining(remaining.min(cooldown))
            },
        )
    }

    /// Generate a unit owned by `owner`.
    pub fn arb_sim_unit(owner: Owner) -> impl Strategy<Value = SimUnit> {
        (
            arb_vec2_position(),
            1u32..400,
            0u32..400,
            0u32..100,
            0u32..4,
            proptest::option::of(arb_weapon()),
            proptest::option::of(arb_weapon()),
            0i32..8,
            any::<(bool, bool, bool)>(),
        )
            .prop_map(
                move |(position, max_hp, hp, shields, armor, ground, air, speed, (flyer, worker, cloaked))| {
                    let mut unit = SimUnit::new(UnitTypeId(1), owner, position, max_hp)
                        .with_hit_points(hp)
                        .with_max_shields(shields)
                        .with_armor(armor)
                        .with_speed(Fixed::from_num(speed))
                        .with_value(max_hp)
                        .with_capabilities(Capabilities {
                            flyer,
                            worker,
                            cloaked,
                            ..Capabilities::default()
                        });
                    if let Some(weapon) = ground {
                        unit = unit.with_ground_weapon(weapon);
                    }
                    if let Some(weapon) = air {
                        unit = unit.with_air_weapon(weapon);
                    }
                    unit
                },
            )
    }

    /// Generate a unit of any owner.
    pub fn arb_any_unit() -> impl Strategy<Value = SimUnit> {
        arb_owner().prop_flat_map(arb_sim_unit)
    }

    /// Generate a snapshot of up to `max_units` units with handles `1..`.
    pub fn arb_world(max_units: usize) -> impl Strategy<Value = WorldState> {
        proptest::collection::vec(arb_any_unit(), 1..max_units).prop_map(|units| {
            let entries = units
                .into_iter()
                .enumerate()
                .map(|(i, u)| (i as UnitHandle + 1, u));
            WorldState::from_units(0, entries)
        })
    }

    /// Generate choices for [`apply_choices`].
    pub fn arb_action_choices(max_len: usize) -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::vec(any::<usize>(), 0..max_len)
    }

    /// Generate an MCTS seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Walk from `initial`, at each step applying the available action
    /// selected by the next choice (modulo the number available).
    ///
    /// Returns every visited state including `initial`. Stops early when no
    /// action is available.
    ///
    /// # Panics
    ///
    /// Panics if a generated action is rejected by `apply`.
    #[must_use]
    pub fn apply_choices(catalog: &TypeCatalog, initial: &GameState, choices: &[usize]) -> Vec<GameState> {
        let mut states = vec![initial.clone()];
        for choice in choices {
            let current = states.last().expect("initial state present");
            let actions: Vec<Action> = current.available_actions(catalog);
            if actions.is_empty() {
                break;
            }
            let action = actions[choice % actions.len()];
            let next = current
                .apply(action, catalog)
                .unwrap_or_else(|e| panic!("available action {action:?} rejected: {e}"));
            states.push(next);
        }
        states
    }
}
