//! Production planners.
//!
//! Both planners search over [`GameState`] transitions for an action sequence
//! that reaches a goal composition at the earliest frame. A plan's cost is the
//! frame at which everything it started has finished.
//!
//! - [`DfsPlanner`]: deterministic branch-and-bound depth-first search.
//! - [`MctsPlanner`]: tree search whose node statistic is the minimum frame
//!   count seen through the node.

mod dfs;
mod mcts;

pub use dfs::DfsPlanner;
pub use mcts::{MctsPlanner, NodeId, SearchNode};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{RaceId, TechId, TypeCatalog, TypeKind, UnitTypeId};
use crate::combat::CombatSimulator;
use crate::error::PlanError;
use crate::state::{Action, GameState, TechContext};
use crate::unit::{Owner, SimUnit};

/// Frame count recorded for plans that never reach the goal.
pub const UNREACHED: u32 = u32::MAX;

/// What a planner should produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Race to plan for.
    pub race: RaceId,
    /// Desired completed count per unit type.
    pub goal: BTreeMap<UnitTypeId, u32>,
    /// Army the finished composition must beat in simulation.
    #[serde(default)]
    pub opposing_army: Vec<SimUnit>,
    /// Actions the planner must never choose.
    #[serde(default)]
    pub excluded: BTreeSet<Action>,
    /// Techs and upgrades already owned.
    #[serde(default)]
    pub tech: TechContext,
}

impl PlanRequest {
    /// Create an empty request for `race`.
    #[must_use]
    pub fn new(race: RaceId) -> Self {
        Self {
            race,
            ..Self::default()
        }
    }

    /// Ask for `count` completed instances of `unit_type`.
    #[must_use]
    pub fn with_goal(mut self, unit_type: UnitTypeId, count: u32) -> Self {
        self.goal.insert(unit_type, count);
        self
    }

    /// Require the finished army to beat `army`.
    #[must_use]
    pub fn with_opposing_army(mut self, army: Vec<SimUnit>) -> Self {
        self.opposing_army = army;
        self
    }

    /// Forbid `action`.
    #[must_use]
    pub fn with_excluded(mut self, action: Action) -> Self {
        self.excluded.insert(action);
        self
    }

    /// Techs and upgrades owned at the start.
    #[must_use]
    pub fn with_tech_context(mut self, tech: TechContext) -> Self {
        self.tech = tech;
        self
    }
}

/// Bounds that keep the branching factor manageable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Longest action sequence explored.
    pub max_depth: u32,
    /// Workers that may be added beyond the starting count.
    pub extra_workers: u32,
    /// Producers that may be added beyond the starting count.
    pub extra_producers: u32,
    /// Goal units that may be added beyond the goal when an opposing army is set.
    pub extra_army: u32,
    /// Frame cap for the battle estimate.
    pub battle_frames: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_depth: 40,
            extra_workers: 6,
            extra_producers: 1,
            extra_army: 8,
            battle_frames: 2400,
        }
    }
}

/// Result of a planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPlan {
    /// Actions in issue order.
    pub actions: Vec<Action>,
    /// Frame at which the plan finishes, or [`UNREACHED`].
    pub frames: u32,
    /// Whether the plan satisfies the goal.
    pub goal_reached: bool,
    /// Iterations spent.
    pub iterations: u32,
    /// State after the plan, advanced to completion when the goal is reached.
    pub final_state: GameState,
}

/// Validated request plus the pruning data derived from it.
#[derive(Debug, Clone)]
pub(crate) struct SearchContext<'a> {
    catalog: &'a TypeCatalog,
    request: PlanRequest,
    limits: SearchLimits,
    relevant_units: BTreeSet<UnitTypeId>,
    relevant_techs: BTreeSet<TechId>,
    providers: BTreeSet<UnitTypeId>,
}

impl<'a> SearchContext<'a> {
    /// Validate `request` against `catalog`.
    pub(crate) fn new(
        catalog: &'a TypeCatalog,
        mut request: PlanRequest,
        limits: SearchLimits,
    ) -> Result<Self, PlanError> {
        request.goal.retain(|_, count| *count > 0);
        if request.goal.is_empty() {
            return Err(PlanError::EmptyGoal);
        }

        for id in request.goal.keys() {
            let info = catalog.unit(*id).ok_or(PlanError::UnknownUnitType(*id))?;
            if info.race != request.race {
                return Err(PlanError::WrongRace {
                    unit_type: *id,
                    expected: request.race,
                    actual: info.race,
                });
            }
        }
        for tech in &request.tech.researched {
            catalog.tech(*tech).ok_or(PlanError::UnknownTech(*tech))?;
        }
        for upgrade in request.tech.upgrades.keys() {
            catalog
                .upgrade(*upgrade)
                .ok_or(PlanError::UnknownUpgrade(*upgrade))?;
        }

        let mut relevant_units = BTreeSet::new();
        let mut relevant_techs = BTreeSet::new();
        for id in request.goal.keys() {
            let prereqs = catalog.prerequisites(*id);
            relevant_units.insert(*id);
            relevant_units.extend(prereqs.units);
            relevant_techs.extend(prereqs.techs);
        }
        relevant_units.extend(
            catalog
                .units()
                .filter(|info| info.worker && info.race == request.race)
                .map(|info| info.id),
        );

        let needs_secondary = relevant_units
            .iter()
            .filter_map(|id| catalog.unit(*id).map(|info| info.cost.secondary))
            .chain(
                relevant_techs
                    .iter()
                    .filter_map(|id| catalog.tech(*id).map(|info| info.cost.secondary)),
            )
            .any(|secondary| secondary > 0);
        if needs_secondary {
            relevant_units.extend(
                catalog
                    .units()
                    .filter(|info| info.refinery && info.race == request.race)
                    .map(|info| info.id),
            );
        }

        let providers = catalog
            .units()
            .filter(|info| info.supply_provided > 0 && info.race == request.race)
            .map(|info| info.id)
            .collect();

        Ok(Self {
            catalog,
            request,
            limits,
            relevant_units,
            relevant_techs,
            providers,
        })
    }

    pub(crate) const fn catalog(&self) -> &'a TypeCatalog {
        self.catalog
    }

    pub(crate) const fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    pub(crate) fn goal(&self) -> &BTreeMap<UnitTypeId, u32> {
        &self.request.goal
    }

    /// Apply the request's tech context and check the state can reach the goal.
    pub(crate) fn prepare(&self, initial: &GameState) -> Result<(GameState, Caps), PlanError> {
        if initial.race() != self.request.race {
            return Err(PlanError::RaceMismatch {
                request: self.request.race,
                state: initial.race(),
            });
        }
        let state = initial.clone().with_tech_context(&self.request.tech);

        let reachable = self.reachable_units(&state);
        if let Some(missing) = self.request.goal.keys().find(|id| !reachable.contains(id)) {
            return Err(PlanError::Unreachable(*missing));
        }

        let caps = self.caps(&state);
        Ok((state, caps))
    }

    /// Goal-relevant subset of the available actions.
    pub(crate) fn candidate_actions(&self, state: &GameState, caps: &Caps) -> Vec<Action> {
        state
            .available_actions(self.catalog)
            .into_iter()
            .filter(|action| !self.request.excluded.contains(action))
            .filter(|action| match action {
                Action::Train(id) | Action::Build(id) => {
                    if self.relevant_units.contains(id) {
                        state.committed_count(*id) < caps.limit(*id)
                    } else {
                        self.providers.contains(id) && self.needs_supply(state, caps)
                    }
                }
                Action::Research(tech) => self.relevant_techs.contains(tech),
                Action::Upgrade(_) => false,
            })
            .collect()
    }

    /// If the goal is committed and holds once everything finishes, the
    /// finished state.
    pub(crate) fn finish(&self, state: &GameState) -> Option<GameState> {
        if !state.goal_committed(&self.request.goal) {
            return None;
        }
        let done = state.advance_to_completion(self.catalog);
        (done.goal_satisfied(&self.request.goal) && self.wins_battle(&done)).then_some(done)
    }

    /// Lower is closer to the goal.
    pub(crate) fn shortfall(&self, state: &GameState) -> u32 {
        state.goal_shortfall(&self.request.goal)
    }

    fn wins_battle(&self, state: &GameState) -> bool {
        if self.request.opposing_army.is_empty() {
            return true;
        }
        let own = state.army(self.catalog, Owner::Own);
        CombatSimulator::simulate_battle(&own, &self.request.opposing_army, self.limits.battle_frames)
            .own_wins()
    }

    fn needs_supply(&self, state: &GameState, caps: &Caps) -> bool {
        let projected = state.projected_supply_total(self.catalog);
        if projected >= self.catalog.economy().max_supply {
            return false;
        }
        let goal_supply: u32 = self
            .request
            .goal
            .iter()
            .filter_map(|(id, count)| {
                let info = self.catalog.unit(*id)?;
                Some(count.saturating_sub(state.committed_count(*id)) * info.supply_cost)
            })
            .sum();
        let worker_supply = self
            .catalog
            .units()
            .filter(|info| info.worker && info.race == self.request.race)
            .find(|info| state.committed_count(info.id) < caps.limit(info.id))
            .map_or(0, |info| info.supply_cost);

        state.supply_used() + goal_supply + worker_supply > projected
    }

    /// Types makeable from `state` ignoring resources and time.
    fn reachable_units(&self, state: &GameState) -> BTreeSet<UnitTypeId> {
        let mut units: BTreeSet<UnitTypeId> = state
            .all_instances()
            .filter(|(_, records)| !records.is_empty())
            .map(|(id, _)| id)
            .collect();
        let mut techs: BTreeSet<TechId> = self
            .catalog
            .techs()
            .map(|info| info.id)
            .filter(|id| state.has_tech(*id) || state.is_researching(*id))
            .collect();

        loop {
            let mut changed = false;
            for info in self.catalog.units() {
                if info.race != self.request.race || units.contains(&info.id) {
                    continue;
                }
                let action = match info.kind {
                    TypeKind::Unit => Action::Train(info.id),
                    TypeKind::Structure => Action::Build(info.id),
                };
                if self.request.excluded.contains(&action) {
                    continue;
                }
                if info.producer.map_or(true, |p| units.contains(&p))
                    && info.requires.iter().all(|r| units.contains(r))
                    && info.requires_tech.iter().all(|t| techs.contains(t))
                {
                    units.insert(info.id);
                    changed = true;
                }
            }
            for info in self.catalog.techs() {
                if info.race != self.request.race
                    || techs.contains(&info.id)
                    || self.request.excluded.contains(&Action::Research(info.id))
                {
                    continue;
                }
                if units.contains(&info.researched_at) && info.requires.iter().all(|r| units.contains(r)) {
                    techs.insert(info.id);
                    changed = true;
                }
            }
            if !changed {
                return units;
            }
        }
    }

    fn caps(&self, initial: &GameState) -> Caps {
        let army_slack = if self.request.opposing_army.is_empty() {
            0
        } else {
            self.limits.extra_army
        };

        let producers: BTreeSet<UnitTypeId> = self
            .relevant_units
            .iter()
            .filter_map(|id| self.catalog.unit(*id))
            .filter(|info| info.kind == TypeKind::Unit)
            .filter_map(|info| info.producer)
            .chain(
                self.relevant_techs
                    .iter()
                    .filter_map(|id| self.catalog.tech(*id))
                    .map(|info| info.researched_at),
            )
            .collect();

        let mut limits = BTreeMap::new();
        for id in &self.relevant_units {
            let Some(info) = self.catalog.unit(*id) else {
                continue;
            };
            let base = initial.committed_count(*id);
            let mut cap = base.max(1);
            if let Some(goal) = self.request.goal.get(id) {
                cap = cap.max(goal + army_slack);
            }
            if info.worker {
                cap = cap.max(base + self.limits.extra_workers);
            }
            if producers.contains(id) {
                cap = cap.max(base + self.limits.extra_producers);
            }
            limits.insert(*id, cap);
        }
        Caps(limits)
    }
}

/// Per-type instance caps for one search.
#[derive(Debug, Clone, Default)]
pub(crate) struct Caps(BTreeMap<UnitTypeId, u32>);

impl Caps {
    fn limit(&self, id: UnitTypeId) -> u32 {
        self.0.get(&id).copied().unwrap_or(u32::MAX)
    }
}

/// Replay `actions` from `initial` into a [`BestPlan`].
pub(crate) fn replay(
    context: &SearchContext<'_>,
    initial: &GameState,
    actions: &[Action],
    iterations: u32,
) -> BestPlan {
    let mut state = initial.clone();
    let mut applied = Vec::with_capacity(actions.len());
    for action in actions {
        match state.apply(*action, context.catalog()) {
            Ok(next) => {
                state = next;
                applied.push(*action);
            }
            Err(err) => {
                tracing::warn!(%err, "Plan replay stopped early");
                break;
            }
        }
    }

    match context.finish(&state) {
        Some(done) => BestPlan {
            actions: applied,
            frames: done.frame(),
            goal_reached: true,
            iterations,
            final_state: done,
        },
        None => BestPlan {
            actions: applied,
            frames: UNREACHED,
            goal_reached: false,
            iterations,
            final_state: state,
        },
    }
}
