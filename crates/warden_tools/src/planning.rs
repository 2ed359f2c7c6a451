//! Offline build-order planning for a scenario.

use serde::Serialize;

use warden_core::search::{BestPlan, DfsPlanner, MctsPlanner};
use warden_core::state::Action;

use crate::scenario::{Scenario, ScenarioError};

/// Which planner to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlanMethod {
    /// Budgeted depth-first branch and bound.
    Dfs,
    /// Monte Carlo tree search.
    Mcts,
}

/// One step of a rendered plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// Position in the plan, from 1.
    pub index: usize,
    /// Action kind.
    pub kind: &'static str,
    /// Name of the trained, built or researched item.
    pub target: String,
}

/// Plan plus everything needed to print or serialize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// Scenario name.
    pub scenario: String,
    /// Planner used.
    pub method: PlanMethod,
    /// Whether the goal is reached.
    pub goal_reached: bool,
    /// Finishing frame, absent when the goal is not reached.
    pub frames: Option<u32>,
    /// Iterations spent.
    pub iterations: u32,
    /// Actions in issue order.
    pub steps: Vec<PlanStep>,
}

impl PlanReport {
    fn new(scenario: &Scenario, method: PlanMethod, plan: &BestPlan) -> Self {
        let steps = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let (kind, target) = describe(scenario, *action);
                PlanStep {
                    index: i + 1,
                    kind,
                    target,
                }
            })
            .collect();
        Self {
            scenario: scenario.name.clone(),
            method,
            goal_reached: plan.goal_reached,
            frames: plan.goal_reached.then_some(plan.frames),
            iterations: plan.iterations,
            steps,
        }
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("Scenario: {} ({:?})\n", self.scenario, self.method);
        match self.frames {
            Some(frames) => out.push_str(&format!("Goal reached at frame {frames}\n")),
            None => out.push_str("Goal not reached; best partial plan:\n"),
        }
        for step in &self.steps {
            out.push_str(&format!("{:>3}. {} {}\n", step.index, step.kind, step.target));
        }
        out.push_str(&format!("Iterations: {}\n", self.iterations));
        out
    }
}

fn describe(scenario: &Scenario, action: Action) -> (&'static str, String) {
    match action {
        Action::Train(id) => ("train", scenario.type_name(id)),
        Action::Build(id) => ("build", scenario.type_name(id)),
        Action::Research(tech) => (
            "research",
            scenario
                .catalog
                .tech(tech)
                .map_or_else(|| format!("{tech:?}"), |t| t.name.clone()),
        ),
        Action::Upgrade(upgrade) => (
            "upgrade",
            scenario
                .catalog
                .upgrade(upgrade)
                .map_or_else(|| format!("{upgrade:?}"), |u| u.name.clone()),
        ),
    }
}

/// Run a planner on `scenario`.
///
/// `budget` overrides the DFS budget or MCTS step count from the scenario
/// config; `seed` overrides the MCTS seed.
pub fn run_plan(
    scenario: &Scenario,
    method: PlanMethod,
    budget: Option<u32>,
    seed: Option<u64>,
) -> Result<PlanReport, ScenarioError> {
    let search = scenario.config.search;
    let initial = scenario.initial_state()?;
    let request = scenario.request()?;

    let plan = match method {
        PlanMethod::Dfs => {
            let planner = DfsPlanner::new(&scenario.catalog, request, search.limits)?;
            planner.run(&initial, budget.unwrap_or(search.budget))?
        }
        PlanMethod::Mcts => {
            let mut planner =
                MctsPlanner::new(&scenario.catalog, request, search.limits, seed.unwrap_or(search.seed))?
                    .with_rollout_depth(search.rollout_depth);
            // full rollout-completed plan, not the shorter tree read-out
            planner.run(&initial, budget.unwrap_or(search.mcts_steps))?
        }
    };

    Ok(PlanReport::new(scenario, method, &plan))
}
