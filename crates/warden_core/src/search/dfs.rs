//! Budgeted depth-first planner.

use std::cmp::Reverse;

use crate::catalog::TypeCatalog;
use crate::error::PlanError;
use crate::state::{Action, GameState};

use super::{BestPlan, Caps, PlanRequest, SearchContext, SearchLimits, UNREACHED};

/// Deterministic branch-and-bound depth-first search.
///
/// Each applied transition costs one iteration. The explored order depends
/// only on the state and the catalog, so a run with a larger budget explores
/// a superset of a smaller run and never reports a later finishing frame.
#[derive(Debug, Clone)]
pub struct DfsPlanner<'a> {
    context: SearchContext<'a>,
}

impl<'a> DfsPlanner<'a> {
    /// Validate `request` and build a planner.
    pub fn new(
        catalog: &'a TypeCatalog,
        request: PlanRequest,
        limits: SearchLimits,
    ) -> Result<Self, PlanError> {
        Ok(Self {
            context: SearchContext::new(catalog, request, limits)?,
        })
    }

    /// Search from `initial` for at most `budget` transitions.
    ///
    /// Returns the earliest-finishing plan found, or the most progressed
    /// partial plan with `goal_reached == false`.
    pub fn run(&self, initial: &GameState, budget: u32) -> Result<BestPlan, PlanError> {
        let (root, caps) = self.context.prepare(initial)?;

        let mut search = Search {
            context: &self.context,
            caps: &caps,
            budget,
            iterations: 0,
            path: Vec::new(),
            best: None,
            partial: None,
        };
        search.visit(&root, 0);

        let iterations = search.iterations;
        let plan = match (search.best, search.partial) {
            (Some(found), _) => BestPlan {
                actions: found.actions,
                frames: found.state.frame(),
                goal_reached: true,
                iterations,
                final_state: found.state,
            },
            (None, Some(partial)) => BestPlan {
                actions: partial.actions,
                frames: UNREACHED,
                goal_reached: false,
                iterations,
                final_state: partial.state,
            },
            (None, None) => BestPlan {
                actions: Vec::new(),
                frames: UNREACHED,
                goal_reached: false,
                iterations,
                final_state: root,
            },
        };

        tracing::info!(
            iterations = plan.iterations,
            frames = plan.frames,
            actions = plan.actions.len(),
            goal_reached = plan.goal_reached,
            "DFS search finished"
        );
        Ok(plan)
    }
}

struct Candidate {
    actions: Vec<Action>,
    state: GameState,
}

struct Partial {
    shortfall: u32,
    actions: Vec<Action>,
    state: GameState,
}

struct Search<'s, 'a> {
    context: &'s SearchContext<'a>,
    caps: &'s Caps,
    budget: u32,
    iterations: u32,
    path: Vec<Action>,
    best: Option<Candidate>,
    partial: Option<Partial>,
}

impl Search<'_, '_> {
    fn best_frames(&self) -> u32 {
        self.best.as_ref().map_or(UNREACHED, |b| b.state.frame())
    }

    fn visit(&mut self, state: &GameState, depth: u32) {
        if let Some(done) = self.context.finish(state) {
            if done.frame() < self.best_frames() {
                self.best = Some(Candidate {
                    actions: self.path.clone(),
                    state: done,
                });
            }
            return;
        }

        // fewest missing goal units, then deepest path, then earliest frame
        let shortfall = self.context.shortfall(state);
        let rank = (shortfall, Reverse(self.path.len()), state.frame());
        let improves = self.partial.as_ref().map_or(true, |p| {
            rank < (p.shortfall, Reverse(p.actions.len()), p.state.frame())
        });
        if improves {
            self.partial = Some(Partial {
                shortfall,
                actions: self.path.clone(),
                state: state.clone(),
            });
        }

        if depth >= self.context.limits().max_depth || state.completion_frame() >= self.best_frames() {
            return;
        }

        for action in self.context.candidate_actions(state, self.caps) {
            if self.iterations >= self.budget {
                return;
            }
            self.iterations += 1;

            let Ok(next) = state.apply(action, self.context.catalog()) else {
                continue;
            };
            if next.completion_frame() >= self.best_frames() {
                continue;
            }

            self.path.push(action);
            self.visit(&next, depth + 1);
            self.path.pop();
        }
    }
}
