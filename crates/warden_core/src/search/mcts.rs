//! Minimum-frames Monte Carlo tree search.
//!
//! Nodes live in an arena indexed by [`NodeId`]; children point back at their
//! parent by index. Every node records the smallest finishing frame seen by
//! any rollout that passed through it, and that minimum drives both
//! selection and read-out. There is no exploration bonus.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::error::PlanError;
use crate::state::{Action, GameState};

use super::{replay, BestPlan, Caps, PlanRequest, SearchContext, SearchLimits, UNREACHED};

/// Default number of transitions per rollout.
pub const DEFAULT_ROLLOUT_DEPTH: u32 = 64;

/// Index of a node in the search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node.
    pub const ROOT: NodeId = NodeId(0);

    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One node of the search tree.
#[derive(Debug, Clone)]
pub struct SearchNode {
    state: Arc<GameState>,
    action: Option<Action>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    untried: Vec<Action>,
    depth: u32,
    visits: u32,
    min_frames: u32,
    best_tail: Vec<Action>,
}

impl SearchNode {
    /// State after the producing action.
    #[must_use]
    pub fn state(&self) -> &Arc<GameState> {
        &self.state
    }

    /// Action that produced this node; `None` for the root.
    #[must_use]
    pub const fn action(&self) -> Option<Action> {
        self.action
    }

    /// Parent node; `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Expanded children.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Rollouts that passed through this node.
    #[must_use]
    pub const fn visits(&self) -> u32 {
        self.visits
    }

    /// Smallest finishing frame seen through this node.
    #[must_use]
    pub const fn min_frames(&self) -> u32 {
        self.min_frames
    }

    /// Whether every candidate action has been expanded.
    #[must_use]
    pub fn is_fully_expanded(&self) -> bool {
        self.untried.is_empty()
    }
}

/// Monte Carlo tree search planner.
pub struct MctsPlanner<'a> {
    context: SearchContext<'a>,
    seed: u64,
    rollout_depth: u32,
    rng: StdRng,
    origin: Option<GameState>,
    caps: Caps,
    nodes: Vec<SearchNode>,
    expansions: u32,
    steps: u32,
}

impl<'a> MctsPlanner<'a> {
    /// Validate `request` and build a planner whose rollouts draw from `seed`.
    pub fn new(
        catalog: &'a TypeCatalog,
        request: PlanRequest,
        limits: SearchLimits,
        seed: u64,
    ) -> Result<Self, PlanError> {
        Ok(Self {
            context: SearchContext::new(catalog, request, limits)?,
            seed,
            rollout_depth: DEFAULT_ROLLOUT_DEPTH,
            rng: StdRng::seed_from_u64(seed),
            origin: None,
            caps: Caps::default(),
            nodes: Vec::new(),
            expansions: 0,
            steps: 0,
        })
    }

    /// Limit each rollout to `depth` transitions.
    #[must_use]
    pub fn with_rollout_depth(mut self, depth: u32) -> Self {
        self.rollout_depth = depth;
        self
    }

    /// Root of the tree, once [`step`](Self::step) has run.
    #[must_use]
    pub fn root(&self) -> Option<&SearchNode> {
        self.nodes.first()
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&SearchNode> {
        self.nodes.get(id.0)
    }

    /// Nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes added since the tree was rooted.
    #[must_use]
    pub const fn expansions(&self) -> u32 {
        self.expansions
    }

    /// Iterations since the tree was rooted.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Run one select, expand, rollout, backpropagate iteration from `state`.
    ///
    /// A `state` different from the current root discards the tree.
    pub fn step(&mut self, state: &GameState) -> Result<(), PlanError> {
        self.ensure_root(state)?;

        let leaf = self.select();
        let node = self.expand(leaf);
        let (frames, tail) = self.rollout(node);
        self.backpropagate(node, frames, tail);

        self.steps += 1;
        Ok(())
    }

    /// Run `steps` iterations and return [`completed_plan`](Self::completed_plan).
    pub fn run(&mut self, state: &GameState, steps: u32) -> Result<BestPlan, PlanError> {
        self.ensure_root(state)?;
        for _ in 0..steps {
            self.step(state)?;
        }
        let plan = self
            .completed_plan()
            .ok_or_else(|| PlanError::InvariantViolated("search tree has no root".to_string()))?;

        tracing::info!(
            steps = self.steps,
            nodes = self.nodes.len(),
            frames = plan.frames,
            goal_reached = plan.goal_reached,
            "MCTS search finished"
        );
        Ok(plan)
    }

    /// Tree path from the root choosing the child with the smallest minimum
    /// frames at each level. Ties go to the earliest expanded child.
    #[must_use]
    pub fn principal_path(&self) -> Vec<NodeId> {
        let mut path = Vec::new();
        if self.nodes.is_empty() {
            return path;
        }
        let mut current = NodeId::ROOT;
        while let Some(next) = self.best_child(current) {
            path.push(next);
            current = next;
        }
        path
    }

    /// Plan made of the actions along [`principal_path`](Self::principal_path).
    ///
    /// Only expanded nodes are used, so the plan has at most
    /// [`expansions`](Self::expansions) actions. `goal_reached` is set when
    /// the path alone reaches the goal.
    #[must_use]
    pub fn read_out(&self) -> Option<BestPlan> {
        let root = self.nodes.first()?;
        let actions: Vec<Action> = self
            .principal_path()
            .iter()
            .filter_map(|id| self.nodes[id.0].action)
            .collect();
        Some(replay(&self.context, &root.state, &actions, self.steps))
    }

    /// Best complete action sequence seen, tree prefix plus rollout.
    ///
    /// Its finishing frame is the root's minimum frames.
    #[must_use]
    pub fn completed_plan(&self) -> Option<BestPlan> {
        let root = self.nodes.first()?;
        Some(replay(&self.context, &root.state, &root.best_tail, self.steps))
    }

    fn ensure_root(&mut self, state: &GameState) -> Result<(), PlanError> {
        if self.origin.as_ref() == Some(state) {
            return Ok(());
        }

        let (prepared, caps) = self.context.prepare(state)?;
        tracing::debug!(frame = state.frame(), "Rooting search tree");

        self.caps = caps;
        self.rng = StdRng::seed_from_u64(self.seed);
        self.nodes.clear();
        self.expansions = 0;
        self.steps = 0;
        let root = self.make_node(Arc::new(prepared), None, None, 0);
        self.nodes.push(root);
        self.origin = Some(state.clone());
        Ok(())
    }

    fn make_node(
        &self,
        state: Arc<GameState>,
        action: Option<Action>,
        parent: Option<NodeId>,
        depth: u32,
    ) -> SearchNode {
        let terminal =
            depth >= self.context.limits().max_depth || self.context.finish(&state).is_some();
        let untried = if terminal {
            Vec::new()
        } else {
            self.context.candidate_actions(&state, &self.caps)
        };
        SearchNode {
            state,
            action,
            parent,
            children: Vec::new(),
            untried,
            depth,
            visits: 0,
            min_frames: UNREACHED,
            best_tail: Vec::new(),
        }
    }

    fn best_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .min_by_key(|child| self.nodes[child.0].min_frames)
    }

    fn select(&self) -> NodeId {
        let mut current = NodeId::ROOT;
        loop {
            let node = &self.nodes[current.0];
            if !node.untried.is_empty() {
                return current;
            }
            match self.best_child(current) {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    fn expand(&mut self, id: NodeId) -> NodeId {
        let node = &self.nodes[id.0];
        if node.untried.is_empty() {
            return id;
        }
        let index = self.rng.gen_range(0..node.untried.len());
        let action = self.nodes[id.0].untried.swap_remove(index);

        let parent = &self.nodes[id.0];
        let Ok(next) = parent.state.apply(action, self.context.catalog()) else {
            return id;
        };
        let child = self.make_node(Arc::new(next), Some(action), Some(id), parent.depth + 1);

        let child_id = NodeId(self.nodes.len());
        self.nodes.push(child);
        self.nodes[id.0].children.push(child_id);
        self.expansions += 1;
        child_id
    }

    fn rollout(&mut self, id: NodeId) -> (u32, Vec<Action>) {
        let mut state = Arc::clone(&self.nodes[id.0].state);
        let mut tail = Vec::new();

        for _ in 0..self.rollout_depth {
            if let Some(done) = self.context.finish(&state) {
                return (done.frame(), tail);
            }
            let candidates = self.context.candidate_actions(&state, &self.caps);
            if candidates.is_empty() {
                return (UNREACHED, tail);
            }
            let action = candidates[self.rng.gen_range(0..candidates.len())];
            match state.apply(action, self.context.catalog()) {
                Ok(next) => {
                    state = Arc::new(next);
                    tail.push(action);
                }
                Err(_) => return (UNREACHED, tail),
            }
        }

        match self.context.finish(&state) {
            Some(done) => (done.frame(), tail),
            None => (UNREACHED, tail),
        }
    }

    fn backpropagate(&mut self, id: NodeId, frames: u32, tail: Vec<Action>) {
        let mut suffix = tail;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &mut self.nodes[node_id.0];
            node.visits += 1;
            if frames < node.min_frames {
                node.min_frames = frames;
                node.best_tail.clone_from(&suffix);
            }
            if let Some(action) = node.action {
                suffix.insert(0, action);
            }
            current = node.parent;
        }
    }
}
