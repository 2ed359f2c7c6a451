//! Behavior tree nodes.

use std::fmt;
use std::sync::Arc;

use crate::environment::{Environment, WorldState};
use crate::utility::UtilityScorer;

use super::{ActionOutcome, Board, Leaf};

/// Everything a node needs for one tick.
pub struct TickContext<'a> {
    /// Board of the unit being ticked.
    pub board: &'a mut Board,
    /// Snapshot for this tick.
    pub world: &'a WorldState,
    /// Where commands go.
    pub env: &'a mut dyn Environment,
    /// Utility scorer.
    pub scorer: &'a UtilityScorer,
}

/// Shared user-supplied closure.
pub struct Custom<F: ?Sized>(pub Arc<F>);

impl<F: ?Sized> Clone for Custom<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> fmt::Debug for Custom<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Custom(..)")
    }
}

/// Signature of a custom utility function.
pub type UtilityFn = dyn Fn(&Board, &WorldState) -> f64 + Send + Sync;

/// How a task's utility is computed.
#[derive(Debug, Clone)]
pub enum Utility {
    /// Fixed value.
    Constant(f64),
    /// [`UtilityScorer::attack`].
    Attack,
    /// [`UtilityScorer::fallback`].
    Fallback,
    /// [`UtilityScorer::runaway`].
    Runaway,
    /// [`UtilityScorer::defend`].
    Defend,
    /// [`UtilityScorer::construct`].
    Construct,
    /// [`UtilityScorer::scout`].
    Scout,
    /// [`UtilityScorer::gather`].
    Gather,
    /// User-supplied function.
    Custom(Custom<UtilityFn>),
}

impl Utility {
    /// Wrap a closure.
    pub fn custom(f: impl Fn(&Board, &WorldState) -> f64 + Send + Sync + 'static) -> Self {
        let f: Arc<UtilityFn> = Arc::new(f);
        Utility::Custom(Custom(f))
    }

    /// Score in `[0, 1]`; NaN scores 0.
    #[must_use]
    pub fn score(&self, scorer: &UtilityScorer, board: &Board, world: &WorldState) -> f64 {
        let raw = match self {
            Utility::Constant(value) => *value,
            Utility::Attack => scorer.attack(board, world),
            Utility::Fallback => scorer.fallback(board, world),
            Utility::Runaway => scorer.runaway(board, world),
            Utility::Defend => scorer.defend(board, world),
            Utility::Construct => scorer.construct(board, world),
            Utility::Scout => scorer.scout(board, world),
            Utility::Gather => scorer.gather(board, world),
            Utility::Custom(f) => (f.0)(board, world),
        };
        if raw.is_nan() || raw <= 0.0 {
            0.0
        } else {
            raw.min(1.0)
        }
    }
}

/// A named node with a utility used by its parent selector.
#[derive(Debug, Clone)]
pub struct UtilityTask {
    name: String,
    utility: Utility,
    node: Box<Node>,
}

impl UtilityTask {
    /// Create a task.
    pub fn new(name: impl Into<String>, utility: Utility, node: Node) -> Self {
        Self {
            name: name.into(),
            utility,
            node: Box::new(node),
        }
    }

    /// Task name, used as the key in the board's utility cache.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Utility function.
    #[must_use]
    pub const fn utility(&self) -> &Utility {
        &self.utility
    }

    /// Tick the wrapped node.
    pub fn tick(&self, ctx: &mut TickContext<'_>) -> ActionOutcome {
        self.node.tick(ctx)
    }
}

/// Behavior tree node.
#[derive(Debug, Clone)]
pub enum Node {
    /// Primitive behavior.
    Leaf(Leaf),
    /// Children in order until one is running or fails.
    Sequence(Vec<Node>),
    /// A utility-scored task on its own.
    UtilityTask(UtilityTask),
    /// Highest-utility child that does not fail.
    UtilitySelector(Vec<UtilityTask>),
}

impl Node {
    /// Tick this node once.
    pub fn tick(&self, ctx: &mut TickContext<'_>) -> ActionOutcome {
        match self {
            Node::Leaf(leaf) => leaf.tick(ctx),
            Node::Sequence(children) => tick_sequence(children, ctx),
            Node::UtilityTask(task) => task.tick(ctx),
            Node::UtilitySelector(tasks) => tick_selector(tasks, ctx),
        }
    }
}

fn tick_sequence(children: &[Node], ctx: &mut TickContext<'_>) -> ActionOutcome {
    let mut last = ActionOutcome::Done;
    for child in children {
        match child.tick(ctx) {
            outcome @ (ActionOutcome::Running | ActionOutcome::Failed) => return outcome,
            outcome => last = outcome,
        }
    }
    last
}

fn tick_selector(tasks: &[UtilityTask], ctx: &mut TickContext<'_>) -> ActionOutcome {
    let mut scored: Vec<(f64, &UtilityTask)> = tasks
        .iter()
        .map(|task| (task.utility.score(ctx.scorer, &*ctx.board, ctx.world), task))
        .collect();
    for (utility, task) in &scored {
        ctx.board.record_utility(&task.name, *utility);
    }

    // stable: equal utilities keep declaration order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (utility, task) in scored {
        if utility == 0.0 {
            break;
        }
        let outcome = task.tick(ctx);
        if outcome != ActionOutcome::Failed {
            tracing::debug!(
                unit = ctx.board.unit(),
                task = %task.name,
                utility,
                ?outcome,
                "Selector chose task"
            );
            return outcome;
        }
    }
    ActionOutcome::Failed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::behavior::test_env::RecordingEnv;
    use crate::math::Vec2Fixed;

    fn constant(outcome: ActionOutcome) -> Node {
        Node::Leaf(Leaf::custom(move |_| outcome))
    }

    fn logged(name: &'static str, outcome: ActionOutcome, log: Arc<Mutex<Vec<&'static str>>>) -> Node {
        Node::Leaf(Leaf::custom(move |_| {
            log.lock().unwrap().push(name);
            outcome
        }))
    }

    fn run(node: &Node, board: &mut Board) -> ActionOutcome {
        let world = RecordingEnv::world_with_unit(board.unit());
        let mut env = RecordingEnv::default();
        let scorer = UtilityScorer::default();
        let mut ctx = TickContext {
            board,
            world: &world,
            env: &mut env,
            scorer: &scorer,
        };
        node.tick(&mut ctx)
    }

    #[test]
    fn test_empty_sequence_is_done() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        assert_eq!(run(&Node::Sequence(vec![]), &mut board), ActionOutcome::Done);
    }

    #[test]
    fn test_sequence_stops_at_running_or_failed() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = Node::Sequence(vec![
            logged("a", ActionOutcome::Done, log.clone()),
            logged("b", ActionOutcome::Running, log.clone()),
            logged("c", ActionOutcome::Done, log.clone()),
        ]);
        assert_eq!(run(&seq, &mut board), ActionOutcome::Running);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

        let seq = Node::Sequence(vec![constant(ActionOutcome::Failed), constant(ActionOutcome::Done)]);
        assert_eq!(run(&seq, &mut board), ActionOutcome::Failed);
    }

    #[test]
    fn test_sequence_returns_last_success() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        let seq = Node::Sequence(vec![constant(ActionOutcome::Done), constant(ActionOutcome::Succeeded)]);
        assert_eq!(run(&seq, &mut board), ActionOutcome::Succeeded);
    }

    #[test]
    fn test_selector_orders_by_utility_then_declaration() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        let log = Arc::new(Mutex::new(Vec::new()));
        let selector = Node::UtilitySelector(vec![
            UtilityTask::new("low", Utility::Constant(0.3), logged("low", ActionOutcome::Done, log.clone())),
            UtilityTask::new("first", Utility::Constant(0.9), logged("first", ActionOutcome::Failed, log.clone())),
            UtilityTask::new("second", Utility::Constant(0.9), logged("second", ActionOutcome::Failed, log.clone())),
        ]);

        assert_eq!(run(&selector, &mut board), ActionOutcome::Done);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "low"]);
    }

    #[test]
    fn test_selector_never_runs_zero_utility() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        let zero_ticks = Arc::new(AtomicUsize::new(0));
        let counter = zero_ticks.clone();
        let selector = Node::UtilitySelector(vec![
            UtilityTask::new(
                "idle",
                Utility::Constant(0.0),
                Node::Leaf(Leaf::custom(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ActionOutcome::Done
                })),
            ),
            UtilityTask::new("busy", Utility::Constant(0.5), constant(ActionOutcome::Failed)),
        ]);

        assert_eq!(run(&selector, &mut board), ActionOutcome::Failed);
        assert_eq!(zero_ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_selector_returns_first_non_failure() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        let selector = Node::UtilitySelector(vec![
            UtilityTask::new("a", Utility::Constant(0.2), constant(ActionOutcome::Succeeded)),
            UtilityTask::new("b", Utility::Constant(0.8), constant(ActionOutcome::Running)),
        ]);
        assert_eq!(run(&selector, &mut board), ActionOutcome::Running);
    }

    #[test]
    fn test_selector_records_utilities() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        let selector = Node::UtilitySelector(vec![
            UtilityTask::new("nan", Utility::custom(|_, _| f64::NAN), constant(ActionOutcome::Done)),
            UtilityTask::new("big", Utility::Constant(3.0), constant(ActionOutcome::Failed)),
        ]);

        assert_eq!(run(&selector, &mut board), ActionOutcome::Failed);
        assert_eq!(board.utility("nan"), Some(0.0));
        assert_eq!(board.utility("big"), Some(1.0));
    }

    #[test]
    fn test_empty_selector_fails() {
        let mut board = Board::new(1, Vec2Fixed::ZERO);
        assert_eq!(run(&Node::UtilitySelector(vec![]), &mut board), ActionOutcome::Failed);
    }
}
