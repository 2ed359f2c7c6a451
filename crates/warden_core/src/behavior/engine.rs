//! Per-unit board registry and the tick loop.

use std::collections::BTreeMap;

use crate::environment::{Environment, WorldState};
use crate::unit::{Owner, UnitHandle};
use crate::utility::{UtilityConfig, UtilityScorer};

use super::{ActionOutcome, Board, Goal, Leaf, Node, TickContext, Utility, UtilityTask};

/// The stock combat-and-economy tree.
///
/// One utility selector over retreat, kite, attack, defend, construct,
/// scout and gather.
#[must_use]
pub fn default_tree() -> Node {
    Node::UtilitySelector(vec![
        UtilityTask::new("runaway", Utility::Runaway, Node::Leaf(Leaf::Retreat)),
        UtilityTask::new("fallback", Utility::Fallback, Node::Leaf(Leaf::Kite)),
        UtilityTask::new("attack", Utility::Attack, Node::Leaf(Leaf::Attack)),
        UtilityTask::new(
            "defend",
            Utility::Defend,
            Node::Sequence(vec![Node::Leaf(Leaf::Move), Node::Leaf(Leaf::Attack)]),
        ),
        UtilityTask::new("construct", Utility::Construct, Node::Leaf(Leaf::Construct)),
        UtilityTask::new("scout", Utility::Scout, Node::Leaf(Leaf::Scout)),
        UtilityTask::new("gather", Utility::Gather, Node::Leaf(Leaf::Gather)),
    ])
}

/// Ticks one shared tree against every managed unit's board.
#[derive(Debug, Clone)]
pub struct BehaviorEngine {
    tree: Node,
    scorer: UtilityScorer,
    boards: BTreeMap<UnitHandle, Board>,
}

impl BehaviorEngine {
    /// Create an engine with no managed units.
    #[must_use]
    pub fn new(tree: Node, config: UtilityConfig) -> Self {
        Self {
            tree,
            scorer: UtilityScorer::new(config),
            boards: BTreeMap::new(),
        }
    }

    /// Engine running [`default_tree`].
    #[must_use]
    pub fn with_default_tree(config: UtilityConfig) -> Self {
        Self::new(default_tree(), config)
    }

    /// Track the owned units of `world`.
    ///
    /// New units get an idle board whose home is where they were first seen.
    /// Boards of units no longer in the snapshot are dropped.
    pub fn sync(&mut self, world: &WorldState) {
        let before = self.boards.len();
        self.boards.retain(|handle, _| {
            world
                .unit(*handle)
                .is_some_and(|unit| unit.owner() == Owner::Own)
        });
        let dropped = before - self.boards.len();

        let mut added = 0usize;
        for (handle, unit) in world.owned_by(Owner::Own) {
            self.boards.entry(handle).or_insert_with(|| {
                added += 1;
                Board::new(handle, unit.position())
            });
        }

        if added > 0 || dropped > 0 {
            tracing::debug!(frame = world.frame(), added, dropped, "Synced boards");
        }
    }

    /// Assign a goal. Returns `false` when `handle` is not managed.
    pub fn set_goal(&mut self, handle: UnitHandle, goal: Goal) -> bool {
        match self.boards.get_mut(&handle) {
            Some(board) => {
                board.set_goal(goal);
                true
            }
            None => false,
        }
    }

    /// Board of a managed unit.
    #[must_use]
    pub fn board(&self, handle: UnitHandle) -> Option<&Board> {
        self.boards.get(&handle)
    }

    /// All boards in handle order.
    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.values()
    }

    /// Scorer used by the tree's selectors.
    #[must_use]
    pub const fn scorer(&self) -> &UtilityScorer {
        &self.scorer
    }

    /// Tick the tree once for `board`.
    pub fn tick(&self, board: &mut Board, world: &WorldState, env: &mut dyn Environment) -> ActionOutcome {
        let mut ctx = TickContext {
            board,
            world,
            env,
            scorer: &self.scorer,
        };
        self.tree.tick(&mut ctx)
    }

    /// Tick every managed unit in handle order.
    pub fn tick_all(
        &mut self,
        world: &WorldState,
        env: &mut dyn Environment,
    ) -> Vec<(UnitHandle, ActionOutcome)> {
        let Self { tree, scorer, boards } = self;
        boards
            .iter_mut()
            .map(|(handle, board)| {
                let mut ctx = TickContext {
                    board,
                    world,
                    env: &mut *env,
                    scorer: &*scorer,
                };
                (*handle, tree.tick(&mut ctx))
            })
            .collect()
    }
}
