//! Primitive behaviors. The only nodes that issue commands.

use std::sync::Arc;

use crate::catalog::UnitTypeId;
use crate::combat::CombatSimulator;
use crate::environment::Command;
use crate::math::{Fixed, Vec2Fixed};
use crate::unit::{Owner, SimUnit, UnitHandle};

use super::{ActionOutcome, Custom, Goal, TickContext};

/// Distance at which a unit counts as arrived.
pub const ARRIVE_RADIUS: i32 = 32;

/// How far a kiting unit steps away from its nearest threat.
pub const KITE_DISTANCE: i32 = 64;

/// Signature of a custom leaf.
pub type LeafFn = dyn Fn(&mut TickContext<'_>) -> ActionOutcome + Send + Sync;

/// Primitive behavior.
#[derive(Debug, Clone)]
pub enum Leaf {
    /// Walk to the goal position.
    Move,
    /// Harvest the goal resource.
    Gather,
    /// Train a unit at the managed producer.
    Train(UnitTypeId),
    /// Place the goal structure.
    Construct,
    /// Attack the goal target or the best visible enemy.
    Attack,
    /// Walk home, or to the runaway position.
    Retreat,
    /// Step away from the nearest threat while the weapon cools down.
    Kite,
    /// Walk to the scouting position.
    Scout,
    /// User-supplied behavior.
    Custom(Custom<LeafFn>),
}

impl Leaf {
    /// Wrap a closure.
    pub fn custom(f: impl Fn(&mut TickContext<'_>) -> ActionOutcome + Send + Sync + 'static) -> Self {
        let f: Arc<LeafFn> = Arc::new(f);
        Leaf::Custom(Custom(f))
    }

    /// Tick the leaf. Fails when the managed unit is not in the snapshot.
    pub fn tick(&self, ctx: &mut TickContext<'_>) -> ActionOutcome {
        let handle = ctx.board.unit();
        let Some(unit) = ctx.world.unit(handle) else {
            tracing::debug!(unit = handle, leaf = ?self, "Managed unit missing from snapshot");
            return ActionOutcome::Failed;
        };
        let unit = unit.clone();

        match self {
            Leaf::Move => match ctx.board.goal().position() {
                Some(target) => walk(ctx, handle, &unit, target, ActionOutcome::Done),
                None => ActionOutcome::Failed,
            },
            Leaf::Gather => gather(ctx, handle, &unit),
            Leaf::Train(unit_type) => {
                if !unit.is_completed() {
                    return ActionOutcome::Failed;
                }
                ctx.env.issue_command(handle, Command::Train(*unit_type));
                ActionOutcome::Done
            }
            Leaf::Construct => construct(ctx, handle, &unit),
            Leaf::Attack => attack(ctx, handle, &unit),
            Leaf::Retreat => {
                let target = match ctx.board.goal() {
                    Goal::Runaway { position } => *position,
                    _ => ctx.board.home(),
                };
                walk(ctx, handle, &unit, target, ActionOutcome::Done)
            }
            Leaf::Kite => kite(ctx, handle, &unit),
            Leaf::Scout => match ctx.board.goal() {
                Goal::Scout { position } => {
                    let target = *position;
                    let outcome = walk(ctx, handle, &unit, target, ActionOutcome::Succeeded);
                    if outcome == ActionOutcome::Succeeded {
                        ctx.board.set_goal(Goal::Idle);
                    }
                    outcome
                }
                _ => ActionOutcome::Failed,
            },
            Leaf::Custom(f) => (f.0)(ctx),
        }
    }
}

fn walk(
    ctx: &mut TickContext<'_>,
    handle: UnitHandle,
    unit: &SimUnit,
    target: Vec2Fixed,
    arrived: ActionOutcome,
) -> ActionOutcome {
    if unit.position().within(target, Fixed::from_num(ARRIVE_RADIUS)) {
        return arrived;
    }
    if unit.top_speed() <= Fixed::ZERO {
        return ActionOutcome::Failed;
    }
    ctx.env.issue_command(handle, Command::Move(target));
    ActionOutcome::Running
}

fn gather(ctx: &mut TickContext<'_>, handle: UnitHandle, unit: &SimUnit) -> ActionOutcome {
    let Goal::Gather { resource } = *ctx.board.goal() else {
        return ActionOutcome::Failed;
    };
    if !unit.is_worker() || ctx.world.unit(resource).is_none() {
        return ActionOutcome::Failed;
    }
    ctx.env.issue_command(handle, Command::Gather(resource));
    ActionOutcome::Running
}

fn construct(ctx: &mut TickContext<'_>, handle: UnitHandle, unit: &SimUnit) -> ActionOutcome {
    let Goal::Construct { structure, position } = *ctx.board.goal() else {
        return ActionOutcome::Failed;
    };
    if !unit.is_worker() {
        return ActionOutcome::Failed;
    }
    ctx.env.issue_command(handle, Command::Build(structure, position));
    ctx.board.set_goal(Goal::Idle);
    ActionOutcome::Succeeded
}

fn attack(ctx: &mut TickContext<'_>, handle: UnitHandle, unit: &SimUnit) -> ActionOutcome {
    if let Goal::Attack { target } = *ctx.board.goal() {
        let assigned = ctx
            .world
            .unit(target)
            .filter(|t| t.is_alive() && CombatSimulator::attack_score(unit, t).is_finite());
        if assigned.is_some() {
            ctx.env.issue_command(handle, Command::Attack(target));
            return ActionOutcome::Running;
        }
    }

    let (handles, candidates): (Vec<UnitHandle>, Vec<SimUnit>) = ctx
        .world
        .units()
        .filter(|(_, other)| unit.owner().is_hostile_to(other.owner()))
        .map(|(h, other)| (h, other.clone()))
        .unzip();

    match CombatSimulator::best_target(unit, &candidates) {
        Some(index) => {
            ctx.env.issue_command(handle, Command::Attack(handles[index]));
            ActionOutcome::Running
        }
        None => ActionOutcome::Failed,
    }
}

fn kite(ctx: &mut TickContext<'_>, handle: UnitHandle, unit: &SimUnit) -> ActionOutcome {
    let Some(engaged) = unit.engaged_weapon() else {
        return ActionOutcome::Failed;
    };
    if engaged.is_ready() || engaged.is_melee() || unit.top_speed() <= Fixed::ZERO {
        return ActionOutcome::Failed;
    }

    let nearest = ctx
        .world
        .owned_by(Owner::Enemy)
        .filter(|(_, enemy)| enemy.is_alive() && enemy.can_attack(unit))
        .min_by_key(|(_, enemy)| enemy.distance_to(unit));
    let Some((_, threat)) = nearest else {
        return ActionOutcome::Failed;
    };

    let away = (unit.position() - threat.position()).normalize();
    if away == Vec2Fixed::ZERO {
        return ActionOutcome::Failed;
    }
    let destination = unit.position() + away.scale(Fixed::from_num(KITE_DISTANCE));
    ctx.env.issue_command(handle, Command::Move(destination));
    ActionOutcome::Running
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::test_env::RecordingEnv;
    use crate::behavior::Board;
    use crate::environment::WorldState;
    use crate::unit::{Capabilities, Weapon};
    use crate::utility::UtilityScorer;

    const ME: UnitHandle = 1;

    fn soldier(x: i32) -> SimUnit {
        SimUnit::new(UnitTypeId(1), Owner::Own, Vec2Fixed::from_ints(x, 0), 40)
            .with_ground_weapon(Weapon::new(6, 128, 15))
            .with_speed(Fixed::from_num(4))
    }

    fn worker() -> SimUnit {
        SimUnit::new(UnitTypeId(2), Owner::Own, Vec2Fixed::ZERO, 40)
            .with_speed(Fixed::from_num(3))
            .with_capabilities(Capabilities {
                worker: true,
                ..Capabilities::default()
            })
    }

    fn enemy(x: i32, hp: u32) -> SimUnit {
        SimUnit::new(UnitTypeId(3), Owner::Enemy, Vec2Fixed::from_ints(x, 0), hp)
            .with_ground_weapon(Weapon::new(6, 128, 15))
            .with_speed(Fixed::from_num(4))
            .with_value(50)
    }

    fn tick(leaf: &Leaf, board: &mut Board, world: &WorldState) -> (ActionOutcome, RecordingEnv) {
        let mut env = RecordingEnv::default();
        let scorer = UtilityScorer::default();
        let outcome = {
            let mut ctx = TickContext {
                board,
                world,
                env: &mut env,
                scorer: &scorer,
            };
            leaf.tick(&mut ctx)
        };
        (outcome, env)
    }

    #[test]
    fn test_missing_unit_fails_without_command() {
        let mut board = Board::new(ME, Vec2Fixed::ZERO);
        let world = WorldState::from_units(0, vec![(2, enemy(10, 40))]);
        for leaf in [Leaf::Move, Leaf::Attack, Leaf::Retreat, Leaf::Train(UnitTypeId(1))] {
            let (outcome, env) = tick(&leaf, &mut board, &world);
            assert_eq!(outcome, ActionOutcome::Failed);
            assert!(env.commands.is_empty());
        }
    }

    #[test]
    fn test_move_runs_until_arrival() {
        let target = Vec2Fixed::from_ints(500, 0);
        let mut board = Board::new(ME, Vec2Fixed::ZERO).with_goal(Goal::Defend { position: target });

        let world = WorldState::from_units(0, vec![(ME, soldier(0))]);
        let (outcome, env) = tick(&Leaf::Move, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Running);
        assert_eq!(env.commands, vec![(ME, Command::Move(target))]);

        let world = WorldState::from_units(0, vec![(ME, soldier(490))]);
        let (outcome, env) = tick(&Leaf::Move, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Done);
        assert!(env.commands.is_empty());
    }

    #[test]
    fn test_attack_prefers_assigned_target() {
        let world = WorldState::from_units(
            0,
            vec![(ME, soldier(0)), (2, enemy(100, 40)), (3, enemy(120, 400))],
        );
        let mut board = Board::new(ME, Vec2Fixed::ZERO).with_goal(Goal::Attack { target: 3 });
        let (outcome, env) = tick(&Leaf::Attack, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Running);
        assert_eq!(env.commands, vec![(ME, Command::Attack(3))]);
    }

    #[test]
    fn test_attack_picks_lowest_score() {
        let world = WorldState::from_units(
            0,
            vec![(ME, soldier(0)), (2, enemy(100, 400)), (3, enemy(120, 20))],
        );
        let mut board = Board::new(ME, Vec2Fixed::ZERO);
        let (outcome, env) = tick(&Leaf::Attack, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Running);
        assert_eq!(env.commands, vec![(ME, Command::Attack(3))]);
    }

    #[test]
    fn test_attack_without_enemies_fails() {
        let world = WorldState::from_units(0, vec![(ME, soldier(0))]);
        let mut board = Board::new(ME, Vec2Fixed::ZERO);
        assert_eq!(tick(&Leaf::Attack, &mut board, &world).0, ActionOutcome::Failed);
    }

    #[test]
    fn test_retreat_heads_home() {
        let home = Vec2Fixed::from_ints(-300, 0);
        let mut board = Board::new(ME, home);
        let world = WorldState::from_units(0, vec![(ME, soldier(0))]);
        let (outcome, env) = tick(&Leaf::Retreat, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Running);
        assert_eq!(env.commands, vec![(ME, Command::Move(home))]);
    }

    #[test]
    fn test_kite_steps_away_while_cooling() {
        let me = soldier(0).with_ground_weapon(Weapon::new(6, 128, 15).with_cooldown_remaining(10));
        let world = WorldState::from_units(0, vec![(ME, me), (2, enemy(100, 40))]);
        let mut board = Board::new(ME, Vec2Fixed::ZERO);
        let (outcome, env) = tick(&Leaf::Kite, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Running);
        let (_, Command::Move(destination)) = env.commands[0] else {
            panic!("expected a move command, got {:?}", env.commands);
        };
        assert!(destination.x < Fixed::ZERO);

        let ready = WorldState::from_units(0, vec![(ME, soldier(0)), (2, enemy(100, 40))]);
        assert_eq!(tick(&Leaf::Kite, &mut board, &ready).0, ActionOutcome::Failed);
    }

    #[test]
    fn test_construct_issues_build_and_clears_goal() {
        let at = Vec2Fixed::from_ints(64, 64);
        let mut board = Board::new(ME, Vec2Fixed::ZERO).with_goal(Goal::Construct {
            structure: UnitTypeId(9),
            position: at,
        });
        let world = WorldState::from_units(0, vec![(ME, worker())]);
        let (outcome, env) = tick(&Leaf::Construct, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Succeeded);
        assert_eq!(env.commands, vec![(ME, Command::Build(UnitTypeId(9), at))]);
        assert_eq!(*board.goal(), Goal::Idle);
    }

    #[test]
    fn test_gather_needs_worker_and_resource() {
        let resource = SimUnit::new(UnitTypeId(50), Owner::Neutral, Vec2Fixed::from_ints(40, 0), 1);
        let mut board = Board::new(ME, Vec2Fixed::ZERO).with_goal(Goal::Gather { resource: 7 });

        let world = WorldState::from_units(0, vec![(ME, worker()), (7, resource.clone())]);
        let (outcome, env) = tick(&Leaf::Gather, &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Running);
        assert_eq!(env.commands, vec![(ME, Command::Gather(7))]);

        let world = WorldState::from_units(0, vec![(ME, soldier(0)), (7, resource)]);
        assert_eq!(tick(&Leaf::Gather, &mut board, &world).0, ActionOutcome::Failed);
    }

    #[test]
    fn test_scout_succeeds_on_arrival() {
        let at = Vec2Fixed::from_ints(10, 0);
        let mut board = Board::new(ME, Vec2Fixed::ZERO).with_goal(Goal::Scout { position: at });
        let world = WorldState::from_units(0, vec![(ME, soldier(0))]);
        assert_eq!(tick(&Leaf::Scout, &mut board, &world).0, ActionOutcome::Succeeded);
        assert_eq!(*board.goal(), Goal::Idle);
    }

    #[test]
    fn test_train_completes_within_tick() {
        let mut board = Board::new(ME, Vec2Fixed::ZERO);
        let world = WorldState::from_units(0, vec![(ME, soldier(0))]);
        let (outcome, env) = tick(&Leaf::Train(UnitTypeId(4)), &mut board, &world);
        assert_eq!(outcome, ActionOutcome::Done);
        assert_eq!(env.commands, vec![(ME, Command::Train(UnitTypeId(4)))]);
    }
}
