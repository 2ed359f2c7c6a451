//! End-to-end planner tests on the sample catalog.

use warden_core::combat::CombatSimulator;
use warden_core::error::PlanError;
use warden_core::search::{DfsPlanner, MctsPlanner, PlanRequest, SearchLimits, UNREACHED};
use warden_core::state::{Action, GameState};
use warden_core::unit::{Owner, SimUnit};
use warden_test_utils::determinism::run_parallel_plans;
use warden_test_utils::fixtures::{
    barracks_state, pos, sample_catalog, starting_state, BARRACKS, FACTORY, FOREIGN_UNIT, OTHER_RACE,
    REFINERY, RIFLEMAN, SAMPLE_RACE, TANK, WORKER,
};

fn replay(catalog: &warden_core::catalog::TypeCatalog, initial: &GameState, actions: &[Action]) -> GameState {
    actions
        .iter()
        .fold(initial.clone(), |state, action| {
            state.apply(*action, catalog).expect("plan action is legal")
        })
        .advance_to_completion(catalog)
}

fn enemy_riflemen(count: i32) -> Vec<SimUnit> {
    let catalog = sample_catalog();
    (0..count)
        .map(|i| {
            catalog
                .instantiate(RIFLEMAN, Owner::Enemy, pos(200 + 20 * i, 0))
                .expect("rifleman has a combat profile")
        })
        .collect()
}

// =============================================================================
// DFS
// =============================================================================

#[test]
fn test_dfs_plans_tank_through_tech_path() {
    let catalog = sample_catalog();
    let initial = barracks_state(&catalog);
    let planner = DfsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE).with_goal(TANK, 1),
        SearchLimits::default(),
    )
    .unwrap();

    let plan = planner.run(&initial, 20_000).unwrap();

    assert!(plan.goal_reached);
    assert!(plan.actions.contains(&Action::Build(REFINERY)));
    assert!(plan.actions.contains(&Action::Build(FACTORY)));
    assert!(plan.actions.contains(&Action::Train(TANK)));
    assert_eq!(plan.final_state.completed_count(TANK), 1);

    let replayed = replay(&catalog, &initial, &plan.actions);
    assert_eq!(replayed.frame(), plan.frames);
    assert_eq!(replayed, plan.final_state);
}

#[test]
fn test_dfs_builds_barracks_before_riflemen() {
    let catalog = sample_catalog();
    let planner = DfsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE).with_goal(RIFLEMAN, 2),
        SearchLimits::default(),
    )
    .unwrap();

    let plan = planner.run(&starting_state(&catalog), 20_000).unwrap();

    assert!(plan.goal_reached);
    let barracks = plan.actions.iter().position(|a| *a == Action::Build(BARRACKS));
    let first_rifleman = plan.actions.iter().position(|a| *a == Action::Train(RIFLEMAN));
    assert!(barracks.is_some());
    assert!(barracks < first_rifleman);
    assert!(plan.final_state.check_invariants(&catalog).is_ok());
}

#[test]
fn test_dfs_outbuilds_opposing_army() {
    let catalog = sample_catalog();
    let enemy = enemy_riflemen(4);
    let planner = DfsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE)
            .with_goal(RIFLEMAN, 2)
            .with_opposing_army(enemy.clone()),
        SearchLimits::default(),
    )
    .unwrap();

    let plan = planner.run(&barracks_state(&catalog), 20_000).unwrap();

    assert!(plan.goal_reached);
    assert!(plan.final_state.completed_count(RIFLEMAN) > 2);
    let own = plan.final_state.army(&catalog, Owner::Own);
    let outcome = CombatSimulator::simulate_battle(&own, &enemy, SearchLimits::default().battle_frames);
    assert!(outcome.own_wins());
}

#[test]
fn test_dfs_budget_sweep_never_regresses() {
    let catalog = sample_catalog();
    let initial = starting_state(&catalog);
    let planner = DfsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE).with_goal(WORKER, 8),
        SearchLimits::default(),
    )
    .unwrap();

    let mut previous = UNREACHED;
    for budget in [1, 5, 50, 500, 5_000] {
        let plan = planner.run(&initial, budget).unwrap();
        assert!(plan.iterations <= budget);
        assert!(plan.frames <= previous, "budget {budget} finished later");
        previous = plan.frames;
    }
    assert_ne!(previous, UNREACHED);
}

// =============================================================================
// Request validation
// =============================================================================

#[test]
fn test_request_errors_surface_before_search() {
    let catalog = sample_catalog();
    let limits = SearchLimits::default();

    let foreign = PlanRequest::new(SAMPLE_RACE).with_goal(FOREIGN_UNIT, 1);
    assert!(matches!(
        DfsPlanner::new(&catalog, foreign.clone(), limits),
        Err(PlanError::WrongRace { .. })
    ));
    assert!(matches!(
        MctsPlanner::new(&catalog, foreign, limits, 1),
        Err(PlanError::WrongRace { .. })
    ));

    let zero = PlanRequest::new(SAMPLE_RACE).with_goal(RIFLEMAN, 0);
    assert!(matches!(DfsPlanner::new(&catalog, zero, limits), Err(PlanError::EmptyGoal)));
}

#[test]
fn test_state_of_other_race_rejected() {
    let catalog = sample_catalog();
    let planner = DfsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE).with_goal(RIFLEMAN, 1),
        SearchLimits::default(),
    )
    .unwrap();

    let err = planner.run(&GameState::new(OTHER_RACE), 100).unwrap_err();
    assert!(matches!(err, PlanError::RaceMismatch { .. }));
}

// =============================================================================
// MCTS
// =============================================================================

#[test]
fn test_mcts_plan_reaches_goal_on_small_target() {
    let catalog = sample_catalog();
    let mut planner = MctsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE).with_goal(WORKER, 6),
        SearchLimits::default(),
        42,
    )
    .unwrap();

    let plan = planner.run(&starting_state(&catalog), 200).unwrap();

    assert!(planner.principal_path().len() <= planner.expansions() as usize);
    assert!(plan.goal_reached);
    assert!(plan.final_state.completed_count(WORKER) >= 6);
    assert_eq!(plan.frames, planner.root().unwrap().min_frames());
}

#[test]
fn test_mcts_read_out_never_exceeds_expansions() {
    let catalog = sample_catalog();
    let initial = barracks_state(&catalog);
    let mut planner = MctsPlanner::new(
        &catalog,
        PlanRequest::new(SAMPLE_RACE).with_goal(TANK, 2),
        SearchLimits::default(),
        9,
    )
    .unwrap();

    let mut steps_done = 0;
    for steps in [1, 5, 50] {
        for _ in steps_done..steps {
            planner.step(&initial).unwrap();
        }
        steps_done = steps;

        let read_out = planner.read_out().unwrap();
        let completed = planner.completed_plan().unwrap();
        assert!(
            read_out.actions.len() <= planner.expansions() as usize,
            "{} actions after {} expansions",
            read_out.actions.len(),
            planner.expansions()
        );
        assert_eq!(read_out.iterations, steps);
        if completed.goal_reached {
            assert_eq!(completed.frames, planner.root().unwrap().min_frames());
            assert!(completed.actions.len() >= read_out.actions.len());
        }
    }
}

#[test]
fn test_mcts_seeded_runs_agree_across_threads() {
    let result = run_parallel_plans(4, || {
        let catalog = sample_catalog();
        let mut planner = MctsPlanner::new(
            &catalog,
            PlanRequest::new(SAMPLE_RACE).with_goal(RIFLEMAN, 2),
            SearchLimits::default(),
            2024,
        )
        .unwrap();
        planner.run(&barracks_state(&catalog), 60).unwrap()
    });
    result.assert_deterministic();
}

#[test]
fn test_dfs_runs_agree_across_threads() {
    let result = run_parallel_plans(3, || {
        let catalog = sample_catalog();
        let planner = DfsPlanner::new(
            &catalog,
            PlanRequest::new(SAMPLE_RACE).with_goal(TANK, 1),
            SearchLimits::default(),
        )
        .unwrap();
        planner.run(&barracks_state(&catalog), 2_000).unwrap()
    });
    result.assert_deterministic();
}
