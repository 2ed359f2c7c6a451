//! Property tests for transitions, scores and combat estimates.

use proptest::prelude::*;

use warden_core::behavior::Board;
use warden_core::combat::CombatSimulator;
use warden_core::math::Fixed;
use warden_core::unit::Owner;
use warden_core::utility::UtilityScorer;
use warden_test_utils::determinism::strategies::{
    apply_choices, arb_action_choices, arb_any_unit, arb_sim_unit, arb_world,
};
use warden_test_utils::fixtures::{barracks_state, sample_catalog, starting_state};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_transitions_preserve_invariants(choices in arb_action_choices(24), barracks in any::<bool>()) {
        let catalog = sample_catalog();
        let initial = if barracks { barracks_state(&catalog) } else { starting_state(&catalog) };
        let states = apply_choices(&catalog, &initial, &choices);

        for pair in states.windows(2) {
            prop_assert!(pair[0].frame() <= pair[1].frame());
        }
        for state in &states {
            prop_assert!(state.check_invariants(&catalog).is_ok());
            prop_assert!(state.stockpile().primary >= Fixed::ZERO);
            prop_assert!(state.stockpile().secondary >= Fixed::ZERO);
        }

        let finished = states.last().unwrap().advance_to_completion(&catalog);
        prop_assert!(finished.is_idle());
        prop_assert!(finished.check_invariants(&catalog).is_ok());
    }

    #[test]
    fn prop_utilities_stay_in_unit_interval(world in arb_world(12)) {
        let scorer = UtilityScorer::default();
        for (handle, unit) in world.owned_by(Owner::Own) {
            let board = Board::new(handle, unit.position());
            let scores = [
                scorer.force(&board, &world),
                scorer.threat(&board, &world),
                scorer.value(&board, &world),
                scorer.danger(&board, &world),
                scorer.runaway(&board, &world),
                scorer.defend(&board, &world),
                scorer.attack(&board, &world),
                scorer.fallback(&board, &world),
                scorer.construct(&board, &world),
                scorer.scout(&board, &world),
                scorer.gather(&board, &world),
            ];
            for score in scores {
                prop_assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
            }
        }
        let need = scorer.need_mobile_detection(&world);
        prop_assert!((0.0..=1.0).contains(&need));
    }

    #[test]
    fn prop_attack_score_non_negative(attacker in arb_any_unit(), target in arb_any_unit()) {
        let score = CombatSimulator::attack_score(&attacker, &target);
        prop_assert!(!score.is_nan());
        prop_assert!(score >= 0.0);
    }

    #[test]
    fn prop_battle_only_removes_units(
        own in proptest::collection::vec(arb_sim_unit(Owner::Own), 0..6),
        enemy in proptest::collection::vec(arb_sim_unit(Owner::Enemy), 0..6),
    ) {
        let outcome = CombatSimulator::simulate_battle(&own, &enemy, 600);
        prop_assert!(outcome.own_survivors.len() <= own.len());
        prop_assert!(outcome.enemy_survivors.len() <= enemy.len());
        prop_assert!(outcome.frames <= 600);
        prop_assert!(outcome.own_survivors.iter().all(|u| u.owner() == Owner::Own));
    }
}
