//! Scenario validation.

use std::path::{Path, PathBuf};

use warden_core::search::DfsPlanner;

use crate::scenario::{Scenario, ScenarioError};

/// Summary of a scenario that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Scenario name.
    pub name: String,
    /// Unit and structure types in the catalog.
    pub unit_types: usize,
    /// Techs in the catalog.
    pub techs: usize,
    /// Upgrades in the catalog.
    pub upgrades: usize,
    /// Distinct goal entries.
    pub goal_entries: usize,
}

/// Check a scenario end to end without searching.
///
/// Covers catalog references, config ranges, type names, goal validity and
/// reachability of every goal type from the starting state.
pub fn validate_scenario(scenario: &Scenario) -> Result<ValidationReport, ScenarioError> {
    scenario.catalog.validate()?;
    scenario.config.validate()?;

    let initial = scenario.initial_state()?;
    let request = scenario.request()?;
    let goal_entries = request.goal.len();

    let planner = DfsPlanner::new(&scenario.catalog, request, scenario.config.search.limits)?;
    // a zero budget runs only the start-state checks
    planner.run(&initial, 0)?;

    Ok(ValidationReport {
        name: scenario.name.clone(),
        unit_types: scenario.catalog.units().count(),
        techs: scenario.catalog.techs().count(),
        upgrades: scenario.catalog.upgrades().count(),
        goal_entries,
    })
}

/// Validate one scenario file, or every `.ron` file in a directory.
///
/// Returns one result per file, sorted by path.
pub fn validate_path(path: &Path) -> Result<Vec<(PathBuf, Result<ValidationReport, ScenarioError>)>, ScenarioError> {
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }

    let mut files = Vec::new();
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let file = entry?.path();
            if file.extension().is_some_and(|ext| ext == "ron") {
                files.push(file);
            }
        }
        files.sort();
    } else {
        files.push(path.to_path_buf());
    }

    Ok(files
        .into_iter()
        .map(|file| {
            let result = Scenario::load(&file).and_then(|scenario| validate_scenario(&scenario));
            (file, result)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::error::PlanError;

    const SCENARIO: &str = r#"(
        name: "Workers",
        race: RaceId(1),
        catalog: (
            units: [
                (id: UnitTypeId(1), name: "Hub", race: RaceId(1), kind: Structure, cost: (primary: 400, secondary: 0),
                 build_frames: 1000, supply_provided: 10, producer: Some(UnitTypeId(2))),
                (id: UnitTypeId(2), name: "Worker", race: RaceId(1), kind: Unit, cost: (primary: 50, secondary: 0),
                 build_frames: 100, supply_cost: 1, producer: Some(UnitTypeId(1)), worker: true),
                (id: UnitTypeId(3), name: "Barracks", race: RaceId(1), kind: Structure, cost: (primary: 150, secondary: 0),
                 build_frames: 300, producer: Some(UnitTypeId(2))),
            ],
        ),
        start: (primary: 50, units: {"Hub": 1, "Worker": 4}),
        goal: {"Worker": 6},
    )"#;

    #[test]
    fn test_valid_scenario() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        let report = validate_scenario(&scenario).unwrap();
        assert_eq!(report.unit_types, 3);
        assert_eq!(report.goal_entries, 1);
    }

    #[test]
    fn test_unreachable_goal_reported() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.start.units.clear();
        let err = validate_scenario(&scenario).unwrap_err();
        assert!(matches!(err, ScenarioError::Plan(PlanError::Unreachable(_))));
    }

    #[test]
    fn test_empty_goal_reported() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.goal.clear();
        let err = validate_scenario(&scenario).unwrap_err();
        assert!(matches!(err, ScenarioError::Plan(PlanError::EmptyGoal)));
    }

    #[test]
    fn test_validate_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ron"), SCENARIO).unwrap();
        std::fs::write(dir.path().join("b.ron"), "(name: oops").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let results = validate_path(dir.path()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(ScenarioError::ParseError(_))));
    }
}
