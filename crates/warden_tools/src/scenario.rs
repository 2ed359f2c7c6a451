//! Planning scenario loading.
//!
//! A scenario bundles a type catalog, a starting position, a production goal
//! and optionally an army the goal must beat. Unit types are referenced by
//! catalog name so files stay readable.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::catalog::{RaceId, TypeCatalog, UnitTypeId};
use warden_core::config::WardenConfig;
use warden_core::error::{ConfigError, PlanError};
use warden_core::math::Vec2Fixed;
use warden_core::search::PlanRequest;
use warden_core::state::{GameState, TechContext};
use warden_core::unit::{Owner, SimUnit};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A type name is not in the catalog.
    #[error("Unknown unit type name '{0}'")]
    UnknownTypeName(String),
    /// An opposing army entry has no combat profile.
    #[error("Unit type '{0}' cannot fight")]
    NotCombatant(String),
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Catalog or goal is invalid.
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Starting position for the planning race.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSetup {
    /// Primary resource on hand.
    #[serde(default)]
    pub primary: u32,
    /// Secondary resource on hand.
    #[serde(default)]
    pub secondary: u32,
    /// Completed units and structures by type name.
    #[serde(default)]
    pub units: BTreeMap<String, u32>,
    /// Techs and upgrades already owned.
    #[serde(default)]
    pub tech: TechContext,
}

/// A complete planning scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Race to plan for.
    pub race: RaceId,
    /// Type tables.
    pub catalog: TypeCatalog,
    /// Starting position.
    pub start: StartSetup,
    /// Completed units wanted, by type name.
    pub goal: BTreeMap<String, u32>,
    /// Enemy army the finished composition must beat, by type name.
    #[serde(default)]
    pub opposing_army: BTreeMap<String, u32>,
    /// Tuning.
    #[serde(default)]
    pub config: WardenConfig,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    fn resolve(&self, name: &str) -> Result<UnitTypeId, ScenarioError> {
        self.catalog
            .unit_by_name(name)
            .map(|info| info.id)
            .ok_or_else(|| ScenarioError::UnknownTypeName(name.to_string()))
    }

    /// Starting [`GameState`] built from [`StartSetup`].
    pub fn initial_state(&self) -> Result<GameState, ScenarioError> {
        let mut state = GameState::new(self.race)
            .with_resources(self.start.primary, self.start.secondary)
            .with_tech_context(&self.start.tech);
        for (name, count) in &self.start.units {
            state = state.with_units(&self.catalog, self.resolve(name)?, *count);
        }
        Ok(state)
    }

    /// Opposing army projected from the catalog, lined up on the x axis.
    pub fn opposing_units(&self) -> Result<Vec<SimUnit>, ScenarioError> {
        let mut army = Vec::new();
        for (name, count) in &self.opposing_army {
            let id = self.resolve(name)?;
            for _ in 0..*count {
                let x = i32::try_from(army.len()).unwrap_or(i32::MAX / 16) * 16;
                let unit = self
                    .catalog
                    .instantiate(id, Owner::Enemy, Vec2Fixed::from_ints(x, 0))
                    .ok_or_else(|| ScenarioError::NotCombatant(name.clone()))?;
                army.push(unit);
            }
        }
        Ok(army)
    }

    /// The planner request this scenario describes.
    pub fn request(&self) -> Result<PlanRequest, ScenarioError> {
        let mut request = PlanRequest::new(self.race)
            .with_opposing_army(self.opposing_units()?)
            .with_tech_context(self.start.tech.clone());
        for (name, count) in &self.goal {
            request = request.with_goal(self.resolve(name)?, *count);
        }
        Ok(request)
    }

    /// Display name of a unit type, falling back to its id.
    #[must_use]
    pub fn type_name(&self, id: UnitTypeId) -> String {
        self.catalog
            .unit(id)
            .map_or_else(|| format!("{id:?}"), |info| info.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"(
        name: "Small",
        race: RaceId(1),
        catalog: (
            units: [
                (id: UnitTypeId(1), name: "Hub", race: RaceId(1), kind: Structure, cost: (primary: 400, secondary: 0),
                 build_frames: 1000, supply_provided: 10, producer: Some(UnitTypeId(2)),
                 combat: Some((hit_points: 1500, size: Large))),
                (id: UnitTypeId(2), name: "Worker", race: RaceId(1), kind: Unit, cost: (primary: 50, secondary: 0),
                 build_frames: 100, supply_cost: 1, producer: Some(UnitTypeId(1)), worker: true),
            ],
        ),
        start: (primary: 50, units: {"Hub": 1, "Worker": 4}),
        goal: {"Worker": 6},
        opposing_army: {"Hub": 1},
    )"#;

    #[test]
    fn test_parse_and_build_state() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        let state = scenario.initial_state().unwrap();
        assert_eq!(state.completed_count(UnitTypeId(2)), 4);
        assert_eq!(state.supply_total(), 10);

        let request = scenario.request().unwrap();
        assert_eq!(request.goal.get(&UnitTypeId(2)), Some(&6));
        assert_eq!(request.opposing_army.len(), 1);
        assert_eq!(scenario.type_name(UnitTypeId(1)), "Hub");
    }

    #[test]
    fn test_unknown_name_rejected() {
        let mut scenario = Scenario::from_ron_str(SMALL).unwrap();
        scenario.goal.insert("Dragon".to_string(), 1);
        assert!(matches!(scenario.request(), Err(ScenarioError::UnknownTypeName(name)) if name == "Dragon"));
    }

    #[test]
    fn test_non_combatant_army_rejected() {
        let mut scenario = Scenario::from_ron_str(SMALL).unwrap();
        scenario.opposing_army.insert("Worker".to_string(), 2);
        assert!(matches!(scenario.opposing_units(), Err(ScenarioError::NotCombatant(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/nonexistent/scenario.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
