//! Scenario loading and configuration.
//!
//! Scenarios define the initial game state for a headless run: map
//! dimensions, per-faction starting units/buildings/resources, and victory
//! conditions. Loaded from RON files so scenario authors never touch Rust.

use std::collections::HashMap;
use std::path::Path;

use rts_core::grid::{Grid, GridPosition, TerrainCost};
use rts_core::player::ResourceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Map dimensions in tile columns/rows. Every tile is flat
    /// [`TerrainCost::Ground`] — scenario terrain painting is future work
    /// (no config schema for it yet; see `DESIGN.md`).
    pub map_size: (u32, u32),
    /// Faction setups for each player.
    pub factions: Vec<FactionSetup>,
    /// Victory conditions.
    pub victory_conditions: VictoryConditions,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Default Skirmish".to_string(),
            description: "A basic 1v1 skirmish scenario".to_string(),
            map_size: (64, 64),
            factions: vec![FactionSetup::default_continuity(), FactionSetup::default_collegium()],
            victory_conditions: VictoryConditions::default(),
        }
    }
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

    /// Create a standard 1v1 skirmish scenario.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        Self {
            name: "Standard 1v1 Skirmish".to_string(),
            description: "Balanced starting positions for faction matchup testing".to_string(),
            map_size: (64, 64),
            factions: vec![
                FactionSetup {
                    faction_id: "continuity".to_string(),
                    ai_controller: AiController::Sandbox,
                    starting_units: vec![
                        UnitPlacement::new("scout", 6, 32, 2),
                        UnitPlacement::new("harvester", 8, 32, 1),
                    ],
                    starting_buildings: vec![BuildingPlacement::new("command_center", 4, 32)],
                    spawn_position: GridPosition::new(4, 32),
                    starting_resources: default_starting_resources(),
                },
                FactionSetup {
                    faction_id: "collegium".to_string(),
                    ai_controller: AiController::Sandbox,
                    starting_units: vec![
                        UnitPlacement::new("scout", 58, 32, 2),
                        UnitPlacement::new("harvester", 56, 32, 1),
                    ],
                    starting_buildings: vec![BuildingPlacement::new("command_center", 60, 32)],
                    spawn_position: GridPosition::new(60, 32),
                    starting_resources: default_starting_resources(),
                },
            ],
            victory_conditions: VictoryConditions {
                elimination: true,
                time_limit_ticks: Some(36_000),
            },
        }
    }

    /// Build a flat, obstacle-free [`Grid`] at this scenario's dimensions.
    #[must_use]
    pub fn build_grid(&self) -> Grid {
        let (columns, rows) = self.map_size;
        Grid::new(columns, rows, vec![TerrainCost::Ground; (columns * rows) as usize])
    }
}

fn default_starting_resources() -> HashMap<ResourceKind, i64> {
    let mut resources = HashMap::new();
    for kind in rts_core::player::ALL_RESOURCE_KINDS {
        resources.insert(kind, 1000);
    }
    resources
}

/// Setup for a single faction in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactionSetup {
    /// Faction identifier ("continuity", "collegium", etc.) — a config-time
    /// string key, distinct from the numeric [`rts_core::player::FactionId`]
    /// assigned when the scenario is instantiated into a [`Simulation`](rts_core::simulation::Simulation).
    pub faction_id: String,
    /// How this faction is controlled.
    pub ai_controller: AiController,
    /// Starting units.
    pub starting_units: Vec<UnitPlacement>,
    /// Starting buildings.
    pub starting_buildings: Vec<BuildingPlacement>,
    /// Spawn position (grid column/row).
    pub spawn_position: GridPosition,
    /// Starting resource stock, per kind.
    #[serde(default = "default_starting_resources")]
    pub starting_resources: HashMap<ResourceKind, i64>,
}

impl FactionSetup {
    /// Create default Continuity faction setup.
    #[must_use]
    pub fn default_continuity() -> Self {
        Self {
            faction_id: "continuity".to_string(),
            ai_controller: AiController::Sandbox,
            starting_units: vec![UnitPlacement::new("scout", 6, 32, 2), UnitPlacement::new("harvester", 8, 32, 1)],
            starting_buildings: vec![BuildingPlacement::new("command_center", 4, 32)],
            spawn_position: GridPosition::new(4, 32),
            starting_resources: default_starting_resources(),
        }
    }

    /// Create default Collegium faction setup.
    #[must_use]
    pub fn default_collegium() -> Self {
        Self {
            faction_id: "collegium".to_string(),
            ai_controller: AiController::Sandbox,
            starting_units: vec![UnitPlacement::new("scout", 58, 32, 2), UnitPlacement::new("harvester", 56, 32, 1)],
            starting_buildings: vec![BuildingPlacement::new("command_center", 60, 32)],
            spawn_position: GridPosition::new(60, 32),
            starting_resources: default_starting_resources(),
        }
    }
}

/// How a faction's units are controlled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AiController {
    /// Full autonomous scripted AI (see [`crate::strategies`]).
    Sandbox,
    /// Follow a named scripted strategy.
    Scripted(String),
    /// No control — units sit idle unless driven by an external caller.
    None,
}

/// Placement of a unit at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type identifier (a [`rts_core::production::BlueprintRegistry`] key).
    pub kind: String,
    /// Position (grid column/row).
    pub position: GridPosition,
    /// Number of units to spawn.
    pub count: u32,
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, column: i32, row: i32, count: u32) -> Self {
        Self {
            kind: kind.into(),
            position: GridPosition::new(column, row),
            count,
        }
    }
}

/// Placement of a building at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building type identifier (a [`rts_core::production::BlueprintRegistry`] key).
    pub kind: String,
    /// Position (grid column/row).
    pub position: GridPosition,
}

impl BuildingPlacement {
    /// Create a new building placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, column: i32, row: i32) -> Self {
        Self {
            kind: kind.into(),
            position: GridPosition::new(column, row),
        }
    }
}

/// Victory conditions for the scenario, translated into a
/// [`rts_core::triggers::Scenario`] at run start (see
/// [`crate::game_runner::install_scenario_triggers`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VictoryConditions {
    /// Victory by eliminating all enemy units and buildings.
    pub elimination: bool,
    /// Optional time limit in ticks; the longest-lived faction at the limit
    /// wins, a draw if more than one remain.
    pub time_limit_ticks: Option<u64>,
}

impl Default for VictoryConditions {
    fn default() -> Self {
        Self {
            elimination: true,
            time_limit_ticks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_has_two_factions() {
        let scenario = Scenario::default();
        assert_eq!(scenario.factions.len(), 2);
        assert_eq!(scenario.factions[0].faction_id, "continuity");
        assert_eq!(scenario.factions[1].faction_id, "collegium");
    }

    #[test]
    fn skirmish_scenario_has_elimination_victory() {
        let scenario = Scenario::skirmish_1v1();
        assert_eq!(scenario.map_size, (64, 64));
        assert!(scenario.victory_conditions.elimination);
        assert_eq!(scenario.factions.len(), 2);
    }

    #[test]
    fn parses_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                description: "Test scenario",
                map_size: (20, 20),
                factions: [],
                victory_conditions: VictoryConditions(
                    elimination: true,
                    time_limit_ticks: None,
                ),
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert!(scenario.factions.is_empty());
    }

    #[test]
    fn build_grid_matches_map_size() {
        let scenario = Scenario::skirmish_1v1();
        let grid = scenario.build_grid();
        assert_eq!(grid.columns, 64);
        assert_eq!(grid.rows, 64);
    }
}
