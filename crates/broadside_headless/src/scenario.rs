//! Scenario loading and configuration.
//!
//! A scenario describes one encounter: the sortie roster, the enemy
//! formation, the field and the ally orders. Scenarios are RON documents;
//! rules and the troop table can be overridden per scenario.

use std::path::{Path, PathBuf};

use broadside_core::battle::BattleSetup;
use broadside_core::error::BattleError;
use broadside_core::formation::FormationPolicy;
use broadside_core::rules::BattleRules;
use broadside_core::squad::RosterEntry;
use broadside_core::strategy::StrategyConfig;
use broadside_core::terrain::TerrainKind;
use broadside_core::troop::TroopTable;
use serde::{Deserialize, Serialize};
use thiserror::Error;

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
    /// Referenced battle data (troop table) is invalid.
    #[error("Invalid battle data: {0}")]
    DataError(#[from] BattleError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ally sortie roster.
    pub allies: Vec<RosterEntry>,
    /// Enemy formation; the default formation is fielded when absent.
    #[serde(default)]
    pub enemies: Option<Vec<RosterEntry>>,
    /// Enemy faction id, carried into the report.
    #[serde(default)]
    pub enemy_faction: Option<String>,
    /// Base biome of the field.
    #[serde(default)]
    pub terrain: TerrainKind,
    /// Ally formation policy.
    #[serde(default)]
    pub formation: FormationPolicy,
    /// Ally strategy.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Fixed seed; a fresh seed is drawn per battle when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Rule overrides.
    #[serde(default)]
    pub rules: Option<BattleRules>,
    /// Path to a RON troop table, relative to the scenario file.
    #[serde(default)]
    pub troop_table: Option<PathBuf>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
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
        let mut scenario = Self::from_ron_str(&contents)?;
        scenario.base_dir = path.parent().map(Path::to_path_buf);
        Ok(scenario)
    }

    /// Parse a scenario from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        Ok(ron::from_str(ron)?)
    }

    /// Built-in skirmish: a mixed sortie against the default enemy formation on open ground.
    pub fn skirmish() -> Self {
        let allies = [
            "infantry",
            "infantry",
            "infantry",
            "archer",
            "archer",
            "musketeer",
            "cavalry",
            "cannoneer",
        ]
        .into_iter()
        .map(RosterEntry::full)
        .collect();

        Self {
            name: "Skirmish".to_string(),
            description: "Mixed sortie against the default enemy formation".to_string(),
            allies,
            enemies: None,
            enemy_faction: None,
            terrain: TerrainKind::Plain,
            formation: FormationPolicy::Balance,
            strategy: StrategyConfig::default(),
            seed: None,
            rules: None,
            troop_table: None,
            base_dir: None,
        }
    }

    /// Load a scenario file, or the built-in skirmish when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ScenarioError> {
        path.map_or_else(|| Ok(Self::skirmish()), Self::load)
    }

    /// Builder: fix the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Battle setup for this scenario.
    pub fn setup(&self) -> BattleSetup {
        let mut setup = BattleSetup::new(self.allies.clone())
            .with_terrain(self.terrain)
            .with_formation(self.formation.clone())
            .with_strategy(self.strategy);
        setup.enemy_formation.clone_from(&self.enemies);
        setup.enemy_faction.clone_from(&self.enemy_faction);
        setup.seed = self.seed;
        setup
    }

    /// Rules with scenario overrides applied.
    pub fn rules(&self) -> BattleRules {
        self.rules.clone().unwrap_or_default().sanitized()
    }

    /// Troop table: the referenced file, or the built-in catalogue.
    pub fn troops(&self) -> Result<TroopTable, ScenarioError> {
        let Some(relative) = &self.troop_table else {
            return Ok(TroopTable::builtin());
        };
        let path = match &self.base_dir {
            Some(dir) if relative.is_relative() => dir.join(relative),
            _ => relative.clone(),
        };
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(TroopTable::from_ron_str(&contents)?)
    }
}
