//! Batch battle runner for balance testing.
//!
//! Fights the same scenario once per seed in parallel using rayon and
//! aggregates the outcomes into a JSON-serialisable summary.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use broadside_core::battle::BattleInstance;
use broadside_core::report::{BattleOutcome, BattleReport};
use broadside_core::squad::Side;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of battles to fight.
    pub battle_count: u32,
    /// Seed of the first battle; battle `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Maximum parallel battles (0 = use rayon default).
    pub parallel_battles: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            battle_count: 100,
            seed_start: 0,
            parallel_battles: 0,
        }
    }
}

impl BatchConfig {
    /// Config for `battle_count` battles.
    pub fn new(battle_count: u32) -> Self {
        Self {
            battle_count,
            ..Default::default()
        }
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set parallelism.
    #[must_use]
    pub fn with_parallel(mut self, parallel: u32) -> Self {
        self.parallel_battles = parallel;
        self
    }

    fn seeds(&self) -> impl ParallelIterator<Item = u64> + '_ {
        (0..self.battle_count)
            .into_par_iter()
            .map(move |i| self.seed_start.wrapping_add(u64::from(i)))
    }
}

/// Aggregate results of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Scenario name.
    pub scenario: String,
    /// Battles fought.
    pub battles: u32,
    /// First seed of the batch.
    pub seed_start: u64,
    /// Ally wins.
    pub wins: u32,
    /// Ally losses.
    pub losses: u32,
    /// Draws.
    pub draws: u32,
    /// Average battle length in ticks.
    pub avg_ticks: f64,
    /// Average share of ally HP left standing.
    pub avg_ally_hp_ratio: f64,
    /// Average share of enemy HP left standing.
    pub avg_enemy_hp_ratio: f64,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchSummary {
    /// Summarise a set of finished battles.
    pub fn from_reports(scenario: &str, seed_start: u64, reports: &[BattleReport]) -> Self {
        let count = |outcome: BattleOutcome| {
            reports.iter().filter(|r| r.outcome == outcome).count() as u32
        };
        let mean = |value: &dyn Fn(&BattleReport) -> f64| {
            if reports.is_empty() {
                0.0
            } else {
                reports.iter().map(value).sum::<f64>() / reports.len() as f64
            }
        };

        Self {
            scenario: scenario.to_string(),
            battles: reports.len() as u32,
            seed_start,
            wins: count(BattleOutcome::Win),
            losses: count(BattleOutcome::Lose),
            draws: count(BattleOutcome::Draw),
            avg_ticks: mean(&|r| f64::from(r.ticks)),
            avg_ally_hp_ratio: mean(&|r| r.surviving_hp_ratio(Side::Ally)),
            avg_enemy_hp_ratio: mean(&|r| r.surviving_hp_ratio(Side::Enemy)),
            duration_seconds: 0.0,
        }
    }

    /// Ally win rate (0.0 to 1.0).
    pub fn win_rate(&self) -> f64 {
        if self.battles == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(self.battles)
    }

    /// Save the summary to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load a summary from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Fight one battle of the scenario with the given seed.
pub fn run_single_battle(scenario: &Scenario, seed: u64) -> Result<BattleReport, ScenarioError> {
    let setup = scenario.setup().with_seed(seed);
    let mut battle = BattleInstance::new(&setup, scenario.rules(), &scenario.troops()?)?;
    Ok(battle.run_to_end())
}

/// Run a batch of battles in parallel.
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> Result<BatchSummary, ScenarioError> {
    let start = Instant::now();
    let rules = scenario.rules();
    let troops = scenario.troops()?;
    let base = scenario.setup();

    if config.parallel_battles > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_battles as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let completed = AtomicU32::new(0);
    let reports: Vec<BattleReport> = config
        .seeds()
        .map(|seed| -> Result<BattleReport, ScenarioError> {
            let setup = base.clone().with_seed(seed);
            let report = BattleInstance::new(&setup, rules.clone(), &troops)?.run_to_end();
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 100 == 0 {
                debug!("Progress: {}/{}", done, config.battle_count);
            }
            Ok(report)
        })
        .collect::<Result<_, ScenarioError>>()?;

    let mut summary = BatchSummary::from_reports(&scenario.name, config.seed_start, &reports);
    summary.duration_seconds = start.elapsed().as_secs_f64();
    info!(
        scenario = %summary.scenario,
        battles = summary.battles,
        wins = summary.wins,
        losses = summary.losses,
        draws = summary.draws,
        "Batch complete"
    );
    Ok(summary)
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismCheck {
    /// Seed every run used.
    pub seed: u64,
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// Whether every run agreed.
    pub deterministic: bool,
}

/// Fight the same seed `runs` times in parallel and compare final state hashes.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
) -> Result<DeterminismCheck, ScenarioError> {
    let rules = scenario.rules();
    let troops = scenario.troops()?;
    let setup = scenario.setup().with_seed(seed);

    let hashes: Vec<u64> = (0..runs)
        .into_par_iter()
        .map(|_| -> Result<u64, ScenarioError> {
            let mut battle = BattleInstance::new(&setup, rules.clone(), &troops)?;
            battle.run_to_end();
            Ok(battle.state_hash())
        })
        .collect::<Result<_, ScenarioError>>()?;

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(seed, ?hashes, "Runs diverged");
    }
    Ok(DeterminismCheck {
        seed,
        hashes,
        deterministic,
    })
}
