//! Balance statistics over many simulated battles.
//!
//! Aggregates [`BattleReport`]s into win rates and average battle length so
//! matchups can be checked for lopsidedness.

use broadside_core::battle::BattleSetup;
use broadside_core::report::{BattleOutcome, BattleReport};
use broadside_core::squad::Side;

use crate::fixtures::rolled_battle;

/// Statistics for a set of battles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BattleStats {
    /// Total battles recorded.
    pub total_battles: u32,
    /// Ally wins.
    pub wins: u32,
    /// Ally losses.
    pub losses: u32,
    /// Draws (tick cap with equal HP, or mutual elimination).
    pub draws: u32,
    /// Average ticks to resolution.
    pub avg_ticks: f64,
    /// Average share of ally HP left standing.
    pub avg_ally_hp_ratio: f64,
}

impl BattleStats {
    /// Add one finished battle.
    pub fn record(&mut self, report: &BattleReport) {
        let n = f64::from(self.total_battles);
        self.total_battles += 1;
        match report.outcome {
            BattleOutcome::Win => self.wins += 1,
            BattleOutcome::Lose => self.losses += 1,
            BattleOutcome::Draw => self.draws += 1,
            BattleOutcome::Pending => {
                tracing::warn!("Recording an undecided battle");
            }
        }
        let total = n + 1.0;
        self.avg_ticks = (self.avg_ticks * n + f64::from(report.ticks)) / total;
        self.avg_ally_hp_ratio =
            (self.avg_ally_hp_ratio * n + report.surviving_hp_ratio(Side::Ally)) / total;
    }

    /// Build statistics from a batch of reports.
    #[must_use]
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a BattleReport>) -> Self {
        let mut stats = Self::default();
        for report in reports {
            stats.record(report);
        }
        stats
    }

    /// Ally win rate (0.0 to 1.0).
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.wins) / f64::from(self.total_battles)
    }

    /// Check if the ally win rate lies within `[min_rate, max_rate]`.
    #[must_use]
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate();
        rate >= min_rate && rate <= max_rate
    }
}

/// Fight the same setup once per seed on rolled terrain.
pub fn run_matchup(setup: &BattleSetup, seeds: impl IntoIterator<Item = u64>) -> BattleStats {
    let mut stats = BattleStats::default();
    for seed in seeds {
        let seeded = setup.clone().with_seed(seed);
        let report = rolled_battle(&seeded).run_to_end();
        stats.record(&report);
    }
    stats
}
