//! Balance rules for a battle.
//!
//! All tunable constants live in [`BattleRules`]. The defaults are the
//! reference balance; a RON document can override any subset of them.
//!
//! # Example RON
//!
//! ```ron
//! BattleRules(
//!     grid_size: 10,
//!     max_ticks: 60,
//!     base_interval_ms: 500,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};

/// Width and height of the reference battle grid.
pub const DEFAULT_GRID_SIZE: u32 = 10;

/// Tick cap after which the battle is decided on remaining HP.
pub const DEFAULT_MAX_TICKS: u32 = 60;

/// Real-time interval between ticks at speed 1, in milliseconds.
pub const DEFAULT_BASE_INTERVAL_MS: u64 = 500;

/// Maximum number of squads a side may field.
pub const MAX_SQUADS: usize = 20;

/// A challenger must beat the current target's strength by this ratio to steal focus.
pub const TARGET_SWITCH_RATIO_PERCENT: u32 = 150;

/// Tunable constants for the battle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleRules {
    /// Grid width and height in cells.
    pub grid_size: u32,
    /// Tick cap; reaching it forces an HP-based decision.
    pub max_ticks: u32,
    /// Timer interval at speed 1, in milliseconds.
    pub base_interval_ms: u64,
    /// Maximum squads per side; longer rosters are truncated.
    pub max_squads: usize,
    /// Target search radius for melee squads (range <= 1).
    pub melee_search_radius: u32,
    /// Target search radius for ranged squads.
    pub ranged_search_radius: u32,
    /// Distance within which a locked target stays valid.
    pub lock_tolerance: u32,
    /// Strength ratio (percent) a challenger must exceed to steal focus.
    pub switch_ratio_percent: u32,
    /// In `hp` mode, a challenger must be below this share (percent) of the current target's HP.
    pub hp_switch_percent: u32,
    /// Retargeting lock after a switch, melee squads.
    pub melee_switch_lock: u32,
    /// Retargeting lock after a switch, ranged squads.
    pub ranged_switch_lock: u32,
    /// HP percentage below which enemy squads try to retreat.
    pub enemy_retreat_threshold: u8,
    /// How many ticks a visual effect stays alive.
    pub effect_ttl: u8,
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            max_ticks: DEFAULT_MAX_TICKS,
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            max_squads: MAX_SQUADS,
            melee_search_radius: 3,
            ranged_search_radius: 5,
            lock_tolerance: 5,
            switch_ratio_percent: TARGET_SWITCH_RATIO_PERCENT,
            hp_switch_percent: 80,
            melee_switch_lock: 3,
            ranged_switch_lock: 2,
            enemy_retreat_threshold: 30,
            effect_ttl: 3,
        }
    }
}

impl BattleRules {
    /// Parse rules from a RON document. Missing fields keep their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let rules: Self = ron::from_str(source).map_err(|e| BattleError::DataParse {
            what: "battle rules",
            message: e.to_string(),
        })?;
        Ok(rules.sanitized())
    }

    /// Clamp values that would make the grid or the clock degenerate.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        // Two deployment columns per side need at least four columns.
        self.grid_size = self.grid_size.clamp(4, 64);
        self.max_ticks = self.max_ticks.max(1);
        self.base_interval_ms = self.base_interval_ms.max(1);
        self.max_squads = self.max_squads.max(1);
        self.enemy_retreat_threshold = self.enemy_retreat_threshold.min(100);
        self
    }
}
