//! Player-selected tactical strategy (ally side only).

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};

/// How ally squads choose their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// Each troop type's innate preference (`hp` for melee, `rear` for ranged).
    #[default]
    Type,
    /// Lowest current HP.
    Hp,
    /// Lowest HP among enemy ranged squads.
    Rear,
    /// Nearest by Manhattan distance.
    Close,
    /// Highest strength score.
    Strong,
}

/// Whether squads disengage from melee or fall back to better ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KiteMode {
    /// Ranged squads step away from adjacent melee; wounded squads retreat.
    #[default]
    Kite,
    /// Wounded squads retreat to better terrain; ranged squads also kite.
    Retreat,
    /// Hold position and fight.
    None,
}

/// Which fast squads are held back from charging ahead of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChargeMode {
    /// Cavalry keeps formation.
    #[default]
    Cavalry,
    /// Every squad moving more than one cell keeps formation.
    All,
    /// No restraint.
    None,
}

/// Tick rate multiplier. Serialized as the bare multiplier (`1`, `2` or `4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum BattleSpeed {
    /// 1x.
    #[default]
    Normal,
    /// 2x.
    Fast,
    /// 4x.
    Fastest,
}

impl BattleSpeed {
    /// Numeric multiplier.
    #[must_use]
    pub const fn multiplier(self) -> u32 {
        match self {
            BattleSpeed::Normal => 1,
            BattleSpeed::Fast => 2,
            BattleSpeed::Fastest => 4,
        }
    }

    /// Parse a multiplier; only 1, 2 and 4 are accepted.
    pub fn from_multiplier(value: u8) -> Result<Self> {
        match value {
            1 => Ok(BattleSpeed::Normal),
            2 => Ok(BattleSpeed::Fast),
            4 => Ok(BattleSpeed::Fastest),
            other => Err(BattleError::InvalidSpeed(other)),
        }
    }
}

impl TryFrom<u8> for BattleSpeed {
    type Error = BattleError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_multiplier(value)
    }
}

impl From<BattleSpeed> for u8 {
    fn from(speed: BattleSpeed) -> u8 {
        match speed {
            BattleSpeed::Normal => 1,
            BattleSpeed::Fast => 2,
            BattleSpeed::Fastest => 4,
        }
    }
}

fn default_retreat_threshold() -> u8 {
    30
}

/// Ally-side strategy. Changes take effect on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Target selection mode.
    #[serde(default)]
    pub target_mode: TargetMode,
    /// Kiting / retreat behaviour.
    #[serde(default)]
    pub kite_mode: KiteMode,
    /// HP percentage (1-100) below which a squad tries to retreat.
    #[serde(default = "default_retreat_threshold")]
    pub retreat_threshold: u8,
    /// Charge restraint.
    #[serde(default)]
    pub charge_mode: ChargeMode,
    /// Tick rate multiplier.
    #[serde(default)]
    pub speed: BattleSpeed,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            target_mode: TargetMode::Type,
            kite_mode: KiteMode::Kite,
            retreat_threshold: default_retreat_threshold(),
            charge_mode: ChargeMode::Cavalry,
            speed: BattleSpeed::Normal,
        }
    }
}

impl StrategyConfig {
    /// Reject thresholds outside 1..=100.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.retreat_threshold) {
            return Err(BattleError::InvalidRetreatThreshold(self.retreat_threshold));
        }
        Ok(())
    }

    /// Builder: target mode.
    #[must_use]
    pub const fn with_target_mode(mut self, mode: TargetMode) -> Self {
        self.target_mode = mode;
        self
    }

    /// Builder: kite mode.
    #[must_use]
    pub const fn with_kite_mode(mut self, mode: KiteMode) -> Self {
        self.kite_mode = mode;
        self
    }

    /// Builder: charge mode.
    #[must_use]
    pub const fn with_charge_mode(mut self, mode: ChargeMode) -> Self {
        self.charge_mode = mode;
        self
    }

    /// Builder: retreat threshold.
    #[must_use]
    pub const fn with_retreat_threshold(mut self, threshold: u8) -> Self {
        self.retreat_threshold = threshold;
        self
    }
}
