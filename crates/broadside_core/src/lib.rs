//! # Broadside Core
//!
//! Real-time tactical battle resolver.
//!
//! Two squad rosters fight on a terrain grid, tick by tick, until one side
//! is eliminated or the tick cap forces a decision on remaining HP. This
//! crate contains the whole engine and nothing else:
//! - No rendering
//! - No IO (data is parsed from strings handed in by the caller)
//! - No wall-clock time (real time sits behind [`clock::TickScheduler`])
//!
//! ## Crate Structure
//!
//! - [`terrain`] - Battle grid and terrain combat rates
//! - [`troop`] - Troop catalogue
//! - [`squad`] - Squad factory
//! - [`formation`] - Deployment planner
//! - [`targeting`] - Target selection with hysteresis
//! - [`movement`] - Retreat, charge restraint, kiting and approach
//! - [`combat`] - Damage formula
//! - [`battle`] - Battle instance and the tick pipeline
//! - [`clock`] - Clock state machine and tick scheduling
//! - [`report`] - Outcome and result payload
//! - [`math`] - Fixed-point math and grid coordinates

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod battle;
pub mod clock;
pub mod combat;
pub mod error;
pub mod formation;
pub mod math;
pub mod movement;
pub mod report;
pub mod rules;
pub mod squad;
pub mod strategy;
pub mod targeting;
pub mod terrain;
pub mod troop;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{
        default_enemy_formation, BattleInstance, BattleSetup, BattleSnapshot, TickEvents,
    };
    pub use crate::clock::{BattleSession, ClockState, ManualScheduler, TickScheduler};
    pub use crate::combat::calculate_damage;
    pub use crate::error::{BattleError, Result};
    pub use crate::formation::FormationPolicy;
    pub use crate::math::{Fixed, GridPos};
    pub use crate::report::{BattleOutcome, BattleReport};
    pub use crate::rules::BattleRules;
    pub use crate::squad::{RosterEntry, Side, Squad, SquadId};
    pub use crate::strategy::{BattleSpeed, ChargeMode, KiteMode, StrategyConfig, TargetMode};
    pub use crate::terrain::{BattleGrid, TerrainKind};
    pub use crate::troop::{TroopKind, TroopTable};
}
