//! Test fixtures and helpers.
//!
//! Pre-built battles and rosters for consistent testing.

use broadside_core::battle::{BattleInstance, BattleSetup};
use broadside_core::clock::{BattleSession, ManualScheduler};
use broadside_core::error::{BattleError, Result};
use broadside_core::rules::BattleRules;
use broadside_core::squad::RosterEntry;
use broadside_core::terrain::{BattleGrid, TerrainKind};
use broadside_core::troop::TroopTable;

/// Full-strength, level 1 roster from `(troop, count)` pairs.
#[must_use]
pub fn roster(entries: &[(&str, usize)]) -> Vec<RosterEntry> {
    entries
        .iter()
        .flat_map(|&(troop, count)| std::iter::repeat_with(move || RosterEntry::full(troop)).take(count))
        .collect()
}

/// Parse a roster from a RON list, e.g. `[(troop: "archer", headcount: 6)]`.
///
/// # Errors
///
/// Returns [`BattleError::DataParse`] for malformed input.
pub fn parse_roster(source: &str) -> Result<Vec<RosterEntry>> {
    ron::from_str(source).map_err(|e| BattleError::DataParse {
        what: "roster",
        message: e.to_string(),
    })
}

/// One full infantry squad per side.
#[must_use]
pub fn infantry_mirror(seed: u64) -> BattleSetup {
    BattleSetup::new(roster(&[("infantry", 1)]))
        .with_enemies(roster(&[("infantry", 1)]))
        .with_seed(seed)
}

/// Mixed armies of equal composition.
#[must_use]
pub fn mixed_armies(seed: u64) -> BattleSetup {
    let army = roster(&[("infantry", 3), ("archer", 2), ("cavalry", 1), ("cannoneer", 1)]);
    BattleSetup::new(army.clone()).with_enemies(army).with_seed(seed)
}

/// Battle on a field of a single terrain kind, default rules.
///
/// # Panics
///
/// Panics if the setup's strategy is invalid.
#[must_use]
pub fn uniform_battle(setup: &BattleSetup, terrain: TerrainKind) -> BattleInstance {
    BattleInstance::with_grid(
        setup,
        BattleRules::default(),
        &TroopTable::builtin(),
        BattleGrid::uniform(BattleRules::default().grid_size, terrain),
    )
    .expect("fixture setup must be valid")
}

/// Battle with terrain rolled from the setup's base biome.
///
/// # Panics
///
/// Panics if the setup's strategy is invalid.
#[must_use]
pub fn rolled_battle(setup: &BattleSetup) -> BattleInstance {
    BattleInstance::new(setup, BattleRules::default(), &TroopTable::builtin())
        .expect("fixture setup must be valid")
}

/// Idle session with a manual scheduler and default data.
#[must_use]
pub fn manual_session() -> BattleSession<ManualScheduler> {
    BattleSession::new(
        ManualScheduler::default(),
        BattleRules::default(),
        TroopTable::builtin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_builder() {
        let r = roster(&[("infantry", 2), ("archer", 1)]);
        assert_eq!(r.len(), 3);
        assert_eq!(r[2].troop, "archer");
        assert_eq!(r[0].headcount, 10);
    }

    #[test]
    fn test_parse_roster_defaults() {
        let r = parse_roster(r#"[(troop: "marine"), (troop: "archer", headcount: 4, level: 2.5)]"#)
            .unwrap();
        assert_eq!(r[0].headcount, 10);
        assert_eq!(r[1].headcount, 4);
        assert!((r[1].level - 2.5).abs() < f32::EPSILON);
        assert!(parse_roster("not a roster").is_err());
    }

    #[test]
    fn test_uniform_battle_fixture() {
        let battle = uniform_battle(&infantry_mirror(1), TerrainKind::Forest);
        assert_eq!(battle.grid().count(TerrainKind::Forest), 100);
        assert_eq!(battle.squads().len(), 2);
    }
}
