//! Combat resolution.
//!
//! Damage is deterministic given effective stats:
//!
//! ```text
//! effective = base stat × terrain combat rate
//! damage    = max(1, round(effective_attack × 100 / (100 + effective_defense)))
//! ```
//!
//! Effective stats are carried in hundredths of a point so terrain
//! percentages apply exactly and the rounding lands on the right side of
//! halves. There are no per-attack rolls.

use serde::{Deserialize, Serialize};

use crate::math::{ratio, round_div, Fixed};
use crate::squad::{Squad, SquadId};
use crate::terrain::BattleGrid;

/// Attacks always deal at least this much damage.
pub const MIN_DAMAGE: u32 = 1;

/// Effective stats are expressed in units of `1 / STAT_SCALE` points.
pub const STAT_SCALE: u64 = 100;

/// Outcome of a single attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// Squad that attacked.
    pub attacker: SquadId,
    /// Squad that was hit.
    pub target: SquadId,
    /// Damage rolled by the formula.
    pub damage: u32,
    /// Damage actually removed (capped by remaining HP).
    pub dealt: u32,
    /// Whether the hit destroyed the target.
    pub killed: bool,
}

/// Damage formula on effective stats given in hundredths of a point.
///
/// `round(a × 100 / (100 + d))` with `a = attack / 100` and `d = defense / 100`
/// is `round(attack × 100 / (10_000 + defense))`, evaluated in integers.
#[must_use]
pub fn calculate_damage(effective_attack: u64, effective_defense: u64) -> u32 {
    let numerator = effective_attack.saturating_mul(100);
    let denominator = (100 * STAT_SCALE).saturating_add(effective_defense);
    u32::try_from(round_div(numerator, denominator))
        .unwrap_or(u32::MAX)
        .max(MIN_DAMAGE)
}

/// Attack scaled by the terrain the squad stands on, in hundredths.
#[must_use]
pub fn effective_attack(squad: &Squad, grid: &BattleGrid) -> u64 {
    u64::from(squad.attack) * u64::from(grid.combat_percent(&squad.profile, squad.position))
}

/// Defense scaled by the terrain the squad stands on, in hundredths.
#[must_use]
pub fn effective_defense(squad: &Squad, grid: &BattleGrid) -> u64 {
    u64::from(squad.defense) * u64::from(grid.combat_percent(&squad.profile, squad.position))
}

/// Strength score: expected damage per tick weighted by effective HP.
///
/// `(effective attack / max(1, speed)) × hp × (1 + effective defense / 100)`
#[must_use]
pub fn strength_score(squad: &Squad, grid: &BattleGrid) -> Fixed {
    let numerator = effective_attack(squad, grid)
        .saturating_mul(u64::from(squad.hp))
        .saturating_mul(100 * STAT_SCALE + effective_defense(squad, grid));
    let denominator = STAT_SCALE * u64::from(squad.speed.max(1)) * 100 * STAT_SCALE;
    ratio(numerator, denominator)
}

/// Resolve one attack from `attacker` on `target`, mutating the target's HP.
pub fn apply_attack(attacker: &Squad, target: &mut Squad, grid: &BattleGrid) -> AttackOutcome {
    let damage = calculate_damage(effective_attack(attacker, grid), effective_defense(target, grid));
    let dealt = target.apply_damage(damage);
    AttackOutcome {
        attacker: attacker.id,
        target: target.id,
        damage,
        dealt,
        killed: !target.is_alive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::GridPos;
    use crate::squad::{create_squad, RosterEntry, Side};
    use crate::terrain::TerrainKind;
    use crate::troop::TroopTable;

    fn squad(id: u32, troop: &str, x: i32) -> Squad {
        create_squad(
            &TroopTable::builtin(),
            SquadId(id),
            Side::Ally,
            &RosterEntry::full(troop),
            GridPos::new(x, 0),
        )
    }

    #[test]
    fn test_reference_damage() {
        // atk 100, def 50 -> round(10000 / 150) = 67
        assert_eq!(calculate_damage(100 * STAT_SCALE, 50 * STAT_SCALE), 67);
    }

    #[test]
    fn test_damage_no_defense() {
        assert_eq!(calculate_damage(42 * STAT_SCALE, 0), 42);
    }

    #[test]
    fn test_damage_minimum() {
        assert_eq!(calculate_damage(STAT_SCALE, 500 * STAT_SCALE), MIN_DAMAGE);
        assert_eq!(calculate_damage(0, 0), MIN_DAMAGE);
    }

    #[test]
    fn test_damage_determinism() {
        let a = 77 * STAT_SCALE;
        let d = 33 * STAT_SCALE;
        let first = calculate_damage(a, d);
        for _ in 0..100 {
            assert_eq!(calculate_damage(a, d), first);
        }
    }

    #[test]
    fn test_terrain_scales_both_sides() {
        let grid = BattleGrid::uniform(10, TerrainKind::Mountain);
        let infantry = squad(0, "infantry", 0);
        // Infantry: 30 × 1.2 attack, 20 × 1.2 defense on mountains.
        assert_eq!(effective_attack(&infantry, &grid), 3600);
        assert_eq!(effective_defense(&infantry, &grid), 2400);
    }

    #[test]
    fn test_damage_rounds_half_up_across_terrain() {
        // Attacker on forest (110%), defender on plain: 33 × 100 / 120 = 27.5 -> 28.
        let grid = BattleGrid::from_rows(&[
            vec![TerrainKind::Forest, TerrainKind::Plain],
            vec![TerrainKind::Plain, TerrainKind::Plain],
        ]);
        let attacker = squad(0, "infantry", 0);
        let mut target = squad(1, "infantry", 1);
        assert_eq!(effective_attack(&attacker, &grid), 33 * STAT_SCALE);
        assert_eq!(effective_defense(&target, &grid), 20 * STAT_SCALE);
        let outcome = apply_attack(&attacker, &mut target, &grid);
        assert_eq!(outcome.damage, 28);
        assert_eq!(target.hp, 272);
    }

    #[test]
    fn test_fractional_effective_stats() {
        // 25 × 1.1 = 27.5 attack into 10 × 0.8 = 8 defense: 2750 / 108 = 25.46 -> 25.
        assert_eq!(calculate_damage(2750, 800), 25);
        // 27.5 attack into zero defense sits on a half: 28.
        assert_eq!(calculate_damage(2750, 0), 28);
    }

    #[test]
    fn test_apply_attack_infantry_vs_infantry_on_plain() {
        let grid = BattleGrid::uniform(10, TerrainKind::Plain);
        let attacker = squad(0, "infantry", 0);
        let mut target = squad(1, "infantry", 1);
        let outcome = apply_attack(&attacker, &mut target, &grid);
        // round(30 × 100 / 120) = 25
        assert_eq!(outcome.damage, 25);
        assert_eq!(outcome.dealt, 25);
        assert_eq!(target.hp, 275);
        assert!(!outcome.killed);
    }

    #[test]
    fn test_apply_attack_kills_and_floors_at_zero() {
        let grid = BattleGrid::uniform(10, TerrainKind::Plain);
        let attacker = squad(0, "cannoneer", 0);
        let mut target = squad(1, "archer", 1);
        target.hp = 3;
        let outcome = apply_attack(&attacker, &mut target, &grid);
        assert!(outcome.killed);
        assert_eq!(outcome.dealt, 3);
        assert_eq!(target.hp, 0);
    }

    #[test]
    fn test_strength_score_orders_by_threat() {
        let grid = BattleGrid::uniform(10, TerrainKind::Plain);
        let healthy = squad(0, "infantry", 0);
        let mut wounded = squad(1, "infantry", 1);
        wounded.hp = 100;
        assert!(strength_score(&healthy, &grid) > strength_score(&wounded, &grid));
        // 30 / 2 × 300 × 1.2 = 5400
        assert_eq!(strength_score(&healthy, &grid), Fixed::from_num(5400));
    }
}
