//! Squads: the atomic combat unit.
//!
//! A squad stands for 1-10 soldiers of one troop type, fought as a single
//! token on the grid. Stats are derived once at creation from the troop
//! profile, the headcount and the level; afterwards only the runtime state
//! (hp, position, cooldown, target) changes.

use serde::{Deserialize, Serialize};

use crate::math::GridPos;
use crate::troop::{Engagement, TroopKind, TroopProfile, TroopTable};

/// Largest headcount a squad can have.
pub const MAX_HEADCOUNT: u32 = 10;

/// Level cap, in tenths.
pub const MAX_LEVEL_TENTHS: u32 = 50;

/// Which side of the battle a squad fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The player's sortie.
    Ally,
    /// The encounter's forces.
    Enemy,
}

/// Stable identifier of a squad within one battle (index into the squad arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SquadId(pub u32);

impl SquadId {
    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

fn default_headcount() -> u32 {
    MAX_HEADCOUNT
}

fn default_level() -> f32 {
    1.0
}

/// One line of a sortie roster or enemy formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Troop type key, e.g. `"infantry"`.
    pub troop: String,
    /// Soldiers in the squad (1-10).
    #[serde(default = "default_headcount")]
    pub headcount: u32,
    /// Experience level (0.1-5.0).
    #[serde(default = "default_level")]
    pub level: f32,
}

impl RosterEntry {
    /// Create a roster entry.
    #[must_use]
    pub fn new(troop: impl Into<String>, headcount: u32, level: f32) -> Self {
        Self {
            troop: troop.into(),
            headcount,
            level,
        }
    }

    /// Full-strength, level 1 entry.
    #[must_use]
    pub fn full(troop: impl Into<String>) -> Self {
        Self::new(troop, MAX_HEADCOUNT, 1.0)
    }
}

/// Normalise a level to tenths within `(0, 5]`.
#[must_use]
pub fn level_to_tenths(level: f32) -> u32 {
    if !level.is_finite() {
        tracing::warn!(level, "Non-finite squad level, using 1.0");
        return 10;
    }
    let tenths = (level * 10.0).round();
    if tenths < 1.0 {
        1
    } else {
        (tenths as u32).min(MAX_LEVEL_TENTHS)
    }
}

/// Scale a base stat by headcount share and level bonus, floored to at least 1.
///
/// `base × headcount/10 × (1 + 0.1 × (level − 1))`, computed in integers:
/// the level factor is `(90 + tenths) / 100`.
#[must_use]
pub fn scaled_stat(base: u32, headcount: u32, level_tenths: u32) -> u32 {
    let numerator = u64::from(base) * u64::from(headcount) * u64::from(90 + level_tenths);
    let scaled = numerator / (u64::from(MAX_HEADCOUNT) * 100);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// A combat-ready squad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squad {
    /// Identifier, stable for the whole battle.
    pub id: SquadId,
    /// Side the squad fights for.
    pub side: Side,
    /// Troop type.
    pub kind: TroopKind,
    /// Base profile the stats were derived from (terrain affinity is read from it).
    pub profile: TroopProfile,
    /// Position in its side's roster, used for pinned deployment.
    pub roster_index: usize,
    /// Soldiers in the squad (1-10).
    pub headcount: u32,
    /// Level in tenths (1-50).
    pub level_tenths: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Current hit points. Zero means destroyed.
    pub hp: u32,
    /// Derived attack.
    pub attack: u32,
    /// Derived defense.
    pub defense: u32,
    /// Ticks between attacks.
    pub speed: u32,
    /// Attack range in cells.
    pub range: u32,
    /// Cells moved per tick.
    pub move_distance: u32,
    /// Current cell.
    pub position: GridPos,
    /// Ticks until the next attack is allowed.
    pub attack_cooldown: u32,
    /// Last chosen enemy squad.
    pub target: Option<SquadId>,
    /// Ticks during which retargeting is suppressed.
    pub target_lock: u32,
}

impl Squad {
    /// Build a squad from a resolved profile.
    ///
    /// Headcount is clamped into 1..=10 and level into (0, 5], rounded to 0.1.
    #[must_use]
    pub fn new(
        id: SquadId,
        side: Side,
        kind: TroopKind,
        profile: TroopProfile,
        headcount: u32,
        level: f32,
        position: GridPos,
    ) -> Self {
        let headcount = headcount.clamp(1, MAX_HEADCOUNT);
        let level_tenths = level_to_tenths(level);
        let max_hp = scaled_stat(profile.hp, headcount, level_tenths);

        Self {
            id,
            side,
            kind,
            roster_index: 0,
            headcount,
            level_tenths,
            max_hp,
            hp: max_hp,
            attack: scaled_stat(profile.attack, headcount, level_tenths),
            defense: scaled_stat(profile.defense, headcount, level_tenths),
            speed: profile.speed.max(1),
            range: profile.range.max(1),
            move_distance: profile.move_distance.max(1),
            position,
            attack_cooldown: 0,
            target: None,
            target_lock: 0,
            profile,
        }
    }

    /// Whether the squad still fights.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Melee or ranged.
    #[must_use]
    pub fn engagement(&self) -> Engagement {
        if self.range <= 1 {
            Engagement::Melee
        } else {
            Engagement::Ranged
        }
    }

    /// Whether the squad attacks from range.
    #[must_use]
    pub fn is_ranged(&self) -> bool {
        self.engagement() == Engagement::Ranged
    }

    /// Current HP as a percentage of maximum, rounded down.
    #[must_use]
    pub fn hp_percent(&self) -> u32 {
        if self.max_hp == 0 {
            return 0;
        }
        ((u64::from(self.hp) * 100) / u64::from(self.max_hp)) as u32
    }

    /// Apply damage, returning the damage actually absorbed. HP never drops below zero.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.hp);
        self.hp -= actual;
        actual
    }
}

/// Turn a roster entry into a combat-ready squad.
///
/// Unknown troop types degrade to the fallback profile instead of failing.
#[must_use]
pub fn create_squad(
    table: &TroopTable,
    id: SquadId,
    side: Side,
    entry: &RosterEntry,
    position: GridPos,
) -> Squad {
    let (kind, profile) = table.resolve(&entry.troop);
    Squad::new(id, side, kind, profile, entry.headcount, entry.level, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squad(troop: &str, headcount: u32, level: f32) -> Squad {
        create_squad(
            &TroopTable::builtin(),
            SquadId(0),
            Side::Ally,
            &RosterEntry::new(troop, headcount, level),
            GridPos::new(0, 0),
        )
    }

    #[test]
    fn test_full_strength_level_one_matches_profile() {
        let s = squad("infantry", 10, 1.0);
        assert_eq!(s.max_hp, 300);
        assert_eq!(s.hp, 300);
        assert_eq!(s.attack, 30);
        assert_eq!(s.defense, 20);
        assert_eq!(s.speed, 2);
        assert_eq!(s.range, 1);
    }

    #[test]
    fn test_headcount_scales_linearly() {
        let s = squad("infantry", 5, 1.0);
        assert_eq!(s.max_hp, 150);
        assert_eq!(s.attack, 15);
        assert_eq!(s.defense, 10);
        // Speed, range and move are not scaled.
        assert_eq!(s.speed, 2);
        assert_eq!(s.move_distance, 1);
    }

    #[test]
    fn test_level_bonus() {
        // Level 3: 1 + 0.1 × 2 = 1.2
        let s = squad("infantry", 10, 3.0);
        assert_eq!(s.max_hp, 360);
        assert_eq!(s.attack, 36);
    }

    #[test]
    fn test_level_rounding_and_cap() {
        assert_eq!(level_to_tenths(1.26), 13);
        assert_eq!(level_to_tenths(9.0), 50);
        assert_eq!(level_to_tenths(0.0), 1);
        assert_eq!(level_to_tenths(-4.0), 1);
        assert_eq!(level_to_tenths(f32::NAN), 10);
    }

    #[test]
    fn test_headcount_clamped() {
        assert_eq!(squad("archer", 0, 1.0).headcount, 1);
        assert_eq!(squad("archer", 42, 1.0).headcount, 10);
    }

    #[test]
    fn test_stats_floored_to_one() {
        // Fallback attack 10 × 1/10 × 0.91 = 0.91 -> floor 0 -> 1
        let s = squad("ghost", 1, 0.1);
        assert_eq!(s.kind, TroopKind::Irregular);
        assert_eq!(s.attack, 1);
        assert_eq!(s.defense, 1);
        assert_eq!(s.max_hp, 9);
    }

    #[test]
    fn test_apply_damage_saturates() {
        let mut s = squad("archer", 10, 1.0);
        assert_eq!(s.apply_damage(50), 50);
        assert_eq!(s.hp, 150);
        assert_eq!(s.apply_damage(500), 150);
        assert_eq!(s.hp, 0);
        assert!(!s.is_alive());
    }

    #[test]
    fn test_hp_percent() {
        let mut s = squad("infantry", 10, 1.0);
        s.hp = 89;
        assert_eq!(s.hp_percent(), 29);
    }
}
