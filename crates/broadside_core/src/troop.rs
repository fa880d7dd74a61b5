//! Troop catalogue.
//!
//! Maps troop types to base stat profiles. Roster entries name troops by
//! string key; keys are resolved against a [`TroopTable`] once, when the
//! battle is built, so the tick loop never does string lookups.
//!
//! # Example RON
//!
//! ```ron
//! {
//!     infantry: (
//!         attack: 30,
//!         defense: 20,
//!         hp: 300,
//!         speed: 2,
//!         range: 1,
//!         move_distance: 1,
//!         terrain_affinity: { forest: 110, mountain: 120, sea: 60 },
//!     ),
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::math::NEUTRAL_RATE;
use crate::squad::Side;
use crate::terrain::TerrainKind;

/// Troop type of a squad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TroopKind {
    /// Line infantry. Steady melee.
    Infantry,
    /// Horse. Fast melee, moves two cells.
    Cavalry,
    /// Bowmen. Ranged.
    Archer,
    /// Firearms. Ranged, slow to reload.
    Musketeer,
    /// Naval infantry. Melee, strong on deck and shoals.
    Marine,
    /// Light guns. Long range, fragile.
    Cannoneer,
    /// Stand-in for roster entries whose troop type is unknown.
    Irregular,
}

impl TroopKind {
    /// Every catalogued kind.
    pub const ALL: [TroopKind; 7] = [
        TroopKind::Infantry,
        TroopKind::Cavalry,
        TroopKind::Archer,
        TroopKind::Musketeer,
        TroopKind::Marine,
        TroopKind::Cannoneer,
        TroopKind::Irregular,
    ];

    /// String key used in rosters and data files.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            TroopKind::Infantry => "infantry",
            TroopKind::Cavalry => "cavalry",
            TroopKind::Archer => "archer",
            TroopKind::Musketeer => "musketeer",
            TroopKind::Marine => "marine",
            TroopKind::Cannoneer => "cannoneer",
            TroopKind::Irregular => "irregular",
        }
    }

    /// Parse a roster key (case-insensitive).
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(key))
    }

    /// Single-character glyph for text renderers.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            TroopKind::Infantry => 'i',
            TroopKind::Cavalry => 'c',
            TroopKind::Archer => 'a',
            TroopKind::Musketeer => 'm',
            TroopKind::Marine => 'n',
            TroopKind::Cannoneer => 'g',
            TroopKind::Irregular => 'x',
        }
    }

    /// Glyph as drawn for a side: uppercase for allies, lowercase for enemies.
    #[must_use]
    pub const fn side_glyph(self, side: Side) -> char {
        match side {
            Side::Ally => self.glyph().to_ascii_uppercase(),
            Side::Enemy => self.glyph(),
        }
    }
}

/// How a squad engages: adjacent or at range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engagement {
    /// Range 1. Prefers the weakest target, searches 3 cells.
    Melee,
    /// Range above 1. Prefers enemy ranged units, searches 5 cells, kites.
    Ranged,
}

/// Base stats of a troop type at full headcount (10) and level 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopProfile {
    /// Base attack.
    pub attack: u32,
    /// Base defense.
    pub defense: u32,
    /// Base hit points.
    pub hp: u32,
    /// Ticks between attacks. Lower is faster.
    pub speed: u32,
    /// Attack range in cells (Manhattan).
    pub range: u32,
    /// Cells moved per tick.
    pub move_distance: u32,
    /// Combat rate per terrain, in percent. Missing entries are 100%.
    #[serde(default)]
    pub terrain_affinity: BTreeMap<TerrainKind, u32>,
}

impl TroopProfile {
    /// Minimal stat block used for unknown troop types.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            attack: 10,
            defense: 10,
            hp: 100,
            speed: 2,
            range: 1,
            move_distance: 1,
            terrain_affinity: BTreeMap::new(),
        }
    }

    /// Melee or ranged, derived from range.
    #[must_use]
    pub fn engagement(&self) -> Engagement {
        if self.range <= 1 {
            Engagement::Melee
        } else {
            Engagement::Ranged
        }
    }

    /// Combat rate on a terrain kind, as an integer percentage (100 is neutral).
    ///
    /// Deck falls back to the plain entry when no deck entry exists.
    #[must_use]
    pub fn terrain_percent(&self, kind: TerrainKind) -> u32 {
        let entry = self.terrain_affinity.get(&kind).or_else(|| {
            if kind == TerrainKind::Deck {
                self.terrain_affinity.get(&TerrainKind::Plain)
            } else {
                None
            }
        });
        entry.copied().unwrap_or(NEUTRAL_RATE)
    }

    fn sanitized(mut self) -> Self {
        self.hp = self.hp.max(1);
        self.speed = self.speed.max(1);
        self.range = self.range.max(1);
        self.move_distance = self.move_distance.max(1);
        self
    }
}

fn affinity(entries: &[(TerrainKind, u32)]) -> BTreeMap<TerrainKind, u32> {
    entries.iter().copied().collect()
}

/// Troop type → base stat profile mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TroopTable {
    profiles: BTreeMap<TroopKind, TroopProfile>,
}

impl Default for TroopTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TroopTable {
    /// The reference troop catalogue.
    #[must_use]
    pub fn builtin() -> Self {
        use TerrainKind::{Deck, Forest, Mountain, Plain, Sea, Shoal};

        let mut profiles = BTreeMap::new();
        profiles.insert(
            TroopKind::Infantry,
            TroopProfile {
                attack: 30,
                defense: 20,
                hp: 300,
                speed: 2,
                range: 1,
                move_distance: 1,
                terrain_affinity: affinity(&[(Forest, 110), (Mountain, 120), (Sea, 60), (Shoal, 80)]),
            },
        );
        profiles.insert(
            TroopKind::Cavalry,
            TroopProfile {
                attack: 40,
                defense: 15,
                hp: 260,
                speed: 2,
                range: 1,
                move_distance: 2,
                terrain_affinity: affinity(&[
                    (Plain, 120),
                    (Forest, 80),
                    (Mountain, 70),
                    (Shoal, 70),
                    (Sea, 50),
                ]),
            },
        );
        profiles.insert(
            TroopKind::Archer,
            TroopProfile {
                attack: 25,
                defense: 10,
                hp: 200,
                speed: 2,
                range: 3,
                move_distance: 1,
                terrain_affinity: affinity(&[(Forest, 110), (Mountain, 120), (Sea, 60), (Shoal, 80)]),
            },
        );
        profiles.insert(
            TroopKind::Musketeer,
            TroopProfile {
                attack: 35,
                defense: 12,
                hp: 220,
                speed: 3,
                range: 3,
                move_distance: 1,
                terrain_affinity: affinity(&[(Mountain, 110), (Forest, 90), (Sea, 60), (Deck, 110)]),
            },
        );
        profiles.insert(
            TroopKind::Marine,
            TroopProfile {
                attack: 32,
                defense: 18,
                hp: 280,
                speed: 2,
                range: 1,
                move_distance: 1,
                terrain_affinity: affinity(&[(Deck, 130), (Shoal, 110), (Sea, 90), (Mountain, 90)]),
            },
        );
        profiles.insert(
            TroopKind::Cannoneer,
            TroopProfile {
                attack: 60,
                defense: 8,
                hp: 180,
                speed: 4,
                range: 5,
                move_distance: 1,
                terrain_affinity: affinity(&[(Deck, 120), (Forest, 80), (Sea, 70)]),
            },
        );
        profiles.insert(TroopKind::Irregular, TroopProfile::fallback());

        Self { profiles }
    }

    /// Parse a table from RON. Entries are validated (speed, range, move and HP at least 1).
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let mut table: Self = ron::from_str(source).map_err(|e| BattleError::DataParse {
            what: "troop table",
            message: e.to_string(),
        })?;
        table.profiles = table
            .profiles
            .into_iter()
            .map(|(kind, profile)| (kind, profile.sanitized()))
            .collect();
        Ok(table)
    }

    /// Profile for a kind. Kinds missing from the table get the fallback profile.
    #[must_use]
    pub fn profile(&self, kind: TroopKind) -> TroopProfile {
        self.profiles
            .get(&kind)
            .cloned()
            .unwrap_or_else(TroopProfile::fallback)
    }

    /// Resolve a roster key to a kind and its profile.
    ///
    /// Unknown keys degrade to [`TroopKind::Irregular`] with the fallback stats.
    #[must_use]
    pub fn resolve(&self, key: &str) -> (TroopKind, TroopProfile) {
        match TroopKind::from_key(key) {
            Some(kind) => (kind, self.profile(kind)),
            None => {
                tracing::warn!(troop = key, "Unknown troop type, using fallback stats");
                (TroopKind::Irregular, TroopProfile::fallback())
            }
        }
    }

    /// Number of profiles in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the table has no profiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_engagement_classes() {
        let table = TroopTable::builtin();
        assert_eq!(table.profile(TroopKind::Infantry).engagement(), Engagement::Melee);
        assert_eq!(table.profile(TroopKind::Cavalry).engagement(), Engagement::Melee);
        assert_eq!(table.profile(TroopKind::Archer).engagement(), Engagement::Ranged);
        assert_eq!(table.profile(TroopKind::Cannoneer).engagement(), Engagement::Ranged);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let table = TroopTable::builtin();
        let (kind, profile) = table.resolve(" Cavalry ");
        assert_eq!(kind, TroopKind::Cavalry);
        assert_eq!(profile.move_distance, 2);
    }

    #[test]
    fn test_side_glyph_case() {
        assert_eq!(TroopKind::Marine.side_glyph(Side::Ally), 'N');
        assert_eq!(TroopKind::Marine.side_glyph(Side::Enemy), 'n');
    }

    #[test]
    fn test_unknown_troop_falls_back() {
        let table = TroopTable::builtin();
        let (kind, profile) = table.resolve("kraken");
        assert_eq!(kind, TroopKind::Irregular);
        assert_eq!(profile.attack, 10);
        assert_eq!(profile.defense, 10);
        assert_eq!(profile.hp, 100);
    }

    #[test]
    fn test_terrain_rate_default_is_neutral() {
        let profile = TroopTable::builtin().profile(TroopKind::Infantry);
        assert_eq!(profile.terrain_percent(TerrainKind::Plain), NEUTRAL_RATE);
        assert_eq!(profile.terrain_percent(TerrainKind::Mountain), 120);
    }

    #[test]
    fn test_deck_falls_back_to_plain() {
        // Cavalry has a plain entry but no deck entry.
        let cavalry = TroopTable::builtin().profile(TroopKind::Cavalry);
        assert_eq!(
            cavalry.terrain_percent(TerrainKind::Deck),
            cavalry.terrain_percent(TerrainKind::Plain)
        );

        // Marines have their own deck entry.
        let marine = TroopTable::builtin().profile(TroopKind::Marine);
        assert_eq!(marine.terrain_percent(TerrainKind::Deck), 130);
    }

    #[test]
    fn test_from_ron_sanitizes() {
        let table = TroopTable::from_ron_str(
            "{ archer: (attack: 20, defense: 5, hp: 150, speed: 0, range: 4, move_distance: 0, terrain_affinity: { forest: 125 }) }",
        )
        .unwrap();
        let archer = table.profile(TroopKind::Archer);
        assert_eq!(archer.speed, 1);
        assert_eq!(archer.move_distance, 1);
        assert_eq!(archer.terrain_percent(TerrainKind::Forest), 125);
        // Kinds not in the file fall back.
        assert_eq!(table.profile(TroopKind::Infantry), TroopProfile::fallback());
    }

    #[test]
    fn test_from_ron_rejects_garbage() {
        assert!(TroopTable::from_ron_str("{ infantry: 3 }").is_err());
    }
}
