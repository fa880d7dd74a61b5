//! Battle terrain grid.
//!
//! The field is a square grid of terrain-typed cells rolled from the base
//! biome of the encounter. Terrain never blocks movement; it only scales the
//! combat strength of the squad standing on it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::GridPos;
use crate::troop::TroopProfile;

/// Terrain type of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TerrainKind {
    /// Open water.
    Sea,
    /// Woodland.
    Forest,
    /// Open ground.
    #[default]
    Plain,
    /// High ground.
    Mountain,
    /// Shallow water and sandbanks.
    Shoal,
    /// Ship deck. Units without a deck affinity fight as on plain.
    Deck,
}

impl TerrainKind {
    /// Every terrain kind, in declaration order.
    pub const ALL: [TerrainKind; 6] = [
        TerrainKind::Sea,
        TerrainKind::Forest,
        TerrainKind::Plain,
        TerrainKind::Mountain,
        TerrainKind::Shoal,
        TerrainKind::Deck,
    ];

    /// Relative roll weights for cells generated from this base terrain.
    #[must_use]
    pub const fn generation_weights(self) -> &'static [(TerrainKind, u32)] {
        match self {
            TerrainKind::Plain => &[
                (TerrainKind::Plain, 60),
                (TerrainKind::Forest, 20),
                (TerrainKind::Mountain, 10),
                (TerrainKind::Shoal, 10),
            ],
            TerrainKind::Forest => &[
                (TerrainKind::Forest, 55),
                (TerrainKind::Plain, 30),
                (TerrainKind::Mountain, 15),
            ],
            TerrainKind::Mountain => &[
                (TerrainKind::Mountain, 45),
                (TerrainKind::Plain, 30),
                (TerrainKind::Forest, 25),
            ],
            TerrainKind::Sea => &[
                (TerrainKind::Sea, 45),
                (TerrainKind::Shoal, 35),
                (TerrainKind::Plain, 20),
            ],
            TerrainKind::Shoal => &[
                (TerrainKind::Shoal, 50),
                (TerrainKind::Plain, 25),
                (TerrainKind::Sea, 25),
            ],
            TerrainKind::Deck => &[(TerrainKind::Deck, 75), (TerrainKind::Plain, 25)],
        }
    }

    /// Coastal encounters are fought between ships: both edge columns are deck.
    #[must_use]
    pub const fn is_coastal(self) -> bool {
        matches!(self, TerrainKind::Sea | TerrainKind::Shoal)
    }

    /// Single-character glyph for text renderers.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            TerrainKind::Sea => '~',
            TerrainKind::Forest => 'T',
            TerrainKind::Plain => '.',
            TerrainKind::Mountain => '^',
            TerrainKind::Shoal => ',',
            TerrainKind::Deck => '=',
        }
    }
}

/// Square terrain grid, immutable once a battle starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleGrid {
    /// Width and height in cells.
    size: u32,
    /// Base biome the grid was rolled from.
    base: TerrainKind,
    /// Cells in row-major order.
    cells: Vec<TerrainKind>,
}

impl BattleGrid {
    /// Grid where every cell has the same terrain.
    #[must_use]
    pub fn uniform(size: u32, kind: TerrainKind) -> Self {
        Self {
            size,
            base: kind,
            cells: vec![kind; (size * size) as usize],
        }
    }

    /// Build a grid from explicit rows (`rows[y][x]`). Short rows are padded with plain.
    #[must_use]
    pub fn from_rows(rows: &[Vec<TerrainKind>]) -> Self {
        let size = rows.len() as u32;
        let mut cells = Vec::with_capacity((size * size) as usize);
        for row in rows {
            for x in 0..size as usize {
                cells.push(row.get(x).copied().unwrap_or(TerrainKind::Plain));
            }
        }
        Self {
            size,
            base: TerrainKind::Plain,
            cells,
        }
    }

    /// Roll a grid from a base biome.
    ///
    /// Each cell is drawn independently from the base's weight table. Coastal
    /// bases then paint the outermost column on each side with deck.
    pub fn generate<R: Rng>(size: u32, base: TerrainKind, rng: &mut R) -> Self {
        let weights = base.generation_weights();
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        let mut cells = Vec::with_capacity((size * size) as usize);

        for _ in 0..size {
            for x in 0..size {
                if base.is_coastal() && (x == 0 || x == size - 1) {
                    cells.push(TerrainKind::Deck);
                    continue;
                }
                let mut roll = rng.gen_range(0..total.max(1));
                let mut picked = base;
                for &(kind, weight) in weights {
                    if roll < weight {
                        picked = kind;
                        break;
                    }
                    roll -= weight;
                }
                cells.push(picked);
            }
        }

        Self { size, base, cells }
    }

    /// Width and height of the grid in cells.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Base biome the grid was generated from.
    #[must_use]
    pub const fn base(&self) -> TerrainKind {
        self.base
    }

    /// Whether the position lies on the grid.
    #[must_use]
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.size && (pos.y as u32) < self.size
    }

    /// Terrain at a position. Off-grid positions read as the base terrain.
    #[must_use]
    pub fn terrain_at(&self, pos: GridPos) -> TerrainKind {
        if !self.in_bounds(pos) {
            return self.base;
        }
        self.cells[(pos.y as u32 * self.size + pos.x as u32) as usize]
    }

    /// Combat rate, in percent, for a troop profile standing at `pos`.
    #[must_use]
    pub fn combat_percent(&self, profile: &TroopProfile, pos: GridPos) -> u32 {
        profile.terrain_percent(self.terrain_at(pos))
    }

    /// Rows of terrain, top to bottom, for renderers.
    pub fn rows(&self) -> impl Iterator<Item = &[TerrainKind]> {
        self.cells.chunks(self.size.max(1) as usize)
    }

    /// Count cells of a given kind.
    #[must_use]
    pub fn count(&self, kind: TerrainKind) -> usize {
        self.cells.iter().filter(|&&c| c == kind).count()
    }
}
