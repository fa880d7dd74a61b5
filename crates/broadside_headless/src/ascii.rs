//! ASCII battle view.
//!
//! Renders a [`BattleSnapshot`] as a character grid for quick terminal
//! review: terrain glyphs for empty cells, troop glyphs for living squads
//! (uppercase allies, lowercase enemies) and `*` where a squad just fell.

use std::fmt::Write as _;

use broadside_core::battle::{BattleSnapshot, EffectKind};
use broadside_core::math::GridPos;
use broadside_core::squad::Side;

/// ASCII visualization configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiConfig {
    /// Show per-side squad counts and HP under the grid.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: true,
        }
    }
}

impl AsciiConfig {
    /// Plain text, legend included.
    pub fn plain() -> Self {
        Self {
            use_color: false,
            ..Self::default()
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const BLUE: &str = "\x1b[34m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
}

fn side_color(side: Side) -> &'static str {
    match side {
        Side::Ally => colors::BLUE,
        Side::Enemy => colors::RED,
    }
}

/// A rendered cell: glyph plus optional color prefix.
#[derive(Clone, Copy)]
struct Cell {
    glyph: char,
    color: Option<&'static str>,
}

/// Render a snapshot as ASCII art.
pub fn render_ascii(snapshot: &BattleSnapshot, config: &AsciiConfig) -> String {
    let mut grid: Vec<Vec<Cell>> = snapshot
        .terrain
        .iter()
        .map(|row| {
            row.iter()
                .map(|kind| Cell {
                    glyph: kind.glyph(),
                    color: Some(colors::DIM),
                })
                .collect()
        })
        .collect();

    let mut put = |pos: GridPos, cell: Cell| {
        let (Ok(x), Ok(y)) = (usize::try_from(pos.x), usize::try_from(pos.y)) else {
            return;
        };
        if let Some(slot) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    };

    for effect in &snapshot.effects {
        if let EffectKind::Death { at } = effect.kind {
            put(
                at,
                Cell {
                    glyph: '*',
                    color: Some(colors::YELLOW),
                },
            );
        }
    }
    for squad in snapshot.squads.iter().filter(|s| s.hp > 0) {
        put(
            squad.position,
            Cell {
                glyph: squad.troop.side_glyph(squad.side),
                color: Some(side_color(squad.side)),
            },
        );
    }

    let mut output = String::new();
    let (bold, reset) = if config.use_color {
        (colors::BOLD, colors::RESET)
    } else {
        ("", "")
    };
    let _ = writeln!(
        output,
        "{bold}Tick {:>2} | {:>6} ms | {:?} | {:?}{reset}",
        snapshot.tick, snapshot.elapsed_ms, snapshot.clock, snapshot.outcome
    );

    for row in &grid {
        for cell in row {
            match cell.color.filter(|_| config.use_color) {
                Some(color) => {
                    let _ = write!(output, "{color}{}{}", cell.glyph, colors::RESET);
                }
                None => output.push(cell.glyph),
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        for side in [Side::Ally, Side::Enemy] {
            let (alive, hp, max_hp) = snapshot
                .squads
                .iter()
                .filter(|s| s.side == side)
                .fold((0u32, 0u64, 0u64), |(alive, hp, max), s| {
                    (
                        alive + u32::from(s.hp > 0),
                        hp + u64::from(s.hp),
                        max + u64::from(s.max_hp),
                    )
                });
            let _ = writeln!(output, "{side:?}: {alive} squads, {hp}/{max_hp} hp");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadside_core::battle::{BattleInstance, BattleSetup, VisualEffect};
    use broadside_core::clock::ClockState;
    use broadside_core::rules::BattleRules;
    use broadside_core::squad::RosterEntry;
    use broadside_core::terrain::{BattleGrid, TerrainKind};
    use broadside_core::troop::TroopTable;

    fn snapshot() -> BattleSnapshot {
        let setup = BattleSetup::new(vec![RosterEntry::full("archer")])
            .with_enemies(vec![RosterEntry::full("cavalry")])
            .with_seed(1);
        let battle = BattleInstance::with_grid(
            &setup,
            BattleRules::default(),
            &TroopTable::builtin(),
            BattleGrid::uniform(10, TerrainKind::Plain),
        )
        .unwrap();
        battle.snapshot(ClockState::Ready)
    }

    #[test]
    fn test_plain_render_dimensions() {
        let text = render_ascii(&snapshot(), &AsciiConfig::plain());
        let lines: Vec<&str> = text.lines().collect();
        // Header, ten rows, two legend lines.
        assert_eq!(lines.len(), 13);
        assert!(lines[0].starts_with("Tick  0"));
        assert!(lines[1..11].iter().all(|l| l.chars().count() == 10));
        assert!(lines[11].starts_with("Ally: 1 squads"));
    }

    fn grid_text(text: &str) -> String {
        text.lines().skip(1).take(10).collect()
    }

    #[test]
    fn test_squad_glyphs_by_side() {
        let grid = grid_text(&render_ascii(&snapshot(), &AsciiConfig::plain()));
        assert_eq!(grid.matches('A').count(), 1);
        assert_eq!(grid.matches('c').count(), 1);
        assert_eq!(grid.matches('.').count(), 98);
    }

    #[test]
    fn test_death_marker_and_dead_squads_hidden() {
        let mut snap = snapshot();
        let enemy = snap.squads[1].position;
        snap.squads[1].hp = 0;
        snap.effects.push(VisualEffect {
            kind: EffectKind::Death { at: enemy },
            ttl: 3,
        });
        let text = render_ascii(&snap, &AsciiConfig::plain());
        let grid = grid_text(&text);
        assert_eq!(grid.matches('c').count(), 0);
        assert_eq!(grid.matches('*').count(), 1);
        assert!(text.contains("Enemy: 0 squads"));
    }

    #[test]
    fn test_color_output_has_escapes() {
        let text = render_ascii(&snapshot(), &AsciiConfig::default());
        assert!(text.contains("\x1b[34m"));
        assert!(text.contains(colors::RESET));
    }
}
