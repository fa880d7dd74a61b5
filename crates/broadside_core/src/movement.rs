//! Movement and positioning.
//!
//! Every squad steps orthogonally, one cell at a time, and never onto an
//! occupied or off-grid cell. Besides plain approach there are three special
//! behaviours: retreating to better terrain when badly hurt, kiting away from
//! adjacent melee for ranged squads, and charge restraint for fast allies.

use std::collections::HashSet;

use crate::math::GridPos;
use crate::rules::BattleRules;
use crate::squad::{Side, Squad};
use crate::strategy::{ChargeMode, KiteMode, StrategyConfig};
use crate::terrain::BattleGrid;
use crate::troop::TroopKind;

/// Cells currently held by living squads.
///
/// Updated immediately on every move so squads later in the tick see the
/// new layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    cells: HashSet<GridPos>,
}

impl Occupancy {
    /// Occupancy of all living squads.
    #[must_use]
    pub fn from_squads(squads: &[Squad]) -> Self {
        Self {
            cells: squads
                .iter()
                .filter(|s| s.is_alive())
                .map(|s| s.position)
                .collect(),
        }
    }

    /// Whether the cell is free.
    #[must_use]
    pub fn is_free(&self, pos: GridPos) -> bool {
        !self.cells.contains(&pos)
    }

    /// Whether the cell is on the grid and free.
    #[must_use]
    pub fn is_open(&self, grid: &BattleGrid, pos: GridPos) -> bool {
        grid.in_bounds(pos) && self.is_free(pos)
    }

    /// Move an occupant from one cell to another.
    pub fn relocate(&mut self, from: GridPos, to: GridPos) {
        self.cells.remove(&from);
        self.cells.insert(to);
    }

    /// Free a cell (its occupant died).
    pub fn vacate(&mut self, pos: GridPos) {
        self.cells.remove(&pos);
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Whether a squad is hurt enough to try retreating this tick.
#[must_use]
pub fn wants_retreat(squad: &Squad, strategy: &StrategyConfig, rules: &BattleRules) -> bool {
    let threshold = match squad.side {
        Side::Ally if strategy.kite_mode == KiteMode::None => return false,
        Side::Ally => strategy.retreat_threshold,
        Side::Enemy => rules.enemy_retreat_threshold,
    };
    squad.hp_percent() < u32::from(threshold)
}

/// Adjacent open cell with the strictly highest combat rate above the current one.
#[must_use]
pub fn retreat_step(squad: &Squad, grid: &BattleGrid, occupancy: &Occupancy) -> Option<GridPos> {
    let mut best_rate = grid.combat_percent(&squad.profile, squad.position);
    let mut best = None;
    for cell in squad.position.neighbours() {
        if !occupancy.is_open(grid, cell) {
            continue;
        }
        let rate = grid.combat_percent(&squad.profile, cell);
        if rate > best_rate {
            best_rate = rate;
            best = Some(cell);
        }
    }
    best
}

/// Whether charge restraint applies to a squad under the ally strategy.
#[must_use]
pub fn charge_restrained(squad: &Squad, strategy: &StrategyConfig) -> bool {
    if squad.side != Side::Ally || squad.move_distance <= 1 {
        return false;
    }
    match strategy.charge_mode {
        ChargeMode::All => true,
        ChargeMode::Cavalry => squad.kind == TroopKind::Cavalry,
        ChargeMode::None => false,
    }
}

/// Cells the squad may move this tick.
///
/// A restrained squad that is already two or more cells closer to its target
/// than every other living friendly squad is capped at one cell. The reference
/// friend is the one nearest the target, the formation's leading edge.
#[must_use]
pub fn movement_allowance(
    squad: &Squad,
    target: GridPos,
    squads: &[Squad],
    strategy: &StrategyConfig,
) -> u32 {
    if !charge_restrained(squad, strategy) {
        return squad.move_distance;
    }
    let leading_friend = squads
        .iter()
        .filter(|s| s.id != squad.id && s.side == squad.side && s.is_alive())
        .map(|s| s.position.manhattan(target))
        .min();
    let Some(theirs) = leading_friend else {
        return squad.move_distance;
    };
    let own = squad.position.manhattan(target);
    if theirs >= own + 2 {
        1
    } else {
        squad.move_distance
    }
}

/// Whether a ranged squad should look for a kiting step.
#[must_use]
pub fn kiting_enabled(squad: &Squad, strategy: &StrategyConfig) -> bool {
    squad.is_ranged() && (squad.side == Side::Enemy || strategy.kite_mode != KiteMode::None)
}

/// Positions of living opposing melee squads orthogonally adjacent to `squad`.
#[must_use]
pub fn adjacent_melee_threats(squad: &Squad, squads: &[Squad]) -> Vec<GridPos> {
    squads
        .iter()
        .filter(|s| {
            s.is_alive()
                && s.side != squad.side
                && !s.is_ranged()
                && s.position.is_adjacent(squad.position)
        })
        .map(|s| s.position)
        .collect()
}

/// Step away from every adjacent melee threat while keeping `target` in range.
///
/// Among valid cells the one furthest from the threats wins; ties keep
/// neighbour order (N, E, S, W).
#[must_use]
pub fn kite_step(
    squad: &Squad,
    target: GridPos,
    threats: &[GridPos],
    grid: &BattleGrid,
    occupancy: &Occupancy,
) -> Option<GridPos> {
    if threats.is_empty() {
        return None;
    }
    let mut best: Option<(GridPos, u32)> = None;
    for cell in squad.position.neighbours() {
        if !occupancy.is_open(grid, cell) || cell.manhattan(target) > squad.range {
            continue;
        }
        let escapes_all = threats
            .iter()
            .all(|&t| cell.manhattan(t) > squad.position.manhattan(t));
        if !escapes_all {
            continue;
        }
        let spread: u32 = threats.iter().map(|&t| cell.manhattan(t)).sum();
        if best.map_or(true, |(_, s)| spread > s) {
            best = Some((cell, spread));
        }
    }
    best.map(|(cell, _)| cell)
}

/// One greedy step from `from` toward `to`.
///
/// Prefers the axis with the larger remaining distance (x on ties) and falls
/// back to the other axis when the preferred cell is blocked.
#[must_use]
pub fn approach_step(
    from: GridPos,
    to: GridPos,
    grid: &BattleGrid,
    occupancy: &Occupancy,
) -> Option<GridPos> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let step_x = (dx != 0).then(|| from.offset(dx.signum(), 0));
    let step_y = (dy != 0).then(|| from.offset(0, dy.signum()));
    let (preferred, fallback) = if dx.abs() >= dy.abs() {
        (step_x, step_y)
    } else {
        (step_y, step_x)
    };
    [preferred, fallback]
        .into_iter()
        .flatten()
        .find(|&cell| occupancy.is_open(grid, cell))
}

/// Walk toward `target` until within `range` or out of allowance.
///
/// Returns the final cell; occupancy is updated along the way.
pub fn approach(
    squad: &Squad,
    target: GridPos,
    allowance: u32,
    grid: &BattleGrid,
    occupancy: &mut Occupancy,
) -> GridPos {
    let mut position = squad.position;
    for _ in 0..allowance {
        if position.manhattan(target) <= squad.range {
            break;
        }
        let Some(next) = approach_step(position, target, grid, occupancy) else {
            break;
        };
        occupancy.relocate(position, next);
        position = next;
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::{create_squad, RosterEntry, SquadId};
    use crate::terrain::TerrainKind;
    use crate::troop::TroopTable;

    fn squad(id: u32, side: Side, troop: &str, x: i32, y: i32) -> Squad {
        create_squad(
            &TroopTable::builtin(),
            SquadId(id),
            side,
            &RosterEntry::full(troop),
            GridPos::new(x, y),
        )
    }

    fn plain() -> BattleGrid {
        BattleGrid::uniform(10, TerrainKind::Plain)
    }

    #[test]
    fn test_occupancy_tracks_living_only() {
        let mut dead = squad(1, Side::Enemy, "infantry", 5, 5);
        dead.hp = 0;
        let squads = vec![squad(0, Side::Ally, "infantry", 1, 1), dead];
        let mut occ = Occupancy::from_squads(&squads);
        assert_eq!(occ.len(), 1);
        assert!(occ.is_free(GridPos::new(5, 5)));
        occ.relocate(GridPos::new(1, 1), GridPos::new(2, 1));
        assert!(occ.is_free(GridPos::new(1, 1)));
        assert!(!occ.is_free(GridPos::new(2, 1)));
        occ.vacate(GridPos::new(2, 1));
        assert!(occ.is_empty());
    }

    #[test]
    fn test_approach_prefers_longer_axis() {
        let grid = plain();
        let occ = Occupancy::default();
        let step = approach_step(GridPos::new(1, 5), GridPos::new(8, 3), &grid, &occ);
        assert_eq!(step, Some(GridPos::new(2, 5)));
        let step = approach_step(GridPos::new(5, 1), GridPos::new(6, 8), &grid, &occ);
        assert_eq!(step, Some(GridPos::new(5, 2)));
    }

    #[test]
    fn test_approach_falls_back_to_other_axis() {
        let grid = plain();
        let mut occ = Occupancy::default();
        occ.relocate(GridPos::new(9, 9), GridPos::new(2, 5));
        let step = approach_step(GridPos::new(1, 5), GridPos::new(8, 3), &grid, &occ);
        assert_eq!(step, Some(GridPos::new(1, 4)));
    }

    #[test]
    fn test_approach_blocked_stays() {
        let grid = plain();
        let mut occ = Occupancy::default();
        occ.relocate(GridPos::new(9, 9), GridPos::new(2, 5));
        // Same row: no fallback axis.
        assert_eq!(
            approach_step(GridPos::new(1, 5), GridPos::new(8, 5), &grid, &occ),
            None
        );
    }

    #[test]
    fn test_approach_stops_in_range() {
        let grid = plain();
        let archer = squad(0, Side::Ally, "archer", 1, 5);
        let mut occ = Occupancy::from_squads(std::slice::from_ref(&archer));
        let end = approach(&archer, GridPos::new(5, 5), 5, &grid, &mut occ);
        assert_eq!(end, GridPos::new(2, 5));
        assert!(!occ.is_free(end));
        assert!(occ.is_free(GridPos::new(1, 5)));
    }

    #[test]
    fn test_retreat_only_to_strictly_better_terrain() {
        let mut rows = vec![vec![TerrainKind::Plain; 10]; 10];
        rows[4][5] = TerrainKind::Forest; // north of (5,5)
        rows[5][6] = TerrainKind::Mountain; // east of (5,5)
        let grid = BattleGrid::from_rows(&rows);
        let infantry = squad(0, Side::Ally, "infantry", 5, 5);
        let occ = Occupancy::from_squads(std::slice::from_ref(&infantry));
        assert_eq!(retreat_step(&infantry, &grid, &occ), Some(GridPos::new(6, 5)));

        let flat = plain();
        assert_eq!(retreat_step(&infantry, &flat, &occ), None);
    }

    #[test]
    fn test_retreat_thresholds() {
        let rules = BattleRules::default();
        let strategy = StrategyConfig::default().with_retreat_threshold(50);
        let mut ally = squad(0, Side::Ally, "infantry", 1, 1);
        ally.hp = 140;
        assert!(wants_retreat(&ally, &strategy, &rules));
        let holding = strategy.with_kite_mode(KiteMode::None);
        assert!(!wants_retreat(&ally, &holding, &rules));

        let mut enemy = squad(1, Side::Enemy, "infantry", 8, 1);
        enemy.hp = 100;
        assert!(!wants_retreat(&enemy, &strategy, &rules));
        enemy.hp = 80;
        assert!(wants_retreat(&enemy, &strategy, &rules));
    }

    #[test]
    fn test_charge_restraint_caps_runaway_cavalry() {
        let strategy = StrategyConfig::default();
        let cavalry = squad(0, Side::Ally, "cavalry", 4, 5);
        let laggard = squad(1, Side::Ally, "infantry", 1, 5);
        let squads = vec![cavalry.clone(), laggard];
        assert_eq!(movement_allowance(&cavalry, GridPos::new(8, 5), &squads, &strategy), 1);

        let free = strategy.with_charge_mode(ChargeMode::None);
        assert_eq!(movement_allowance(&cavalry, GridPos::new(8, 5), &squads, &free), 2);
    }

    #[test]
    fn test_charge_restraint_allows_line_advance() {
        let strategy = StrategyConfig::default();
        let cavalry = squad(0, Side::Ally, "cavalry", 2, 5);
        let friend = squad(1, Side::Ally, "infantry", 1, 5);
        let squads = vec![cavalry.clone(), friend];
        assert_eq!(movement_allowance(&cavalry, GridPos::new(8, 5), &squads, &strategy), 2);
    }

    #[test]
    fn test_charge_restraint_measures_from_leading_friend() {
        let strategy = StrategyConfig::default();
        let target = GridPos::new(8, 5);
        let cavalry = squad(0, Side::Ally, "cavalry", 4, 5);
        // Closest to the cavalry but six cells from the target.
        let flank = squad(1, Side::Ally, "infantry", 4, 7);
        // Farther from the cavalry, yet only four cells from the target.
        let vanguard = squad(2, Side::Ally, "infantry", 6, 3);
        let squads = vec![cavalry.clone(), flank.clone(), vanguard];
        assert_eq!(movement_allowance(&cavalry, target, &squads, &strategy), 2);

        let squads = vec![cavalry.clone(), flank];
        assert_eq!(movement_allowance(&cavalry, target, &squads, &strategy), 1);
    }

    #[test]
    fn test_lone_squad_is_never_restrained() {
        let cavalry = squad(0, Side::Ally, "cavalry", 4, 5);
        let squads = vec![cavalry.clone(), squad(1, Side::Enemy, "infantry", 8, 5)];
        assert_eq!(
            movement_allowance(&cavalry, GridPos::new(8, 5), &squads, &StrategyConfig::default()),
            2
        );
    }

    #[test]
    fn test_charge_mode_all_covers_non_cavalry() {
        let mut fast = squad(0, Side::Ally, "infantry", 4, 5);
        fast.move_distance = 2;
        let squads = vec![fast.clone(), squad(1, Side::Ally, "infantry", 1, 5)];
        let cavalry_only = StrategyConfig::default();
        assert_eq!(movement_allowance(&fast, GridPos::new(8, 5), &squads, &cavalry_only), 2);
        let all = cavalry_only.with_charge_mode(ChargeMode::All);
        assert_eq!(movement_allowance(&fast, GridPos::new(8, 5), &squads, &all), 1);
    }

    #[test]
    fn test_kite_steps_away_and_keeps_range() {
        let grid = plain();
        let archer = squad(0, Side::Ally, "archer", 4, 5);
        let brute = squad(1, Side::Enemy, "infantry", 5, 5);
        let squads = vec![archer.clone(), brute.clone()];
        let occ = Occupancy::from_squads(&squads);
        let threats = adjacent_melee_threats(&archer, &squads);
        assert_eq!(threats, vec![brute.position]);

        let cell = kite_step(&archer, brute.position, &threats, &grid, &occ).unwrap();
        assert!(cell.manhattan(brute.position) > archer.position.manhattan(brute.position));
        assert!(cell.manhattan(brute.position) <= archer.range);
    }

    #[test]
    fn test_kite_boxed_in_holds() {
        let grid = plain();
        let archer = squad(0, Side::Ally, "archer", 0, 0);
        let brute = squad(1, Side::Enemy, "infantry", 1, 0);
        let wall = squad(2, Side::Ally, "infantry", 0, 1);
        let squads = vec![archer.clone(), brute.clone(), wall];
        let occ = Occupancy::from_squads(&squads);
        let threats = adjacent_melee_threats(&archer, &squads);
        assert_eq!(kite_step(&archer, brute.position, &threats, &grid, &occ), None);
    }

    #[test]
    fn test_kiting_gate() {
        let strategy = StrategyConfig::default();
        let archer = squad(0, Side::Ally, "archer", 0, 0);
        let infantry = squad(1, Side::Ally, "infantry", 0, 1);
        assert!(kiting_enabled(&archer, &strategy));
        assert!(!kiting_enabled(&infantry, &strategy));
        let hold = strategy.with_kite_mode(KiteMode::None);
        assert!(!kiting_enabled(&archer, &hold));
        let mut enemy_archer = archer;
        enemy_archer.side = Side::Enemy;
        assert!(kiting_enabled(&enemy_archer, &hold));
    }
}
