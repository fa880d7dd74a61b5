//! Battle outcome and the result payload handed back to the caller.

use serde::{Deserialize, Serialize};

use crate::squad::{RosterEntry, Side, Squad};

/// Result code of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    /// Still being fought.
    #[default]
    Pending,
    /// Allies prevailed.
    Win,
    /// Enemies prevailed.
    Lose,
    /// Even result.
    Draw,
}

impl BattleOutcome {
    /// Whether the battle has been decided.
    #[must_use]
    pub const fn is_decided(self) -> bool {
        !matches!(self, BattleOutcome::Pending)
    }
}

/// Living squads and total remaining HP of one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideTally {
    /// Squads with HP above zero.
    pub alive: usize,
    /// Sum of current HP.
    pub total_hp: u64,
}

impl SideTally {
    /// Tally one side of a squad set.
    #[must_use]
    pub fn of(squads: &[Squad], side: Side) -> Self {
        squads
            .iter()
            .filter(|s| s.side == side)
            .fold(Self::default(), |mut tally, s| {
                if s.is_alive() {
                    tally.alive += 1;
                }
                tally.total_hp += u64::from(s.hp);
                tally
            })
    }
}

/// Decide a finished battle.
///
/// Elimination is checked first; only when both or neither side still stand
/// is the result decided on total remaining HP.
#[must_use]
pub fn decide_outcome(allies: SideTally, enemies: SideTally) -> BattleOutcome {
    match (allies.alive > 0, enemies.alive > 0) {
        (true, false) => BattleOutcome::Win,
        (false, true) => BattleOutcome::Lose,
        (false, false) => BattleOutcome::Draw,
        (true, true) => match allies.total_hp.cmp(&enemies.total_hp) {
            std::cmp::Ordering::Greater => BattleOutcome::Win,
            std::cmp::Ordering::Less => BattleOutcome::Lose,
            std::cmp::Ordering::Equal => BattleOutcome::Draw,
        },
    }
}

/// Final state of one squad, for reward and loss accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadReport {
    /// Side the squad fought for.
    pub side: Side,
    /// Troop type key.
    pub troop: String,
    /// Index in its side's roster.
    pub roster_index: usize,
    /// Starting headcount.
    pub headcount: u32,
    /// Level.
    pub level: f32,
    /// Remaining HP.
    pub hp: u32,
    /// Maximum HP.
    pub max_hp: u32,
    /// Whether the squad survived.
    pub alive: bool,
}

impl From<&Squad> for SquadReport {
    fn from(squad: &Squad) -> Self {
        Self {
            side: squad.side,
            troop: squad.kind.key().to_string(),
            roster_index: squad.roster_index,
            headcount: squad.headcount,
            level: squad.level_tenths as f32 / 10.0,
            hp: squad.hp,
            max_hp: squad.max_hp,
            alive: squad.is_alive(),
        }
    }
}

/// Result payload delivered once when a battle finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Result code.
    pub outcome: BattleOutcome,
    /// Every squad of both sides, in squad-id order.
    pub final_squads: Vec<SquadReport>,
    /// Enemy formation the battle was fought against.
    pub enemy_formation: Vec<RosterEntry>,
    /// Faction the enemy belonged to, if any.
    pub enemy_faction: Option<String>,
    /// Ticks simulated.
    pub ticks: u32,
    /// Simulated time in milliseconds.
    pub elapsed_ms: u64,
    /// Seed of the battle RNG.
    pub seed: u64,
}

impl BattleReport {
    /// Share of a side's maximum HP still standing, in `0.0..=1.0`.
    #[must_use]
    pub fn surviving_hp_ratio(&self, side: Side) -> f64 {
        let (hp, max) = self
            .final_squads
            .iter()
            .filter(|s| s.side == side)
            .fold((0u64, 0u64), |(hp, max), s| {
                (hp + u64::from(s.hp), max + u64::from(s.max_hp))
            });
        if max == 0 {
            0.0
        } else {
            hp as f64 / max as f64
        }
    }

    /// Surviving squads of a side.
    #[must_use]
    pub fn survivors(&self, side: Side) -> usize {
        self.final_squads
            .iter()
            .filter(|s| s.side == side && s.alive)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(alive: usize, total_hp: u64) -> SideTally {
        SideTally { alive, total_hp }
    }

    #[test]
    fn test_elimination_decides_first() {
        assert_eq!(decide_outcome(tally(1, 5), tally(0, 0)), BattleOutcome::Win);
        assert_eq!(decide_outcome(tally(0, 0), tally(2, 10)), BattleOutcome::Lose);
        assert_eq!(decide_outcome(tally(0, 0), tally(0, 0)), BattleOutcome::Draw);
    }

    #[test]
    fn test_tick_cap_decides_on_hp() {
        assert_eq!(decide_outcome(tally(3, 500), tally(1, 499)), BattleOutcome::Win);
        assert_eq!(decide_outcome(tally(3, 100), tally(1, 499)), BattleOutcome::Lose);
        assert_eq!(decide_outcome(tally(2, 300), tally(2, 300)), BattleOutcome::Draw);
    }

    #[test]
    fn test_pending_is_undecided() {
        assert!(!BattleOutcome::Pending.is_decided());
        assert!(BattleOutcome::Draw.is_decided());
    }

    #[test]
    fn test_surviving_ratio() {
        let squad = |side, hp| SquadReport {
            side,
            troop: "infantry".into(),
            roster_index: 0,
            headcount: 10,
            level: 1.0,
            hp,
            max_hp: 300,
            alive: hp > 0,
        };
        let report = BattleReport {
            outcome: BattleOutcome::Win,
            final_squads: vec![squad(Side::Ally, 150), squad(Side::Ally, 0), squad(Side::Enemy, 0)],
            enemy_formation: Vec::new(),
            enemy_faction: None,
            ticks: 10,
            elapsed_ms: 5000,
            seed: 1,
        };
        assert!((report.surviving_hp_ratio(Side::Ally) - 0.25).abs() < f64::EPSILON);
        assert_eq!(report.survivors(Side::Ally), 1);
        assert_eq!(report.survivors(Side::Enemy), 0);
    }
}
