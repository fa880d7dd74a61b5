//! Target selection.
//!
//! Ally squads search a radius around themselves and pick a target by the
//! strategy's target mode, with hysteresis so near-equal candidates do not
//! make a squad thrash between them. Enemy squads skip all of that and chase
//! the nearest living ally.

use crate::combat::strength_score;
use crate::math::Fixed;
use crate::rules::BattleRules;
use crate::squad::{Side, Squad, SquadId};
use crate::strategy::{StrategyConfig, TargetMode};
use crate::terrain::BattleGrid;

/// Read-only context for one targeting pass.
#[derive(Debug, Clone, Copy)]
pub struct Targeting<'a> {
    /// Terrain, for effective stats in strength scores.
    pub grid: &'a BattleGrid,
    /// Radii, locks and switch ratios.
    pub rules: &'a BattleRules,
    /// Ally strategy.
    pub strategy: &'a StrategyConfig,
}

/// Result of a targeting pass for one squad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDecision {
    /// Chosen target, `None` only when no opposing squad is alive.
    pub target: Option<SquadId>,
    /// Retargeting lock to store on the squad.
    pub lock: u32,
    /// Whether the target differs from the previous one.
    pub switched: bool,
}

/// The concrete mode a squad targets with, after resolving `type`.
#[must_use]
pub fn resolve_mode(mode: TargetMode, squad: &Squad) -> TargetMode {
    match mode {
        TargetMode::Type if squad.is_ranged() => TargetMode::Rear,
        TargetMode::Type => TargetMode::Hp,
        explicit => explicit,
    }
}

impl Targeting<'_> {
    /// Search radius for a squad's engagement class.
    #[must_use]
    pub fn search_radius(&self, squad: &Squad) -> u32 {
        if squad.is_ranged() {
            self.rules.ranged_search_radius
        } else {
            self.rules.melee_search_radius
        }
    }

    /// Choose a target for `squads[actor]`.
    ///
    /// The actor must be alive; the caller stores the decision on the squad.
    #[must_use]
    pub fn select_target(&self, squads: &[Squad], actor: SquadId) -> TargetDecision {
        let Some(me) = squads.get(actor.index()) else {
            return TargetDecision {
                target: None,
                lock: 0,
                switched: false,
            };
        };
        match me.side {
            Side::Enemy => Self::nearest_decision(me, squads),
            Side::Ally => self.ally_decision(me, squads),
        }
    }

    fn nearest_decision(me: &Squad, squads: &[Squad]) -> TargetDecision {
        let target = nearest(me, opponents(me, squads)).map(|s| s.id);
        TargetDecision {
            target,
            lock: 0,
            switched: target != me.target,
        }
    }

    fn ally_decision(&self, me: &Squad, squads: &[Squad]) -> TargetDecision {
        let lock = me.target_lock.saturating_sub(1);
        let current = me
            .target
            .and_then(|id| squads.get(id.index()))
            .filter(|t| t.is_alive() && t.side != me.side);

        if let Some(current) = current {
            let in_tolerance =
                me.position.manhattan(current.position) <= self.rules.lock_tolerance;
            if me.target_lock > 0 && in_tolerance {
                return TargetDecision {
                    target: Some(current.id),
                    lock,
                    switched: false,
                };
            }
        }

        let radius = self.search_radius(me);
        let candidates: Vec<&Squad> = opponents(me, squads)
            .filter(|s| me.position.manhattan(s.position) <= radius)
            .collect();

        let mode = resolve_mode(self.strategy.target_mode, me);
        let best = if candidates.is_empty() {
            nearest(me, opponents(me, squads))
        } else {
            self.pick(mode, me, &candidates)
        };
        let Some(best) = best else {
            return TargetDecision {
                target: None,
                lock: 0,
                switched: me.target.is_some(),
            };
        };

        let chosen = match current {
            Some(current)
                if current.id != best.id
                    && me.position.manhattan(current.position) <= radius
                    && !self.should_switch(mode, current, best) =>
            {
                current
            }
            _ => best,
        };

        if Some(chosen.id) == me.target {
            TargetDecision {
                target: Some(chosen.id),
                lock,
                switched: false,
            }
        } else {
            let lock = if me.is_ranged() {
                self.rules.ranged_switch_lock
            } else {
                self.rules.melee_switch_lock
            };
            tracing::debug!(squad = me.id.0, target = chosen.id.0, ?mode, "Target switch");
            TargetDecision {
                target: Some(chosen.id),
                lock,
                switched: true,
            }
        }
    }

    /// Best candidate under a mode. Ties keep the earliest candidate.
    fn pick<'s>(&self, mode: TargetMode, me: &Squad, candidates: &[&'s Squad]) -> Option<&'s Squad> {
        match mode {
            TargetMode::Hp => lowest_hp(candidates.iter().copied()),
            TargetMode::Rear => lowest_hp(candidates.iter().copied().filter(|s| s.is_ranged()))
                .or_else(|| lowest_hp(candidates.iter().copied())),
            TargetMode::Close => nearest(me, candidates.iter().copied()),
            TargetMode::Strong | TargetMode::Type => self.strongest(candidates.iter().copied()),
        }
    }

    fn strongest<'s>(&self, candidates: impl Iterator<Item = &'s Squad>) -> Option<&'s Squad> {
        let mut best: Option<(&Squad, Fixed)> = None;
        for squad in candidates {
            let score = strength_score(squad, self.grid);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((squad, score));
            }
        }
        best.map(|(squad, _)| squad)
    }

    /// Hysteresis: whether `candidate` is enough of an improvement over `current`.
    #[must_use]
    pub fn should_switch(&self, mode: TargetMode, current: &Squad, candidate: &Squad) -> bool {
        let hp_better = mode == TargetMode::Hp
            && u64::from(candidate.hp) * 100
                < u64::from(current.hp) * u64::from(self.rules.hp_switch_percent);
        let rear_better = mode == TargetMode::Rear && candidate.is_ranged() && !current.is_ranged();
        let stronger = strength_score(candidate, self.grid).saturating_mul_int(100)
            > strength_score(current, self.grid)
                .saturating_mul_int(i64::from(self.rules.switch_ratio_percent));
        hp_better || rear_better || stronger
    }
}

fn opponents<'s>(me: &'s Squad, squads: &'s [Squad]) -> impl Iterator<Item = &'s Squad> + 's {
    squads
        .iter()
        .filter(move |s| s.is_alive() && s.side != me.side)
}

fn nearest<'s>(me: &Squad, candidates: impl Iterator<Item = &'s Squad>) -> Option<&'s Squad> {
    let mut best: Option<(&Squad, u32)> = None;
    for squad in candidates {
        let distance = me.position.manhattan(squad.position);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((squad, distance));
        }
    }
    best.map(|(squad, _)| squad)
}

fn lowest_hp<'s>(candidates: impl Iterator<Item = &'s Squad>) -> Option<&'s Squad> {
    let mut best: Option<&Squad> = None;
    for squad in candidates {
        if best.map_or(true, |b| squad.hp < b.hp) {
            best = Some(squad);
        }
    }
    best
}
