//! The battle instance and its per-tick pipeline.
//!
//! A [`BattleInstance`] owns everything one battle needs: the terrain grid,
//! the squad arena (allies first, then enemies, indexed by [`SquadId`]), the
//! ally strategy, the seed and the transient visual effects. It is a plain
//! value; the caller owns it and drives it with [`BattleInstance::step`].
//!
//! # Tick Order
//!
//! Each tick, every living squad acts once in arena order:
//! 1. **Cooldown** - attack cooldown counts down
//! 2. **Targeting** - pick or keep a target
//! 3. **Retreat** - badly hurt squads step to better terrain and stop there
//! 4. **Charge restraint** - fast allies that outran the line move one cell
//! 5. **Kiting** - ranged squads step away from adjacent melee, then shoot
//! 6. **Approach** - greedy steps toward the target until in range
//! 7. **Attack** - if in range and off cooldown
//!
//! Moves and deaths are visible immediately to squads later in the order.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::clock::ClockState;
use crate::combat::{apply_attack, AttackOutcome};
use crate::error::{BattleError, Result};
use crate::formation::{deploy, deploy_in_order, shuffled_slot_order, FormationPolicy};
use crate::math::GridPos;
use crate::movement::{
    adjacent_melee_threats, approach, kite_step, kiting_enabled, movement_allowance,
    retreat_step, wants_retreat, Occupancy,
};
use crate::report::{decide_outcome, BattleOutcome, BattleReport, SideTally, SquadReport};
use crate::rules::BattleRules;
use crate::squad::{create_squad, RosterEntry, Side, Squad, SquadId};
use crate::strategy::StrategyConfig;
use crate::targeting::Targeting;
use crate::terrain::{BattleGrid, TerrainKind};
use crate::troop::{TroopKind, TroopTable};

/// Enemy formation used when the encounter supplies none.
#[must_use]
pub fn default_enemy_formation() -> Vec<RosterEntry> {
    [
        "infantry",
        "infantry",
        "infantry",
        "infantry",
        "archer",
        "archer",
        "cavalry",
        "cavalry",
        "musketeer",
        "cannoneer",
    ]
    .into_iter()
    .map(RosterEntry::full)
    .collect()
}

/// Everything needed to start a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSetup {
    /// Ally sortie roster, in deployment order.
    pub ally_roster: Vec<RosterEntry>,
    /// Enemy formation; the default formation is used when absent.
    #[serde(default)]
    pub enemy_formation: Option<Vec<RosterEntry>>,
    /// Faction the enemy belongs to.
    #[serde(default)]
    pub enemy_faction: Option<String>,
    /// Biome the grid is rolled from.
    #[serde(default)]
    pub base_terrain: TerrainKind,
    /// Ally deployment policy.
    #[serde(default)]
    pub ally_formation: FormationPolicy,
    /// Ally strategy.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// RNG seed; a fresh one is drawn when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl BattleSetup {
    /// Setup with an ally roster and defaults for everything else.
    #[must_use]
    pub fn new(ally_roster: Vec<RosterEntry>) -> Self {
        Self {
            ally_roster,
            enemy_formation: None,
            enemy_faction: None,
            base_terrain: TerrainKind::default(),
            ally_formation: FormationPolicy::default(),
            strategy: StrategyConfig::default(),
            seed: None,
        }
    }

    /// Builder: explicit enemy formation.
    #[must_use]
    pub fn with_enemies(mut self, formation: Vec<RosterEntry>) -> Self {
        self.enemy_formation = Some(formation);
        self
    }

    /// Builder: seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder: base terrain.
    #[must_use]
    pub fn with_terrain(mut self, terrain: TerrainKind) -> Self {
        self.base_terrain = terrain;
        self
    }

    /// Builder: ally strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder: ally formation policy.
    #[must_use]
    pub fn with_formation(mut self, policy: FormationPolicy) -> Self {
        self.ally_formation = policy;
        self
    }
}

/// Why a squad moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveReason {
    /// Stepped to better terrain while badly hurt.
    Retreat,
    /// Stepped away from adjacent melee.
    Kite,
    /// Advanced toward its target.
    Approach,
}

/// A squad changing cells during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvent {
    /// Squad that moved.
    pub squad: SquadId,
    /// Starting cell.
    pub from: GridPos,
    /// Final cell.
    pub to: GridPos,
    /// Why it moved.
    pub reason: MoveReason,
}

/// Events produced by a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number after the step.
    pub tick: u32,
    /// Attacks resolved this tick.
    pub attacks: Vec<AttackOutcome>,
    /// Moves made this tick.
    pub moves: Vec<MoveEvent>,
    /// Squads destroyed this tick.
    pub deaths: Vec<SquadId>,
    /// Outcome after the step; `Pending` while the battle goes on.
    pub outcome: BattleOutcome,
}

/// Kind of a presentation-only effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    /// Attack trail from attacker to target.
    Attack {
        /// Attacker cell.
        from: GridPos,
        /// Target cell.
        to: GridPos,
    },
    /// Movement trail.
    Move {
        /// Starting cell.
        from: GridPos,
        /// Final cell.
        to: GridPos,
    },
    /// Squad destroyed.
    Death {
        /// Cell where it fell.
        at: GridPos,
    },
}

/// A visual hint that decays after a few ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualEffect {
    /// What to draw.
    pub kind: EffectKind,
    /// Ticks left before the effect disappears.
    pub ttl: u8,
}

/// Read-only view of one squad for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadView {
    /// Squad id.
    pub id: SquadId,
    /// Side.
    pub side: Side,
    /// Troop type.
    pub troop: TroopKind,
    /// Current cell.
    pub position: GridPos,
    /// Current HP.
    pub hp: u32,
    /// Maximum HP.
    pub max_hp: u32,
    /// Current target.
    pub target: Option<SquadId>,
}

impl From<&Squad> for SquadView {
    fn from(squad: &Squad) -> Self {
        Self {
            id: squad.id,
            side: squad.side,
            troop: squad.kind,
            position: squad.position,
            hp: squad.hp,
            max_hp: squad.max_hp,
            target: squad.target,
        }
    }
}

/// Consistent post-tick state for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    /// Ticks simulated.
    pub tick: u32,
    /// Simulated time in milliseconds.
    pub elapsed_ms: u64,
    /// Clock state when the snapshot was taken.
    pub clock: ClockState,
    /// Outcome so far.
    pub outcome: BattleOutcome,
    /// Terrain rows, top to bottom.
    pub terrain: Vec<Vec<TerrainKind>>,
    /// Every squad, dead ones included.
    pub squads: Vec<SquadView>,
    /// Live visual effects.
    pub effects: Vec<VisualEffect>,
}

/// One battle, from deployment to outcome.
#[derive(Debug, Clone)]
pub struct BattleInstance {
    rules: BattleRules,
    grid: BattleGrid,
    squads: Vec<Squad>,
    ally_count: usize,
    strategy: StrategyConfig,
    ally_formation: FormationPolicy,
    enemy_formation: Vec<RosterEntry>,
    enemy_faction: Option<String>,
    enemy_slot_order: Vec<usize>,
    tick: u32,
    elapsed_ms: u64,
    outcome: BattleOutcome,
    effects: Vec<VisualEffect>,
    seed: u64,
}

impl BattleInstance {
    /// Roll terrain from the setup's base biome and deploy both sides.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy fails validation.
    pub fn new(setup: &BattleSetup, rules: BattleRules, troops: &TroopTable) -> Result<Self> {
        let seed = setup.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rules = rules.sanitized();
        let grid = BattleGrid::generate(rules.grid_size, setup.base_terrain, &mut rng);
        Self::assemble(setup, rules, troops, grid, seed, &mut rng)
    }

    /// Deploy both sides on an existing grid (scripted fields, field preservation).
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy fails validation.
    pub fn with_grid(
        setup: &BattleSetup,
        rules: BattleRules,
        troops: &TroopTable,
        grid: BattleGrid,
    ) -> Result<Self> {
        let seed = setup.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut rules = rules.sanitized();
        rules.grid_size = grid.size();
        Self::assemble(setup, rules, troops, grid, seed, &mut rng)
    }

    fn assemble(
        setup: &BattleSetup,
        rules: BattleRules,
        troops: &TroopTable,
        grid: BattleGrid,
        seed: u64,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        setup.strategy.validate()?;

        let allies = truncate_roster(&setup.ally_roster, rules.max_squads, Side::Ally);
        let enemy_formation = setup
            .enemy_formation
            .clone()
            .unwrap_or_else(default_enemy_formation);
        let enemies = truncate_roster(&enemy_formation, rules.max_squads, Side::Enemy);

        if allies.is_empty() {
            tracing::warn!("Empty ally roster, the battle resolves as a loss on the first tick");
        }

        let ally_count = allies.len();
        let mut squads = Vec::with_capacity(ally_count + enemies.len());
        for (side, roster) in [(Side::Ally, allies), (Side::Enemy, enemies)] {
            for (roster_index, entry) in roster.iter().enumerate() {
                let id = SquadId(squads.len() as u32);
                let mut squad = create_squad(troops, id, side, entry, GridPos::default());
                squad.roster_index = roster_index;
                squads.push(squad);
            }
        }

        let enemy_slot_order = shuffled_slot_order(Side::Enemy, grid.size(), rng);

        let mut battle = Self {
            rules,
            grid,
            squads,
            ally_count,
            strategy: setup.strategy,
            ally_formation: setup.ally_formation.clone(),
            enemy_formation,
            enemy_faction: setup.enemy_faction.clone(),
            enemy_slot_order,
            tick: 0,
            elapsed_ms: 0,
            outcome: BattleOutcome::Pending,
            effects: Vec::new(),
            seed,
        };
        battle.deploy_allies();
        battle.deploy_enemies();

        tracing::info!(
            seed,
            terrain = ?battle.grid.base(),
            allies = battle.ally_count,
            enemies = battle.squads.len() - battle.ally_count,
            "Battle prepared"
        );
        Ok(battle)
    }

    fn deploy_allies(&mut self) {
        let size = self.grid.size();
        let (allies, _) = self.squads.split_at_mut(self.ally_count);
        deploy(allies, Side::Ally, &self.ally_formation, size);
    }

    fn deploy_enemies(&mut self) {
        let size = self.grid.size();
        let (_, enemies) = self.squads.split_at_mut(self.ally_count);
        deploy_in_order(enemies, Side::Enemy, &self.enemy_slot_order, size);
    }

    /// Re-apply the ally formation. Enemy positions keep the stored slot order.
    ///
    /// # Errors
    ///
    /// Returns an error once the first tick has run.
    pub fn apply_formation(&mut self, policy: FormationPolicy) -> Result<()> {
        if self.tick > 0 {
            return Err(BattleError::InvalidTransition {
                from: ClockState::Running,
                action: "redeploy",
            });
        }
        self.ally_formation = policy;
        self.deploy_allies();
        self.deploy_enemies();
        Ok(())
    }

    /// Replace the ally strategy; it takes effect on the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy fails validation.
    pub fn set_strategy(&mut self, strategy: StrategyConfig) -> Result<()> {
        strategy.validate()?;
        self.strategy = strategy;
        Ok(())
    }

    /// Advance the battle by one tick.
    ///
    /// Does nothing once the outcome is decided.
    pub fn step(&mut self) -> TickEvents {
        let mut events = TickEvents {
            tick: self.tick,
            outcome: self.outcome,
            ..TickEvents::default()
        };
        if self.outcome.is_decided() {
            return events;
        }

        self.decay_effects();
        let mut occupancy = Occupancy::from_squads(&self.squads);
        for index in 0..self.squads.len() {
            if self.squads[index].is_alive() {
                self.act(index, &mut occupancy, &mut events);
            }
        }

        self.tick += 1;
        self.elapsed_ms += self.rules.base_interval_ms * u64::from(self.strategy.speed.multiplier());

        let allies = SideTally::of(&self.squads, Side::Ally);
        let enemies = SideTally::of(&self.squads, Side::Enemy);
        if allies.alive == 0 || enemies.alive == 0 || self.tick >= self.rules.max_ticks {
            self.outcome = decide_outcome(allies, enemies);
            tracing::info!(
                outcome = ?self.outcome,
                ticks = self.tick,
                allies_alive = allies.alive,
                enemies_alive = enemies.alive,
                "Battle finished"
            );
        }

        events.tick = self.tick;
        events.outcome = self.outcome;

        #[cfg(feature = "debug-validation")]
        self.assert_invariants();

        tracing::debug!(
            tick = self.tick,
            allies = allies.alive,
            enemies = enemies.alive,
            "Tick complete"
        );
        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Battle state hash");
        }

        events
    }

    #[cfg(feature = "debug-validation")]
    fn assert_invariants(&self) {
        let mut cells = std::collections::HashSet::new();
        for squad in &self.squads {
            assert!(squad.hp <= squad.max_hp, "squad {:?} above max hp", squad.id);
            if squad.is_alive() {
                assert!(
                    cells.insert(squad.position),
                    "two living squads share {}",
                    squad.position
                );
            }
        }
    }

    /// Run ticks until the outcome is decided and return the report.
    pub fn run_to_end(&mut self) -> BattleReport {
        while !self.outcome.is_decided() {
            self.step();
        }
        self.report()
    }

    fn act(&mut self, index: usize, occupancy: &mut Occupancy, events: &mut TickEvents) {
        let id = SquadId(index as u32);
        {
            let squad = &mut self.squads[index];
            squad.attack_cooldown = squad.attack_cooldown.saturating_sub(1);
        }

        let decision = Targeting {
            grid: &self.grid,
            rules: &self.rules,
            strategy: &self.strategy,
        }
        .select_target(&self.squads, id);
        {
            let squad = &mut self.squads[index];
            squad.target = decision.target;
            squad.target_lock = decision.lock;
        }
        let Some(target) = decision.target else {
            return;
        };
        let target_pos = self.squads[target.index()].position;

        let squad = &self.squads[index];
        if wants_retreat(squad, &self.strategy, &self.rules) {
            if let Some(cell) = retreat_step(squad, &self.grid, occupancy) {
                self.relocate(index, cell, MoveReason::Retreat, occupancy, events);
                return;
            }
        }

        let allowance = movement_allowance(squad, target_pos, &self.squads, &self.strategy);

        if kiting_enabled(squad, &self.strategy) {
            let threats = adjacent_melee_threats(squad, &self.squads);
            if let Some(cell) = kite_step(squad, target_pos, &threats, &self.grid, occupancy) {
                self.relocate(index, cell, MoveReason::Kite, occupancy, events);
                self.try_attack(index, target, occupancy, events);
                return;
            }
        }

        let squad = &self.squads[index];
        if squad.position.manhattan(target_pos) > squad.range {
            let from = squad.position;
            let to = approach(squad, target_pos, allowance, &self.grid, occupancy);
            if to != from {
                self.squads[index].position = to;
                self.record_move(id, from, to, MoveReason::Approach, events);
            }
        }

        self.try_attack(index, target, occupancy, events);
    }

    fn relocate(
        &mut self,
        index: usize,
        to: GridPos,
        reason: MoveReason,
        occupancy: &mut Occupancy,
        events: &mut TickEvents,
    ) {
        let squad = &mut self.squads[index];
        let from = squad.position;
        occupancy.relocate(from, to);
        squad.position = to;
        let id = squad.id;
        self.record_move(id, from, to, reason, events);
    }

    fn record_move(
        &mut self,
        squad: SquadId,
        from: GridPos,
        to: GridPos,
        reason: MoveReason,
        events: &mut TickEvents,
    ) {
        events.moves.push(MoveEvent {
            squad,
            from,
            to,
            reason,
        });
        self.push_effect(EffectKind::Move { from, to });
    }

    fn try_attack(
        &mut self,
        index: usize,
        target: SquadId,
        occupancy: &mut Occupancy,
        events: &mut TickEvents,
    ) {
        let grid = &self.grid;
        let Some((attacker, victim)) = attacker_and_target(&mut self.squads, index, target.index())
        else {
            return;
        };
        if !victim.is_alive()
            || attacker.attack_cooldown > 0
            || attacker.position.manhattan(victim.position) > attacker.range
        {
            return;
        }

        let outcome = apply_attack(attacker, victim, grid);
        let from = attacker.position;
        let at = victim.position;
        let cooldown = attacker.speed;
        self.squads[index].attack_cooldown = cooldown;

        events.attacks.push(outcome);
        self.push_effect(EffectKind::Attack { from, to: at });
        if outcome.killed {
            occupancy.vacate(at);
            events.deaths.push(target);
            self.push_effect(EffectKind::Death { at });
            tracing::debug!(squad = target.0, by = outcome.attacker.0, "Squad destroyed");
        }
    }

    fn push_effect(&mut self, kind: EffectKind) {
        self.effects.push(VisualEffect {
            kind,
            ttl: self.rules.effect_ttl,
        });
    }

    fn decay_effects(&mut self) {
        for effect in &mut self.effects {
            effect.ttl = effect.ttl.saturating_sub(1);
        }
        self.effects.retain(|e| e.ttl > 0);
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// Simulated time in milliseconds.
    #[must_use]
    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Outcome so far.
    #[must_use]
    pub const fn outcome(&self) -> BattleOutcome {
        self.outcome
    }

    /// Whether the battle is decided.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_decided()
    }

    /// The terrain grid.
    #[must_use]
    pub const fn grid(&self) -> &BattleGrid {
        &self.grid
    }

    /// Rules in force.
    #[must_use]
    pub const fn rules(&self) -> &BattleRules {
        &self.rules
    }

    /// Ally strategy.
    #[must_use]
    pub const fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    /// RNG seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// All squads, allies first.
    #[must_use]
    pub fn squads(&self) -> &[Squad] {
        &self.squads
    }

    /// Look up a squad.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownSquad`] for an id not in this battle.
    pub fn squad(&self, id: SquadId) -> Result<&Squad> {
        self.squads.get(id.index()).ok_or(BattleError::UnknownSquad(id))
    }

    /// Living squads of a side.
    pub fn living(&self, side: Side) -> impl Iterator<Item = &Squad> {
        self.squads
            .iter()
            .filter(move |s| s.side == side && s.is_alive())
    }

    /// Live visual effects.
    #[must_use]
    pub fn effects(&self) -> &[VisualEffect] {
        &self.effects
    }

    /// Read-only snapshot for renderers.
    #[must_use]
    pub fn snapshot(&self, clock: ClockState) -> BattleSnapshot {
        BattleSnapshot {
            tick: self.tick,
            elapsed_ms: self.elapsed_ms,
            clock,
            outcome: self.outcome,
            terrain: self.grid.rows().map(<[TerrainKind]>::to_vec).collect(),
            squads: self.squads.iter().map(SquadView::from).collect(),
            effects: self.effects.clone(),
        }
    }

    /// Result payload for the current state.
    #[must_use]
    pub fn report(&self) -> BattleReport {
        BattleReport {
            outcome: self.outcome,
            final_squads: self.squads.iter().map(SquadReport::from).collect(),
            enemy_formation: self.enemy_formation.clone(),
            enemy_faction: self.enemy_faction.clone(),
            ticks: self.tick,
            elapsed_ms: self.elapsed_ms,
            seed: self.seed,
        }
    }

    /// Hash of tick, positions and HP in squad-id order.
    ///
    /// Two battles from the same setup and seed produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let state: Vec<(u32, GridPos, u32)> = self
            .squads
            .iter()
            .map(|s| (s.id.0, s.position, s.hp))
            .collect();
        let bytes = bincode::serialize(&(self.tick, &state)).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        hasher.finish()
    }
}

fn truncate_roster(roster: &[RosterEntry], max: usize, side: Side) -> Vec<RosterEntry> {
    if roster.len() > max {
        tracing::warn!(
            ?side,
            squads = roster.len(),
            max,
            "Roster exceeds the squad limit, extra entries are dropped"
        );
    }
    roster.iter().take(max).cloned().collect()
}

/// Split-borrow an attacker and a different target from the arena.
fn attacker_and_target(
    squads: &mut [Squad],
    attacker: usize,
    target: usize,
) -> Option<(&Squad, &mut Squad)> {
    if attacker == target || attacker >= squads.len() || target >= squads.len() {
        return None;
    }
    if attacker < target {
        let (left, right) = squads.split_at_mut(target);
        Some((&left[attacker], &mut right[0]))
    } else {
        let (left, right) = squads.split_at_mut(attacker);
        Some((&right[0], &mut left[target]))
    }
}
