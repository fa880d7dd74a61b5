//! Simulation clock.
//!
//! A [`BattleSession`] drives one [`BattleInstance`] through the clock states
//!
//! ```text
//! idle -> ready -> running <-> paused -> finished
//! ```
//!
//! Real time is abstracted behind [`TickScheduler`]: the session only asks
//! the scheduler to fire every `base_interval / speed`, and the driver calls
//! [`BattleSession::fire`] whenever it does. Tests use [`ManualScheduler`]
//! and fire ticks synchronously.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::battle::{BattleInstance, BattleSetup, BattleSnapshot, TickEvents};
use crate::error::{BattleError, Result};
use crate::formation::FormationPolicy;
use crate::report::BattleReport;
use crate::rules::BattleRules;
use crate::strategy::{BattleSpeed, StrategyConfig};
use crate::troop::TroopTable;

/// State of the battle clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    /// Nothing prepared.
    #[default]
    Idle,
    /// Squads deployed, no tick run yet.
    Ready,
    /// Timer armed, ticks firing.
    Running,
    /// Timer cancelled mid-battle.
    Paused,
    /// Outcome decided; a new battle must be prepared.
    Finished,
}

/// Source of repeating tick timers.
pub trait TickScheduler {
    /// Arm a repeating timer, replacing any armed one.
    fn schedule(&mut self, interval: Duration);

    /// Disarm the timer. Idempotent.
    fn cancel(&mut self);
}

/// Scheduler that only records requests; ticks are fired by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualScheduler {
    interval: Option<Duration>,
    /// Number of `schedule` calls.
    pub scheduled: u32,
    /// Number of `cancel` calls.
    pub cancelled: u32,
}

impl ManualScheduler {
    /// Interval of the armed timer.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether a timer is armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.interval.is_some()
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.scheduled += 1;
    }

    fn cancel(&mut self) {
        self.interval = None;
        self.cancelled += 1;
    }
}

/// Single-use completion callback.
pub type CompletionCallback = Box<dyn FnOnce(BattleReport)>;

/// Clock-driven battle session.
pub struct BattleSession<S: TickScheduler> {
    scheduler: S,
    state: ClockState,
    rules: BattleRules,
    troops: TroopTable,
    battle: Option<BattleInstance>,
    on_complete: Option<CompletionCallback>,
    report: Option<BattleReport>,
}

impl<S: TickScheduler + std::fmt::Debug> std::fmt::Debug for BattleSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("scheduler", &self.scheduler)
            .field("state", &self.state)
            .field("tick", &self.battle.as_ref().map(BattleInstance::tick))
            .field("callback_registered", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: TickScheduler> BattleSession<S> {
    /// Create an idle session.
    pub fn new(scheduler: S, rules: BattleRules, troops: TroopTable) -> Self {
        Self {
            scheduler,
            state: ClockState::Idle,
            rules: rules.sanitized(),
            troops,
            battle: None,
            on_complete: None,
            report: None,
        }
    }

    fn invalid(&self, action: &'static str) -> BattleError {
        BattleError::InvalidTransition {
            from: self.state,
            action,
        }
    }

    /// Deploy a new battle and enter `ready`.
    ///
    /// With `preserve_field`, the terrain of the previous battle is kept and
    /// only the squads and the enemy slot order are rolled again.
    ///
    /// # Errors
    ///
    /// Fails while running, or if the setup's strategy is invalid.
    pub fn prepare(&mut self, setup: &BattleSetup, preserve_field: bool) -> Result<()> {
        if self.state == ClockState::Running {
            return Err(self.invalid("prepare"));
        }
        self.scheduler.cancel();

        let previous_grid = self
            .battle
            .as_ref()
            .filter(|_| preserve_field)
            .map(|b| b.grid().clone());
        let battle = match previous_grid {
            Some(grid) => BattleInstance::with_grid(setup, self.rules.clone(), &self.troops, grid)?,
            None => BattleInstance::new(setup, self.rules.clone(), &self.troops)?,
        };

        self.battle = Some(battle);
        self.report = None;
        self.state = ClockState::Ready;
        Ok(())
    }

    /// Re-apply the ally formation while `ready`.
    ///
    /// # Errors
    ///
    /// Fails outside `ready`.
    pub fn apply_formation(&mut self, policy: FormationPolicy) -> Result<()> {
        match (self.state, self.battle.as_mut()) {
            (ClockState::Ready, Some(battle)) => battle.apply_formation(policy),
            _ => Err(self.invalid("redeploy")),
        }
    }

    /// Replace the ally strategy while `ready` or `paused`.
    ///
    /// # Errors
    ///
    /// Fails in other states, or if the strategy is invalid.
    pub fn set_strategy(&mut self, strategy: StrategyConfig) -> Result<()> {
        match (self.state, self.battle.as_mut()) {
            (ClockState::Ready | ClockState::Paused, Some(battle)) => battle.set_strategy(strategy),
            _ => Err(self.invalid("change strategy")),
        }
    }

    /// Register the completion callback, replacing any earlier one.
    pub fn on_complete(&mut self, callback: impl FnOnce(BattleReport) + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Start ticking.
    ///
    /// # Errors
    ///
    /// Fails outside `ready`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ClockState::Ready {
            return Err(self.invalid("start"));
        }
        self.state = ClockState::Running;
        let interval = self.interval();
        self.scheduler.schedule(interval);
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Battle clock started");
        Ok(())
    }

    /// Cancel the timer. No simulated time passes while paused.
    ///
    /// # Errors
    ///
    /// Fails outside `running`.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != ClockState::Running {
            return Err(self.invalid("pause"));
        }
        self.scheduler.cancel();
        self.state = ClockState::Paused;
        Ok(())
    }

    /// Re-arm the timer at the current speed.
    ///
    /// # Errors
    ///
    /// Fails outside `paused`.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != ClockState::Paused {
            return Err(self.invalid("resume"));
        }
        self.state = ClockState::Running;
        let interval = self.interval();
        self.scheduler.schedule(interval);
        Ok(())
    }

    /// Change the speed multiplier (1, 2 or 4).
    ///
    /// While running the timer is re-armed at the new interval immediately;
    /// tick progress is kept.
    ///
    /// # Errors
    ///
    /// Fails for unsupported multipliers or when no battle is in progress.
    pub fn set_speed(&mut self, multiplier: u8) -> Result<()> {
        let speed = BattleSpeed::from_multiplier(multiplier)?;
        let state = self.state;
        let Some(battle) = self.battle.as_mut().filter(|_| state != ClockState::Finished) else {
            return Err(self.invalid("change speed"));
        };
        let strategy = StrategyConfig {
            speed,
            ..*battle.strategy()
        };
        battle.set_strategy(strategy)?;

        if state == ClockState::Running {
            self.scheduler.cancel();
            let interval = self.interval();
            self.scheduler.schedule(interval);
        }
        Ok(())
    }

    /// Run one tick; called by the driver whenever the timer fires.
    ///
    /// On termination the session finishes, the timer is cancelled and the
    /// completion callback is invoked exactly once.
    ///
    /// # Errors
    ///
    /// Fails outside `running`.
    pub fn fire(&mut self) -> Result<TickEvents> {
        let state = self.state;
        let Some(battle) = self.battle.as_mut().filter(|_| state == ClockState::Running) else {
            return Err(self.invalid("tick"));
        };
        let events = battle.step();
        if battle.is_finished() {
            self.finish();
        }
        Ok(events)
    }

    fn finish(&mut self) {
        self.state = ClockState::Finished;
        self.scheduler.cancel();
        let Some(report) = self.battle.as_ref().map(BattleInstance::report) else {
            return;
        };
        if let Some(callback) = self.on_complete.take() {
            callback(report.clone());
        }
        self.report = Some(report);
    }

    /// Start (if ready) and fire ticks back to back until the battle finishes.
    ///
    /// # Errors
    ///
    /// Fails if the session is neither `ready`, `running` nor `paused`.
    pub fn run_until_finished(&mut self) -> Result<BattleReport> {
        match self.state {
            ClockState::Ready => self.start()?,
            ClockState::Paused => self.resume()?,
            ClockState::Running => {}
            ClockState::Idle | ClockState::Finished => return Err(self.invalid("run")),
        }
        while self.state == ClockState::Running {
            self.fire()?;
        }
        self.report.clone().ok_or_else(|| self.invalid("report"))
    }

    /// Timer interval at the current speed.
    #[must_use]
    pub fn interval(&self) -> Duration {
        let multiplier = self
            .battle
            .as_ref()
            .map_or(1, |b| b.strategy().speed.multiplier());
        Duration::from_millis(self.rules.base_interval_ms / u64::from(multiplier))
    }

    /// Current clock state.
    #[must_use]
    pub const fn state(&self) -> ClockState {
        self.state
    }

    /// The battle being fought, if any.
    #[must_use]
    pub const fn battle(&self) -> Option<&BattleInstance> {
        self.battle.as_ref()
    }

    /// Post-tick snapshot for renderers.
    #[must_use]
    pub fn snapshot(&self) -> Option<BattleSnapshot> {
        self.battle.as_ref().map(|b| b.snapshot(self.state))
    }

    /// Report of the finished battle.
    #[must_use]
    pub const fn report(&self) -> Option<&BattleReport> {
        self.report.as_ref()
    }

    /// The tick scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BattleOutcome;
    use crate::squad::RosterEntry;
    use crate::terrain::TerrainKind;
    use std::cell::Cell;
    use std::rc::Rc;

    fn session() -> BattleSession<ManualScheduler> {
        BattleSession::new(
            ManualScheduler::default(),
            BattleRules::default(),
            TroopTable::builtin(),
        )
    }

    fn setup() -> BattleSetup {
        BattleSetup::new(vec![RosterEntry::full("infantry"); 2])
            .with_enemies(vec![RosterEntry::full("infantry"); 2])
            .with_seed(21)
    }

    #[test]
    fn test_lifecycle() {
        let mut session = session();
        assert_eq!(session.state(), ClockState::Idle);
        assert!(session.start().is_err());

        session.prepare(&setup(), false).unwrap();
        assert_eq!(session.state(), ClockState::Ready);
        assert_eq!(session.battle().unwrap().tick(), 0);

        session.start().unwrap();
        assert_eq!(session.state(), ClockState::Running);
        assert_eq!(session.scheduler().interval(), Some(Duration::from_millis(500)));

        session.fire().unwrap();
        session.pause().unwrap();
        assert_eq!(session.state(), ClockState::Paused);
        assert!(!session.scheduler().is_armed());

        session.resume().unwrap();
        assert_eq!(session.state(), ClockState::Running);
        assert!(session.scheduler().is_armed());
    }

    #[test]
    fn test_paused_clock_does_not_tick() {
        let mut session = session();
        session.prepare(&setup(), false).unwrap();
        session.start().unwrap();
        session.fire().unwrap();
        session.pause().unwrap();
        let elapsed = session.battle().unwrap().elapsed_ms();
        assert!(matches!(
            session.fire(),
            Err(BattleError::InvalidTransition {
                from: ClockState::Paused,
                ..
            })
        ));
        assert_eq!(session.battle().unwrap().elapsed_ms(), elapsed);
    }

    #[test]
    fn test_speed_change_reschedules() {
        let mut session = session();
        session.prepare(&setup(), false).unwrap();
        session.start().unwrap();
        session.fire().unwrap();
        session.set_speed(4).unwrap();
        assert_eq!(session.scheduler().interval(), Some(Duration::from_millis(125)));
        assert_eq!(session.battle().unwrap().tick(), 1);

        session.fire().unwrap();
        // 500 × 1 + 500 × 4
        assert_eq!(session.battle().unwrap().elapsed_ms(), 2500);
        assert!(session.set_speed(3).is_err());
    }

    #[test]
    fn test_speed_change_while_paused_applies_on_resume() {
        let mut session = session();
        session.prepare(&setup(), false).unwrap();
        session.start().unwrap();
        session.pause().unwrap();
        let scheduled = session.scheduler().scheduled;
        session.set_speed(2).unwrap();
        assert_eq!(session.scheduler().scheduled, scheduled);
        session.resume().unwrap();
        assert_eq!(session.scheduler().interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_strategy_only_when_ready_or_paused() {
        let mut session = session();
        session.prepare(&setup(), false).unwrap();
        session.set_strategy(StrategyConfig::default()).unwrap();
        session.start().unwrap();
        assert!(session.set_strategy(StrategyConfig::default()).is_err());
        session.pause().unwrap();
        session.set_strategy(StrategyConfig::default()).unwrap();
    }

    #[test]
    fn test_callback_fires_exactly_once() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let mut session = session();
        session.prepare(&setup(), false).unwrap();
        session.on_complete(move |report| {
            assert!(report.outcome.is_decided());
            seen.set(seen.get() + 1);
        });

        let report = session.run_until_finished().unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(session.state(), ClockState::Finished);
        assert!(!session.scheduler().is_armed());
        assert_ne!(report.outcome, BattleOutcome::Pending);

        assert!(session.fire().is_err());
        assert!(session.resume().is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_finished_requires_prepare() {
        let mut session = session();
        session.prepare(&setup(), false).unwrap();
        session.run_until_finished().unwrap();
        assert!(session.start().is_err());
        session.prepare(&setup(), false).unwrap();
        assert_eq!(session.state(), ClockState::Ready);
        assert!(session.report().is_none());
    }

    #[test]
    fn test_prepare_preserves_field() {
        let mut session = session();
        let first = setup().with_terrain(TerrainKind::Mountain);
        session.prepare(&first, false).unwrap();
        let grid = session.battle().unwrap().grid().clone();

        let second = first.clone().with_seed(999);
        session.prepare(&second, true).unwrap();
        assert_eq!(session.battle().unwrap().grid(), &grid);
    }

    #[test]
    fn test_formation_only_when_ready() {
        let mut session = session();
        assert!(session.apply_formation(FormationPolicy::Assault).is_err());
        session.prepare(&setup(), false).unwrap();
        session.apply_formation(FormationPolicy::Assault).unwrap();
        session.start().unwrap();
        assert!(session.apply_formation(FormationPolicy::Defense).is_err());
    }

    #[test]
    fn test_snapshot_carries_clock_state() {
        let mut session = session();
        assert!(session.snapshot().is_none());
        session.prepare(&setup(), false).unwrap();
        assert_eq!(session.snapshot().unwrap().clock, ClockState::Ready);
    }
}
