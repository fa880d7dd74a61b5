//! Single-battle runner.
//!
//! Drives a [`BattleSession`] through its clock: ticks either fire back to
//! back (fast mode, the default) or the runner sleeps for the scheduled
//! interval between ticks so a viewer can follow along.

use std::thread;
use std::time::{Duration, Instant};

use broadside_core::battle::{BattleSnapshot, TickEvents};
use broadside_core::clock::{BattleSession, ClockState, TickScheduler};
use broadside_core::error::BattleError;
use broadside_core::report::BattleReport;
use thiserror::Error;
use tracing::{debug, info};

use crate::scenario::{Scenario, ScenarioError};

/// Error type for a single run.
#[derive(Error, Debug)]
pub enum RunError {
    /// Scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The battle clock rejected a request.
    #[error("Battle error: {0}")]
    Battle(#[from] BattleError),
}

/// Runner configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Sleep for the tick interval between ticks.
    pub realtime: bool,
    /// Speed multiplier override (1, 2 or 4).
    pub speed: Option<u8>,
}

impl RunConfig {
    /// Fast, unpaced run at the scenario's speed.
    pub fn fast() -> Self {
        Self::default()
    }

    /// Builder: pace ticks in real time.
    #[must_use]
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Builder: speed override.
    #[must_use]
    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// Scheduler for a single-threaded driver loop.
///
/// Remembers the armed interval; [`PacedScheduler::wait`] blocks for it when
/// pacing is on and returns immediately otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacedScheduler {
    interval: Option<Duration>,
    realtime: bool,
}

impl PacedScheduler {
    /// Create a scheduler; `realtime` turns on sleeping between ticks.
    pub fn new(realtime: bool) -> Self {
        Self {
            interval: None,
            realtime,
        }
    }

    /// Armed interval.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until the next tick is due.
    pub fn wait(&self) {
        if let (true, Some(interval)) = (self.realtime, self.interval) {
            thread::sleep(interval);
        }
    }
}

impl TickScheduler for PacedScheduler {
    fn schedule(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    fn cancel(&mut self) {
        self.interval = None;
    }
}

/// Run one battle to completion.
///
/// `on_tick` sees the events and the post-tick snapshot of every tick.
pub fn run_battle<F>(
    scenario: &Scenario,
    config: RunConfig,
    mut on_tick: F,
) -> Result<BattleReport, RunError>
where
    F: FnMut(&TickEvents, &BattleSnapshot),
{
    let mut session = BattleSession::new(
        PacedScheduler::new(config.realtime),
        scenario.rules(),
        scenario.troops()?,
    );
    session.prepare(&scenario.setup(), false)?;
    if let Some(speed) = config.speed {
        session.set_speed(speed)?;
    }

    let name = scenario.name.clone();
    session.on_complete(move |report| {
        info!(
            scenario = %name,
            outcome = ?report.outcome,
            ticks = report.ticks,
            "Battle complete"
        );
    });

    let wall_clock = Instant::now();
    session.start()?;
    while session.state() == ClockState::Running {
        session.scheduler().wait();
        let events = session.fire()?;
        if let Some(snapshot) = session.snapshot() {
            on_tick(&events, &snapshot);
        }
    }
    debug!(wall_ms = wall_clock.elapsed().as_millis(), "Run finished");

    session.report().cloned().ok_or(RunError::Battle(BattleError::InvalidTransition {
        from: session.state(),
        action: "report",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadside_core::report::BattleOutcome;
    use broadside_core::strategy::BattleSpeed;

    #[test]
    fn test_paced_scheduler_tracks_interval() {
        let mut scheduler = PacedScheduler::new(false);
        assert_eq!(scheduler.interval(), None);
        scheduler.schedule(Duration::from_millis(250));
        assert_eq!(scheduler.interval(), Some(Duration::from_millis(250)));
        scheduler.wait();
        scheduler.cancel();
        assert_eq!(scheduler.interval(), None);
    }

    #[test]
    fn test_fast_run_reaches_outcome() {
        let scenario = Scenario::skirmish().with_seed(42);
        let mut ticks = 0;
        let report = run_battle(&scenario, RunConfig::fast(), |events, snapshot| {
            ticks += 1;
            assert_eq!(events.tick, snapshot.tick);
        })
        .unwrap();

        assert_ne!(report.outcome, BattleOutcome::Pending);
        assert_eq!(report.ticks, ticks);
        assert!(report.ticks <= 60);
        assert_eq!(report.seed, 42);
    }

    #[test]
    fn test_speed_override_scales_elapsed_time() {
        let scenario = Scenario::skirmish().with_seed(3);
        let report = run_battle(&scenario, RunConfig::fast().with_speed(4), |_, _| {}).unwrap();
        assert_eq!(report.elapsed_ms, u64::from(report.ticks) * 2000);
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let scenario = Scenario::skirmish().with_seed(3);
        let result = run_battle(&scenario, RunConfig::fast().with_speed(3), |_, _| {});
        assert!(matches!(
            result,
            Err(RunError::Battle(BattleError::InvalidSpeed(3)))
        ));
    }

    #[test]
    fn test_scenario_speed_used_without_override() {
        let mut scenario = Scenario::skirmish().with_seed(5);
        scenario.strategy.speed = BattleSpeed::Fast;
        let report = run_battle(&scenario, RunConfig::fast(), |_, _| {}).unwrap();
        assert_eq!(report.elapsed_ms, u64::from(report.ticks) * 1000);
    }
}
