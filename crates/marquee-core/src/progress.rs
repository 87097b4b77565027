#![forbid(unsafe_code)]

//! Simulated loading progress that gates the first paint.
//!
//! A [`ProgressSimulator`] manufactures a bounded, monotonic, randomized
//! progress signal and raises a single completion callback once it has
//! reached 100 and the overlay has had time to settle and fade out.
//!
//! # Timeline
//!
//! ```text
//! start ──tick──tick── … ──tick(value = 100)──settle──exit──on_complete
//!        |<- tick_period ->|                 |<-500->|<-600->|
//!   Loading                       Settling    Exiting   Finished
//! ```
//!
//! # Invariants
//!
//! 1. `value()` is non-decreasing within a run and never exceeds 100.
//! 2. The recurring tick is cancelled on the same tick that reaches 100.
//! 3. `on_complete` fires at most once per run, and only after the value
//!    reached 100 and both delays elapsed.
//! 4. After [`ProgressSimulator::stop`] no timer of that run fires and its
//!    callback is dropped without being called.
//! 5. Starting a new run cancels the previous one (same as stopping it).

use std::fmt;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::error::{ConfigError, Result};
use crate::timer::{Lifecycle, RunHandle, TimerHandle, TimerQueue};

/// Upper bound of the progress value.
pub const MAX_PROGRESS: f64 = 100.0;

/// Timings and increment bound for a [`ProgressSimulator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressConfig {
    /// Period of the recurring progress tick.
    pub tick_period: Duration,
    /// Exclusive upper bound of the uniform per-tick increment.
    pub max_increment: f64,
    /// Pause between reaching 100 and starting the exit.
    pub settle_delay: Duration,
    /// Length of the exit (overlay fade) before `on_complete` fires.
    pub exit_delay: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(150),
            max_increment: 15.0,
            settle_delay: Duration::from_millis(500),
            exit_delay: Duration::from_millis(600),
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub fn with_max_increment(mut self, max: f64) -> Self {
        self.max_increment = max;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_exit_delay(mut self, delay: Duration) -> Self {
        self.exit_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ConfigError::require_period(self.tick_period, "progress tick")?;
        if !self.max_increment.is_finite() || self.max_increment <= 0.0 {
            return Err(ConfigError::InvalidIncrement {
                value: self.max_increment,
            });
        }
        Ok(())
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Never started.
    Idle,
    /// Ticking toward 100.
    Loading,
    /// Reached 100, waiting out the settle delay.
    Settling,
    /// Overlay fading out, completion pending.
    Exiting,
    /// Completion callback has fired.
    Finished,
    /// Torn down before finishing.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressEvent {
    Tick,
    Settled,
    Exited,
}

type CompletionFn = Box<dyn FnOnce()>;

/// Randomized, monotonic progress with a single completion signal.
pub struct ProgressSimulator {
    config: ProgressConfig,
    rng: SmallRng,
    timers: TimerQueue<ProgressEvent>,
    tick: Option<TimerHandle>,
    lifecycle: Lifecycle,
    phase: ProgressPhase,
    value: f64,
    on_complete: Option<CompletionFn>,
}

impl fmt::Debug for ProgressSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSimulator")
            .field("phase", &self.phase)
            .field("value", &self.value)
            .field("pending_timers", &self.timers.len())
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

impl ProgressSimulator {
    /// Simulator with an OS-seeded increment source.
    pub fn new(config: ProgressConfig) -> Result<Self> {
        Self::with_rng(config, SmallRng::from_os_rng())
    }

    /// Simulator with a fixed seed, for reproducible runs.
    pub fn with_seed(config: ProgressConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: ProgressConfig, rng: SmallRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            timers: TimerQueue::new(),
            tick: None,
            lifecycle: Lifecycle::default(),
            phase: ProgressPhase::Idle,
            value: 0.0,
            on_complete: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    /// Current progress in `[0, 100]`.
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Whole percent for display (floor of the value).
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.value.floor().clamp(0.0, MAX_PROGRESS) as u8
    }

    /// True once the value has reached 100 in the current run.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(
            self.phase,
            ProgressPhase::Settling | ProgressPhase::Exiting | ProgressPhase::Finished
        )
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    /// Whether the loading overlay should still be mounted at full opacity.
    #[must_use]
    pub fn is_overlay_visible(&self) -> bool {
        matches!(
            self.phase,
            ProgressPhase::Idle | ProgressPhase::Loading | ProgressPhase::Settling
        )
    }

    /// Begin a run. `on_complete` fires at most once, after the value reaches
    /// 100 and the settle and exit delays elapse.
    pub fn start(&mut self, on_complete: impl FnOnce() + 'static) -> RunHandle {
        if self.lifecycle.is_active() {
            warn!(
                generation = self.lifecycle.generation(),
                "progress restarted while running; previous run cancelled"
            );
            self.cancel_pending();
        }

        let run = self.lifecycle.begin();
        self.value = 0.0;
        self.phase = ProgressPhase::Loading;
        self.on_complete = Some(Box::new(on_complete));
        // Validated at construction, so the period is non-zero.
        self.tick = self
            .timers
            .every(self.config.tick_period, ProgressEvent::Tick)
            .ok();
        debug!(generation = run.generation(), "progress started");
        run
    }

    /// Tear down a run: cancel its timers and drop its callback unfired.
    ///
    /// Returns `false` for a stale handle or a run that already finished.
    pub fn stop(&mut self, run: RunHandle) -> bool {
        let generation = run.generation();
        if !self.lifecycle.end(run) {
            warn!(generation, "progress stop ignored: run not active");
            return false;
        }
        let cancelled = self.cancel_pending();
        self.phase = ProgressPhase::Stopped;
        debug!(generation, cancelled, "progress stopped");
        true
    }

    /// Advance simulated time by `dt`, firing due timers in order.
    ///
    /// The clock saturates, so `Duration::MAX` runs a started simulation to
    /// completion.
    pub fn tick(&mut self, dt: Duration) {
        let deadline = self.timers.now().saturating_add(dt);
        while let Some(fired) = self.timers.poll(deadline) {
            self.on_timer(fired.event);
        }
        self.timers.settle(deadline);
    }

    fn on_timer(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Tick => self.on_tick(),
            ProgressEvent::Settled => {
                self.phase = ProgressPhase::Exiting;
                debug!("progress settled, exiting");
                let _exit = self
                    .timers
                    .after(self.config.exit_delay, ProgressEvent::Exited);
            }
            ProgressEvent::Exited => {
                self.phase = ProgressPhase::Finished;
                self.lifecycle.finish();
                if let Some(callback) = self.on_complete.take() {
                    info!(generation = self.lifecycle.generation(), "progress complete");
                    callback();
                }
            }
        }
    }

    fn on_tick(&mut self) {
        let increment = self.rng.random_range(0.0..self.config.max_increment);
        self.value = (self.value + increment).min(MAX_PROGRESS);
        trace!(value = self.value, increment, "progress tick");

        if self.value >= MAX_PROGRESS {
            if let Some(tick) = self.tick.take() {
                self.timers.cancel(tick);
            }
            self.phase = ProgressPhase::Settling;
            debug!("progress reached 100");
            let _settle = self
                .timers
                .after(self.config.settle_delay, ProgressEvent::Settled);
        }
    }

    fn cancel_pending(&mut self) -> usize {
        self.tick = None;
        self.on_complete = None;
        self.timers.cancel_all()
    }
}
