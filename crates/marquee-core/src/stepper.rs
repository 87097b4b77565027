#![forbid(unsafe_code)]

//! Round-robin stage indicator.
//!
//! [`CyclicStepScheduler`] advances a [`StepIndex`] modulo the stage count on
//! a fixed period, forever. A [`PhaseMap`] turns the index into visual
//! emphasis for a pipeline diagram: which named phase is lit, which
//! connectors are lit, and which progress dot is current.
//!
//! # Invariants
//!
//! 1. The index is always in `[0, stage_count)`.
//! 2. Under normal ticking the sequence is `0, 1, …, N-1, 0, …` with no skips.
//! 3. Stopping keeps the index; the next start resumes from it.
//! 4. At most one recurring timer is armed at a time.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{ConfigError, Result};
use crate::timer::{Lifecycle, RunHandle, TimerHandle, TimerQueue};

/// Position of the indicator within the stage cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StepIndex(usize);

impl StepIndex {
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for StepIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for StepIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Period and stage count of a [`CyclicStepScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepConfig {
    pub period: Duration,
    pub stage_count: usize,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(2000),
            stage_count: 4,
        }
    }
}

impl StepConfig {
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_stage_count(mut self, count: usize) -> Self {
        self.stage_count = count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ConfigError::require_period(self.period, "step")?;
        if self.stage_count == 0 {
            return Err(ConfigError::ZeroStageCount);
        }
        Ok(())
    }
}

/// Perpetual stage stepper with caller-owned lifecycle.
#[derive(Debug)]
pub struct CyclicStepScheduler {
    config: StepConfig,
    timers: TimerQueue<()>,
    tick: Option<TimerHandle>,
    lifecycle: Lifecycle,
    index: StepIndex,
}

impl CyclicStepScheduler {
    pub fn new(config: StepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            timers: TimerQueue::new(),
            tick: None,
            lifecycle: Lifecycle::default(),
            index: StepIndex::default(),
        })
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> StepIndex {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.config.stage_count
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Arm the stepping timer. A running scheduler is re-armed, not doubled.
    pub fn start(&mut self) -> RunHandle {
        if let Some(tick) = self.tick.take() {
            self.timers.cancel(tick);
        }
        let run = self.lifecycle.begin();
        // Validated at construction, so the period is non-zero.
        self.tick = self.timers.every(self.config.period, ()).ok();
        debug!(generation = run.generation(), index = %self.index, "stepper started");
        run
    }

    /// Cancel the stepping timer. The index is kept.
    pub fn stop(&mut self, run: RunHandle) -> bool {
        let generation = run.generation();
        if !self.lifecycle.end(run) {
            warn!(generation, "stepper stop ignored: run not active");
            return false;
        }
        if let Some(tick) = self.tick.take() {
            self.timers.cancel(tick);
        }
        debug!(generation, index = %self.index, "stepper stopped");
        true
    }

    /// Advance simulated time. Returns the new index if it changed.
    ///
    /// Every elapsed period advances the index once, however large `dt` is.
    pub fn tick(&mut self, dt: Duration) -> Option<StepIndex> {
        let before = self.index;
        let deadline = self.timers.now().saturating_add(dt);
        if let Some(tick) = &self.tick {
            let steps = self.timers.skip_elapsed(tick, deadline);
            if steps > 0 {
                let count = self.config.stage_count;
                let offset = usize::try_from(steps % count as u128).unwrap_or(0);
                self.index = StepIndex((self.index.0 + offset) % count);
                trace!(steps, index = %self.index, "stepper advanced");
            }
        }
        self.timers.settle(deadline);
        (self.index != before).then_some(self.index)
    }
}

/// A named phase of the pipeline, lit while the index is in `steps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub steps: RangeInclusive<usize>,
}

impl Phase {
    pub fn new(name: impl Into<String>, steps: RangeInclusive<usize>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// Emphasis of one phase for a given index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState<'a> {
    pub name: &'a str,
    pub active: bool,
}

/// Maps a [`StepIndex`] to pipeline emphasis.
///
/// Phases are listed in pipeline order. The connector in front of each phase
/// after the first lights up once the index reaches that phase's first step,
/// and stays lit for the rest of the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseMap {
    phases: Vec<Phase>,
    stage_count: usize,
    scanning_step: Option<usize>,
}

impl PhaseMap {
    pub fn new(phases: Vec<Phase>, stage_count: usize) -> Result<Self> {
        if stage_count == 0 {
            return Err(ConfigError::ZeroStageCount);
        }
        for phase in &phases {
            let (start, end) = (*phase.steps.start(), *phase.steps.end());
            if start > end || end >= stage_count {
                return Err(ConfigError::PhaseOutOfRange {
                    name: phase.name.clone(),
                    start,
                    end,
                    stage_count,
                });
            }
        }
        Ok(Self {
            phases,
            stage_count,
            scanning_step: None,
        })
    }

    /// Step on which the scanning effect plays (the first build step in the
    /// default map). Ignored if outside the stage range.
    #[must_use]
    pub fn with_scanning_step(mut self, step: usize) -> Self {
        self.scanning_step = (step < self.stage_count).then_some(step);
        self
    }

    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Whether the phase called `name` is lit at `index`. Unknown names are
    /// never active.
    #[must_use]
    pub fn is_phase_active(&self, name: &str, index: StepIndex) -> bool {
        self.phases
            .iter()
            .any(|p| p.name == name && p.steps.contains(&index.get()))
    }

    /// Every phase with its emphasis, in pipeline order.
    #[must_use]
    pub fn states(&self, index: StepIndex) -> Vec<PhaseState<'_>> {
        self.phases
            .iter()
            .map(|p| PhaseState {
                name: &p.name,
                active: p.steps.contains(&index.get()),
            })
            .collect()
    }

    /// Lit state of the connectors between consecutive phases.
    #[must_use]
    pub fn connectors(&self, index: StepIndex) -> Vec<bool> {
        self.phases
            .iter()
            .skip(1)
            .map(|p| index.get() >= *p.steps.start())
            .collect()
    }

    #[must_use]
    pub fn is_scanning(&self, index: StepIndex) -> bool {
        self.scanning_step == Some(index.get())
    }

    /// One entry per stage; only the current stage is `true`.
    #[must_use]
    pub fn dots(&self, index: StepIndex) -> Vec<bool> {
        (0..self.stage_count).map(|i| i == index.get()).collect()
    }
}

impl Default for PhaseMap {
    /// Analysis on step 0, Build on steps 1 and 2 (scanning on 1), Deploy on 3.
    fn default() -> Self {
        Self {
            phases: vec![
                Phase::new("Analysis", 0..=0),
                Phase::new("Build", 1..=2),
                Phase::new("Deploy", 3..=3),
            ],
            stage_count: 4,
            scanning_step: Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(2000);

    fn stepper() -> CyclicStepScheduler {
        CyclicStepScheduler::new(StepConfig::default()).unwrap()
    }

    #[test]
    fn does_not_advance_until_started() {
        let mut s = stepper();
        assert_eq!(s.tick(PERIOD * 10), None);
        assert_eq!(s.index(), StepIndex::new(0));
    }

    #[test]
    fn advances_once_per_period_and_wraps() {
        let mut s = stepper();
        let _run = s.start();
        let seen: Vec<usize> = (0..9)
            .map(|_| s.tick(PERIOD).map(StepIndex::get).unwrap_or(usize::MAX))
            .collect();
        assert_eq!(seen, vec![1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn partial_period_reports_no_change() {
        let mut s = stepper();
        let _run = s.start();
        assert_eq!(s.tick(Duration::from_millis(1999)), None);
        assert_eq!(s.tick(Duration::from_millis(1)), Some(StepIndex::new(1)));
    }

    #[test]
    fn stop_keeps_index_and_halts() {
        let mut s = stepper();
        let run = s.start();
        s.tick(PERIOD * 2);
        assert!(s.stop(run));
        assert!(!s.is_running());
        assert_eq!(s.tick(PERIOD * 5), None);
        assert_eq!(s.index(), StepIndex::new(2));

        let _run = s.start();
        assert_eq!(s.tick(PERIOD), Some(StepIndex::new(3)));
    }

    #[test]
    fn double_start_does_not_double_speed() {
        let mut s = stepper();
        let stale = s.start();
        let run = s.start();
        assert_eq!(s.tick(PERIOD), Some(StepIndex::new(1)));
        assert_eq!(s.timers.len(), 1);
        assert!(!s.stop(stale));
        assert!(s.stop(run));
        assert!(s.timers.is_empty());
    }

    #[test]
    fn full_cycle_in_one_tick_returns_none() {
        let mut s = stepper();
        let _run = s.start();
        assert_eq!(s.tick(PERIOD * 4), None);
        assert_eq!(s.index(), StepIndex::new(0));
    }

    #[test]
    fn many_cycles_in_one_tick_keep_phase() {
        let mut s = stepper();
        let _run = s.start();
        assert_eq!(
            s.tick(PERIOD * 4_000_000 + PERIOD),
            Some(StepIndex::new(1))
        );
        assert_eq!(s.tick(PERIOD), Some(StepIndex::new(2)));
    }

    #[test]
    fn max_dt_on_idle_stepper_is_noop() {
        let mut s = stepper();
        assert_eq!(s.tick(Duration::MAX), None);
        assert_eq!(s.tick(Duration::MAX), None);
        assert_eq!(s.index(), StepIndex::new(0));
    }

    #[test]
    fn max_dt_on_running_stepper_returns() {
        let mut s = stepper();
        let run = s.start();
        s.tick(PERIOD);
        s.tick(Duration::MAX);
        assert!(s.index().get() < s.stage_count());
        assert_eq!(s.tick(PERIOD), None);
        assert!(s.stop(run));
    }

    #[test]
    fn invalid_config_rejected() {
        assert_eq!(
            CyclicStepScheduler::new(StepConfig::default().with_stage_count(0)).unwrap_err(),
            ConfigError::ZeroStageCount
        );
        assert!(matches!(
            CyclicStepScheduler::new(StepConfig::default().with_period(Duration::ZERO)),
            Err(ConfigError::ZeroPeriod { .. })
        ));
    }

    #[test]
    fn default_phase_map_emphasis() {
        let map = PhaseMap::default();
        let at = StepIndex::new;

        assert!(map.is_phase_active("Analysis", at(0)));
        assert!(!map.is_phase_active("Build", at(0)));
        assert!(map.is_phase_active("Build", at(1)));
        assert!(map.is_phase_active("Build", at(2)));
        assert!(map.is_phase_active("Deploy", at(3)));
        assert!(!map.is_phase_active("Nope", at(3)));

        assert!(map.is_scanning(at(1)));
        assert!(!map.is_scanning(at(2)));

        assert_eq!(map.connectors(at(0)), vec![false, false]);
        assert_eq!(map.connectors(at(2)), vec![true, false]);
        assert_eq!(map.connectors(at(3)), vec![true, true]);
        assert_eq!(map.dots(at(2)), vec![false, false, true, false]);
    }

    #[test]
    fn states_list_phases_in_order() {
        let map = PhaseMap::default();
        let states = map.states(StepIndex::new(2));
        let names: Vec<_> = states.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Analysis", "Build", "Deploy"]);
        let active: Vec<_> = states.iter().map(|s| s.active).collect();
        assert_eq!(active, vec![false, true, false]);
    }

    #[test]
    fn phase_map_rejects_out_of_range() {
        let err = PhaseMap::new(vec![Phase::new("Late", 2..=4)], 4).unwrap_err();
        assert!(matches!(err, ConfigError::PhaseOutOfRange { end: 4, .. }));
        assert!(PhaseMap::new(vec![], 0).is_err());
    }

    #[test]
    fn scanning_step_outside_range_is_dropped() {
        let map = PhaseMap::new(vec![Phase::new("Only", 0..=1)], 2)
            .unwrap()
            .with_scanning_step(5);
        assert!(!map.is_scanning(StepIndex::new(1)));
    }
}
