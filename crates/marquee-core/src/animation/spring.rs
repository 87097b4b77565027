#![forbid(unsafe_code)]

//! Damped harmonic oscillator (spring) animation.
//!
//! Drives a displayed value toward a target with physically based motion:
//!
//!   F = -stiffness × (position - target) - damping × velocity
//!
//! # Parameters
//!
//! - **stiffness** (k): restoring force strength. Higher responds faster.
//! - **damping** (c): velocity drag.
//!   - Underdamped (c < 2√k): overshoots the target, then settles
//!   - Critically damped (c = 2√k): fastest convergence without overshoot
//!   - Overdamped (c > 2√k): slow approach, no overshoot
//!
//! The metric display uses k = 80, c = 15 ([`SpringParams::DISPLAY`]), which
//! is underdamped: one visible overshoot, then a quick settle.
//!
//! # Retargeting
//!
//! [`Spring::retarget`] changes only the target. Position and velocity carry
//! over, so switching targets mid-flight bends the current trajectory rather
//! than restarting it.
//!
//! # Integration
//!
//! Semi-implicit Euler. [`Spring::advance`] subdivides `dt` into steps of at
//! most 4ms, so a stalled frame followed by a large delta still integrates
//! stably. Integration stops as soon as the spring comes to rest, and a
//! single delta never integrates more than [`MAX_ADVANCE`].
//!
//! # Invariants
//!
//! 1. Stiffness is at least [`MIN_STIFFNESS`]; damping is non-negative.
//! 2. A spring at rest stays put until `retarget` or `reset`.
//! 3. On coming to rest, position snaps exactly to the target and velocity
//!    to zero.
//! 4. `Animation::value()` is the position clamped to `[0.0, 1.0]`; use
//!    [`Spring::position`] for the raw value.

use std::time::Duration;

use super::Animation;
use crate::error::{ConfigError, Result};

/// Maximum integration step in seconds.
const MAX_STEP_SECS: f64 = 0.004;

/// Longest span one [`Spring::advance`] call integrates.
pub const MAX_ADVANCE: Duration = Duration::from_secs(10);

/// Position delta below which the spring may come to rest.
const DEFAULT_REST_THRESHOLD: f64 = 0.001;

/// Speed below which (together with the position delta) the spring rests.
const DEFAULT_VELOCITY_THRESHOLD: f64 = 0.01;

/// Lower bound applied to stiffness.
pub const MIN_STIFFNESS: f64 = 0.1;

/// Stiffness and damping pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
}

impl SpringParams {
    /// Tuning used by the metric display bar.
    pub const DISPLAY: Self = Self {
        stiffness: 80.0,
        damping: 15.0,
    };

    /// Critically damped parameters for stiffness `k`.
    #[must_use]
    pub fn critical(k: f64) -> Self {
        let k = k.max(MIN_STIFFNESS);
        Self {
            stiffness: k,
            damping: 2.0 * k.sqrt(),
        }
    }

    /// Reject non-finite or negative values and stiffness below the floor.
    pub fn validate(&self) -> Result<()> {
        if !self.stiffness.is_finite() || self.stiffness < MIN_STIFFNESS {
            return Err(ConfigError::InvalidSpring {
                name: "stiffness",
                value: self.stiffness,
            });
        }
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(ConfigError::InvalidSpring {
                name: "damping",
                value: self.damping,
            });
        }
        Ok(())
    }

    /// Whether these parameters overshoot before settling.
    #[must_use]
    pub fn is_underdamped(&self) -> bool {
        self.damping < 2.0 * self.stiffness.sqrt()
    }
}

impl Default for SpringParams {
    fn default() -> Self {
        Self::DISPLAY
    }
}

/// A damped spring moving a scalar toward a target.
///
/// ```
/// use std::time::Duration;
/// use marquee_core::animation::{Spring, SpringParams};
///
/// let mut spring = Spring::new(0.0, 90.0).with_params(SpringParams::DISPLAY);
/// for _ in 0..600 {
///     spring.advance(Duration::from_millis(16));
/// }
/// assert!(spring.is_at_rest());
/// assert_eq!(spring.position(), 90.0);
/// ```
#[derive(Debug, Clone)]
pub struct Spring {
    position: f64,
    velocity: f64,
    target: f64,
    initial: f64,
    stiffness: f64,
    damping: f64,
    rest_threshold: f64,
    velocity_threshold: f64,
    at_rest: bool,
}

impl Spring {
    /// Spring starting at `initial`, heading for `target`, with
    /// [`SpringParams::DISPLAY`] tuning.
    #[must_use]
    pub fn new(initial: f64, target: f64) -> Self {
        let params = SpringParams::DISPLAY;
        Self {
            position: initial,
            velocity: 0.0,
            target,
            initial,
            stiffness: params.stiffness,
            damping: params.damping,
            rest_threshold: DEFAULT_REST_THRESHOLD,
            velocity_threshold: DEFAULT_VELOCITY_THRESHOLD,
            at_rest: false,
        }
    }

    #[must_use]
    pub fn with_params(self, params: SpringParams) -> Self {
        self.with_stiffness(params.stiffness)
            .with_damping(params.damping)
    }

    /// Set stiffness, clamped to [`MIN_STIFFNESS`].
    #[must_use]
    pub fn with_stiffness(mut self, k: f64) -> Self {
        self.stiffness = k.max(MIN_STIFFNESS);
        self
    }

    /// Set damping, clamped to zero.
    #[must_use]
    pub fn with_damping(mut self, c: f64) -> Self {
        self.damping = c.max(0.0);
        self
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> SpringParams {
        SpringParams {
            stiffness: self.stiffness,
            damping: self.damping,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Point the spring at a new target, keeping position and velocity.
    ///
    /// Returns `true` if the target moved. A target within the rest threshold
    /// of the current one is ignored, so a resting spring stays at rest.
    pub fn retarget(&mut self, target: f64) -> bool {
        if (self.target - target).abs() <= self.rest_threshold {
            return false;
        }
        self.target = target;
        self.at_rest = false;
        true
    }

    fn step(&mut self, dt: f64) {
        let displacement = self.position - self.target;
        let acceleration = -self.stiffness * displacement - self.damping * self.velocity;

        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    fn settle_if_resting(&mut self) -> bool {
        if (self.position - self.target).abs() < self.rest_threshold
            && self.velocity.abs() < self.velocity_threshold
        {
            self.position = self.target;
            self.velocity = 0.0;
            self.at_rest = true;
        }
        self.at_rest
    }

    /// Advance by `dt` and return the new position.
    ///
    /// Deltas longer than [`MAX_ADVANCE`] are clamped to it.
    pub fn advance(&mut self, dt: Duration) -> f64 {
        if self.at_rest {
            return self.position;
        }

        let mut remaining = dt.min(MAX_ADVANCE).as_secs_f64();
        while remaining > 0.0 {
            let step_dt = remaining.min(MAX_STEP_SECS);
            self.step(step_dt);
            remaining -= step_dt;
            if self.settle_if_resting() {
                break;
            }
        }
        self.settle_if_resting();
        self.position
    }
}

impl Animation for Spring {
    fn tick(&mut self, dt: Duration) {
        self.advance(dt);
    }

    fn is_complete(&self) -> bool {
        self.at_rest
    }

    fn value(&self) -> f32 {
        (self.position as f32).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.position = self.initial;
        self.velocity = 0.0;
        self.at_rest = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn simulate(spring: &mut Spring, frames: usize) {
        for _ in 0..frames {
            spring.advance(FRAME);
        }
    }

    #[test]
    fn display_params_are_underdamped() {
        assert!(SpringParams::DISPLAY.is_underdamped());
        assert!(!SpringParams::critical(80.0).is_underdamped());
    }

    #[test]
    fn display_spring_reaches_target() {
        let mut spring = Spring::new(0.0, 90.0);
        simulate(&mut spring, 600);
        assert!(spring.is_at_rest());
        assert!((spring.position() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn display_spring_overshoots_once() {
        let mut spring = Spring::new(0.0, 90.0);
        let mut peak = 0.0_f64;
        for _ in 0..600 {
            peak = peak.max(spring.advance(FRAME));
        }
        assert!(peak > 90.0, "expected overshoot, peak {peak}");
        assert!(peak < 95.0, "overshoot too large, peak {peak}");
    }

    #[test]
    fn critical_params_do_not_overshoot() {
        let mut spring = Spring::new(0.0, 75.0).with_params(SpringParams::critical(80.0));
        for _ in 0..600 {
            let p = spring.advance(FRAME);
            assert!(p <= 75.0 + 0.05, "overshoot to {p}");
        }
    }

    #[test]
    fn retarget_keeps_position_and_velocity() {
        let mut spring = Spring::new(0.0, 90.0);
        simulate(&mut spring, 10);
        let (pos, vel) = (spring.position(), spring.velocity());

        assert!(spring.retarget(75.0));
        assert!((spring.position() - pos).abs() < f64::EPSILON);
        assert!((spring.velocity() - vel).abs() < f64::EPSILON);
        assert!((spring.target() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn retarget_same_value_is_ignored() {
        let mut spring = Spring::new(0.0, 1.0);
        simulate(&mut spring, 600);
        assert!(!spring.retarget(1.0));
        assert!(spring.is_at_rest());
    }

    #[test]
    fn retarget_wakes_resting_spring() {
        let mut spring = Spring::new(0.0, 1.0);
        simulate(&mut spring, 600);
        assert!(spring.retarget(2.0));
        assert!(!spring.is_at_rest());
    }

    #[test]
    fn large_dt_is_subdivided() {
        let mut spring = Spring::new(0.0, 85.0);
        spring.advance(Duration::from_secs(10));
        assert!(
            (spring.position() - 85.0).abs() < 0.01,
            "position: {}",
            spring.position()
        );
    }

    #[test]
    fn zero_dt_is_noop() {
        let mut spring = Spring::new(0.0, 1.0);
        spring.advance(Duration::ZERO);
        assert!(spring.position().abs() < f64::EPSILON);
    }

    #[test]
    fn resting_spring_ignores_ticks() {
        let mut spring = Spring::new(0.0, 1.0);
        simulate(&mut spring, 600);
        let pos = spring.position();
        spring.advance(Duration::from_secs(5));
        assert!((spring.position() - pos).abs() < f64::EPSILON);
    }

    #[test]
    fn huge_dt_returns_and_settles() {
        let mut spring = Spring::new(0.0, 85.0);
        spring.advance(Duration::MAX);
        assert!(spring.is_at_rest());
        assert_eq!(spring.position(), 85.0);
    }

    #[test]
    fn undamped_spring_with_huge_dt_still_returns() {
        let mut spring = Spring::new(0.0, 1.0).with_damping(0.0);
        let pos = spring.advance(Duration::MAX);
        assert!(pos.is_finite());
        assert!(!spring.is_at_rest());
    }

    #[test]
    fn degenerate_params_are_clamped() {
        let spring = Spring::new(0.0, 1.0).with_stiffness(-3.0).with_damping(-1.0);
        assert!(spring.params().stiffness >= MIN_STIFFNESS);
        assert!(spring.params().damping >= 0.0);
    }

    #[test]
    fn validate_rejects_bad_params() {
        let bad = SpringParams {
            stiffness: f64::NAN,
            damping: 15.0,
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidSpring { name: "stiffness", .. })
        ));
        let bad = SpringParams {
            stiffness: 80.0,
            damping: -1.0,
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidSpring { name: "damping", .. })
        ));
        assert!(SpringParams::DISPLAY.validate().is_ok());
    }

    #[test]
    fn animation_value_is_clamped() {
        let mut spring = Spring::new(0.0, 5.0);
        simulate(&mut spring, 600);
        assert!((spring.value() - 1.0).abs() < f32::EPSILON);
        spring.reset();
        assert!(spring.value().abs() < f32::EPSILON);
        assert!(!spring.is_complete());
    }

    #[test]
    fn deterministic_across_runs() {
        let run = || {
            let mut spring = Spring::new(0.0, 90.0);
            (0..50).map(|_| spring.advance(FRAME)).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
