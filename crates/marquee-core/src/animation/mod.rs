#![forbid(unsafe_code)]

//! Time-driven animation primitives.
//!
//! Everything here is advanced explicitly with a frame delta, so the same
//! math runs under a fixed-tick loop, an animation-frame callback, or a test
//! that feeds synthetic durations.

pub mod spring;

use std::time::Duration;

pub use spring::{Spring, SpringParams};

/// A value that evolves over time.
pub trait Animation {
    /// Advance by `dt`.
    fn tick(&mut self, dt: Duration);

    /// Whether the animation has come to rest.
    fn is_complete(&self) -> bool;

    /// Normalized output in `[0.0, 1.0]`, suitable for sizing a visual node.
    fn value(&self) -> f32;

    /// Return to the starting state.
    fn reset(&mut self);
}
