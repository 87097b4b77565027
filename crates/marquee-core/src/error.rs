//! Configuration errors shared by every engine.
//!
//! Engine configuration is static and supplied by the host, so every variant
//! here is a programming mistake. Constructors return them so callers can
//! propagate with `?` at startup; nothing in the engines produces an error
//! once they are running.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("timer period must be non-zero ({what})")]
    ZeroPeriod { what: &'static str },

    #[error("max increment must be finite and positive, got {value}")]
    InvalidIncrement { value: f64 },

    #[error("stage count must be at least 1")]
    ZeroStageCount,

    #[error("phase {name:?} covers {start}..={end}, outside 0..{stage_count}")]
    PhaseOutOfRange {
        name: String,
        start: usize,
        end: usize,
        stage_count: usize,
    },

    #[error("catalog entry has an empty id")]
    EmptyId,

    #[error("duplicate catalog id: {id}")]
    DuplicateId { id: String },

    #[error("catalog entry {id} has a side effect but no payload")]
    MissingPayload { id: String },

    #[error("category table is empty")]
    EmptyTable,

    #[error("duplicate category key: {key}")]
    DuplicateCategory { key: String },

    #[error("category {key} target {value} is outside 0..=100")]
    TargetOutOfRange { key: String, value: f64 },

    #[error("unknown category: {key}")]
    UnknownCategory { key: String },

    #[error("invalid spring parameter {name} = {value}")]
    InvalidSpring { name: &'static str, value: f64 },
}

impl ConfigError {
    /// Reject a zero duration for the named timer.
    pub(crate) fn require_period(period: Duration, what: &'static str) -> Result<()> {
        if period.is_zero() {
            return Err(Self::ZeroPeriod { what });
        }
        Ok(())
    }
}
