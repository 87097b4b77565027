// Forbid unsafe in production; deny in tests.
#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, deny(unsafe_code))]

//! Core: deterministic presentation state engines.
//!
//! # Role in Marquee
//! `marquee-core` decides *when* and *in what state* a page's animated
//! widgets render. It owns no threads and reads no clock: every engine moves
//! forward only when its host calls `tick(dt)` / `advance(dt)`, which keeps
//! the logic testable with synthetic time.
//!
//! # Primary responsibilities
//! - **[`ProgressSimulator`]**: bounded, monotonic, randomized loading
//!   progress with a single completion callback.
//! - **[`CyclicStepScheduler`]**: perpetual round-robin stage indicator, with
//!   [`PhaseMap`] for pipeline emphasis.
//! - **[`ToggleSelectionModel`]**: multi-select panel that diverts
//!   side-effect items to a modal.
//! - **[`CategoricalValueInterpolator`]**: spring-animated metric that
//!   retargets smoothly on category change.
//! - **[`timer::TimerQueue`]**: per-engine virtual-clock timers with owned
//!   handles, so a timer cannot outlive its engine.
//!
//! # How it fits in the system
//! `marquee-runtime` supplies wall-clock deltas and wires the engines into a
//! stage host; the engines themselves never depend on it.

pub mod animation;
pub mod error;
pub mod interpolator;
pub mod progress;
pub mod selection;
pub mod stepper;
pub mod timer;

pub use animation::{Animation, Spring, SpringParams};
pub use error::{ConfigError, Result};
pub use interpolator::{CategoricalValueInterpolator, CategoryEntry, CategoryTable};
pub use progress::{ProgressConfig, ProgressPhase, ProgressSimulator};
pub use selection::{Catalog, CatalogEntry, ToggleOutcome, ToggleSelectionModel};
pub use stepper::{CyclicStepScheduler, Phase, PhaseMap, PhaseState, StepConfig, StepIndex};
pub use timer::RunHandle;
