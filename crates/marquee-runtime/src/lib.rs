#![forbid(unsafe_code)]

//! Marquee Runtime
//!
//! Drives the `marquee-core` engines from real time and wires them into a
//! single page-like host.
//!
//! # Key Components
//!
//! - [`Stage`] - One instance of each engine plus the current [`View`]
//! - [`StageLoop`] - Wall-clock loop feeding frames and commands to a stage
//! - [`StageConfig`] - TOML/JSON configuration for every engine
//! - [`Subscription`] - Trait for background message sources
//! - [`Every`] - Built-in frame clock
//! - [`Observable`] - Change-notifying values published by the stage
//! - [`CancellationToken`] - Cooperative shutdown
//!
//! # How it fits in the system
//! The engines in `marquee-core` never read a clock; this crate is the only
//! place that does. A render surface (the `marquee-demo` binary, a test
//! harness) owns a [`Stage`], watches its observables, and hands it to a
//! [`StageLoop`].

pub mod cancellation;
pub mod config;
pub mod reactive;
pub mod stage;
pub mod stage_loop;
pub mod subscription;

pub use cancellation::{CancelReason, CancellationSource, CancellationToken};
pub use config::{ConfigLoadError, StageConfig};
pub use reactive::{Observable, Watch};
pub use stage::{Command, CommandError, Reply, Stage, StageMsg, StageStatus, View};
pub use stage_loop::{LoopExit, StageLoop};
pub use subscription::{Every, Script, StopSignal, SubId, Subscription, SubscriptionManager};
