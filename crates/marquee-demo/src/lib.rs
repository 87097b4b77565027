#![forbid(unsafe_code)]

//! Terminal host for the Marquee stage.
//!
//! Loads a [`StageConfig`](marquee_runtime::StageConfig), runs the stage in
//! real time, reads line commands from stdin, and prints view changes,
//! pipeline steps, and command replies to stdout. Logs go to stderr.

pub mod cli;
pub mod error;
pub mod input;
pub mod output;

pub use cli::{Cli, run, run_from_env};
pub use error::{DemoError, Result};
