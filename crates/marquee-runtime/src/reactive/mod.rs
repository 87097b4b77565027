//! Change-notifying values the stage publishes to its render surface.

pub mod observable;

pub use observable::{Observable, Watch};
