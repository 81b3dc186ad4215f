//! graft library crate.
//!
//! The engine finds the declarations contributed to a scope, resolves binding
//! conflicts and replacement or exclusion directives, and describes the merged
//! declarations and generated subcomponents a writer must emit. The `graft`
//! binary drives it over JSON fixtures; everything it uses is exported here so
//! integration tests can exercise the engine directly.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod identity;
pub mod merge;
pub mod model;
pub mod round;
pub mod scan;
pub mod telemetry;

pub use engine::Engine;
pub use error::MergeError;
