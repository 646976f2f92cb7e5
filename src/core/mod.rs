//! Core data structures for gb.
//!
//! This module contains the foundational types used throughout gb:
//! - Source classification and header extraction
//! - Target naming and artifact paths
//! - Units and the registry that owns them
//! - Per-run configuration

pub mod error;
pub mod extract;
pub mod platform;
pub mod registry;
pub mod run_config;
pub mod source;
pub mod target;
pub mod unit;

pub use error::UnitError;
pub use platform::Platform;
pub use registry::UnitRegistry;
pub use run_config::{Modes, RunConfig, Selection};
pub use source::SourceSet;
pub use unit::{Failure, Timestamp, Unit, UnitId, UnitKind, UnitState};
