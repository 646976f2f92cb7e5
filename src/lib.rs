//! gb - a dependency-aware build orchestrator for Go-style source trees
//!
//! This crate provides the library behind the `gb` binary: discovering
//! buildable units in a directory tree, linking their imports into a
//! dependency graph, and driving an incremental, optionally concurrent build
//! through a pluggable toolchain backend.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

pub use core::{RunConfig, Unit, UnitId, UnitRegistry};
pub use resolver::ResolveError;
pub use util::context::GlobalContext;
