//! High-level operations.
//!
//! This module contains the implementation of gb commands.

pub mod gb_build;
pub mod gb_scan;

pub use gb_build::{prepare, run, BrokenUnit, PreparedTree, RunSummary};
pub use gb_scan::{print_scan, scan, ScanEntry, ScanOptions, ScanResult};
