//! The build backend interface.
//!
//! The scheduler decides *whether* a unit is built; a [`Backend`] decides
//! *how*. Keeping the two apart lets the scheduler be tested against a
//! recording backend that never spawns a process.

use anyhow::Result;
use serde::Serialize;

use crate::builder::testmain::TestSuite;
use crate::core::run_config::Modes;
use crate::core::unit::{Timestamp, Unit};

/// How a unit is built. Chosen once, during resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStrategy {
    /// Compile, assemble and link or pack with the toolchain directly
    #[default]
    Direct,
    /// Delegate to the unit's Makefile
    Makefile,
    /// Foreign-interop unit, built through `make` with interop flags
    Interop,
}

impl BackendStrategy {
    pub fn select(unit: &Unit, modes: &Modes) -> Self {
        if unit.has_makefile && (modes.makefiles || unit.must_use_makefile) {
            BackendStrategy::Makefile
        } else if unit.interop {
            BackendStrategy::Interop
        } else {
            BackendStrategy::Direct
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStrategy::Direct => "direct",
            BackendStrategy::Makefile => "makefile",
            BackendStrategy::Interop => "interop",
        }
    }
}

/// Something that can turn a unit into artifacts.
///
/// Implementations must be callable from several threads at once; the
/// scheduler guarantees that no two calls ever concern the same unit
/// concurrently.
pub trait Backend: Send + Sync {
    /// Build the unit's artifact at `unit.paths.build`. Returns the new
    /// artifact time.
    fn build(&self, unit: &Unit) -> Result<Timestamp>;

    /// Copy the built artifact to `unit.paths.install`.
    fn install(&self, unit: &Unit) -> Result<()>;

    /// Remove everything the backend produced for the unit.
    fn clean(&self, unit: &Unit) -> Result<()>;

    /// Build and run the unit's tests. An error means the tests failed.
    fn test(&self, unit: &Unit, suite: &TestSuite) -> Result<()>;

    /// Fetch and install a remote import. Returns the installed artifact time.
    fn fetch(&self, import: &str) -> Result<Timestamp>;
}
