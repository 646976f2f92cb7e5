//! Build scheduling and the toolchain backend.
//!
//! The scheduler walks the unit graph and calls into a [`Backend`] for every
//! unit that is out of date; [`NativeBackend`] is the implementation that
//! drives the real compiler, linker and `make`.

pub mod backend;
pub mod limiter;
pub mod native;
pub mod plan;
pub mod progress;
pub mod scheduler;
pub mod testmain;
pub mod toolchain;

pub use backend::{Backend, BackendStrategy};
pub use limiter::JobLimiter;
pub use native::NativeBackend;
pub use plan::BuildPlan;
pub use progress::RunProgress;
pub use scheduler::Scheduler;
pub use testmain::TestSuite;
pub use toolchain::{CommandSpec, Toolchain};
