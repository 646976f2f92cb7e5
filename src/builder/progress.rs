//! Run counters shared across scheduler threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts of what a run actually did. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct RunProgress {
    built: Arc<AtomicUsize>,
    installed: Arc<AtomicUsize>,
    cleaned: Arc<AtomicUsize>,
    tested: Arc<AtomicUsize>,
    test_failures: Arc<AtomicUsize>,
    fetched: Arc<AtomicUsize>,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_built(&self) {
        self.built.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_installed(&self) {
        self.installed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_cleaned(&self) {
        self.cleaned.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a finished test run and whether it passed.
    pub fn record_tested(&self, passed: bool) {
        self.tested.fetch_add(1, Ordering::SeqCst);
        if !passed {
            self.test_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::SeqCst);
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn installed(&self) -> usize {
        self.installed.load(Ordering::SeqCst)
    }

    pub fn cleaned(&self) -> usize {
        self.cleaned.load(Ordering::SeqCst)
    }

    pub fn tested(&self) -> usize {
        self.tested.load(Ordering::SeqCst)
    }

    pub fn test_failures(&self) -> usize {
        self.test_failures.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    /// Whether the run changed anything on disk.
    pub fn did_work(&self) -> bool {
        self.built() + self.installed() + self.cleaned() + self.tested() + self.fetched() > 0
    }
}
