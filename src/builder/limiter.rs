//! Global limit on concurrently running backend invocations.

use parking_lot::{Condvar, Mutex};

/// A counting semaphore for backend invocations.
///
/// Every build, install, clean, test or fetch holds a [`JobToken`] while the
/// backend runs. Tokens are released on drop, so an early return or a panic
/// in the backend cannot leak capacity.
#[derive(Debug)]
pub struct JobLimiter {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

impl JobLimiter {
    /// A limiter with room for `capacity` jobs (at least one).
    pub fn new(capacity: usize) -> Self {
        JobLimiter {
            capacity: capacity.max(1),
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> JobToken<'_> {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.capacity {
            self.released.wait(&mut in_use);
        }
        *in_use += 1;
        JobToken { limiter: self }
    }

    /// Number of slots currently taken.
    pub fn in_use(&self) -> usize {
        *self.in_use.lock()
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock();
        *in_use -= 1;
        self.released.notify_one();
    }
}

/// A held slot. Dropping it frees the slot.
#[must_use]
#[derive(Debug)]
pub struct JobToken<'a> {
    limiter: &'a JobLimiter,
}

impl Drop for JobToken<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
