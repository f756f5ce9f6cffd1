// src/pipeline/semaphore.rs
//! Counting semaphore used for the stage-to-stage handoff.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Counts produced-but-unconsumed items.
///
/// The mutex is the happens-before edge between a stage that writes a slot and
/// calls [`release`](Self::release), and the stage that acquires and reads it.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Wait up to `timeout` for a permit. Returns `false` on timeout.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.available.wait_until(&mut permits, deadline).timed_out() && *permits == 0 {
                return false;
            }
        }
        *permits -= 1;
        true
    }

    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }
}
