//! # Clock interface

use std::{sync::Arc, time::Instant};

/// A monotonic nanosecond timestamp source.
///
/// Only differences between two timestamps are meaningful.
pub trait Clock {
    /// Current timestamp in nanoseconds.
    fn now_ns(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        // u64 nanoseconds covers several centuries of uptime
        self.epoch.elapsed().as_nanos() as u64
    }
}
