//! Per-stage runtime metrics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

const RING_CAPACITY: usize = 100;

/// Bounded ring of the last `RING_CAPACITY` processing durations.
#[derive(Debug, Default)]
pub struct TimeRing {
    samples: Mutex<VecDeque<Duration>>,
}

impl TimeRing {
    pub fn push(&self, sample: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == RING_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.samples.lock().iter().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn average(&self) -> Duration {
        let len = self.len();
        if len == 0 {
            Duration::ZERO
        } else {
            self.total() / len as u32
        }
    }
}

/// Counters and timing samples for one stage, updated after every item.
#[derive(Debug, Default)]
pub struct StageMetrics {
    pub processed: AtomicU64,
    pub errors: AtomicU64,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<DateTime<Utc>>>,
    pub times: TimeRing,
}

impl StageMetrics {
    pub fn record_success(&self, duration: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.times.push(duration);
        *self.last_success.lock() = Some(Utc::now());
    }

    pub fn record_error(&self, duration: Duration) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.times.push(duration);
        *self.last_error.lock() = Some(Utc::now());
    }

    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.lock()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<DateTime<Utc>> {
        *self.last_error.lock()
    }

    #[must_use]
    pub fn average_time(&self) -> Duration {
        self.times.average()
    }
}
