use crate::bitrate::Bitrate;
use std::sync::atomic::{AtomicU64, Ordering};

/// The bandwidth cap shared between the data path and the control path.
///
/// Holds a single bits-per-second value where zero means unlimited. Reads and
/// writes are single atomic operations, so a reader racing a writer observes
/// either the old or the new limit, never a mix of both.
#[derive(Debug, Default)]
pub struct SharedLimit {
    bits_per_second: AtomicU64,
}

impl SharedLimit {
    pub fn new(initial: Bitrate) -> Self {
        Self {
            bits_per_second: AtomicU64::new(initial.bits_per_second()),
        }
    }

    pub fn get(&self) -> Bitrate {
        Bitrate::from_validated(self.bits_per_second.load(Ordering::Acquire))
    }

    pub fn set(&self, limit: Bitrate) {
        self.bits_per_second
            .store(limit.bits_per_second(), Ordering::Release);
    }

    /// Stores `limit` and returns the limit it replaced.
    pub fn replace(&self, limit: Bitrate) -> Bitrate {
        let previous = self
            .bits_per_second
            .swap(limit.bits_per_second(), Ordering::AcqRel);
        Bitrate::from_validated(previous)
    }

    pub fn is_unlimited(&self) -> bool {
        self.get().is_zero()
    }
}
