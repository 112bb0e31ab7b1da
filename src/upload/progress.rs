//! Upload progress
//!
//! [`ProgressCounter`] is the only state shared between concurrent transfer
//! tasks. The increment and the callback run under one lock, so callbacks
//! see strictly increasing counts no matter how tasks interleave.

use parking_lot::Mutex;
use std::sync::Arc;

/// Snapshot passed to progress callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Chunks confirmed by the server so far
    pub confirmed: u32,
    /// Total chunks in the session
    pub total: u32,
}

impl UploadProgress {
    /// Whole-number percentage, rounded
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((u64::from(self.confirmed) * 100 + u64::from(self.total) / 2) / u64::from(self.total))
            as u32
    }
}

/// Callback invoked with upload progress.
///
/// Called while the counter lock is held; it must not call back into the
/// counter.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Confirmed-chunk counter for one upload operation
pub struct ProgressCounter {
    confirmed: Mutex<u32>,
    total: u32,
    callback: Option<ProgressCallback>,
}

impl ProgressCounter {
    /// Create a counter seeded with chunks confirmed before this run
    pub fn new(already_confirmed: u32, total: u32, callback: Option<ProgressCallback>) -> Self {
        Self {
            confirmed: Mutex::new(already_confirmed.min(total)),
            total,
            callback,
        }
    }

    pub fn snapshot(&self) -> UploadProgress {
        UploadProgress {
            confirmed: *self.confirmed.lock(),
            total: self.total,
        }
    }

    /// Report the current value without changing it
    pub fn report(&self) {
        let confirmed = self.confirmed.lock();
        self.notify(*confirmed);
    }

    /// Record one newly confirmed chunk
    pub fn increment(&self) -> UploadProgress {
        let mut confirmed = self.confirmed.lock();
        *confirmed = (*confirmed + 1).min(self.total);
        self.notify(*confirmed);
        UploadProgress {
            confirmed: *confirmed,
            total: self.total,
        }
    }

    /// Mark every chunk confirmed (after successful assembly)
    pub fn finish(&self) {
        let mut confirmed = self.confirmed.lock();
        *confirmed = self.total;
        self.notify(*confirmed);
    }

    fn notify(&self, confirmed: u32) {
        if let Some(callback) = &self.callback {
            callback(UploadProgress {
                confirmed,
                total: self.total,
            });
        }
    }
}
