//! Device thread affinity.

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

/// Remembers the first thread that did device work and rejects any other.
#[derive(Debug, Default)]
pub struct DeviceThread {
    owner: OnceLock<ThreadId>,
    strict: bool,
}

impl DeviceThread {
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            owner: OnceLock::new(),
            strict,
        }
    }

    /// Claims the device thread on first use.
    ///
    /// # Panics
    ///
    /// When strict and called from a thread other than the claimed one.
    #[track_caller]
    pub fn assert_current(&self, operation: &str) {
        let current = thread::current().id();
        let owner = *self.owner.get_or_init(|| {
            log::debug!("Device thread claimed by {current:?} in {operation}");
            current
        });
        if self.strict && owner != current {
            log::error!("{operation} called from {current:?}, device thread is {owner:?}");
            panic!("{operation} must run on the device thread ({owner:?}), called from {current:?}");
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.get().copied()
    }
}
