//! Surface Lifecycle
//!
//! Two-state machine driven by the windowing layer. Losing the surface
//! invalidates every device object at once; when it comes back the tracked
//! resources are rebuilt in two passes so that no deletion for an old handle
//! can run after the new allocation it would collide with.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::GraphicsContext;
use crate::errors::LifecycleError;
use crate::recycler::RecycleQueue;
use crate::resource::Resource;
use crate::tracker::ExpirationTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceState {
    #[default]
    SurfaceAbsent,
    SurfaceReady,
}

impl SurfaceState {
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::SurfaceReady
    }
}

impl fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SurfaceAbsent => "absent",
            Self::SurfaceReady => "ready",
        })
    }
}

/// Counters reported by one recovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Deletions that were already queued when the surface came back.
    pub flushed: usize,
    /// Expired tracker entries dropped before rebuilding.
    pub expired: usize,
    /// Live tracked resources whose old handle was released.
    pub recycled: usize,
    /// Tracked resources prepared again.
    pub prepared: usize,
    /// Preparation requests that were queued while the surface was absent.
    pub requests: usize,
}

/// A tracked resource that could not be rebuilt.
pub(crate) struct RecoveryFailure {
    pub resource: Arc<dyn Resource>,
    pub error: LifecycleError,
}

/// Rebuilds every live tracked resource.
///
/// 1. executes the deletions already queued,
/// 2. prunes expired entries,
/// 3. recycles each live entry and executes its deletion right away,
/// 4. prepares each entry that is now absent.
///
/// The tracker is locked only to take the live set, not while the device
/// works. The first failing `prepare` aborts the run.
pub(crate) fn recover(
    ctx: &mut GraphicsContext,
    tracker: &Mutex<ExpirationTracker>,
    recycler: &RecycleQueue,
) -> Result<RecoveryReport, RecoveryFailure> {
    let flushed = recycler.drain(ctx);
    let (expired, live) = {
        let mut tracker = tracker.lock();
        (tracker.sweep_expired(), tracker.live())
    };
    let mut report = RecoveryReport {
        flushed,
        expired,
        ..RecoveryReport::default()
    };

    for resource in &live {
        let task = resource.recycle();
        if !task.is_noop() {
            report.recycled += 1;
        }
        task.execute(ctx);
    }

    for resource in live {
        if resource.id().is_present() {
            continue;
        }
        if let Err(error) = resource.prepare(ctx) {
            return Err(RecoveryFailure { resource, error });
        }
        report.prepared += 1;
    }

    Ok(report)
}
