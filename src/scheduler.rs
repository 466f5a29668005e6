//! Preparation Scheduler
//!
//! Producers on any thread describe *what* should exist on the device with a
//! [`PreparationRequest`]; the device thread decides *when* by taking the
//! queued batch once per frame.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{LifecycleError, Result};
use crate::resource::Resource;

// ============================================================================
// Strategy
// ============================================================================

/// How and when a requested resource is prepared.
///
/// | Strategy                | Prepared on drain          | Tracked for surface recovery |
/// |-------------------------|----------------------------|------------------------------|
/// | `Once`                  | if absent                  | no                           |
/// | `OnceForce`             | always                     | no                           |
/// | `OnSurfaceReady`        | never                      | yes                          |
/// | `OnceAndOnSurfaceReady` | if absent                  | yes                          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Once,
    OnceForce,
    OnSurfaceReady,
    OnceAndOnSurfaceReady,
}

impl Strategy {
    /// Prepared at drain time when the resource is still absent.
    #[inline]
    #[must_use]
    pub const fn prepares_immediately(self) -> bool {
        matches!(self, Self::Once | Self::OnceAndOnSurfaceReady)
    }

    /// Prepared at drain time regardless of the current handle.
    #[inline]
    #[must_use]
    pub const fn forces(self) -> bool {
        matches!(self, Self::OnceForce)
    }

    /// Registered with the expiration tracker.
    #[inline]
    #[must_use]
    pub const fn tracks_surface(self) -> bool {
        matches!(self, Self::OnSurfaceReady | Self::OnceAndOnSurfaceReady)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Once => "once",
            Self::OnceForce => "once_force",
            Self::OnSurfaceReady => "on_surface_ready",
            Self::OnceAndOnSurfaceReady => "once_and_on_surface_ready",
        })
    }
}

impl FromStr for Strategy {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "once" => Ok(Self::Once),
            "once_force" | "reload" => Ok(Self::OnceForce),
            "on_surface_ready" => Ok(Self::OnSurfaceReady),
            "once_and_on_surface_ready" => Ok(Self::OnceAndOnSurfaceReady),
            _ => Err(LifecycleError::UnknownStrategy(s.to_string())),
        }
    }
}

// ============================================================================
// PreparationRequest
// ============================================================================

/// A queued preparation.
///
/// Holds the resource strongly until the request is drained.
#[derive(Clone)]
pub struct PreparationRequest {
    pub resource: Arc<dyn Resource>,
    pub strategy: Strategy,
}

impl fmt::Debug for PreparationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparationRequest")
            .field("kind", &self.resource.kind())
            .field("label", &self.resource.label())
            .field("strategy", &self.strategy)
            .finish()
    }
}

// ============================================================================
// PreparationScheduler
// ============================================================================

/// Non-blocking MPSC queue of [`PreparationRequest`]s.
pub struct PreparationScheduler {
    tx: flume::Sender<PreparationRequest>,
    rx: flume::Receiver<PreparationRequest>,
}

impl PreparationScheduler {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Queues a request. Never blocks and never touches the device.
    pub fn submit(&self, resource: Arc<dyn Resource>, strategy: Strategy) {
        // The receiver lives in `self`, so sending cannot fail.
        let _ = self.tx.send(PreparationRequest { resource, strategy });
    }

    /// Removes and returns the requests queued at entry, in queue order.
    ///
    /// Requests submitted while the caller works through the batch wait for
    /// the next call.
    #[must_use]
    pub fn take_pending(&self) -> Vec<PreparationRequest> {
        let snapshot = self.rx.len();
        self.rx.try_iter().take(snapshot).collect()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Default for PreparationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PreparationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparationScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_flags() {
        assert!(Strategy::Once.prepares_immediately());
        assert!(!Strategy::Once.tracks_surface());
        assert!(Strategy::OnceForce.forces());
        assert!(!Strategy::OnSurfaceReady.prepares_immediately());
        assert!(Strategy::OnSurfaceReady.tracks_surface());
        assert!(Strategy::OnceAndOnSurfaceReady.prepares_immediately());
        assert!(Strategy::OnceAndOnSurfaceReady.tracks_surface());
    }

    #[test]
    fn strategy_display_round_trips_through_from_str() {
        for strategy in [
            Strategy::Once,
            Strategy::OnceForce,
            Strategy::OnSurfaceReady,
            Strategy::OnceAndOnSurfaceReady,
        ] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!("reload".parse::<Strategy>().unwrap(), Strategy::OnceForce);
        assert_eq!("On-Surface-Ready".parse::<Strategy>().unwrap(), Strategy::OnSurfaceReady);
    }
}
