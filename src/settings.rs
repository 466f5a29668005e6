//! Manager Settings
//!
//! Configuration consumed once when a [`ResourceManager`](crate::ResourceManager)
//! is constructed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gpu_lifecycle::{ManagerSettings, ResourceManager, SweepCadence};
//!
//! // Defaults: sweep every 300 frames, deletions flushed half a period later
//! let manager = ResourceManager::new();
//!
//! // Faster cadence for tools that churn through many short-lived textures
//! let settings = ManagerSettings {
//!     cadence: SweepCadence { period: 60, expire_phase: 0, recycle_phase: 30 },
//!     ..Default::default()
//! };
//! let manager = ResourceManager::with_settings(settings)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LifecycleError, Result};

// ---------------------------------------------------------------------------
// SweepCadence
// ---------------------------------------------------------------------------

/// Tick gating of the two sweep passes.
///
/// Every call to [`ResourceManager::sweep`](crate::ResourceManager::sweep)
/// advances the tick by one. When `tick % period == expire_phase` expired
/// tracker entries are pruned; when `tick % period == recycle_phase` the
/// queued deletion tasks are executed. Keeping the two phases apart spreads
/// device deletion cost across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepCadence {
    /// Length of one sweep cycle in frames.
    pub period: u64,
    /// Tick offset of the expiration pass.
    pub expire_phase: u64,
    /// Tick offset of the deletion pass.
    pub recycle_phase: u64,
}

impl Default for SweepCadence {
    fn default() -> Self {
        Self {
            period: 300,
            expire_phase: 0,
            recycle_phase: 150,
        }
    }
}

impl SweepCadence {
    /// Checks that both phases fall inside the period and do not coincide.
    pub fn validate(&self) -> Result<()> {
        if self.period == 0 {
            return Err(LifecycleError::InvalidCadence("period must be non-zero".to_string()));
        }
        if self.expire_phase >= self.period || self.recycle_phase >= self.period {
            return Err(LifecycleError::InvalidCadence(format!(
                "phases ({}, {}) must be smaller than the period {}",
                self.expire_phase, self.recycle_phase, self.period
            )));
        }
        if self.expire_phase == self.recycle_phase && self.period > 1 {
            return Err(LifecycleError::InvalidCadence(format!(
                "expire and recycle phases both at {}",
                self.expire_phase
            )));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_expire_tick(&self, tick: u64) -> bool {
        tick % self.period == self.expire_phase
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_recycle_tick(&self, tick: u64) -> bool {
        tick % self.period == self.recycle_phase
    }
}

// ---------------------------------------------------------------------------
// ManagerSettings
// ---------------------------------------------------------------------------

/// Global configuration of the resource manager.
///
/// | Field                  | Description                                        | Default     |
/// |------------------------|----------------------------------------------------|-------------|
/// | `cadence`              | Sweep tick gating                                  | 300/0/150   |
/// | `index_reserve_factor` | Growth factor for shared index buffer capacity     | `2`         |
/// | `index_warning_limit`  | Object count above which index requests are logged | `20000`     |
/// | `strict_device_thread` | Assert that device work stays on one thread        | `true`      |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Sweep cadence. See [`SweepCadence`].
    pub cadence: SweepCadence,

    /// When a shared index buffer is too small, the new capacity is the
    /// requested object count multiplied by this factor.
    pub index_reserve_factor: usize,

    /// Requests for more objects than this are still served, but logged.
    pub index_warning_limit: usize,

    /// When `true`, the first thread entering a device-side operation becomes
    /// the device thread and any other thread doing so panics.
    pub strict_device_thread: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            cadence: SweepCadence::default(),
            index_reserve_factor: 2,
            index_warning_limit: 20_000,
            strict_device_thread: true,
        }
    }
}

impl ManagerSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.cadence.validate()?;
        if self.index_reserve_factor == 0 {
            return Err(LifecycleError::InvalidCadence(
                "index_reserve_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
