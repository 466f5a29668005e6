//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`LifecycleError`] covers:
//! - Device allocation and program link failures
//! - Invalid handles and descriptors handed to a backend
//! - Configuration parsing and validation
//!
//! Device errors returned from [`Resource::prepare`](crate::resource::Resource::prepare)
//! are not recoverable: the [`ResourceManager`](crate::ResourceManager) logs them and
//! aborts the frame with a panic. Everything else is an ordinary `Result`.
//!
//! ```rust,ignore
//! use gpu_lifecycle::errors::{LifecycleError, Result};
//!
//! fn load_settings(json: &str) -> Result<ManagerSettings> {
//!     ManagerSettings::from_json_str(json)
//! }
//! ```

use thiserror::Error;

use crate::resource::{Handle, ResourceKind};

/// The main error type for the lifecycle manager.
#[derive(Error, Debug)]
pub enum LifecycleError {
    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The device could not satisfy an allocation.
    #[error("Failed to allocate {kind} '{label}' ({size} bytes)")]
    AllocationFailed {
        /// Kind of resource being allocated
        kind: ResourceKind,
        /// Debug label of the resource
        label: String,
        /// Requested size in bytes
        size: u64,
    },

    /// Shader compilation or program linking failed.
    #[error("Failed to link program '{label}': {message}")]
    ProgramLinkFailed {
        /// Debug label of the program
        label: String,
        /// Backend diagnostic
        message: String,
    },

    /// A handle was used that the device does not know about.
    #[error("Invalid {kind} handle: {handle}")]
    InvalidHandle {
        /// Kind the handle was expected to refer to
        kind: ResourceKind,
        /// The offending handle
        handle: Handle,
    },

    /// A descriptor or content source is inconsistent with the resource.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    // ========================================================================
    // Parsing & Configuration Errors
    // ========================================================================
    /// Unrecognised preparation strategy name.
    #[error("Unknown preparation strategy: {0}")]
    UnknownStrategy(String),

    /// Unrecognised index layout name.
    #[error("Unknown index kind: {0}")]
    UnknownIndexKind(String),

    /// The sweep cadence is not usable.
    #[error("Invalid sweep cadence: {0}")]
    InvalidCadence(String),

    /// JSON configuration could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Alias for `Result<T, LifecycleError>`.
pub type Result<T> = std::result::Result<T, LifecycleError>;
