//! Device Resource Contract
//!
//! Every device-backed object (buffer, texture, framebuffer, program)
//! implements [`Resource`]. The contract separates *when* an allocation
//! happens from *who* asks for it:
//!
//! - [`Resource::prepare`] performs the device allocation or upload and is
//!   only ever called on the device thread.
//! - [`Resource::recycle`] clears the handle eagerly, from any thread, and
//!   hands back a [`DeletionTask`] that the device thread executes later.
//!
//! Concrete resources keep their handle in a [`DeviceSlot`], which also
//! enqueues the outstanding deletion when the resource is dropped while
//! still allocated.
//!
//! Submodules:
//! - `buffer.rs`: [`Buffer`], [`Uploader`], [`ByteUploader`]
//! - `texture.rs`: [`Texture`], [`Bitmap`]
//! - `framebuffer.rs`: [`Framebuffer`]
//! - `program.rs`: [`Program`], [`ShaderSource`]

mod buffer;
mod framebuffer;
mod program;
mod texture;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::GraphicsContext;
use crate::errors::Result;
use crate::recycler::RecycleQueue;

pub use buffer::{Buffer, ByteUploader, Uploader};
pub use framebuffer::{Framebuffer, MAX_COLOR_ATTACHMENTS};
pub use program::{Program, ShaderSource};
pub use texture::{Bitmap, Texture};

/// Process-wide handle counter. Starts at 1 so that 0 stays the absent value.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Handle
// ============================================================================

/// Opaque device handle.
///
/// Backends mint handles with [`Handle::next`], so a raw value is never
/// reused, not even after the device has been re-created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(u64);

impl Handle {
    /// "Not currently allocated."
    pub const ABSENT: Handle = Handle(0);

    /// Allocates a fresh, process-unique handle.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absent() {
            f.write_str("#absent")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

// ============================================================================
// ResourceKind
// ============================================================================

/// Category of a device object. Backends dispatch deletions on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Framebuffer,
    Program,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Framebuffer => "framebuffer",
            Self::Program => "program",
        };
        f.write_str(name)
    }
}

// ============================================================================
// DeletionTask
// ============================================================================

/// Deferred device deletion.
///
/// Captures the raw handle only, never the resource that owned it, so the
/// task can outlive its resource and cannot accidentally revive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a deletion task does nothing until it is executed or queued"]
pub struct DeletionTask {
    kind: ResourceKind,
    handle: Handle,
}

impl DeletionTask {
    pub fn new(kind: ResourceKind, handle: Handle) -> Self {
        Self { kind, handle }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// `true` when there is nothing to delete.
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.handle.is_absent()
    }

    /// Issues the device deletion. Device thread only.
    pub fn execute(self, ctx: &mut GraphicsContext) {
        if self.is_noop() {
            return;
        }
        log::debug!("Deleting {} {}", self.kind, self.handle);
        ctx.device_mut().release(self.kind, self.handle);
    }
}

// ============================================================================
// DeviceSlot
// ============================================================================

/// Handle storage shared by all concrete resources.
///
/// The handle is written only by the device thread (inside `prepare`) and
/// cleared to absent from any thread by [`DeviceSlot::take`].
pub struct DeviceSlot {
    kind: ResourceKind,
    handle: AtomicU64,
    recycler: RecycleQueue,
}

impl DeviceSlot {
    pub fn new(kind: ResourceKind, recycler: RecycleQueue) -> Self {
        Self {
            kind,
            handle: AtomicU64::new(Handle::ABSENT.raw()),
            recycler,
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Handle {
        Handle(self.handle.load(Ordering::Acquire))
    }

    /// Stores a freshly allocated handle. Device thread only.
    ///
    /// A handle that was still present is queued for deletion rather than
    /// leaked.
    pub fn set(&self, handle: Handle) {
        let previous = Handle(self.handle.swap(handle.raw(), Ordering::AcqRel));
        if previous.is_present() && previous != handle {
            self.recycler.push(DeletionTask::new(self.kind, previous));
        }
    }

    /// Clears the handle and returns the deletion task for the old value.
    pub fn take(&self) -> DeletionTask {
        let previous = Handle(self.handle.swap(Handle::ABSENT.raw(), Ordering::AcqRel));
        DeletionTask::new(self.kind, previous)
    }

    #[must_use]
    pub fn recycler(&self) -> &RecycleQueue {
        &self.recycler
    }
}

impl Drop for DeviceSlot {
    fn drop(&mut self) {
        let task = self.take();
        if !task.is_noop() {
            log::debug!("Dropped {} {} still allocated, queued for deletion", task.kind, task.handle);
            self.recycler.push(task);
        }
    }
}

impl fmt::Debug for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSlot")
            .field("kind", &self.kind)
            .field("handle", &self.get())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Capability contract of a device-backed object.
pub trait Resource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Debug label used in logs and diagnostics.
    fn label(&self) -> &str;

    /// Current device handle, [`Handle::ABSENT`] if never prepared or since
    /// recycled.
    fn id(&self) -> Handle;

    /// Allocates or refreshes the device object. Device thread only.
    ///
    /// Called on an already allocated resource only when a refresh was
    /// forced; implementations then re-upload or rebuild their contents.
    /// An error here is treated as fatal by the manager.
    fn prepare(&self, ctx: &mut GraphicsContext) -> Result<()>;

    /// Clears the handle to absent and returns the deletion for the old one.
    /// Deletes nothing itself, so it is safe from any thread.
    fn recycle(&self) -> DeletionTask;
}
