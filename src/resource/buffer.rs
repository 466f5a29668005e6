//! Buffer resources and their content sources.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;
use parking_lot::Mutex;

use super::{DeletionTask, DeviceSlot, Handle, Resource, ResourceKind};
use crate::context::{BufferDescriptor, GraphicsContext};
use crate::errors::Result;
use crate::recycler::RecycleQueue;

// ============================================================================
// Uploader
// ============================================================================

/// Source of buffer contents.
///
/// Contents are regenerated on every prepare, which is what lets a buffer be
/// rebuilt after the device lost it.
pub trait Uploader: Send + Sync {
    /// Size of the generated contents in bytes.
    fn size(&self) -> usize;

    /// Writes exactly `size()` bytes into `dst`.
    fn write_to(&self, dst: &mut [u8]);

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size()];
        self.write_to(&mut bytes);
        bytes
    }
}

/// Uploader over an owned byte copy.
#[derive(Debug, Clone, Default)]
pub struct ByteUploader {
    bytes: Vec<u8>,
}

impl ByteUploader {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Copies any `Pod` slice, e.g. `&[Vertex]` or `&[u32]`.
    #[must_use]
    pub fn from_pod<T: Pod>(data: &[T]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(data).to_vec(),
        }
    }
}

impl Uploader for ByteUploader {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn write_to(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.bytes);
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

// ============================================================================
// Buffer
// ============================================================================

/// Vertex, index or uniform buffer.
///
/// Preparing an allocated buffer re-uploads the current contents.
pub struct Buffer {
    slot: DeviceSlot,
    label: String,
    usage: wgpu::BufferUsages,
    uploader: Mutex<Option<Arc<dyn Uploader>>>,
    uploaded_size: AtomicU64,
}

impl Buffer {
    pub fn new(
        recycler: RecycleQueue,
        label: impl Into<String>,
        usage: wgpu::BufferUsages,
        uploader: Option<Arc<dyn Uploader>>,
    ) -> Self {
        Self {
            slot: DeviceSlot::new(ResourceKind::Buffer, recycler),
            label: label.into(),
            usage,
            uploader: Mutex::new(uploader),
            uploaded_size: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn usage(&self) -> wgpu::BufferUsages {
        self.usage
    }

    /// Size of the contents uploaded by the last prepare.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.uploaded_size.load(Ordering::Acquire)
    }

    /// Size the next prepare will upload.
    #[must_use]
    pub fn pending_size(&self) -> usize {
        self.uploader.lock().as_ref().map_or(0, |u| u.size())
    }

    /// Swaps the content source. Request a forced prepare to push it.
    pub fn set_uploader(&self, uploader: Arc<dyn Uploader>) {
        *self.uploader.lock() = Some(uploader);
    }
}

impl Resource for Buffer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> Handle {
        self.slot.get()
    }

    fn prepare(&self, ctx: &mut GraphicsContext) -> Result<()> {
        let uploader = self.uploader.lock().clone();
        let contents = uploader.map(|u| u.to_bytes()).unwrap_or_default();

        let handle = self.slot.get();
        if handle.is_absent() {
            let handle = ctx.device_mut().create_buffer(&BufferDescriptor {
                label: &self.label,
                usage: self.usage,
                contents: &contents,
            })?;
            self.slot.set(handle);
            log::debug!("Created buffer '{}' {} ({} bytes)", self.label, handle, contents.len());
        } else if !contents.is_empty() {
            ctx.device_mut().write_buffer(handle, &contents)?;
            log::debug!("Re-uploaded buffer '{}' {} ({} bytes)", self.label, handle, contents.len());
        }

        self.uploaded_size.store(contents.len() as u64, Ordering::Release);
        Ok(())
    }

    fn recycle(&self) -> DeletionTask {
        self.uploaded_size.store(0, Ordering::Release);
        self.slot.take()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.label)
            .field("handle", &self.slot.get())
            .field("usage", &self.usage)
            .field("size", &self.size())
            .finish()
    }
}
