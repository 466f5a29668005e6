//! Graphics Context
//!
//! [`GraphicsContext`] is the value threaded through every device-side call.
//! It owns the [`RenderDevice`], the single injection point for device API
//! calls, so the lifecycle core stays independent of any one backend.
//!
//! Backends shipped with the crate:
//! - [`HeadlessDevice`](crate::backend::HeadlessDevice): in-memory, journals every call
//! - [`WgpuDevice`](crate::backend::WgpuDevice): wgpu device + queue

use std::any::Any;

use crate::errors::Result;
use crate::resource::{Bitmap, Handle, ResourceKind};

// ============================================================================
// Descriptors
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub usage: wgpu::BufferUsages,
    /// Initial contents. The allocation is exactly this large.
    pub contents: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferDescriptor<'a> {
    pub label: &'a str,
    /// Texture handles, in attachment order.
    pub color_attachments: &'a [Handle],
    pub depth_attachment: Option<Handle>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub vertex_source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_source: &'a str,
    pub fragment_entry: &'a str,
}

// ============================================================================
// RenderDevice
// ============================================================================

/// Device API binding.
///
/// All methods are called from the device thread only. Every `create_*`
/// call returns a handle minted with [`Handle::next`].
pub trait RenderDevice: Send + 'static {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<Handle>;

    /// Replaces the contents of a buffer. Implementations grow the
    /// allocation when `data` is larger, keeping the handle.
    fn write_buffer(&mut self, handle: Handle, data: &[u8]) -> Result<()>;

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<Handle>;

    fn write_texture(&mut self, handle: Handle, bitmap: &Bitmap) -> Result<()>;

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> Result<Handle>;

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<Handle>;

    /// Destroys a device object. Unknown handles are ignored: they belong to
    /// a context that no longer exists.
    fn release(&mut self, kind: ResourceKind, handle: Handle);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ============================================================================
// GraphicsContext
// ============================================================================

/// Opaque device context handed to `prepare` and deletion tasks.
pub struct GraphicsContext {
    device: Box<dyn RenderDevice>,
}

impl GraphicsContext {
    pub fn new(device: impl RenderDevice) -> Self {
        Self {
            device: Box::new(device),
        }
    }

    pub fn from_boxed(device: Box<dyn RenderDevice>) -> Self {
        Self { device }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &dyn RenderDevice {
        self.device.as_ref()
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut dyn RenderDevice {
        self.device.as_mut()
    }

    /// Concrete backend access, e.g. to fetch a `wgpu::Buffer` for a draw.
    #[must_use]
    pub fn downcast_ref<T: RenderDevice>(&self) -> Option<&T> {
        self.device.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: RenderDevice>(&mut self) -> Option<&mut T> {
        self.device.as_any_mut().downcast_mut::<T>()
    }

    /// Swaps in a new device, e.g. after the old one was lost. Returns the
    /// previous device.
    pub fn replace_device(&mut self, device: impl RenderDevice) -> Box<dyn RenderDevice> {
        std::mem::replace(&mut self.device, Box::new(device))
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("backend", &self.device.backend_name())
            .finish()
    }
}
