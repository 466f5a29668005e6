//! 2D textures and their bitmap sources.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{DeletionTask, DeviceSlot, Handle, Resource, ResourceKind};
use crate::context::{GraphicsContext, TextureDescriptor};
use crate::errors::{LifecycleError, Result};
use crate::recycler::RecycleQueue;

// ============================================================================
// Bitmap
// ============================================================================

/// Decoded pixel data, tightly packed rows.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Validates that `pixels` holds exactly `width * height` texels of an
    /// uncompressed `format`.
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat, pixels: Vec<u8>) -> Result<Self> {
        let bpp = bytes_per_texel(format)?;
        let expected = u64::from(width) * u64::from(height) * u64::from(bpp);
        if pixels.len() as u64 != expected {
            return Err(LifecycleError::InvalidDescriptor(format!(
                "bitmap {width}x{height} {format:?} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Single-colour RGBA8 bitmap.
    #[must_use]
    pub fn solid_rgba8(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let texels = width as usize * height as usize;
        Self {
            width,
            height,
            format: wgpu::TextureFormat::Rgba8Unorm,
            pixels: rgba.repeat(texels),
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes per row, without padding.
    #[must_use]
    pub fn row_pitch(&self) -> u32 {
        self.width * self.format.block_copy_size(None).unwrap_or(4)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

fn bytes_per_texel(format: wgpu::TextureFormat) -> Result<u32> {
    if format.block_dimensions() != (1, 1) {
        return Err(LifecycleError::InvalidDescriptor(format!(
            "block-compressed format {format:?} cannot back a bitmap"
        )));
    }
    format.block_copy_size(None).ok_or_else(|| {
        LifecycleError::InvalidDescriptor(format!("format {format:?} has no single-aspect copy size"))
    })
}

// ============================================================================
// Texture
// ============================================================================

/// 2D texture.
///
/// Preparing an allocated texture re-uploads the bitmap; the manager only
/// does that for forced requests and after surface loss.
pub struct Texture {
    slot: DeviceSlot,
    label: String,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    bitmap: Mutex<Option<Arc<Bitmap>>>,
}

impl Texture {
    pub fn new(
        recycler: RecycleQueue,
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            slot: DeviceSlot::new(ResourceKind::Texture, recycler),
            label: label.into(),
            width,
            height,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            bitmap: Mutex::new(None),
        }
    }

    /// Texture sized and formatted after its bitmap.
    pub fn from_bitmap(recycler: RecycleQueue, label: impl Into<String>, bitmap: Arc<Bitmap>) -> Self {
        let texture = Self::new(recycler, label, bitmap.width(), bitmap.height(), bitmap.format());
        *texture.bitmap.lock() = Some(bitmap);
        texture
    }

    /// Colour or depth attachment without CPU-side contents.
    pub fn render_target(
        recycler: RecycleQueue,
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::new(recycler, label, width, height, format)
            .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
    }

    #[must_use]
    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[must_use]
    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.bitmap.lock().clone()
    }

    /// Replaces the source bitmap, e.g. after an atlas was repacked.
    /// Request a forced prepare to push it to the device.
    pub fn set_bitmap(&self, bitmap: Arc<Bitmap>) -> Result<()> {
        if bitmap.width() != self.width || bitmap.height() != self.height || bitmap.format() != self.format {
            return Err(LifecycleError::InvalidDescriptor(format!(
                "texture '{}' is {}x{} {:?}, bitmap is {}x{} {:?}",
                self.label,
                self.width,
                self.height,
                self.format,
                bitmap.width(),
                bitmap.height(),
                bitmap.format()
            )));
        }
        *self.bitmap.lock() = Some(bitmap);
        Ok(())
    }
}

impl Resource for Texture {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> Handle {
        self.slot.get()
    }

    fn prepare(&self, ctx: &mut GraphicsContext) -> Result<()> {
        let mut handle = self.slot.get();
        if handle.is_absent() {
            handle = ctx.device_mut().create_texture(&TextureDescriptor {
                label: &self.label,
                width: self.width,
                height: self.height,
                format: self.format,
                usage: self.usage,
            })?;
            self.slot.set(handle);
        }

        let bitmap = self.bitmap.lock().clone();
        if let Some(bitmap) = &bitmap {
            ctx.device_mut().write_texture(handle, bitmap)?;
        }
        log::debug!(
            "Uploaded texture '{}' {}, {}x{}{}",
            self.label,
            handle,
            self.width,
            self.height,
            if bitmap.is_some() { "" } else { ", no bitmap" }
        );
        Ok(())
    }

    fn recycle(&self) -> DeletionTask {
        self.slot.take()
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.label)
            .field("handle", &self.slot.get())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
