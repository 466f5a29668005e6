//! wgpu backend.
//!
//! Maps lifecycle handles onto `wgpu` objects. Renderers reach the objects
//! through [`GraphicsContext::downcast_ref`](crate::context::GraphicsContext::downcast_ref):
//!
//! ```rust,ignore
//! let device = ctx.downcast_ref::<WgpuDevice>().unwrap();
//! let indices = device.buffer(snapshot.buffer.id()).unwrap();
//! pass.set_index_buffer(indices.slice(..snapshot.byte_len()), INDEX_FORMAT);
//! ```
//!
//! Shader errors are reported by wgpu through the device's uncaptured error
//! handler, which panics unless replaced.

use std::any::Any;
use std::borrow::Cow;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use crate::context::{BufferDescriptor, FramebufferDescriptor, ProgramDescriptor, RenderDevice, TextureDescriptor};
use crate::errors::{LifecycleError, Result};
use crate::resource::{Bitmap, Handle, MAX_COLOR_ATTACHMENTS, ResourceKind};

// ============================================================================
// GPU object wrappers
// ============================================================================

pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    pub label: String,
}

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// Attachment views of a framebuffer, ready for a render pass descriptor.
pub struct GpuFramebuffer {
    pub color: SmallVec<[wgpu::TextureView; MAX_COLOR_ATTACHMENTS]>,
    pub depth: Option<wgpu::TextureView>,
    pub attachments: SmallVec<[Handle; MAX_COLOR_ATTACHMENTS]>,
}

pub struct GpuProgram {
    pub vertex: wgpu::ShaderModule,
    /// `None` when both stages share the vertex module.
    pub fragment: Option<wgpu::ShaderModule>,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl GpuProgram {
    #[must_use]
    pub fn fragment_module(&self) -> &wgpu::ShaderModule {
        self.fragment.as_ref().unwrap_or(&self.vertex)
    }
}

// ============================================================================
// WgpuDevice
// ============================================================================

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: FxHashMap<Handle, GpuBuffer>,
    textures: FxHashMap<Handle, GpuTexture>,
    framebuffers: FxHashMap<Handle, GpuFramebuffer>,
    programs: FxHashMap<Handle, GpuProgram>,
}

/// `queue.write_buffer` needs 4-byte multiples.
fn padded(data: &[u8]) -> Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if data.len() % align == 0 && !data.is_empty() {
        Cow::Borrowed(data)
    } else {
        let mut bytes = data.to_vec();
        bytes.resize(data.len().div_ceil(align).max(1) * align, 0);
        Cow::Owned(bytes)
    }
}

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            programs: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[must_use]
    pub fn buffer(&self, handle: Handle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle).map(|b| &b.buffer)
    }

    #[must_use]
    pub fn gpu_buffer(&self, handle: Handle) -> Option<&GpuBuffer> {
        self.buffers.get(&handle)
    }

    #[must_use]
    pub fn texture(&self, handle: Handle) -> Option<&GpuTexture> {
        self.textures.get(&handle)
    }

    #[must_use]
    pub fn texture_view(&self, handle: Handle) -> Option<&wgpu::TextureView> {
        self.textures.get(&handle).map(|t| &t.view)
    }

    #[must_use]
    pub fn framebuffer(&self, handle: Handle) -> Option<&GpuFramebuffer> {
        self.framebuffers.get(&handle)
    }

    #[must_use]
    pub fn program(&self, handle: Handle) -> Option<&GpuProgram> {
        self.programs.get(&handle)
    }

    /// Objects currently held, across all kinds.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.framebuffers.len() + self.programs.len()
    }

    fn view_of(&self, handle: Handle) -> Result<wgpu::TextureView> {
        self.textures
            .get(&handle)
            .map(|t| t.view.clone())
            .ok_or(LifecycleError::InvalidHandle {
                kind: ResourceKind::Texture,
                handle,
            })
    }

    fn shader_module(&self, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
        if source.trim().is_empty() {
            return Err(LifecycleError::ProgramLinkFailed {
                label: label.to_string(),
                message: "empty shader source".to_string(),
            });
        }
        Ok(self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
        }))
    }
}

impl RenderDevice for WgpuDevice {
    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<Handle> {
        let contents = padded(desc.contents);
        let usage = desc.usage | wgpu::BufferUsages::COPY_DST;
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(desc.label),
            contents: &contents,
            usage,
        });
        let handle = Handle::next();
        self.buffers.insert(
            handle,
            GpuBuffer {
                buffer,
                size: contents.len() as u64,
                usage,
                label: desc.label.to_string(),
            },
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
        let gpu = self.buffers.get_mut(&handle).ok_or(LifecycleError::InvalidHandle {
            kind: ResourceKind::Buffer,
            handle,
        })?;
        let data = padded(data);
        let new_size = data.len() as u64;
        if new_size > gpu.size {
            gpu.buffer.destroy();
            gpu.buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&gpu.label),
                size: new_size,
                usage: gpu.usage,
                mapped_at_creation: false,
            });
            gpu.size = new_size;
        }
        self.queue.write_buffer(&gpu.buffer, 0, &data);
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<Handle> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let handle = Handle::next();
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                format: desc.format,
            },
        );
        Ok(handle)
    }

    fn write_texture(&mut self, handle: Handle, bitmap: &Bitmap) -> Result<()> {
        let gpu = self.textures.get(&handle).ok_or(LifecycleError::InvalidHandle {
            kind: ResourceKind::Texture,
            handle,
        })?;
        if gpu.format != bitmap.format() {
            return Err(LifecycleError::InvalidDescriptor(format!(
                "texture {handle} is {:?}, bitmap is {:?}",
                gpu.format,
                bitmap.format()
            )));
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bitmap.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.row_pitch()),
                rows_per_image: Some(bitmap.height()),
            },
            wgpu::Extent3d {
                width: bitmap.width(),
                height: bitmap.height(),
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> Result<Handle> {
        let mut color = SmallVec::new();
        for &attachment in desc.color_attachments {
            color.push(self.view_of(attachment)?);
        }
        let depth = desc.depth_attachment.map(|h| self.view_of(h)).transpose()?;

        let mut attachments: SmallVec<[Handle; MAX_COLOR_ATTACHMENTS]> = desc.color_attachments.iter().copied().collect();
        attachments.extend(desc.depth_attachment);

        let handle = Handle::next();
        self.framebuffers.insert(
            handle,
            GpuFramebuffer {
                color,
                depth,
                attachments,
            },
        );
        Ok(handle)
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<Handle> {
        let vertex = self.shader_module(desc.label, desc.vertex_source)?;
        let fragment = if desc.fragment_source == desc.vertex_source {
            None
        } else {
            Some(self.shader_module(desc.label, desc.fragment_source)?)
        };
        let handle = Handle::next();
        self.programs.insert(
            handle,
            GpuProgram {
                vertex,
                fragment,
                vertex_entry: desc.vertex_entry.to_string(),
                fragment_entry: desc.fragment_entry.to_string(),
            },
        );
        Ok(handle)
    }

    fn release(&mut self, kind: ResourceKind, handle: Handle) {
        let found = match kind {
            ResourceKind::Buffer => self.buffers.remove(&handle).inspect(|gpu| gpu.buffer.destroy()).is_some(),
            ResourceKind::Texture => self.textures.remove(&handle).inspect(|gpu| gpu.texture.destroy()).is_some(),
            ResourceKind::Framebuffer => self.framebuffers.remove(&handle).is_some(),
            ResourceKind::Program => self.programs.remove(&handle).is_some(),
        };
        if !found {
            log::debug!("Release of unknown {kind} {handle}, device was recreated");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
