use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::{DeletionTask, DeviceSlot, Handle, Resource, ResourceKind, Texture};
use crate::context::{FramebufferDescriptor, GraphicsContext};
use crate::errors::{LifecycleError, Result};
use crate::recycler::RecycleQueue;

pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// Render target made of texture attachments.
///
/// Holds its attachments strongly, so tracked attachments stay alive as long
/// as the framebuffer does. Preparing it prepares any absent attachment
/// first, then (re)builds the device framebuffer from the attachment handles.
pub struct Framebuffer {
    slot: DeviceSlot,
    label: String,
    color: SmallVec<[Arc<Texture>; MAX_COLOR_ATTACHMENTS]>,
    depth: Option<Arc<Texture>>,
}

impl Framebuffer {
    pub fn new(
        recycler: RecycleQueue,
        label: impl Into<String>,
        color: impl IntoIterator<Item = Arc<Texture>>,
        depth: Option<Arc<Texture>>,
    ) -> Result<Self> {
        let label = label.into();
        let color: SmallVec<[Arc<Texture>; MAX_COLOR_ATTACHMENTS]> = color.into_iter().collect();
        if color.is_empty() && depth.is_none() {
            return Err(LifecycleError::InvalidDescriptor(format!("framebuffer '{label}' has no attachments")));
        }
        if color.len() > MAX_COLOR_ATTACHMENTS {
            return Err(LifecycleError::InvalidDescriptor(format!(
                "framebuffer '{label}' has {} colour attachments, at most {MAX_COLOR_ATTACHMENTS} supported",
                color.len()
            )));
        }
        Ok(Self {
            slot: DeviceSlot::new(ResourceKind::Framebuffer, recycler),
            label,
            color,
            depth,
        })
    }

    #[must_use]
    pub fn color_attachments(&self) -> &[Arc<Texture>] {
        &self.color
    }

    #[must_use]
    pub fn depth_attachment(&self) -> Option<&Arc<Texture>> {
        self.depth.as_ref()
    }

    fn ensure_attachment(ctx: &mut GraphicsContext, texture: &Texture) -> Result<Handle> {
        if texture.id().is_absent() {
            texture.prepare(ctx)?;
        }
        Ok(texture.id())
    }
}

impl Resource for Framebuffer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Framebuffer
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> Handle {
        self.slot.get()
    }

    fn prepare(&self, ctx: &mut GraphicsContext) -> Result<()> {
        let mut color_handles: SmallVec<[Handle; MAX_COLOR_ATTACHMENTS]> = SmallVec::new();
        for texture in &self.color {
            color_handles.push(Self::ensure_attachment(ctx, texture)?);
        }
        let depth_handle = match &self.depth {
            Some(texture) => Some(Self::ensure_attachment(ctx, texture)?),
            None => None,
        };

        // Attachments may have been re-created, so a refresh always rebuilds.
        self.slot.take().execute(ctx);

        let handle = ctx.device_mut().create_framebuffer(&FramebufferDescriptor {
            label: &self.label,
            color_attachments: &color_handles,
            depth_attachment: depth_handle,
        })?;
        self.slot.set(handle);
        log::debug!("Built framebuffer '{}' {} ({} colour attachments)", self.label, handle, color_handles.len());
        Ok(())
    }

    fn recycle(&self) -> DeletionTask {
        self.slot.take()
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("label", &self.label)
            .field("handle", &self.slot.get())
            .field("color", &self.color.len())
            .field("depth", &self.depth.is_some())
            .finish()
    }
}
