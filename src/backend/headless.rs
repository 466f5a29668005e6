//! In-memory device.
//!
//! Keeps every object in a map and journals every call, which makes the
//! lifecycle observable without a GPU. Tests assert on the journal; tools use
//! it to dry-run resource setups.

use std::any::Any;

use rustc_hash::FxHashMap;

use crate::context::{BufferDescriptor, FramebufferDescriptor, ProgramDescriptor, RenderDevice, TextureDescriptor};
use crate::errors::{LifecycleError, Result};
use crate::resource::{Bitmap, Handle, ResourceKind};

/// One journaled device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Created {
        kind: ResourceKind,
        handle: Handle,
        label: String,
    },
    Updated {
        kind: ResourceKind,
        handle: Handle,
    },
    Released {
        kind: ResourceKind,
        handle: Handle,
    },
    ContextLost {
        dropped: usize,
    },
}

impl DeviceEvent {
    /// Handle the event refers to, if any.
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::Created { handle, .. } | Self::Updated { handle, .. } | Self::Released { handle, .. } => {
                Some(*handle)
            }
            Self::ContextLost { .. } => None,
        }
    }
}

/// Device-side copy of an object.
#[derive(Debug, Clone)]
pub struct HeadlessObject {
    pub kind: ResourceKind,
    pub label: String,
    /// Buffer contents or texture pixels as last written.
    pub data: Vec<u8>,
    /// Allocation size in bytes, used against the allocation limit.
    pub size: u64,
    /// Attachments of a framebuffer.
    pub attachments: Vec<Handle>,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    objects: FxHashMap<Handle, HeadlessObject>,
    events: Vec<DeviceEvent>,
    allocation_limit: Option<u64>,
    allocated: u64,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails allocations once `bytes` are in use.
    #[must_use]
    pub fn with_allocation_limit(mut self, bytes: u64) -> Self {
        self.allocation_limit = Some(bytes);
        self
    }

    /// Drops every object as if the context had been destroyed. Handles held
    /// by resources become stale.
    pub fn lose_context(&mut self) {
        let dropped = self.objects.len();
        self.objects.clear();
        self.allocated = 0;
        self.events.push(DeviceEvent::ContextLost { dropped });
        log::info!("Headless context lost, {dropped} objects dropped");
    }

    #[must_use]
    pub fn object(&self, handle: Handle) -> Option<&HeadlessObject> {
        self.objects.get(&handle)
    }

    #[must_use]
    pub fn is_live(&self, handle: Handle) -> bool {
        self.objects.contains_key(&handle)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.objects.values().filter(|object| object.kind == kind).count()
    }

    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    #[must_use]
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    #[must_use]
    pub fn created_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, DeviceEvent::Created { .. }))
            .count()
    }

    #[must_use]
    pub fn released_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, DeviceEvent::Released { .. }))
            .count()
    }

    /// Number of journaled releases of `handle`.
    #[must_use]
    pub fn releases_of(&self, handle: Handle) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, DeviceEvent::Released { handle: h, .. } if *h == handle))
            .count()
    }

    /// Journal position of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&DeviceEvent) -> bool) -> Option<usize> {
        self.events.iter().position(pred)
    }

    fn reserve(&mut self, kind: ResourceKind, label: &str, size: u64) -> Result<()> {
        if let Some(limit) = self.allocation_limit
            && self.allocated + size > limit
        {
            return Err(LifecycleError::AllocationFailed {
                kind,
                label: label.to_string(),
                size,
            });
        }
        self.allocated += size;
        Ok(())
    }

    fn insert(&mut self, object: HeadlessObject) -> Handle {
        let handle = Handle::next();
        self.events.push(DeviceEvent::Created {
            kind: object.kind,
            handle,
            label: object.label.clone(),
        });
        self.objects.insert(handle, object);
        handle
    }

    fn object_mut(&mut self, kind: ResourceKind, handle: Handle) -> Result<&mut HeadlessObject> {
        match self.objects.get_mut(&handle) {
            Some(object) if object.kind == kind => Ok(object),
            _ => Err(LifecycleError::InvalidHandle { kind, handle }),
        }
    }
}

impl RenderDevice for HeadlessDevice {
    fn backend_name(&self) -> &'static str {
        "headless"
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<Handle> {
        let size = desc.contents.len() as u64;
        self.reserve(ResourceKind::Buffer, desc.label, size)?;
        Ok(self.insert(HeadlessObject {
            kind: ResourceKind::Buffer,
            label: desc.label.to_string(),
            data: desc.contents.to_vec(),
            size,
            attachments: Vec::new(),
        }))
    }

    fn write_buffer(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
        let current = self.object_mut(ResourceKind::Buffer, handle)?.size;
        let size = data.len() as u64;
        if size > current {
            let label = self.objects.get(&handle).map(|o| o.label.clone()).unwrap_or_default();
            self.reserve(ResourceKind::Buffer, &label, size - current)?;
        }
        let object = self.object_mut(ResourceKind::Buffer, handle)?;
        object.size = object.size.max(size);
        object.data.clear();
        object.data.extend_from_slice(data);
        self.events.push(DeviceEvent::Updated {
            kind: ResourceKind::Buffer,
            handle,
        });
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<Handle> {
        let texel = u64::from(desc.format.block_copy_size(None).unwrap_or(4));
        let size = u64::from(desc.width) * u64::from(desc.height) * texel;
        self.reserve(ResourceKind::Texture, desc.label, size)?;
        Ok(self.insert(HeadlessObject {
            kind: ResourceKind::Texture,
            label: desc.label.to_string(),
            data: Vec::new(),
            size,
            attachments: Vec::new(),
        }))
    }

    fn write_texture(&mut self, handle: Handle, bitmap: &Bitmap) -> Result<()> {
        let object = self.object_mut(ResourceKind::Texture, handle)?;
        if bitmap.pixels().len() as u64 != object.size {
            return Err(LifecycleError::InvalidDescriptor(format!(
                "texture {handle} holds {} bytes, bitmap has {}",
                object.size,
                bitmap.pixels().len()
            )));
        }
        object.data.clear();
        object.data.extend_from_slice(bitmap.pixels());
        self.events.push(DeviceEvent::Updated {
            kind: ResourceKind::Texture,
            handle,
        });
        Ok(())
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> Result<Handle> {
        let mut attachments = desc.color_attachments.to_vec();
        attachments.extend(desc.depth_attachment);
        for &attachment in &attachments {
            self.object_mut(ResourceKind::Texture, attachment)?;
        }
        Ok(self.insert(HeadlessObject {
            kind: ResourceKind::Framebuffer,
            label: desc.label.to_string(),
            data: Vec::new(),
            size: 0,
            attachments,
        }))
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<Handle> {
        for (stage, source, entry) in [
            ("vertex", desc.vertex_source, desc.vertex_entry),
            ("fragment", desc.fragment_source, desc.fragment_entry),
        ] {
            if source.trim().is_empty() {
                return Err(LifecycleError::ProgramLinkFailed {
                    label: desc.label.to_string(),
                    message: format!("empty {stage} stage"),
                });
            }
            if entry.is_empty() {
                return Err(LifecycleError::ProgramLinkFailed {
                    label: desc.label.to_string(),
                    message: format!("missing {stage} entry point"),
                });
            }
        }
        Ok(self.insert(HeadlessObject {
            kind: ResourceKind::Program,
            label: desc.label.to_string(),
            data: Vec::new(),
            size: 0,
            attachments: Vec::new(),
        }))
    }

    fn release(&mut self, kind: ResourceKind, handle: Handle) {
        match self.objects.remove(&handle) {
            Some(object) => {
                debug_assert_eq!(object.kind, kind, "released {handle} with the wrong kind");
                self.allocated = self.allocated.saturating_sub(object.size);
            }
            None => log::debug!("Release of unknown {kind} {handle}, context was recreated"),
        }
        self.events.push(DeviceEvent::Released { kind, handle });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
