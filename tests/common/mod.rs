//! Shared test helpers.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gpu_lifecycle::context::BufferDescriptor;
use gpu_lifecycle::{
    DeletionTask, DeviceSlot, GraphicsContext, Handle, HeadlessDevice, LifecycleError, RecycleQueue, Resource,
    ResourceKind, ResourceManager,
};

/// Resource that counts its `prepare` calls.
///
/// Allocates an empty device buffer when absent and does nothing on a forced
/// refresh, so even very large request counts stay cheap.
pub struct Probe {
    slot: DeviceSlot,
    label: String,
    prepares: AtomicUsize,
    fail: bool,
}

impl Probe {
    pub fn new(recycler: RecycleQueue, label: &str) -> Self {
        Self {
            slot: DeviceSlot::new(ResourceKind::Buffer, recycler),
            label: label.to_string(),
            prepares: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Probe whose every prepare fails like an out-of-memory device.
    pub fn failing(recycler: RecycleQueue, label: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(recycler, label)
        }
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }
}

impl Resource for Probe {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> Handle {
        self.slot.get()
    }

    fn prepare(&self, ctx: &mut GraphicsContext) -> gpu_lifecycle::Result<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LifecycleError::AllocationFailed {
                kind: ResourceKind::Buffer,
                label: self.label.clone(),
                size: u64::MAX,
            });
        }
        if self.slot.get().is_absent() {
            let handle = ctx.device_mut().create_buffer(&BufferDescriptor {
                label: &self.label,
                usage: wgpu::BufferUsages::VERTEX,
                contents: &[],
            })?;
            self.slot.set(handle);
        }
        Ok(())
    }

    fn recycle(&self) -> DeletionTask {
        self.slot.take()
    }
}

pub fn probe(manager: &ResourceManager, label: &str) -> Arc<Probe> {
    Arc::new(Probe::new(manager.recycler().clone(), label))
}

/// Headless context with the surface already reported ready.
pub fn ready_context(manager: &ResourceManager) -> GraphicsContext {
    let mut ctx = GraphicsContext::new(HeadlessDevice::new());
    manager.on_surface_ready(&mut ctx);
    ctx
}

pub fn headless(ctx: &GraphicsContext) -> &HeadlessDevice {
    ctx.downcast_ref::<HeadlessDevice>().expect("headless backend")
}

pub fn headless_mut(ctx: &mut GraphicsContext) -> &mut HeadlessDevice {
    ctx.downcast_mut::<HeadlessDevice>().expect("headless backend")
}

/// Runs `frames` sweeps.
pub fn sweep_frames(manager: &ResourceManager, ctx: &mut GraphicsContext, frames: u64) {
    for _ in 0..frames {
        manager.sweep(ctx);
    }
}
