//! Resource Manager
//!
//! [`ResourceManager`] ties the lifecycle pieces together and is the only
//! type most callers touch:
//!
//! - **Producer side** (any thread): [`prepare`](ResourceManager::prepare),
//!   [`recycle`](ResourceManager::recycle), the `make_*` factories and
//!   [`shared_index_buffer`](ResourceManager::shared_index_buffer). These only
//!   queue work and never block on the device.
//! - **Device side** (device thread): [`drain_once`](ResourceManager::drain_once)
//!   and [`sweep`](ResourceManager::sweep) once per frame, or the combined
//!   [`on_draw_frame`](ResourceManager::on_draw_frame), plus the surface
//!   notifications.
//!
//! # Frame Loop
//!
//! ```rust,ignore
//! let manager = Arc::new(ResourceManager::new());
//! let mut ctx = GraphicsContext::new(device);
//! manager.on_surface_ready(&mut ctx);
//!
//! loop {
//!     manager.drain_once(&mut ctx);
//!     // ... record and submit draws ...
//!     manager.sweep(&mut ctx);
//! }
//! ```
//!
//! # Fatal errors
//!
//! A failing [`Resource::prepare`] means the device is out of memory or a
//! shader does not link. The manager logs the resource and the error, then
//! panics. Nothing is retried.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::context::GraphicsContext;
use crate::device_thread::DeviceThread;
use crate::errors::{LifecycleError, Result};
use crate::index_buffers::{IndexBufferSnapshot, IndexKind, SharedIndexBuffers};
use crate::recycler::RecycleQueue;
use crate::resource::{Bitmap, Buffer, Framebuffer, Program, Resource, ShaderSource, Texture, Uploader};
use crate::scheduler::{PreparationRequest, PreparationScheduler, Strategy};
use crate::settings::ManagerSettings;
use crate::surface::{self, RecoveryReport, SurfaceState};
use crate::tracker::ExpirationTracker;

/// What one [`ResourceManager::sweep`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Tick after the sweep.
    pub tick: u64,
    /// Pruned entries, if this was an expiration tick.
    pub expired: Option<usize>,
    /// Executed deletions, if this was a deletion tick.
    pub deleted: Option<usize>,
}

/// Shared between producers and the device thread.
///
/// The tracker lock is only held for bookkeeping, never across a device
/// call, so queries and surface notifications never wait on a drain.
pub struct ResourceManager {
    settings: ManagerSettings,
    scheduler: PreparationScheduler,
    recycler: RecycleQueue,
    device_thread: DeviceThread,
    tracker: Mutex<ExpirationTracker>,
    surface_ready: AtomicBool,
    tick: AtomicU64,
    shared_indices: Mutex<SharedIndexBuffers>,
}

impl ResourceManager {
    /// Manager with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::build(ManagerSettings::default())
    }

    pub fn with_settings(settings: ManagerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(settings))
    }

    fn build(settings: ManagerSettings) -> Self {
        Self {
            device_thread: DeviceThread::new(settings.strict_device_thread),
            settings,
            scheduler: PreparationScheduler::new(),
            recycler: RecycleQueue::new(),
            tracker: Mutex::new(ExpirationTracker::new()),
            surface_ready: AtomicBool::new(false),
            tick: AtomicU64::new(0),
            shared_indices: Mutex::new(SharedIndexBuffers::default()),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Queue that resources built for this manager must be constructed with.
    #[inline]
    #[must_use]
    pub fn recycler(&self) -> &RecycleQueue {
        &self.recycler
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Requests preparation of `resource`. Any thread, never blocks.
    pub fn prepare<R: Resource + 'static>(&self, resource: &Arc<R>, strategy: Strategy) {
        self.prepare_dyn(Arc::clone(resource) as Arc<dyn Resource>, strategy);
    }

    pub fn prepare_dyn(&self, resource: Arc<dyn Resource>, strategy: Strategy) {
        self.scheduler.submit(resource, strategy);
    }

    /// Releases the resource's device object at the next deletion pass.
    /// The resource itself stays usable and can be prepared again.
    pub fn recycle(&self, resource: &dyn Resource) {
        self.recycler.recycle(resource);
    }

    /// Builds a resource around this manager's recycle queue and schedules it
    /// with [`Strategy::OnceAndOnSurfaceReady`].
    pub fn create_managed<R, F>(&self, build: F) -> Arc<R>
    where
        R: Resource + 'static,
        F: FnOnce(RecycleQueue) -> R,
    {
        let resource = Arc::new(build(self.recycler.clone()));
        self.prepare(&resource, Strategy::OnceAndOnSurfaceReady);
        resource
    }

    /// Buffer with optional contents.
    ///
    /// With contents it is uploaded on the next drain and rebuilt after
    /// surface loss; without, it is only allocated on surface recovery.
    pub fn make_buffer(
        &self,
        label: impl Into<String>,
        usage: wgpu::BufferUsages,
        uploader: Option<Arc<dyn Uploader>>,
    ) -> Arc<Buffer> {
        let strategy = if uploader.is_some() {
            Strategy::OnceAndOnSurfaceReady
        } else {
            Strategy::OnSurfaceReady
        };
        let buffer = Arc::new(Buffer::new(self.recycler.clone(), label, usage, uploader));
        self.prepare(&buffer, strategy);
        buffer
    }

    pub fn make_texture(&self, label: impl Into<String>, bitmap: Arc<Bitmap>, strategy: Strategy) -> Arc<Texture> {
        let texture = Arc::new(Texture::from_bitmap(self.recycler.clone(), label, bitmap));
        self.prepare(&texture, strategy);
        texture
    }

    /// Framebuffer over existing attachments.
    ///
    /// The attachments are scheduled with
    /// [`Strategy::OnceAndOnSurfaceReady`] ahead of the framebuffer, so they
    /// are rebuilt with it after surface loss.
    pub fn make_framebuffer(
        &self,
        label: impl Into<String>,
        color: impl IntoIterator<Item = Arc<Texture>>,
        depth: Option<Arc<Texture>>,
    ) -> Result<Arc<Framebuffer>> {
        let framebuffer = Arc::new(Framebuffer::new(self.recycler.clone(), label, color, depth)?);
        for attachment in framebuffer.color_attachments().iter().chain(framebuffer.depth_attachment()) {
            self.prepare(attachment, Strategy::OnceAndOnSurfaceReady);
        }
        self.prepare(&framebuffer, Strategy::OnceAndOnSurfaceReady);
        Ok(framebuffer)
    }

    pub fn make_program(&self, label: impl Into<String>, source: ShaderSource) -> Arc<Program> {
        let program = Arc::new(Program::new(self.recycler.clone(), label, source));
        self.prepare(&program, Strategy::OnceAndOnSurfaceReady);
        program
    }

    /// Shared index buffer covering at least `object_count` objects.
    ///
    /// Grows by `index_reserve_factor` when too small and never shrinks.
    /// Keep the returned snapshot for as long as draws reference its buffer.
    pub fn shared_index_buffer(&self, kind: IndexKind, object_count: usize) -> IndexBufferSnapshot {
        if object_count > self.settings.index_warning_limit {
            log::warn!(
                "Requested {kind} indices for {object_count} objects, above the limit of {}",
                self.settings.index_warning_limit
            );
        }

        let (snapshot, created) = self.shared_indices.lock().acquire(
            kind,
            object_count,
            self.settings.index_reserve_factor,
            |uploader| {
                Arc::new(Buffer::new(
                    self.recycler.clone(),
                    format!("shared {kind} indices"),
                    wgpu::BufferUsages::INDEX,
                    Some(Arc::new(uploader)),
                ))
            },
        );
        if created {
            self.prepare(&snapshot.buffer, Strategy::OnceAndOnSurfaceReady);
        }
        snapshot
    }

    /// Object capacity of the shared buffer for `kind`, 0 if none yet.
    #[must_use]
    pub fn shared_index_capacity(&self, kind: IndexKind) -> usize {
        self.shared_indices.lock().capacity(kind)
    }

    // ========================================================================
    // Device side
    // ========================================================================

    /// Processes the requests queued at entry. Returns how many were handled.
    ///
    /// While the surface is absent nothing is taken from the queue.
    ///
    /// # Panics
    ///
    /// On a fatal device error, or when called off the device thread.
    pub fn drain_once(&self, ctx: &mut GraphicsContext) -> usize {
        self.device_thread.assert_current("drain_once");
        if !self.surface_ready.load(Ordering::Acquire) {
            log::trace!("Surface absent, {} preparation requests deferred", self.scheduler.pending());
            return 0;
        }

        let requests = self.scheduler.take_pending();
        let count = requests.len();
        for request in requests {
            self.dispatch(ctx, request);
        }
        count
    }

    fn dispatch(&self, ctx: &mut GraphicsContext, request: PreparationRequest) {
        let PreparationRequest { resource, strategy } = request;
        if strategy.forces() || (strategy.prepares_immediately() && resource.id().is_absent()) {
            if let Err(err) = resource.prepare(ctx) {
                fatal(resource.as_ref(), &err);
            }
        }
        if strategy.tracks_surface() {
            self.track(&resource);
        }
    }

    fn track(&self, resource: &Arc<dyn Resource>) {
        if self.tracker.lock().insert(resource) {
            log::debug!("Tracking {} '{}' for surface recovery", resource.kind(), resource.label());
        }
    }

    /// Advances the frame tick and runs whichever sweep pass is due.
    ///
    /// While the surface is absent the tick does not move.
    ///
    /// # Panics
    ///
    /// When called off the device thread.
    pub fn sweep(&self, ctx: &mut GraphicsContext) -> SweepOutcome {
        self.device_thread.assert_current("sweep");
        if !self.surface_ready.load(Ordering::Acquire) {
            return SweepOutcome {
                tick: self.tick.load(Ordering::Acquire),
                ..SweepOutcome::default()
            };
        }

        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let cadence = self.settings.cadence;
        let mut outcome = SweepOutcome {
            tick,
            ..SweepOutcome::default()
        };

        if cadence.is_expire_tick(tick) {
            let (expired, remaining) = {
                let mut tracker = self.tracker.lock();
                (tracker.sweep_expired(), tracker.len())
            };
            if expired > 0 {
                log::debug!("Tick {tick}: pruned {expired} expired resources, {remaining} tracked");
            }
            outcome.expired = Some(expired);
        }
        if cadence.is_recycle_tick(tick) {
            let deleted = self.recycler.drain(ctx);
            if deleted > 0 {
                log::debug!("Tick {tick}: executed {deleted} deferred deletions");
            }
            outcome.deleted = Some(deleted);
        }
        outcome
    }

    /// [`drain_once`](Self::drain_once) followed by [`sweep`](Self::sweep).
    pub fn on_draw_frame(&self, ctx: &mut GraphicsContext) -> SweepOutcome {
        self.drain_once(ctx);
        self.sweep(ctx)
    }

    /// The surface (and with it a usable device context) is available.
    ///
    /// Every live tracked resource is released and prepared again, so owners
    /// keep their `Arc` while the device object behind it is replaced.
    /// Requests queued while the surface was absent are handled here too.
    ///
    /// # Panics
    ///
    /// On a fatal device error, or when called off the device thread.
    pub fn on_surface_ready(&self, ctx: &mut GraphicsContext) -> RecoveryReport {
        self.device_thread.assert_current("on_surface_ready");
        self.surface_ready.store(true, Ordering::Release);

        // Requests queued while the surface was absent join the tracker
        // before recovery, so surface-only resources are built right away.
        let requests = self.scheduler.take_pending();
        for request in &requests {
            if request.strategy.tracks_surface() {
                self.track(&request.resource);
            }
        }

        let mut report = match surface::recover(ctx, &self.tracker, &self.recycler) {
            Ok(report) => report,
            Err(failure) => fatal(failure.resource.as_ref(), &failure.error),
        };

        report.requests = requests.len();
        for request in requests {
            self.dispatch(ctx, request);
        }

        log::info!(
            "Surface ready on {}: {} tracked resources rebuilt, {} released, {} expired, {} queued requests",
            ctx.device().backend_name(),
            report.prepared,
            report.recycled,
            report.expired,
            report.requests
        );
        report
    }

    /// The surface is gone. Device work is suspended until the next
    /// [`on_surface_ready`](Self::on_surface_ready). Makes no device calls,
    /// so any thread may report it.
    pub fn on_surface_lost(&self) {
        if self.surface_ready.swap(false, Ordering::AcqRel) {
            log::info!("Surface lost, {} resources tracked for recovery", self.tracker.lock().len());
        }
    }

    /// Executes every queued deletion now, ignoring the cadence. Useful
    /// before tearing the device down.
    ///
    /// # Panics
    ///
    /// When called off the device thread.
    pub fn flush_deletions(&self, ctx: &mut GraphicsContext) -> usize {
        self.device_thread.assert_current("flush_deletions");
        self.recycler.drain(ctx)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn surface_state(&self) -> SurfaceState {
        if self.surface_ready.load(Ordering::Acquire) {
            SurfaceState::SurfaceReady
        } else {
            SurfaceState::SurfaceAbsent
        }
    }

    /// Tracked entries, including expired ones not yet pruned.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracker.lock().len()
    }

    #[must_use]
    pub fn is_tracked(&self, resource: &Arc<dyn Resource>) -> bool {
        self.tracker.lock().contains(resource)
    }

    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.scheduler.pending()
    }

    #[must_use]
    pub fn pending_deletions(&self) -> usize {
        self.recycler.pending()
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("settings", &self.settings)
            .field("pending_requests", &self.scheduler.pending())
            .field("pending_deletions", &self.recycler.pending())
            .finish_non_exhaustive()
    }
}

#[cold]
#[track_caller]
fn fatal(resource: &dyn Resource, error: &LifecycleError) -> ! {
    log::error!("Fatal device error preparing {} '{}': {error}", resource.kind(), resource.label());
    panic!("fatal device error preparing {} '{}': {error}", resource.kind(), resource.label());
}
