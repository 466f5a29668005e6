//! Concurrency Tests
//!
//! Tests for:
//! - Many producers against one device-thread consumer
//! - Deletions queued from foreign threads
//! - Device thread affinity
//! - Queries and surface loss while the device thread is preparing

mod common;

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::{headless, probe, ready_context, sweep_frames};
use gpu_lifecycle::{
    DeletionTask, DeviceSlot, GraphicsContext, Handle, HeadlessDevice, ManagerSettings, RecycleQueue, Resource,
    ResourceKind, ResourceManager, Strategy, SurfaceState,
};
use parking_lot::Mutex;

const PRODUCERS: usize = 4;
const REQUESTS_PER_PRODUCER: usize = 100_000;

#[test]
fn every_forced_request_from_every_producer_is_prepared() {
    let manager = Arc::new(ResourceManager::new());
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "contended");

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for _ in 0..REQUESTS_PER_PRODUCER {
                    manager.prepare(&r, Strategy::OnceForce);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(manager.pending_requests(), PRODUCERS * REQUESTS_PER_PRODUCER);
    assert_eq!(manager.drain_once(&mut ctx), PRODUCERS * REQUESTS_PER_PRODUCER);
    assert_eq!(r.prepares(), PRODUCERS * REQUESTS_PER_PRODUCER);
    assert_eq!(manager.pending_requests(), 0);
}

#[test]
fn producers_and_consumer_run_concurrently() {
    let manager = Arc::new(ResourceManager::new());
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "interleaved");

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    manager.prepare(&r, Strategy::OnceForce);
                }
            })
        })
        .collect();

    let mut drained = 0;
    while producers.iter().any(|p| !p.is_finished()) {
        drained += manager.drain_once(&mut ctx);
    }
    for producer in producers {
        producer.join().unwrap();
    }
    drained += manager.drain_once(&mut ctx);

    assert_eq!(drained, PRODUCERS * 10_000);
    assert_eq!(r.prepares(), PRODUCERS * 10_000);
}

#[test]
fn resources_dropped_on_other_threads_are_reclaimed() {
    let manager = Arc::new(ResourceManager::new());
    let mut ctx = ready_context(&manager);

    let resources: Vec<_> = (0..16).map(|i| probe(&manager, &format!("worker-{i}"))).collect();
    for r in &resources {
        manager.prepare(r, Strategy::OnceAndOnSurfaceReady);
    }
    manager.drain_once(&mut ctx);
    let handles: Vec<_> = resources.iter().map(|r| r.id()).collect();

    let workers: Vec<_> = resources
        .into_iter()
        .map(|r| thread::spawn(move || drop(r)))
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(manager.pending_deletions(), 16);
    sweep_frames(&manager, &mut ctx, 300);
    for handle in handles {
        assert_eq!(headless(&ctx).releases_of(handle), 1);
    }
    assert_eq!(manager.tracked_count(), 0);
}

#[test]
fn device_work_off_the_device_thread_panics() {
    let manager = Arc::new(ResourceManager::new());
    let _ctx = ready_context(&manager);

    let remote = Arc::clone(&manager);
    let result = thread::spawn(move || {
        let mut ctx = GraphicsContext::new(HeadlessDevice::new());
        remote.drain_once(&mut ctx);
    })
    .join();
    assert!(result.is_err());
}

#[test]
fn lenient_manager_accepts_any_device_thread() {
    let settings = ManagerSettings {
        strict_device_thread: false,
        ..Default::default()
    };
    let manager = Arc::new(ResourceManager::with_settings(settings).unwrap());
    let _ctx = ready_context(&manager);

    let remote = Arc::clone(&manager);
    let result = thread::spawn(move || {
        let mut ctx = GraphicsContext::new(HeadlessDevice::new());
        remote.drain_once(&mut ctx)
    })
    .join();
    assert_eq!(result.unwrap(), 0);
}

#[test]
fn surface_loss_may_be_reported_from_any_thread() {
    let manager = Arc::new(ResourceManager::new());
    let _ctx = ready_context(&manager);

    let remote = Arc::clone(&manager);
    thread::spawn(move || remote.on_surface_lost()).join().unwrap();
    assert!(!manager.surface_state().is_ready());
}

/// What another thread saw of the manager while a prepare was running.
#[derive(Debug, PartialEq, Eq)]
struct Observed {
    tracked: usize,
    tick: u64,
    surface: SurfaceState,
}

/// Resource whose prepare asks another thread to report the surface lost
/// and query the manager, then waits for the answer.
struct Watcher {
    slot: DeviceSlot,
    manager: Arc<ResourceManager>,
    observed: Mutex<Option<Observed>>,
}

impl Watcher {
    fn new(recycler: RecycleQueue, manager: Arc<ResourceManager>) -> Self {
        Self {
            slot: DeviceSlot::new(ResourceKind::Buffer, recycler),
            manager,
            observed: Mutex::new(None),
        }
    }
}

impl Resource for Watcher {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    fn label(&self) -> &str {
        "watcher"
    }

    fn id(&self) -> Handle {
        self.slot.get()
    }

    fn prepare(&self, _ctx: &mut GraphicsContext) -> gpu_lifecycle::Result<()> {
        let manager = Arc::clone(&self.manager);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            manager.on_surface_lost();
            let _ = tx.send(Observed {
                tracked: manager.tracked_count(),
                tick: manager.tick(),
                surface: manager.surface_state(),
            });
        });
        *self.observed.lock() = rx.recv_timeout(Duration::from_secs(10)).ok();
        Ok(())
    }

    fn recycle(&self) -> DeletionTask {
        self.slot.take()
    }
}

#[test]
fn surface_loss_and_queries_do_not_wait_for_prepare() {
    let manager = Arc::new(ResourceManager::new());
    let mut ctx = ready_context(&manager);
    let tracked = probe(&manager, "tracked");
    manager.prepare(&tracked, Strategy::OnceAndOnSurfaceReady);
    manager.drain_once(&mut ctx);
    sweep_frames(&manager, &mut ctx, 3);

    let watcher = Arc::new(Watcher::new(manager.recycler().clone(), Arc::clone(&manager)));
    manager.prepare(&watcher, Strategy::OnceForce);
    assert_eq!(manager.drain_once(&mut ctx), 1);

    assert_eq!(
        *watcher.observed.lock(),
        Some(Observed {
            tracked: 1,
            tick: 3,
            surface: SurfaceState::SurfaceAbsent,
        })
    );
    assert_eq!(manager.surface_state(), SurfaceState::SurfaceAbsent);
    assert_eq!(manager.drain_once(&mut ctx), 0);
}
