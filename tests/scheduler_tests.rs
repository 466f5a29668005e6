//! Preparation Scheduler Tests
//!
//! Tests for:
//! - drain_once: strategy dispatch (Once, OnceForce, OnSurfaceReady, OnceAndOnSurfaceReady)
//! - Tracking set semantics
//! - Deferred drains while the surface is absent, dispatched on surface ready
//! - Fatal device errors
//! - Strategy parsing

mod common;

use std::sync::Arc;

use common::{Probe, headless, probe, ready_context};
use gpu_lifecycle::{GraphicsContext, HeadlessDevice, Resource, ResourceManager, ShaderSource, Strategy, SurfaceState};

// ============================================================================
// Strategy dispatch
// ============================================================================

#[test]
fn once_requested_twice_prepares_once() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "once");

    manager.prepare(&r, Strategy::Once);
    manager.prepare(&r, Strategy::Once);
    assert_eq!(manager.drain_once(&mut ctx), 2);

    assert_eq!(r.prepares(), 1);
    assert!(r.id().is_present());
}

#[test]
fn once_on_allocated_resource_is_skipped() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "once");

    manager.prepare(&r, Strategy::Once);
    manager.drain_once(&mut ctx);
    manager.prepare(&r, Strategy::Once);
    manager.drain_once(&mut ctx);

    assert_eq!(r.prepares(), 1);
}

#[test]
fn once_force_prepares_an_allocated_resource_again() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "forced");

    manager.prepare(&r, Strategy::Once);
    manager.drain_once(&mut ctx);
    let handle = r.id();

    manager.prepare(&r, Strategy::OnceForce);
    manager.drain_once(&mut ctx);

    assert_eq!(r.prepares(), 2);
    assert_eq!(r.id(), handle);
}

#[test]
fn once_and_force_are_not_tracked() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let a = probe(&manager, "a");
    let b = probe(&manager, "b");

    manager.prepare(&a, Strategy::Once);
    manager.prepare(&b, Strategy::OnceForce);
    manager.drain_once(&mut ctx);

    assert_eq!(manager.tracked_count(), 0);
}

#[test]
fn on_surface_ready_is_tracked_but_not_prepared() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "deferred");

    manager.prepare(&r, Strategy::OnSurfaceReady);
    manager.drain_once(&mut ctx);

    assert_eq!(r.prepares(), 0);
    assert!(r.id().is_absent());
    assert!(manager.is_tracked(&(Arc::clone(&r) as Arc<dyn Resource>)));

    manager.on_surface_lost();
    manager.on_surface_ready(&mut ctx);
    assert_eq!(r.prepares(), 1);
    assert!(r.id().is_present());
}

#[test]
fn once_and_on_surface_ready_prepares_and_tracks() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "both");

    manager.prepare(&r, Strategy::OnceAndOnSurfaceReady);
    manager.drain_once(&mut ctx);

    assert_eq!(r.prepares(), 1);
    assert_eq!(manager.tracked_count(), 1);
}

#[test]
fn tracking_has_set_semantics() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "tracked");

    for _ in 0..5 {
        manager.prepare(&r, Strategy::OnceAndOnSurfaceReady);
    }
    manager.prepare(&r, Strategy::OnSurfaceReady);
    manager.drain_once(&mut ctx);

    assert_eq!(manager.tracked_count(), 1);
    assert_eq!(r.prepares(), 1);
}

#[test]
fn requests_are_handled_in_submission_order() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let first = probe(&manager, "first");
    let second = probe(&manager, "second");

    manager.prepare(&first, Strategy::Once);
    manager.prepare(&second, Strategy::Once);
    manager.drain_once(&mut ctx);

    assert!(first.id().raw() < second.id().raw());
}

#[test]
fn request_keeps_resource_alive_until_drained() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "short-lived");
    let weak = Arc::downgrade(&r);

    manager.prepare(&r, Strategy::Once);
    drop(r);
    assert!(weak.upgrade().is_some());

    manager.drain_once(&mut ctx);
    assert!(weak.upgrade().is_none());
    // The dropped resource was allocated, so its deletion is queued.
    assert_eq!(manager.pending_deletions(), 1);
}

// ============================================================================
// Surface gating
// ============================================================================

#[test]
fn drain_is_a_noop_while_surface_absent() {
    let manager = ResourceManager::new();
    let mut ctx = GraphicsContext::new(HeadlessDevice::new());
    let r = probe(&manager, "early");

    assert_eq!(manager.surface_state(), SurfaceState::SurfaceAbsent);
    manager.prepare(&r, Strategy::Once);
    assert_eq!(manager.drain_once(&mut ctx), 0);
    assert_eq!(manager.pending_requests(), 1);
    assert_eq!(r.prepares(), 0);

    let report = manager.on_surface_ready(&mut ctx);
    assert_eq!(report.requests, 1);
    assert_eq!(manager.pending_requests(), 0);
    assert_eq!(r.prepares(), 1);
    assert_eq!(manager.drain_once(&mut ctx), 0);
}

#[test]
fn surface_ready_prepares_requests_made_before_the_first_surface() {
    let manager = ResourceManager::new();
    let mut ctx = GraphicsContext::new(HeadlessDevice::new());
    let r = probe(&manager, "surface only");
    let scratch = manager.make_buffer("scratch", wgpu::BufferUsages::STORAGE, None);

    manager.prepare(&r, Strategy::OnSurfaceReady);
    assert_eq!(manager.drain_once(&mut ctx), 0);
    manager.on_surface_ready(&mut ctx);

    assert!(r.id().is_present());
    assert!(scratch.id().is_present());
    assert_eq!(r.prepares(), 1);
    assert!(manager.is_tracked(&(Arc::clone(&r) as Arc<dyn Resource>)));
    assert_eq!(manager.tracked_count(), 2);
}

#[test]
fn surface_ready_prepares_early_tracked_requests_once() {
    let manager = ResourceManager::new();
    let mut ctx = GraphicsContext::new(HeadlessDevice::new());
    let r = probe(&manager, "both");

    manager.prepare(&r, Strategy::OnceAndOnSurfaceReady);
    manager.on_surface_ready(&mut ctx);

    assert_eq!(r.prepares(), 1);
    assert_eq!(headless(&ctx).live_count(), 1);
}

#[test]
fn drain_defers_again_after_surface_loss() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = probe(&manager, "late");

    manager.on_surface_lost();
    manager.prepare(&r, Strategy::Once);
    assert_eq!(manager.drain_once(&mut ctx), 0);
    assert_eq!(manager.pending_requests(), 1);
}

// ============================================================================
// Fatal errors
// ============================================================================

#[test]
#[should_panic(expected = "fatal device error")]
fn failing_prepare_is_fatal() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let r = Arc::new(Probe::failing(manager.recycler().clone(), "oom"));

    manager.prepare(&r, Strategy::Once);
    manager.drain_once(&mut ctx);
}

#[test]
#[should_panic(expected = "fatal device error")]
fn program_link_failure_is_fatal() {
    let manager = ResourceManager::new();
    let mut ctx = ready_context(&manager);
    let _program = manager.make_program(
        "broken",
        ShaderSource {
            vertex: String::new(),
            vertex_entry: "vs_main".to_string(),
            fragment: "@fragment fn fs_main() {}".to_string(),
            fragment_entry: "fs_main".to_string(),
        },
    );
    manager.drain_once(&mut ctx);
}

#[test]
#[should_panic(expected = "fatal device error")]
fn allocation_over_device_limit_is_fatal() {
    let manager = ResourceManager::new();
    let mut ctx = GraphicsContext::new(HeadlessDevice::new().with_allocation_limit(16));
    manager.on_surface_ready(&mut ctx);

    let _buffer = manager.make_buffer(
        "too big",
        wgpu::BufferUsages::VERTEX,
        Some(Arc::new(gpu_lifecycle::ByteUploader::new(vec![0; 64]))),
    );
    manager.drain_once(&mut ctx);
}

// ============================================================================
// Strategy parsing
// ============================================================================

#[test]
fn strategies_parse_from_config_strings() {
    assert_eq!("once".parse::<Strategy>().unwrap(), Strategy::Once);
    assert_eq!("once_force".parse::<Strategy>().unwrap(), Strategy::OnceForce);
    assert_eq!("reload".parse::<Strategy>().unwrap(), Strategy::OnceForce);
    assert_eq!("on_surface_ready".parse::<Strategy>().unwrap(), Strategy::OnSurfaceReady);
    assert_eq!(
        "once_and_on_surface_ready".parse::<Strategy>().unwrap(),
        Strategy::OnceAndOnSurfaceReady
    );
    assert!("sometimes".parse::<Strategy>().is_err());
}

#[test]
fn strategies_deserialize_from_json() {
    let strategies: Vec<Strategy> = serde_json::from_str(r#"["once", "on_surface_ready"]"#).unwrap();
    assert_eq!(strategies, vec![Strategy::Once, Strategy::OnSurfaceReady]);
}
