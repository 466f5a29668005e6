//! Drives the lifecycle manager against a real wgpu device without a window.
//!
//! Builds a few tracked resources, renders frames into an offscreen
//! framebuffer, then simulates a surface loss and shows that every tracked
//! resource comes back with a new device object.
//!
//! ```text
//! RUST_LOG=gpu_lifecycle=debug cargo run --example wgpu_frames
//! ```

use std::sync::Arc;

use anyhow::Context;
use gpu_lifecycle::{
    Bitmap, GraphicsContext, INDEX_FORMAT, IndexKind, Resource, ResourceManager, ShaderSource, Strategy, Texture,
    WgpuDevice,
};

const SHADER: &str = r"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(index & 1u) * 2.0 - 1.0;
    let y = f32((index >> 1u) & 1u) * 2.0 - 1.0;
    return vec4<f32>(x * 0.5, y * 0.5, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.5, 0.2, 1.0);
}
";

const FRAMES: u64 = 600;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(device) = pollster::block_on(create_device())? else {
        log::warn!("No wgpu adapter available, nothing to demo");
        return Ok(());
    };

    let manager = Arc::new(ResourceManager::new());
    let mut ctx = GraphicsContext::new(device);
    manager.on_surface_ready(&mut ctx);

    let program = manager.make_program("quad program", ShaderSource::single_module(SHADER));
    let albedo = manager.make_texture(
        "albedo",
        Arc::new(Bitmap::solid_rgba8(16, 16, [200, 120, 40, 255])),
        Strategy::OnceAndOnSurfaceReady,
    );
    let target = manager.create_managed(|recycler| {
        Texture::render_target(recycler, "offscreen color", 256, 256, wgpu::TextureFormat::Rgba8Unorm)
    });
    let framebuffer = manager.make_framebuffer("offscreen", [Arc::clone(&target)], None)?;

    // A worker thread asks for geometry while the device thread renders.
    let producer = {
        let manager = Arc::clone(&manager);
        std::thread::spawn(move || manager.shared_index_buffer(IndexKind::Quads, 64))
    };
    let indices = producer.join().map_err(|_| anyhow::anyhow!("index producer panicked"))?;

    for frame in 0..FRAMES {
        manager.drain_once(&mut ctx);
        render(&ctx, &framebuffer, &indices).context("render frame")?;
        let outcome = manager.sweep(&mut ctx);

        if frame == FRAMES / 2 {
            log::info!("Simulating surface loss at tick {}", outcome.tick);
            let before = [program.id(), albedo.id(), framebuffer.id(), indices.buffer.id()];
            manager.on_surface_lost();
            let report = manager.on_surface_ready(&mut ctx);
            let after = [program.id(), albedo.id(), framebuffer.id(), indices.buffer.id()];
            log::info!("Recovered {} resources: {before:?} -> {after:?}", report.prepared);
        }
    }

    let flushed = manager.flush_deletions(&mut ctx);
    let device = ctx.downcast_ref::<WgpuDevice>().context("wgpu backend")?;
    log::info!(
        "Done after {} ticks: {} live device objects, {} final deletions, {} tracked",
        manager.tick(),
        device.live_count(),
        flushed,
        manager.tracked_count()
    );
    Ok(())
}

async fn create_device() -> anyhow::Result<Option<WgpuDevice>> {
    let instance = wgpu::Instance::default();
    let Ok(adapter) = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    else {
        return Ok(None);
    };

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("lifecycle demo"),
            ..Default::default()
        })
        .await?;
    // wgpu's default uncaptured error handler panics, so shader errors stay fatal.
    Ok(Some(WgpuDevice::new(device, queue)))
}

fn render(
    ctx: &GraphicsContext,
    framebuffer: &gpu_lifecycle::Framebuffer,
    indices: &gpu_lifecycle::IndexBufferSnapshot,
) -> anyhow::Result<()> {
    let device = ctx.downcast_ref::<WgpuDevice>().context("wgpu backend")?;
    let (Some(target), Some(index_buffer)) = (device.framebuffer(framebuffer.id()), device.buffer(indices.buffer.id()))
    else {
        // Not prepared yet; the next drain will allocate it.
        return Ok(());
    };

    let mut encoder = device
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("offscreen clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color[0],
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        pass.set_index_buffer(index_buffer.slice(..indices.byte_len()), INDEX_FORMAT);
    }
    device.queue().submit(Some(encoder.finish()));
    Ok(())
}
