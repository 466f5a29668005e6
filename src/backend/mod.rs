//! [`RenderDevice`](crate::context::RenderDevice) implementations.

pub mod headless;
pub mod wgpu_device;

pub use headless::{DeviceEvent, HeadlessDevice, HeadlessObject};
pub use wgpu_device::{GpuBuffer, GpuFramebuffer, GpuProgram, GpuTexture, WgpuDevice};
