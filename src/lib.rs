#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Deferred creation, batched destruction and surface-loss recovery for GPU
//! resources.
//!
//! Producers on any thread hand resources to a [`ResourceManager`] with a
//! [`Strategy`]; the device thread prepares them once per frame, deletes
//! abandoned ones on a fixed cadence, and rebuilds every tracked resource when
//! the rendering surface comes back after being lost.

pub mod backend;
pub mod context;
pub mod device_thread;
pub mod errors;
pub mod index_buffers;
pub mod manager;
pub mod recycler;
pub mod resource;
pub mod scheduler;
pub mod settings;
pub mod surface;
pub mod tracker;

pub use backend::{DeviceEvent, HeadlessDevice, WgpuDevice};
pub use context::{GraphicsContext, RenderDevice};
pub use errors::{LifecycleError, Result};
pub use index_buffers::{INDEX_FORMAT, IndexBufferSnapshot, IndexKind, IndexUploader};
pub use manager::{ResourceManager, SweepOutcome};
pub use recycler::RecycleQueue;
pub use resource::{
    Bitmap, Buffer, ByteUploader, DeletionTask, DeviceSlot, Framebuffer, Handle, Program, Resource, ResourceKind,
    ShaderSource, Texture, Uploader,
};
pub use scheduler::{PreparationRequest, PreparationScheduler, Strategy};
pub use settings::{ManagerSettings, SweepCadence};
pub use surface::{RecoveryReport, SurfaceState};
pub use tracker::{ExpirableEntry, ExpirationTracker};
