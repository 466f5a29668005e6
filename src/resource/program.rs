use std::fmt;

use super::{DeletionTask, DeviceSlot, Handle, Resource, ResourceKind};
use crate::context::{GraphicsContext, ProgramDescriptor};
use crate::errors::Result;
use crate::recycler::RecycleQueue;

/// Shader stages of a program, already preprocessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub vertex_entry: String,
    pub fragment: String,
    pub fragment_entry: String,
}

impl ShaderSource {
    /// Both stages in one module, with the conventional `vs_main`/`fs_main`
    /// entry points.
    #[must_use]
    pub fn single_module(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            vertex: source.clone(),
            vertex_entry: "vs_main".to_string(),
            fragment: source,
            fragment_entry: "fs_main".to_string(),
        }
    }
}

/// Compiled and linked shader program.
pub struct Program {
    slot: DeviceSlot,
    label: String,
    source: ShaderSource,
}

impl Program {
    pub fn new(recycler: RecycleQueue, label: impl Into<String>, source: ShaderSource) -> Self {
        Self {
            slot: DeviceSlot::new(ResourceKind::Program, recycler),
            label: label.into(),
            source,
        }
    }

    #[must_use]
    pub fn source(&self) -> &ShaderSource {
        &self.source
    }
}

impl Resource for Program {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Program
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> Handle {
        self.slot.get()
    }

    fn prepare(&self, ctx: &mut GraphicsContext) -> Result<()> {
        // Programs cannot be patched in place; a forced refresh relinks.
        self.slot.take().execute(ctx);

        let handle = ctx.device_mut().create_program(&ProgramDescriptor {
            label: &self.label,
            vertex_source: &self.source.vertex,
            vertex_entry: &self.source.vertex_entry,
            fragment_source: &self.source.fragment,
            fragment_entry: &self.source.fragment_entry,
        })?;
        self.slot.set(handle);
        log::debug!("Linked program '{}' {}", self.label, handle);
        Ok(())
    }

    fn recycle(&self) -> DeletionTask {
        self.slot.take()
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("label", &self.label)
            .field("handle", &self.slot.get())
            .finish_non_exhaustive()
    }
}
