//! Index Sequence Synthesis
//!
//! Pure generators for the index buffers of common primitive layouts:
//!
//! | Kind        | Vertices / object | Indices for `n` objects |
//! |-------------|-------------------|-------------------------|
//! | `Quads`     | 4                 | `6n`                    |
//! | `NinePatch` | 16 (4×4 grid)     | `30n − 2`               |
//! | `Points`    | 1                 | `n`                     |
//!
//! Output depends on `n` alone, so one buffer built for `n` objects serves
//! every draw of up to `n` objects. [`SharedIndexBuffers`] relies on this to
//! keep a single grow-only buffer per layout.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{LifecycleError, Result};
use crate::resource::{Buffer, Uploader};

/// Index element type of every synthesised buffer.
pub type IndexElement = u32;

pub const INDEX_FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint32;

/// Triangle-strip walk over a 4×4 control grid.
pub const NINE_PATCH_TEMPLATE: [IndexElement; 28] = [
    0, 4, 1, 5, 2, 6, 3, 7, 7, 4, 4, 8, 5, 9, 6, 10, 7, 11, 11, 8, 8, 12, 9, 13, 10, 14, 11, 15,
];

const QUAD_TEMPLATE: [IndexElement; 6] = [0, 2, 1, 2, 3, 1];

// ============================================================================
// IndexKind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Quads,
    NinePatch,
    Points,
}

impl IndexKind {
    pub const ALL: [IndexKind; 3] = [IndexKind::Quads, IndexKind::NinePatch, IndexKind::Points];

    #[must_use]
    pub const fn vertices_per_object(self) -> usize {
        match self {
            Self::Quads => 4,
            Self::NinePatch => 16,
            Self::Points => 1,
        }
    }

    /// Number of indices generated for `object_count` objects.
    #[must_use]
    pub const fn index_count(self, object_count: usize) -> usize {
        match self {
            Self::Quads => object_count * QUAD_TEMPLATE.len(),
            Self::NinePatch => {
                if object_count == 0 {
                    0
                } else {
                    (NINE_PATCH_TEMPLATE.len() + 2) * object_count - 2
                }
            }
            Self::Points => object_count,
        }
    }

    /// Synthesises the sequence for `object_count` objects.
    #[must_use]
    pub fn synthesize(self, object_count: usize) -> Vec<IndexElement> {
        match self {
            Self::Quads => quads(object_count),
            Self::NinePatch => nine_patch(object_count),
            Self::Points => points(object_count),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quads => "quads",
            Self::NinePatch => "nine_patch",
            Self::Points => "points",
        })
    }
}

impl FromStr for IndexKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quads" | "quad" => Ok(Self::Quads),
            "nine_patch" | "ninepatch" | "nine-patch" => Ok(Self::NinePatch),
            "points" | "point" => Ok(Self::Points),
            _ => Err(LifecycleError::UnknownIndexKind(s.to_string())),
        }
    }
}

// ============================================================================
// Generators
// ============================================================================

/// Two triangles per quad: `(0,2,1)` and `(2,3,1)`, offset by `4i`.
#[must_use]
pub fn quads(object_count: usize) -> Vec<IndexElement> {
    let mut indices = Vec::with_capacity(IndexKind::Quads.index_count(object_count));
    for i in 0..object_count {
        let offset = (i * 4) as IndexElement;
        indices.extend(QUAD_TEMPLATE.iter().map(|&index| index + offset));
    }
    indices
}

/// One strip for all grids, joined by degenerate pairs.
///
/// Between objects `i` and `i + 1` the last index of `i` and the first index
/// of `i + 1` are repeated, producing zero-area triangles that stitch the
/// grids into a single strip draw.
#[must_use]
pub fn nine_patch(object_count: usize) -> Vec<IndexElement> {
    let mut indices = Vec::with_capacity(IndexKind::NinePatch.index_count(object_count));
    for i in 0..object_count {
        let offset = (i * 16) as IndexElement;
        indices.extend(NINE_PATCH_TEMPLATE.iter().map(|&index| index + offset));
        if i + 1 != object_count {
            indices.push(15 + offset);
            indices.push(offset + 16);
        }
    }
    indices
}

#[must_use]
pub fn points(object_count: usize) -> Vec<IndexElement> {
    (0..object_count as IndexElement).collect()
}

// ============================================================================
// IndexUploader
// ============================================================================

/// Streams a synthesised sequence into a buffer upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexUploader {
    kind: IndexKind,
    object_count: usize,
}

impl IndexUploader {
    #[must_use]
    pub fn new(kind: IndexKind, object_count: usize) -> Self {
        Self { kind, object_count }
    }

    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.object_count
    }
}

impl Uploader for IndexUploader {
    fn size(&self) -> usize {
        self.kind.index_count(self.object_count) * std::mem::size_of::<IndexElement>()
    }

    fn write_to(&self, dst: &mut [u8]) {
        let indices = self.kind.synthesize(self.object_count);
        dst.copy_from_slice(bytemuck::cast_slice(&indices));
    }

    fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.kind.synthesize(self.object_count)).to_vec()
    }
}

// ============================================================================
// Shared index buffers
// ============================================================================

/// A view of the first `index_count` indices of a shared buffer.
#[derive(Debug, Clone)]
pub struct IndexBufferSnapshot {
    pub kind: IndexKind,
    pub buffer: Arc<Buffer>,
    pub index_count: u32,
}

impl IndexBufferSnapshot {
    /// Byte length of the indices this snapshot draws.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.index_count) * std::mem::size_of::<IndexElement>() as u64
    }
}

struct SharedIndexBuffer {
    buffer: Arc<Buffer>,
    capacity: usize,
}

/// One grow-only index buffer per [`IndexKind`].
///
/// Replaced buffers are not destroyed here: draws recorded this frame may
/// still hold them, and they are reclaimed by the expiration sweep once the
/// last snapshot is gone.
#[derive(Default)]
pub(crate) struct SharedIndexBuffers {
    buffers: FxHashMap<IndexKind, SharedIndexBuffer>,
}

impl SharedIndexBuffers {
    /// Returns the cached buffer if its capacity covers `object_count`,
    /// otherwise builds a replacement through `make` with
    /// `object_count * reserve_factor` capacity. The second value is `true`
    /// when a new buffer was created.
    pub fn acquire<F>(
        &mut self,
        kind: IndexKind,
        object_count: usize,
        reserve_factor: usize,
        make: F,
    ) -> (IndexBufferSnapshot, bool)
    where
        F: FnOnce(IndexUploader) -> Arc<Buffer>,
    {
        let index_count = kind.index_count(object_count) as u32;

        if let Some(shared) = self.buffers.get(&kind)
            && shared.capacity >= object_count
        {
            let snapshot = IndexBufferSnapshot {
                kind,
                buffer: Arc::clone(&shared.buffer),
                index_count,
            };
            return (snapshot, false);
        }

        let previous = self.buffers.get(&kind).map_or(0, |shared| shared.capacity);
        let capacity = (object_count * reserve_factor.max(1)).max(object_count).max(previous);
        log::debug!("Growing shared {kind} index buffer: {previous} -> {capacity} objects");

        let buffer = make(IndexUploader::new(kind, capacity));
        self.buffers.insert(
            kind,
            SharedIndexBuffer {
                buffer: Arc::clone(&buffer),
                capacity,
            },
        );
        (
            IndexBufferSnapshot {
                kind,
                buffer,
                index_count,
            },
            true,
        )
    }

    pub fn capacity(&self, kind: IndexKind) -> usize {
        self.buffers.get(&kind).map_or(0, |shared| shared.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_patch_degenerate_pair_joins_objects() {
        let indices = nine_patch(2);
        assert_eq!(indices[28], 15);
        assert_eq!(indices[29], 16);
        assert_eq!(indices[30], 16);
    }

    #[test]
    fn uploader_size_matches_generated_bytes() {
        for kind in IndexKind::ALL {
            let uploader = IndexUploader::new(kind, 7);
            assert_eq!(uploader.to_bytes().len(), uploader.size());
        }
    }

    #[test]
    fn kinds_parse_from_names() {
        assert_eq!("nine_patch".parse::<IndexKind>().unwrap(), IndexKind::NinePatch);
        assert_eq!("Quads".parse::<IndexKind>().unwrap(), IndexKind::Quads);
        assert!("triangles".parse::<IndexKind>().is_err());
    }
}
