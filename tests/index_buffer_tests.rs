//! Index Synthesis Tests
//!
//! Tests for:
//! - quads / nine_patch / points: exact sequences and lengths
//! - IndexKind: counts per layout
//! - IndexUploader: byte output matches the synthesised sequence

use gpu_lifecycle::index_buffers::{NINE_PATCH_TEMPLATE, nine_patch, points, quads};
use gpu_lifecycle::{IndexKind, IndexUploader, Uploader};

// ============================================================================
// Quads
// ============================================================================

#[test]
fn quads_single_object() {
    assert_eq!(quads(1), vec![0, 2, 1, 2, 3, 1]);
}

#[test]
fn quads_offset_by_four_per_object() {
    assert_eq!(quads(2), vec![0, 2, 1, 2, 3, 1, 4, 6, 5, 6, 7, 5]);
}

#[test]
fn quads_length_is_six_per_object() {
    for n in [0, 1, 7, 100, 2048] {
        assert_eq!(quads(n).len(), 6 * n);
    }
}

// ============================================================================
// Nine-patch
// ============================================================================

#[test]
fn nine_patch_empty_for_zero_objects() {
    assert!(nine_patch(0).is_empty());
    assert_eq!(IndexKind::NinePatch.index_count(0), 0);
}

#[test]
fn nine_patch_single_object_is_the_template() {
    assert_eq!(nine_patch(1), NINE_PATCH_TEMPLATE.to_vec());
}

#[test]
fn nine_patch_length_is_thirty_per_object_minus_two() {
    for n in 1..=50 {
        assert_eq!(nine_patch(n).len(), 30 * n - 2);
    }
}

#[test]
fn nine_patch_objects_are_joined_by_degenerate_pairs() {
    let n = 4;
    let indices = nine_patch(n);
    for i in 0..n - 1 {
        let joint = 28 * (i + 1) + 2 * i;
        assert_eq!(indices[joint], (15 + 16 * i) as u32);
        assert_eq!(indices[joint + 1], (16 * (i + 1)) as u32);
    }
}

#[test]
fn nine_patch_second_object_is_offset_template() {
    let indices = nine_patch(2);
    let second: Vec<u32> = NINE_PATCH_TEMPLATE.iter().map(|i| i + 16).collect();
    assert_eq!(&indices[30..], second.as_slice());
}

// ============================================================================
// Points
// ============================================================================

#[test]
fn points_are_the_identity_sequence() {
    assert_eq!(points(5), vec![0, 1, 2, 3, 4]);
    assert!(points(0).is_empty());
}

// ============================================================================
// IndexKind & IndexUploader
// ============================================================================

#[test]
fn index_count_matches_synthesised_length() {
    for kind in IndexKind::ALL {
        for n in [0, 1, 3, 64] {
            assert_eq!(kind.synthesize(n).len(), kind.index_count(n), "{kind} x {n}");
        }
    }
}

#[test]
fn vertices_per_object() {
    assert_eq!(IndexKind::Quads.vertices_per_object(), 4);
    assert_eq!(IndexKind::NinePatch.vertices_per_object(), 16);
    assert_eq!(IndexKind::Points.vertices_per_object(), 1);
}

#[test]
fn uploader_writes_native_endian_u32() {
    let uploader = IndexUploader::new(IndexKind::Quads, 3);
    let mut bytes = vec![0u8; uploader.size()];
    uploader.write_to(&mut bytes);

    let decoded: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    assert_eq!(decoded, quads(3));
}

#[test]
fn synthesis_is_deterministic() {
    assert_eq!(nine_patch(17), nine_patch(17));
    assert_eq!(IndexUploader::new(IndexKind::Points, 9).to_bytes(), IndexUploader::new(IndexKind::Points, 9).to_bytes());
}
