//! Chunk geometry construction and level of detail.
//!
//! A chunk mesh is a regular grid of field samples over the chunk
//! footprint. Lower detail levels sample the same footprint with a larger
//! stride, so every level spans the full chunk and neighboring chunks of
//! different detail still abut. The triangle index pattern depends only on
//! the grid resolution, so one shared buffer per detail level serves every
//! chunk.

use aurora_common::ChunkCoord;
use aurora_field::FieldCache;
use serde::{Deserialize, Serialize};

use crate::config::StreamConfig;

/// Sampling resolution chosen for a chunk from its distance to the
/// viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetailLevel {
    /// Full resolution, for the viewpoint's immediate surroundings.
    High,
    /// Half resolution.
    Medium,
    /// Quarter resolution, for distant chunks.
    Low,
}

impl DetailLevel {
    /// All levels, ordered from finest to coarsest.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Chooses a detail level from squared chunk distance to the
    /// viewpoint's chunk.
    #[must_use]
    pub const fn for_chunk_distance_squared(dist2: i64) -> Self {
        if dist2 <= 1 {
            Self::High
        } else if dist2 <= 4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Sampling stride multiplier for this level.
    #[must_use]
    pub const fn stride(self, config: &StreamConfig) -> u32 {
        match self {
            Self::High => 1,
            Self::Medium => config.medium_stride,
            Self::Low => config.low_stride,
        }
    }

    /// Dense index for per-level lookup tables.
    #[must_use]
    pub const fn table_index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

/// Vertices along one side of a chunk grid at the given level.
#[must_use]
pub fn vertices_per_side(config: &StreamConfig, lod: DetailLevel) -> u32 {
    config.resolution / lod.stride(config) + 1
}

/// Total vertex count of a chunk grid at the given level.
#[must_use]
pub fn vertex_count(config: &StreamConfig, lod: DetailLevel) -> usize {
    let side = vertices_per_side(config, lod) as usize;
    side * side
}

/// Finished position/color buffers for one chunk, ready to copy into a
/// pool slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBuffers {
    /// Vertex positions, 3 floats per vertex: chunk-local x, height, z.
    pub positions: Vec<f32>,
    /// Vertex colors, 3 floats per vertex.
    pub colors: Vec<f32>,
}

impl GeometryBuffers {
    /// Creates buffers with capacity for `vertex_count` vertices.
    #[must_use]
    pub fn with_capacity(vertex_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            colors: Vec::with_capacity(vertex_count * 3),
        }
    }
}

/// Builds chunk geometry by sampling the field over the chunk footprint.
///
/// Positions are chunk-local (the world offset is carried separately), so
/// f32 precision is safe arbitrarily far from the origin; sampling itself
/// happens in f64 world space. Output is clear-then-extend, so reused
/// buffers keep their capacity. Identical inputs produce identical buffers
/// on any thread.
pub fn build_geometry(
    cache: &FieldCache,
    coord: ChunkCoord,
    lod: DetailLevel,
    config: &StreamConfig,
    out: &mut GeometryBuffers,
) {
    let side = vertices_per_side(config, lod);
    let origin = coord.to_world_origin(config.chunk_size);
    let step = f64::from(config.chunk_size) / f64::from(side - 1);

    out.positions.clear();
    out.colors.clear();

    for gz in 0..side {
        for gx in 0..side {
            let local_x = f64::from(gx) * step;
            let local_z = f64::from(gz) * step;
            let sample = cache.get_or_compute(origin.x + local_x, origin.z + local_z);

            #[allow(clippy::cast_possible_truncation)]
            out.positions
                .extend_from_slice(&[local_x as f32, sample.height as f32, local_z as f32]);
            out.colors.extend_from_slice(&sample.color.to_array());
        }
    }
}

/// Builds the shared triangle index pattern for a grid with
/// `vertices_per_side` vertices along each side.
///
/// Two counter-clockwise triangles per grid quad. The pattern is the same
/// for every chunk at a given detail level; the renderer receives it once.
#[must_use]
pub fn index_pattern(vertices_per_side: u32) -> Vec<u32> {
    let quads = vertices_per_side - 1;
    let mut indices = Vec::with_capacity((quads * quads * 6) as usize);

    for qz in 0..quads {
        for qx in 0..quads {
            let top_left = qz * vertices_per_side + qx;
            let top_right = top_left + 1;
            let bottom_left = top_left + vertices_per_side;
            let bottom_right = bottom_left + 1;

            indices.extend_from_slice(&[
                top_left,
                bottom_left,
                top_right,
                top_right,
                bottom_left,
                bottom_right,
            ]);
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_common::WorldSeed;
    use aurora_field::Field;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn test_cache() -> FieldCache {
        FieldCache::new(Arc::new(Field::new(WorldSeed::new(42))), 4096)
    }

    #[test]
    fn test_detail_level_buckets() {
        assert_eq!(DetailLevel::for_chunk_distance_squared(0), DetailLevel::High);
        assert_eq!(DetailLevel::for_chunk_distance_squared(1), DetailLevel::High);
        assert_eq!(DetailLevel::for_chunk_distance_squared(2), DetailLevel::Medium);
        assert_eq!(DetailLevel::for_chunk_distance_squared(4), DetailLevel::Medium);
        assert_eq!(DetailLevel::for_chunk_distance_squared(5), DetailLevel::Low);
        assert_eq!(DetailLevel::for_chunk_distance_squared(100), DetailLevel::Low);
    }

    #[test]
    fn test_vertex_counts_per_level() {
        let config = StreamConfig::default();
        assert_eq!(vertices_per_side(&config, DetailLevel::High), 33);
        assert_eq!(vertices_per_side(&config, DetailLevel::Medium), 17);
        assert_eq!(vertices_per_side(&config, DetailLevel::Low), 9);
        assert_eq!(vertex_count(&config, DetailLevel::High), 33 * 33);
    }

    #[test]
    fn test_geometry_shape() {
        let cache = test_cache();
        let config = StreamConfig::default();
        let mut out = GeometryBuffers::default();

        build_geometry(&cache, ChunkCoord::new(0, 0), DetailLevel::Low, &config, &mut out);

        let count = vertex_count(&config, DetailLevel::Low);
        assert_eq!(out.positions.len(), count * 3);
        assert_eq!(out.colors.len(), count * 3);
    }

    #[test]
    fn test_geometry_spans_full_chunk() {
        let cache = test_cache();
        let config = StreamConfig::default();
        let mut out = GeometryBuffers::default();

        build_geometry(&cache, ChunkCoord::new(2, -1), DetailLevel::Medium, &config, &mut out);

        // First vertex sits at the chunk origin, last at the far corner
        assert!((out.positions[0]).abs() < 1e-6);
        assert!((out.positions[2]).abs() < 1e-6);
        let last = out.positions.len() - 3;
        let size = config.chunk_size as f32;
        assert!((out.positions[last] - size).abs() < 1e-4);
        assert!((out.positions[last + 2] - size).abs() < 1e-4);
    }

    #[test]
    fn test_geometry_deterministic_across_caches() {
        // Fallback correctness relies on worker and foreground builds
        // agreeing exactly, including through separate caches.
        let config = StreamConfig::default();
        let coord = ChunkCoord::new(3, 4);

        let mut a = GeometryBuffers::default();
        let mut b = GeometryBuffers::default();
        build_geometry(&test_cache(), coord, DetailLevel::High, &config, &mut a);
        build_geometry(&test_cache(), coord, DetailLevel::High, &config, &mut b);

        assert_eq!(a, b);
    }

    #[test]
    fn test_index_pattern_counts() {
        let indices = index_pattern(3);
        // 2x2 quads, 6 indices each
        assert_eq!(indices.len(), 24);
        assert!(indices.iter().all(|&i| i < 9));
    }

    #[test]
    fn test_index_pattern_covers_all_vertices() {
        let side = 5;
        let indices = index_pattern(side);
        let used: std::collections::HashSet<_> = indices.iter().copied().collect();
        assert_eq!(used.len(), (side * side) as usize);
    }

    proptest! {
        #[test]
        fn prop_index_pattern_in_bounds(side in 2_u32..65) {
            let indices = index_pattern(side);
            let quads = side - 1;
            prop_assert_eq!(indices.len(), (quads * quads * 6) as usize);
            prop_assert!(indices.iter().all(|&i| i < side * side));
        }
    }

    #[test]
    fn test_reused_buffers_keep_capacity() {
        let cache = test_cache();
        let config = StreamConfig::default();
        let mut out = GeometryBuffers::with_capacity(vertex_count(&config, DetailLevel::High));

        build_geometry(&cache, ChunkCoord::new(0, 0), DetailLevel::High, &config, &mut out);
        let cap = out.positions.capacity();
        build_geometry(&cache, ChunkCoord::new(1, 0), DetailLevel::Low, &config, &mut out);
        assert_eq!(out.positions.capacity(), cap);
    }
}
