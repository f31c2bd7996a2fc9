//! Coordinate types for world positions and the chunk grid.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A position in continuous world space.
///
/// The field is a 2D height function: `x` and `z` span the horizontal
/// plane and height is derived, so positions carry no vertical component.
/// Double precision is required to avoid banding artifacts far from the
/// origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct WorldPos {
    /// X coordinate in world units
    pub x: f64,
    /// Z coordinate in world units
    pub z: f64,
}

impl WorldPos {
    /// Creates a new world position.
    #[must_use]
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Converts to the chunk coordinate containing this position.
    #[must_use]
    pub fn to_chunk_coord(self, chunk_size: u32) -> ChunkCoord {
        let size = f64::from(chunk_size);
        ChunkCoord {
            x: (self.x / size).floor() as i32,
            z: (self.z / size).floor() as i32,
        }
    }

    /// Squared distance to another position, in world units.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Z coordinate in chunk space
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World-space origin of this chunk (minimum-corner).
    #[must_use]
    pub fn to_world_origin(self, chunk_size: u32) -> WorldPos {
        let size = f64::from(chunk_size);
        WorldPos {
            x: f64::from(self.x) * size,
            z: f64::from(self.z) * size,
        }
    }

    /// Squared distance to another chunk coordinate, in chunk units.
    ///
    /// Total over the whole grid: the subtraction is widened to `i64` and
    /// the squares saturate, so opposite corners compare correctly
    /// instead of overflowing.
    #[must_use]
    pub const fn distance_squared_to(self, other: Self) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dz = self.z as i64 - other.z as i64;
        dx.saturating_mul(dx).saturating_add(dz.saturating_mul(dz))
    }
}
