//! # Aurora Common
//!
//! Common types and shared abstractions for Project Aurora.
//!
//! This crate provides foundational types used across the streaming core:
//! - Coordinate types (world positions, chunk grid coordinates)
//! - World seed derivation
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod seed;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::seed::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_to_chunk_conversion() {
        let pos = WorldPos::new(100.0, -200.0);
        let chunk = pos.to_chunk_coord(64);

        assert_eq!(chunk, ChunkCoord::new(1, -4));
    }

    #[test]
    fn test_seed_stability() {
        let a = WorldSeed::from_str_seed("aurora");
        let b = WorldSeed::from_str_seed("aurora");
        assert_eq!(a, b);
    }

    #[test]
    fn test_numeric_seed_parses_directly() {
        let seed = WorldSeed::from_str_seed("42");
        assert_eq!(seed.value(), 42);
    }
}
