//! # Aurora Stream
//!
//! Chunk streaming for Project Aurora: keeps the terrain around a moving
//! viewpoint resident as renderable geometry, within a fixed memory
//! budget.
//!
//! The [`StreamManager`] is the entry point. Each tick it is handed the
//! current viewpoint and it decides which chunks are required, generates
//! the closest missing ones first (optionally on a background worker),
//! recycles geometry buffers through a fixed [`BufferPool`], and evicts
//! chunks that fell out of range. Geometry is produced by sampling the
//! deterministic field from [`aurora_field`], so the same seed always
//! streams the same world.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod manager;
pub mod mesh;
pub mod offload;
pub mod pool;

pub use config::StreamConfig;
pub use manager::{ChunkState, ChunkView, StreamManager, StreamStats};
pub use mesh::{DetailLevel, GeometryBuffers};
pub use offload::{GeometryRequest, GeometryResponse, OffloadChannel};
pub use pool::{Acquire, BufferPool, PoolSlot, SlotId};
