//! Fixed-capacity geometry buffer pool.
//!
//! The pool pre-allocates every slot at construction and never grows,
//! which bounds worst-case geometry memory no matter how far the world is
//! explored. Chunks borrow a slot while generating or active and return it
//! on eviction; when every slot is taken, acquiring reclaims the
//! least-recently-used slot and reports which chunk lost it so the manager
//! can evict that chunk. Pool exhaustion is a designed trigger, not an
//! error.

use aurora_common::ChunkCoord;
use tracing::debug;

use crate::mesh::GeometryBuffers;

/// Identifier of a slot within the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// Returns the raw slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A pre-allocated, reusable geometry buffer.
#[derive(Debug)]
pub struct PoolSlot {
    /// Vertex positions and colors for the owning chunk.
    pub geometry: GeometryBuffers,
    /// Whether a chunk currently owns this slot.
    in_use: bool,
    /// The owning chunk, while in use.
    owner: Option<ChunkCoord>,
    /// Acquisition/touch counter value, for LRU reclamation.
    last_used: u64,
}

impl PoolSlot {
    fn new(vertex_capacity: usize) -> Self {
        Self {
            geometry: GeometryBuffers::with_capacity(vertex_capacity),
            in_use: false,
            owner: None,
            last_used: 0,
        }
    }

    /// Whether a chunk currently owns this slot.
    #[must_use]
    pub const fn in_use(&self) -> bool {
        self.in_use
    }

    /// The owning chunk, while in use.
    #[must_use]
    pub const fn owner(&self) -> Option<ChunkCoord> {
        self.owner
    }
}

/// Outcome of acquiring a slot.
#[derive(Debug, PartialEq, Eq)]
pub enum Acquire {
    /// A free slot was available.
    Fresh(SlotId),
    /// The pool was exhausted; the least-recently-used slot was reclaimed
    /// and its previous owner must be evicted by the caller.
    Reclaimed {
        /// The reassigned slot.
        slot: SlotId,
        /// The chunk that lost the slot.
        evicted: ChunkCoord,
    },
}

impl Acquire {
    /// The acquired slot, regardless of how it was obtained.
    #[must_use]
    pub const fn slot(&self) -> SlotId {
        match self {
            Self::Fresh(slot) | Self::Reclaimed { slot, .. } => *slot,
        }
    }
}

/// Fixed-size pool of reusable geometry buffers.
#[derive(Debug)]
pub struct BufferPool {
    slots: Vec<PoolSlot>,
    /// Monotonic counter backing `last_used`.
    clock: u64,
}

impl BufferPool {
    /// Creates a pool of `pool_size` slots, each with room for
    /// `vertex_capacity` vertices.
    #[must_use]
    pub fn new(pool_size: usize, vertex_capacity: usize) -> Self {
        Self {
            slots: (0..pool_size).map(|_| PoolSlot::new(vertex_capacity)).collect(),
            clock: 0,
        }
    }

    /// Total slot count; constant for the lifetime of the pool.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently owned by chunks.
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// Acquires a slot for `owner`. Never blocks, never allocates.
    ///
    /// Returns `None` only for a zero-sized pool. When no slot is free,
    /// the least-recently-used in-use slot is reassigned and its previous
    /// owner reported for eviction.
    pub fn acquire(&mut self, owner: ChunkCoord) -> Option<Acquire> {
        self.clock += 1;

        if let Some(index) = self.slots.iter().position(|s| !s.in_use) {
            let slot = &mut self.slots[index];
            slot.in_use = true;
            slot.owner = Some(owner);
            slot.last_used = self.clock;
            return Some(Acquire::Fresh(SlotId(index)));
        }

        // Exhausted: reclaim the stalest in-use slot
        let (index, evicted) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.owner.map(|o| (i, o, s.last_used)))
            .min_by_key(|&(_, _, last_used)| last_used)
            .map(|(i, o, _)| (i, o))?;

        debug!("Pool exhausted, reclaiming slot {index} from chunk {evicted:?}");

        let slot = &mut self.slots[index];
        slot.in_use = true;
        slot.owner = Some(owner);
        slot.last_used = self.clock;
        Some(Acquire::Reclaimed {
            slot: SlotId(index),
            evicted,
        })
    }

    /// Releases a slot back to the pool. Releasing an already-free slot is
    /// a no-op; the caller must not touch the slot's buffers afterward.
    pub fn release(&mut self, id: SlotId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.in_use = false;
            slot.owner = None;
        }
    }

    /// Marks a slot as recently used, protecting it from LRU reclamation.
    pub fn touch(&mut self, id: SlotId) {
        self.clock += 1;
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.last_used = self.clock;
        }
    }

    /// Borrows a slot.
    #[must_use]
    pub fn slot(&self, id: SlotId) -> &PoolSlot {
        &self.slots[id.0]
    }

    /// Mutably borrows a slot for geometry writes.
    ///
    /// Writes are only valid while the calling chunk owns the slot
    /// exclusively (pool exclusivity invariant).
    #[must_use]
    pub fn slot_mut(&mut self, id: SlotId) -> &mut PoolSlot {
        &mut self.slots[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(x: i32, z: i32) -> ChunkCoord {
        ChunkCoord::new(x, z)
    }

    #[test]
    fn test_fresh_acquisition() {
        let mut pool = BufferPool::new(2, 16);
        let a = pool.acquire(coord(0, 0)).expect("non-empty pool");
        assert!(matches!(a, Acquire::Fresh(_)));
        assert_eq!(pool.in_use_count(), 1);
    }

    #[test]
    fn test_exhaustion_reclaims_lru() {
        let mut pool = BufferPool::new(2, 16);
        let first = pool.acquire(coord(0, 0)).expect("slot");
        let _second = pool.acquire(coord(1, 0)).expect("slot");

        // Touch the first slot so the second becomes stalest
        pool.touch(first.slot());

        let third = pool.acquire(coord(2, 0)).expect("slot");
        match third {
            Acquire::Reclaimed { evicted, .. } => assert_eq!(evicted, coord(1, 0)),
            Acquire::Fresh(_) => panic!("expected reclamation"),
        }
        assert_eq!(pool.in_use_count(), 2);
        assert_eq!(pool.pool_size(), 2);
    }

    #[test]
    fn test_release_frees_slot() {
        let mut pool = BufferPool::new(1, 16);
        let a = pool.acquire(coord(0, 0)).expect("slot");
        pool.release(a.slot());
        assert_eq!(pool.in_use_count(), 0);

        let b = pool.acquire(coord(5, 5)).expect("slot");
        assert!(matches!(b, Acquire::Fresh(_)));
    }

    #[test]
    fn test_release_idempotent() {
        let mut pool = BufferPool::new(1, 16);
        let a = pool.acquire(coord(0, 0)).expect("slot");
        pool.release(a.slot());
        pool.release(a.slot());
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    fn test_zero_sized_pool() {
        let mut pool = BufferPool::new(0, 16);
        assert!(pool.acquire(coord(0, 0)).is_none());
    }

    #[test]
    fn test_pool_size_constant_under_churn() {
        let mut pool = BufferPool::new(4, 16);
        for i in 0..50 {
            let _ = pool.acquire(coord(i, 0));
        }
        assert_eq!(pool.pool_size(), 4);
        assert_eq!(pool.in_use_count(), 4);
    }

    #[test]
    fn test_buffers_keep_capacity_after_release() {
        let mut pool = BufferPool::new(1, 8);
        let a = pool.acquire(coord(0, 0)).expect("slot");
        let slot = pool.slot_mut(a.slot());
        slot.geometry.positions.extend_from_slice(&[1.0; 12]);
        let cap = slot.geometry.positions.capacity();
        pool.release(a.slot());

        let b = pool.acquire(coord(1, 1)).expect("slot");
        assert_eq!(pool.slot(b.slot()).geometry.positions.capacity(), cap);
    }
}
