//! Chunk stream manager.
//!
//! Tracks which chunks the current viewpoint requires, walks each one
//! through its lifecycle (queued, generating, active, evicting), and keeps
//! the whole working set inside the fixed buffer pool. Generation is paced
//! by a per-tick budget and ordered closest-first, so the terrain under
//! the viewpoint always materializes before the horizon.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use aurora_common::{ChunkCoord, WorldPos, WorldSeed};
use aurora_field::{Field, FieldCache, Rgb};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::mesh::{
    build_geometry, index_pattern, vertex_count, vertices_per_side, DetailLevel,
};
use crate::offload::{GeometryResponse, OffloadChannel};
use crate::pool::{Acquire, BufferPool, SlotId};

/// Lifecycle state of a chunk, as observed from outside the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not in the required set; the manager holds nothing for it.
    Unrequested,
    /// Required and waiting for a generation budget slot.
    Queued,
    /// Holds a pool slot; geometry is being computed.
    Generating,
    /// Holds a pool slot with finished geometry; visible to the renderer.
    Active,
    /// Left the required set; resources are released at the end of the
    /// current tick.
    Evicting,
}

/// Per-chunk bookkeeping. A record exists for every chunk that is not
/// `Unrequested`, and it holds a pool slot exactly while generating or
/// active.
#[derive(Debug)]
struct ChunkRecord {
    state: ChunkState,
    lod: DetailLevel,
    slot: Option<SlotId>,
    /// Correlation id of the in-flight offload request, while generating
    /// in the background.
    correlation_id: Option<u64>,
    /// When the in-flight request was issued, for timeout detection.
    issued_at: Option<Instant>,
}

impl ChunkRecord {
    fn queued(lod: DetailLevel) -> Self {
        Self {
            state: ChunkState::Queued,
            lod,
            slot: None,
            correlation_id: None,
            issued_at: None,
        }
    }
}

/// Generation queue entry, ordered closest-first.
///
/// Entries are never removed when a chunk leaves the queue; the pop loop
/// skips entries whose chunk is no longer queued.
#[derive(Debug, PartialEq, Eq)]
struct QueueEntry {
    dist2: i64,
    /// Insertion sequence; breaks distance ties in request order.
    seq: u64,
    coord: ChunkCoord,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the smallest distance first
        other
            .dist2
            .cmp(&self.dist2)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Streaming counters, refreshed every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    /// Chunks with finished geometry.
    pub active: usize,
    /// Chunks waiting for a generation budget slot.
    pub queued: usize,
    /// Chunks with an in-flight background request.
    pub generating: usize,
    /// Chunks that finished generating this tick.
    pub generated_this_tick: usize,
    /// Chunks evicted this tick.
    pub evicted_this_tick: usize,
    /// Total requests answered synchronously instead of by the worker.
    pub sync_fallbacks: u64,
    /// Total responses discarded because their request was no longer
    /// pending.
    pub stale_responses: u64,
    /// Total forced evictions caused by pool exhaustion.
    pub forced_reclaims: u64,
}

/// One active chunk's renderable geometry.
#[derive(Debug)]
pub struct ChunkView<'a> {
    /// Chunk grid coordinate.
    pub coord: ChunkCoord,
    /// World-space offset of the chunk origin; positions are relative to
    /// it.
    pub world_offset: (f64, f64),
    /// Detail level the geometry was sampled at.
    pub lod: DetailLevel,
    /// Vertex positions, 3 floats per vertex.
    pub positions: &'a [f32],
    /// Vertex colors, 3 floats per vertex.
    pub colors: &'a [f32],
}

/// Owns the chunk lifecycle: required-set tracking, prioritized
/// generation, pool residency, and the background offload protocol.
pub struct StreamManager {
    config: StreamConfig,
    cache: Arc<FieldCache>,
    pool: BufferPool,
    offload: OffloadChannel,

    chunks: AHashMap<ChunkCoord, ChunkRecord>,
    queue: BinaryHeap<QueueEntry>,
    /// In-flight correlation ids mapped back to their chunk. Removing an
    /// id here is what turns a late response stale.
    pending: AHashMap<u64, ChunkCoord>,

    /// Shared triangle indices, one buffer per detail level.
    index_patterns: [Vec<u32>; 3],

    viewpoint: WorldPos,
    viewpoint_chunk: ChunkCoord,
    /// Viewpoint at the last required-set evaluation, for movement
    /// hysteresis.
    last_eval: Option<WorldPos>,

    seq: u64,
    stats: StreamStats,
}

impl StreamManager {
    /// Creates a manager streaming the given field.
    ///
    /// The configuration is validated (clamped) before use. A background
    /// worker is spawned unless disabled in the configuration.
    #[must_use]
    pub fn new(field: Arc<Field>, mut config: StreamConfig) -> Self {
        config.validate();
        let cache = Arc::new(FieldCache::new(field, config.cache_capacity));

        let offload = if config.use_background_worker {
            OffloadChannel::spawn(Arc::clone(&cache), config.clone())
        } else {
            OffloadChannel::disabled()
        };

        Self::assemble(cache, config, offload)
    }

    /// Creates a manager from a seed with default field parameters.
    #[must_use]
    pub fn from_seed(seed: WorldSeed, config: StreamConfig) -> Self {
        Self::new(Arc::new(Field::new(seed)), config)
    }

    /// Assembles a manager around an existing channel; lets tests inject
    /// degenerate workers.
    fn assemble(cache: Arc<FieldCache>, config: StreamConfig, offload: OffloadChannel) -> Self {
        let index_patterns = DetailLevel::ALL
            .map(|lod| index_pattern(vertices_per_side(&config, lod)));

        let pool = BufferPool::new(
            config.pool_size,
            vertex_count(&config, DetailLevel::High),
        );

        info!(
            "Stream manager ready: radius {} chunks, pool {} slots, background worker: {}",
            config.chunk_radius(),
            config.pool_size,
            offload.is_background()
        );

        Self {
            config,
            cache,
            pool,
            offload,
            chunks: AHashMap::new(),
            queue: BinaryHeap::new(),
            pending: AHashMap::new(),
            index_patterns,
            viewpoint: WorldPos::new(0.0, 0.0),
            viewpoint_chunk: ChunkCoord::new(0, 0),
            last_eval: None,
            seq: 0,
            stats: StreamStats::default(),
        }
    }

    #[cfg(test)]
    fn with_channel(field: Arc<Field>, mut config: StreamConfig, offload: OffloadChannel) -> Self {
        config.validate();
        let cache = Arc::new(FieldCache::new(field, config.cache_capacity));
        Self::assemble(cache, config, offload)
    }

    /// Advances streaming by one tick for the given viewpoint.
    ///
    /// Collects finished background work, re-evaluates the required set if
    /// the viewpoint moved far enough, recovers timed-out requests, starts
    /// up to `chunks_per_frame` queued chunks, and releases everything
    /// marked for eviction.
    pub fn update(&mut self, viewpoint: WorldPos) {
        self.stats.generated_this_tick = 0;
        self.stats.evicted_this_tick = 0;
        self.viewpoint = viewpoint;

        for response in self.offload.try_collect() {
            self.apply_response(response);
        }

        let moved = self.last_eval.map_or(true, |last| {
            last.distance_squared(viewpoint)
                > self.config.update_threshold * self.config.update_threshold
        });
        if moved {
            self.last_eval = Some(viewpoint);
            self.viewpoint_chunk = viewpoint.to_chunk_coord(self.config.chunk_size);
            self.reevaluate();
        }

        self.recover_timeouts();
        self.advance_queue();
        self.sweep_evicting();
        self.refresh_counts();
    }

    /// Recomputes the required set around the viewpoint chunk: queues
    /// chunks that entered it, marks chunks that left it, and requeues
    /// active chunks whose detail bucket changed.
    fn reevaluate(&mut self) {
        let center = self.viewpoint_chunk;
        let radius = self.config.chunk_radius();
        let radius2 = i64::from(radius) * i64::from(radius);

        let departed: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(coord, record)| {
                record.state != ChunkState::Evicting
                    && coord.distance_squared_to(center) > radius2
            })
            .map(|(coord, _)| *coord)
            .collect();
        for coord in departed {
            self.mark_evicting(coord);
        }

        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let dist2 = i64::from(dx) * i64::from(dx) + i64::from(dz) * i64::from(dz);
                if dist2 > radius2 {
                    continue;
                }
                // Saturate at the grid edge; coordinates never wrap
                let coord =
                    ChunkCoord::new(center.x.saturating_add(dx), center.z.saturating_add(dz));
                let lod = DetailLevel::for_chunk_distance_squared(dist2);

                match self.chunks.get_mut(&coord) {
                    None => {
                        self.chunks.insert(coord, ChunkRecord::queued(lod));
                        self.queue.push(QueueEntry {
                            dist2,
                            seq: self.seq,
                            coord,
                        });
                        self.seq += 1;
                    },
                    Some(record) if record.state == ChunkState::Active => {
                        if record.lod == lod {
                            if let Some(slot) = record.slot {
                                // Still required at this resolution;
                                // shield its slot from LRU reclamation
                                self.pool.touch(slot);
                            }
                        } else {
                            // Regenerate at the new resolution
                            if let Some(slot) = record.slot.take() {
                                self.pool.release(slot);
                            }
                            record.state = ChunkState::Queued;
                            record.lod = lod;
                            self.queue.push(QueueEntry {
                                dist2,
                                seq: self.seq,
                                coord,
                            });
                            self.seq += 1;
                        }
                    },
                    Some(record) if record.state == ChunkState::Evicting => {
                        // Reclaimed by pool exhaustion earlier this tick
                        // but required again; restart from the queue
                        record.state = ChunkState::Queued;
                        record.lod = lod;
                        self.queue.push(QueueEntry {
                            dist2,
                            seq: self.seq,
                            coord,
                        });
                        self.seq += 1;
                    },
                    Some(record) if record.state == ChunkState::Queued => {
                        // Refresh resolution and priority for the new
                        // center; the old queue entry is skipped when it
                        // pops
                        record.lod = lod;
                        self.queue.push(QueueEntry {
                            dist2,
                            seq: self.seq,
                            coord,
                        });
                        self.seq += 1;
                    },
                    // Generating finishes at the resolution it started
                    // with; the result is re-bucketed on installation
                    Some(_) => {},
                }
            }
        }
    }

    /// Starts generation for the closest queued chunks, up to the per-tick
    /// budget.
    fn advance_queue(&mut self) {
        let mut started = 0;
        while started < self.config.chunks_per_frame {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            // Stale entry: the chunk was evicted or already started
            let lod = match self.chunks.get(&entry.coord) {
                Some(record) if record.state == ChunkState::Queued => record.lod,
                _ => continue,
            };

            let Some(acquired) = self.pool.acquire(entry.coord) else {
                warn!("Geometry pool has no slots; chunk streaming stalled");
                break;
            };
            if let Acquire::Reclaimed { evicted, .. } = acquired {
                self.on_slot_reclaimed(evicted);
                self.stats.forced_reclaims += 1;
            }
            let slot = acquired.slot();

            if let Some(record) = self.chunks.get_mut(&entry.coord) {
                record.slot = Some(slot);
                record.state = ChunkState::Generating;
            }

            if let Some(correlation_id) = self.offload.submit(entry.coord, lod) {
                if let Some(record) = self.chunks.get_mut(&entry.coord) {
                    record.correlation_id = Some(correlation_id);
                    record.issued_at = Some(Instant::now());
                }
                self.pending.insert(correlation_id, entry.coord);
            } else {
                self.generate_sync(entry.coord);
                self.stats.sync_fallbacks += 1;
            }

            started += 1;
        }
    }

    /// Computes a chunk's geometry on the calling thread, directly into
    /// its pool slot.
    fn generate_sync(&mut self, coord: ChunkCoord) {
        let Some(record) = self.chunks.get(&coord) else {
            return;
        };
        let lod = record.lod;
        let Some(slot) = record.slot else {
            return;
        };

        build_geometry(
            &self.cache,
            coord,
            lod,
            &self.config,
            &mut self.pool.slot_mut(slot).geometry,
        );
        self.pool.touch(slot);

        if let Some(record) = self.chunks.get_mut(&coord) {
            record.state = ChunkState::Active;
            record.correlation_id = None;
            record.issued_at = None;
        }
        self.stats.generated_this_tick += 1;
        self.rebucket_stale_lod(coord);
    }

    /// A request can finish after the viewpoint has moved. If the chunk's
    /// distance bucket changed while it was generating, requeue it at the
    /// resolution its distance now calls for; otherwise a stationary
    /// viewpoint would keep rendering the pre-movement detail level.
    fn rebucket_stale_lod(&mut self, coord: ChunkCoord) {
        let dist2 = coord.distance_squared_to(self.viewpoint_chunk);
        let radius = self.config.chunk_radius();
        if dist2 > i64::from(radius) * i64::from(radius) {
            // Left the required set; eviction handles it
            return;
        }
        let lod = DetailLevel::for_chunk_distance_squared(dist2);

        let Some(record) = self.chunks.get_mut(&coord) else {
            return;
        };
        if record.state != ChunkState::Active || record.lod == lod {
            return;
        }
        if let Some(slot) = record.slot.take() {
            self.pool.release(slot);
        }
        record.state = ChunkState::Queued;
        record.lod = lod;
        self.queue.push(QueueEntry {
            dist2,
            seq: self.seq,
            coord,
        });
        self.seq += 1;
    }

    /// Installs a finished background response, unless its request is no
    /// longer pending.
    fn apply_response(&mut self, response: GeometryResponse) {
        let Some(coord) = self.pending.remove(&response.correlation_id) else {
            self.stats.stale_responses += 1;
            debug!(
                "Discarding stale geometry response {} for chunk {:?}",
                response.correlation_id, response.coord
            );
            return;
        };
        debug_assert_eq!(coord, response.coord);

        let installed = self.chunks.get_mut(&coord).is_some_and(|record| {
            if record.state != ChunkState::Generating
                || record.correlation_id != Some(response.correlation_id)
            {
                return false;
            }
            let Some(slot) = record.slot else {
                return false;
            };

            let geometry = &mut self.pool.slot_mut(slot).geometry;
            geometry.positions.clear();
            geometry.positions.extend_from_slice(&response.buffers.positions);
            geometry.colors.clear();
            geometry.colors.extend_from_slice(&response.buffers.colors);

            record.state = ChunkState::Active;
            record.correlation_id = None;
            record.issued_at = None;
            true
        });

        if installed {
            if let Some(record) = self.chunks.get(&coord) {
                if let Some(slot) = record.slot {
                    self.pool.touch(slot);
                }
            }
            self.stats.generated_this_tick += 1;
            self.rebucket_stale_lod(coord);
        } else {
            self.stats.stale_responses += 1;
        }
    }

    /// Finds background requests older than the request timeout and
    /// answers them synchronously. Their correlation ids are dropped
    /// first, so a response that arrives later is discarded as stale.
    fn recover_timeouts(&mut self) {
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let expired: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(_, record)| {
                record.state == ChunkState::Generating
                    && record
                        .issued_at
                        .is_some_and(|issued| issued.elapsed() > timeout)
            })
            .map(|(coord, _)| *coord)
            .collect();

        for coord in expired {
            warn!("Generation request for chunk {coord:?} timed out, computing synchronously");
            if let Some(record) = self.chunks.get_mut(&coord) {
                if let Some(id) = record.correlation_id.take() {
                    self.pending.remove(&id);
                }
                record.issued_at = None;
            }
            self.generate_sync(coord);
            self.stats.sync_fallbacks += 1;
        }
    }

    /// Releases every chunk marked for eviction and forgets it.
    fn sweep_evicting(&mut self) {
        let departing: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(_, record)| record.state == ChunkState::Evicting)
            .map(|(coord, _)| *coord)
            .collect();

        for coord in departing {
            if let Some(record) = self.chunks.remove(&coord) {
                if let Some(slot) = record.slot {
                    self.pool.release(slot);
                }
                self.stats.evicted_this_tick += 1;
            }
        }
    }

    fn refresh_counts(&mut self) {
        self.stats.active = 0;
        self.stats.queued = 0;
        self.stats.generating = 0;
        for record in self.chunks.values() {
            match record.state {
                ChunkState::Active => self.stats.active += 1,
                ChunkState::Queued => self.stats.queued += 1,
                ChunkState::Generating => self.stats.generating += 1,
                ChunkState::Unrequested | ChunkState::Evicting => {},
            }
        }
    }

    /// Marks a chunk for eviction at the end of the current tick. A no-op
    /// for chunks that are unrequested or already evicting.
    pub fn evict(&mut self, coord: ChunkCoord) {
        self.mark_evicting(coord);
    }

    fn mark_evicting(&mut self, coord: ChunkCoord) {
        let Some(record) = self.chunks.get_mut(&coord) else {
            return;
        };
        match record.state {
            ChunkState::Evicting => {},
            ChunkState::Generating => {
                // Orphan the in-flight request; its response will be
                // discarded as stale
                if let Some(id) = record.correlation_id.take() {
                    self.pending.remove(&id);
                }
                record.issued_at = None;
                record.state = ChunkState::Evicting;
            },
            _ => record.state = ChunkState::Evicting,
        }
    }

    /// A chunk's slot was reassigned by pool exhaustion; drop the chunk
    /// without releasing the slot it no longer owns.
    fn on_slot_reclaimed(&mut self, coord: ChunkCoord) {
        debug!("Chunk {coord:?} force-evicted by pool exhaustion");
        if let Some(record) = self.chunks.get_mut(&coord) {
            if let Some(id) = record.correlation_id.take() {
                self.pending.remove(&id);
            }
            record.issued_at = None;
            record.slot = None;
            record.state = ChunkState::Evicting;
        }
    }

    // === Queries ===

    /// Lifecycle state of a chunk.
    #[must_use]
    pub fn chunk_state(&self, coord: ChunkCoord) -> ChunkState {
        self.chunks
            .get(&coord)
            .map_or(ChunkState::Unrequested, |record| record.state)
    }

    /// Iterates over every active chunk's geometry, for rendering.
    pub fn visible_chunks(&self) -> impl Iterator<Item = ChunkView<'_>> {
        self.chunks
            .iter()
            .filter(|(_, record)| record.state == ChunkState::Active)
            .filter_map(move |(coord, record)| {
                let slot = self.pool.slot(record.slot?);
                let origin = coord.to_world_origin(self.config.chunk_size);
                Some(ChunkView {
                    coord: *coord,
                    world_offset: (origin.x, origin.z),
                    lod: record.lod,
                    positions: &slot.geometry.positions,
                    colors: &slot.geometry.colors,
                })
            })
    }

    /// Shared triangle index pattern for a detail level. The same buffer
    /// serves every chunk at that level.
    #[must_use]
    pub fn index_pattern(&self, lod: DetailLevel) -> &[u32] {
        &self.index_patterns[lod.table_index()]
    }

    /// Terrain height at a world position, through the value cache. Never
    /// triggers chunk generation.
    #[must_use]
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        self.cache.get_or_compute(x, z).height
    }

    /// Terrain color for a caller-supplied height at a world position.
    /// Never triggers chunk generation.
    #[must_use]
    pub fn color_at(&self, height: f64, x: f64, z: f64) -> Rgb {
        self.cache.field().color_at(height, x, z)
    }

    /// Streaming counters as of the last tick.
    #[must_use]
    pub const fn stats(&self) -> StreamStats {
        self.stats
    }

    /// The active configuration (validated).
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The shared field value cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<FieldCache> {
        &self.cache
    }

    /// The most recently observed viewpoint.
    #[must_use]
    pub const fn viewpoint(&self) -> WorldPos {
        self.viewpoint
    }

    /// The chunk currently containing the viewpoint.
    #[must_use]
    pub const fn viewpoint_chunk(&self) -> ChunkCoord {
        self.viewpoint_chunk
    }

    /// Number of pool slots currently held by chunks.
    #[must_use]
    pub fn slots_in_use(&self) -> usize {
        self.pool.in_use_count()
    }

    /// Total pool slots; constant for the lifetime of the manager.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.pool_size()
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("viewpoint_chunk", &self.viewpoint_chunk)
            .field("chunks", &self.chunks.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sync_config() -> StreamConfig {
        StreamConfig {
            use_background_worker: false,
            ..StreamConfig::default()
        }
    }

    fn sync_manager() -> StreamManager {
        StreamManager::from_seed(WorldSeed::from_str_seed("1"), sync_config())
    }

    /// Ticks until the queue drains or the bound is hit.
    fn settle(manager: &mut StreamManager, viewpoint: WorldPos, max_ticks: usize) {
        for _ in 0..max_ticks {
            manager.update(viewpoint);
            let stats = manager.stats();
            if stats.queued == 0 && stats.generating == 0 {
                return;
            }
            if manager.config().use_background_worker {
                thread::sleep(Duration::from_millis(2));
            }
        }
        panic!("streaming did not settle within {max_ticks} ticks");
    }

    #[test]
    fn test_startup_fills_required_set() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        // Radius 2 in chunks: 13 coordinates within distance² ≤ 4
        assert_eq!(manager.stats().active, 13);
        assert_eq!(manager.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Active);
        assert_eq!(manager.chunk_state(ChunkCoord::new(2, 0)), ChunkState::Active);
        assert_eq!(manager.chunk_state(ChunkCoord::new(2, 2)), ChunkState::Unrequested);
        assert_eq!(manager.visible_chunks().count(), 13);
    }

    #[test]
    fn test_generation_is_closest_first() {
        let mut manager = sync_manager();
        let viewpoint = WorldPos::new(0.0, 0.0);
        let center = ChunkCoord::new(0, 0);

        let mut max_seen = 0_i64;
        let mut active: Vec<ChunkCoord> = Vec::new();
        for _ in 0..30 {
            manager.update(viewpoint);

            let mut batch_min = i64::MAX;
            let mut batch_max = 0_i64;
            for view in manager.visible_chunks() {
                if !active.contains(&view.coord) {
                    let d2 = view.coord.distance_squared_to(center);
                    batch_min = batch_min.min(d2);
                    batch_max = batch_max.max(d2);
                    active.push(view.coord);
                }
            }
            if batch_min != i64::MAX {
                // Everything in this tick's batch is at least as far as
                // everything generated before it
                assert!(batch_min >= max_seen);
                max_seen = max_seen.max(batch_max);
            }
            if manager.stats().queued == 0 {
                break;
            }
        }
        assert_eq!(active.len(), 13);
    }

    #[test]
    fn test_per_tick_budget_respected() {
        let mut manager = sync_manager();
        manager.update(WorldPos::new(0.0, 0.0));
        assert_eq!(manager.stats().generated_this_tick, 2);
        assert_eq!(manager.stats().active, 2);
    }

    #[test]
    fn test_lod_assignment_by_distance() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        let vertex_floats = |coord: ChunkCoord| {
            manager
                .visible_chunks()
                .find(|v| v.coord == coord)
                .map(|v| v.positions.len())
                .expect("chunk is visible")
        };

        // distance² 0 and 1: high (33² vertices); 2 and 4: medium (17²)
        assert_eq!(vertex_floats(ChunkCoord::new(0, 0)), 33 * 33 * 3);
        assert_eq!(vertex_floats(ChunkCoord::new(1, 0)), 33 * 33 * 3);
        assert_eq!(vertex_floats(ChunkCoord::new(1, 1)), 17 * 17 * 3);
        assert_eq!(vertex_floats(ChunkCoord::new(2, 0)), 17 * 17 * 3);
    }

    #[test]
    fn test_movement_evicts_departed_chunks() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        // Jump three chunks east; the old western chunks leave the set
        let jump = WorldPos::new(3.0 * 64.0, 0.0);
        settle(&mut manager, jump, 30);

        assert_eq!(manager.stats().active, 13);
        assert_eq!(manager.chunk_state(ChunkCoord::new(-2, 0)), ChunkState::Unrequested);
        assert_eq!(manager.chunk_state(ChunkCoord::new(-1, 0)), ChunkState::Unrequested);
        assert_eq!(manager.chunk_state(ChunkCoord::new(3, 0)), ChunkState::Active);
        assert_eq!(manager.viewpoint_chunk(), ChunkCoord::new(3, 0));
        // Slots were recycled, not grown
        assert_eq!(manager.pool_size(), 36);
        assert!(manager.slots_in_use() <= 36);
    }

    #[test]
    fn test_small_movement_changes_nothing() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);
        let before = manager.stats().active;

        // Below the update threshold: required set is not re-evaluated
        manager.update(WorldPos::new(10.0, 0.0));
        assert_eq!(manager.stats().active, before);
        assert_eq!(manager.stats().queued, 0);
        assert_eq!(manager.stats().evicted_this_tick, 0);
    }

    #[test]
    fn test_lod_changes_on_movement() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        // Two chunks east: the old center is now at distance² 4 (medium)
        settle(&mut manager, WorldPos::new(2.0 * 64.0, 0.0), 30);

        let old_center = manager
            .visible_chunks()
            .find(|v| v.coord == ChunkCoord::new(0, 0))
            .expect("still in range");
        assert_eq!(old_center.lod, DetailLevel::Medium);
        assert_eq!(old_center.positions.len(), 17 * 17 * 3);
    }

    #[test]
    fn test_in_flight_lod_refreshes_after_move() {
        let mut manager =
            StreamManager::from_seed(WorldSeed::from_str_seed("1"), StreamConfig::default());

        // Issue background requests at the origin, then move two chunks
        // east while they may still be in flight
        manager.update(WorldPos::new(0.0, 0.0));
        settle(&mut manager, WorldPos::new(2.0 * 64.0, 0.0), 400);

        // The old center is now at distance² 4; even though its first
        // request was issued at high detail it must settle at medium
        let old_center = manager
            .visible_chunks()
            .find(|v| v.coord == ChunkCoord::new(0, 0))
            .expect("still in range");
        assert_eq!(old_center.lod, DetailLevel::Medium);
        assert_eq!(old_center.positions.len(), 17 * 17 * 3);
    }

    #[test]
    fn test_extreme_viewpoint_is_panic_free() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        // Past the edge of the i32 chunk grid: the coordinate cast
        // saturates and the required set clamps at the corner instead of
        // wrapping or overflowing
        let far = WorldPos::new(3.0e11, -3.0e11);
        for _ in 0..30 {
            manager.update(far);
        }

        assert!(manager.stats().active > 0);
        assert_eq!(manager.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Unrequested);
        assert_eq!(
            manager.viewpoint_chunk(),
            ChunkCoord::new(i32::MAX, i32::MIN)
        );
    }

    #[test]
    fn test_pool_exhaustion_keeps_working_set_bounded() {
        let config = StreamConfig {
            pool_size: 4,
            use_background_worker: false,
            ..StreamConfig::default()
        };
        let mut manager = StreamManager::from_seed(WorldSeed::from_str_seed("1"), config);

        for _ in 0..30 {
            manager.update(WorldPos::new(0.0, 0.0));
        }

        assert_eq!(manager.pool_size(), 4);
        assert!(manager.slots_in_use() <= 4);
        assert!(manager.stats().active <= 4);
        assert!(manager.stats().forced_reclaims > 0);
    }

    #[test]
    fn test_eviction_is_idempotent() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        let coord = ChunkCoord::new(2, 0);
        manager.evict(coord);
        manager.evict(coord);
        assert_eq!(manager.chunk_state(coord), ChunkState::Evicting);

        // Evicting something never requested is also a no-op
        manager.evict(ChunkCoord::new(100, 100));

        manager.update(WorldPos::new(10.0, 0.0));
        assert_eq!(manager.chunk_state(coord), ChunkState::Unrequested);
    }

    #[test]
    fn test_height_queries_never_trigger_generation() {
        let manager = sync_manager();
        let h = manager.height_at(10.0, 20.0);
        assert!(h.is_finite());
        assert_eq!(manager.stats().active, 0);
        assert_eq!(manager.stats().queued, 0);

        // Deterministic under repetition
        assert_eq!(manager.height_at(10.0, 20.0).to_bits(), h.to_bits());
    }

    #[test]
    fn test_height_matches_field_directly() {
        let manager = sync_manager();
        let direct = manager.cache().field().sample(10.0, 20.0);
        assert_eq!(manager.height_at(10.0, 20.0).to_bits(), direct.height.to_bits());

        let color = manager.color_at(direct.height, 10.0, 20.0);
        assert_eq!(color, direct.color);
    }

    #[test]
    fn test_background_worker_settles() {
        let mut manager =
            StreamManager::from_seed(WorldSeed::from_str_seed("1"), StreamConfig::default());
        settle(&mut manager, WorldPos::new(0.0, 0.0), 400);
        assert_eq!(manager.stats().active, 13);
    }

    #[test]
    fn test_background_matches_synchronous_geometry() {
        let seed = WorldSeed::from_str_seed("1");
        let mut background = StreamManager::from_seed(seed, StreamConfig::default());
        let mut synchronous = StreamManager::from_seed(seed, sync_config());

        let viewpoint = WorldPos::new(0.0, 0.0);
        settle(&mut background, viewpoint, 400);
        settle(&mut synchronous, viewpoint, 30);

        let coord = ChunkCoord::new(0, 0);
        let from_worker = background
            .visible_chunks()
            .find(|v| v.coord == coord)
            .expect("active");
        let from_caller = synchronous
            .visible_chunks()
            .find(|v| v.coord == coord)
            .expect("active");
        assert_eq!(from_worker.positions, from_caller.positions);
        assert_eq!(from_worker.colors, from_caller.colors);
    }

    #[test]
    fn test_timeout_falls_back_to_synchronous() {
        let config = StreamConfig {
            request_timeout_ms: 20,
            chunks_per_frame: 13,
            ..StreamConfig::default()
        };
        let field = Arc::new(Field::new(WorldSeed::from_str_seed("1")));
        let mut manager =
            StreamManager::with_channel(field, config, OffloadChannel::unresponsive());

        let viewpoint = WorldPos::new(0.0, 0.0);
        manager.update(viewpoint);
        assert!(manager.stats().generating > 0);

        thread::sleep(Duration::from_millis(40));
        manager.update(viewpoint);

        assert_eq!(manager.stats().active, 13);
        assert_eq!(manager.stats().generating, 0);
        assert!(manager.stats().sync_fallbacks >= 13);
    }

    #[test]
    fn test_in_flight_eviction_discards_response() {
        let mut manager =
            StreamManager::from_seed(WorldSeed::from_str_seed("1"), StreamConfig::default());

        // Start background work, then immediately evict the chunks
        manager.update(WorldPos::new(0.0, 0.0));
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)] {
            manager.evict(coord);
        }

        // Teleport far away so the old chunks never re-enter the set
        let far = WorldPos::new(10_000.0, 10_000.0);
        settle(&mut manager, far, 400);

        assert_eq!(manager.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Unrequested);
        for view in manager.visible_chunks() {
            let d2 = view.coord.distance_squared_to(manager.viewpoint_chunk());
            assert!(d2 <= 4, "chunk {:?} outside required set", view.coord);
        }
    }

    #[test]
    fn test_index_pattern_shared_per_level() {
        let manager = sync_manager();
        // 32 quads per side at high detail, 6 indices per quad
        assert_eq!(manager.index_pattern(DetailLevel::High).len(), 32 * 32 * 6);
        assert_eq!(manager.index_pattern(DetailLevel::Medium).len(), 16 * 16 * 6);
        assert_eq!(manager.index_pattern(DetailLevel::Low).len(), 8 * 8 * 6);
    }

    #[test]
    fn test_world_offset_matches_chunk_origin() {
        let mut manager = sync_manager();
        settle(&mut manager, WorldPos::new(0.0, 0.0), 30);

        let view = manager
            .visible_chunks()
            .find(|v| v.coord == ChunkCoord::new(1, -1))
            .expect("active");
        assert!((view.world_offset.0 - 64.0).abs() < f64::EPSILON);
        assert!((view.world_offset.1 + 64.0).abs() < f64::EPSILON);
    }
}
