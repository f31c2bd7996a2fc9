//! Bounded memoization layer in front of the field.
//!
//! Spatially-close queries land on the same 1-unit grid point, so repeated
//! sampling (collision checks, AI probes, mesh rebuilds) skips the noise
//! stack. The cache is an optimization, never a correctness dependency: a
//! miss falls through to the pure field, and both paths sample at the
//! rounded grid point so enabling or disabling the cache changes latency
//! only.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::{Field, FieldSample};

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to the field.
    pub misses: u64,
    /// Entries evicted to make room.
    pub evictions: u64,
}

/// Interior state, behind one mutex so the cache can be shared across the
/// foreground tick and the background worker.
#[derive(Debug)]
struct CacheInner {
    map: AHashMap<(i64, i64), FieldSample>,
    /// Insertion order for oldest-first eviction.
    order: VecDeque<(i64, i64)>,
    stats: CacheStats,
}

/// Bounded, thread-safe memoization of field samples.
#[derive(Debug)]
pub struct FieldCache {
    field: Arc<Field>,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl FieldCache {
    /// Creates a cache in front of `field` holding at most `capacity`
    /// samples. A capacity of zero disables caching entirely.
    #[must_use]
    pub fn new(field: Arc<Field>, capacity: usize) -> Self {
        Self {
            field,
            capacity,
            inner: Mutex::new(CacheInner {
                map: AHashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Returns the underlying field.
    #[must_use]
    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    /// Samples the field at the 1-unit grid point nearest to `(x, z)`,
    /// consulting the cache first.
    #[must_use]
    pub fn get_or_compute(&self, x: f64, z: f64) -> FieldSample {
        let key = (round_coord(x), round_coord(z));
        let gx = key.0 as f64;
        let gz = key.1 as f64;

        if self.capacity == 0 {
            return self.field.sample(gx, gz);
        }

        {
            let mut inner = self.inner.lock();
            if let Some(sample) = inner.map.get(&key) {
                let sample = *sample;
                inner.stats.hits += 1;
                return sample;
            }
            inner.stats.misses += 1;
        }

        // Field evaluation happens outside the lock; recomputing the same
        // grid point on a race is cheaper than holding the lock through
        // the noise stack.
        let sample = self.field.sample(gx, gz);

        let mut inner = self.inner.lock();
        if !inner.map.contains_key(&key) {
            while inner.map.len() >= self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.map.remove(&oldest);
                    inner.stats.evictions += 1;
                } else {
                    break;
                }
            }
            inner.map.insert(key, sample);
            inner.order.push_back(key);
        }
        sample
    }

    /// Current number of cached samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Whether the cache holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    /// Returns a snapshot of the hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

/// Rounds a coordinate to the cache grid.
fn round_coord(v: f64) -> i64 {
    v.round() as i64
}
