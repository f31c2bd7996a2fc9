//! Streaming configuration.
//!
//! Typed configuration with named fields and documented defaults, loadable
//! from and savable to a TOML file. Loading never fails hard: a missing or
//! invalid file falls back to defaults with a warning, and `validate()`
//! clamps out-of-range values instead of rejecting them.

use aurora_common::{AuroraError, AuroraResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Streaming configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    // === Grid ===
    /// Chunk size in world units (grid cell size)
    pub chunk_size: u32,
    /// Distance in world units within which chunks are kept resident
    pub render_distance: u32,
    /// Viewpoint movement (world units) required before the required set
    /// is re-evaluated
    pub update_threshold: f64,

    // === Memory ===
    /// Number of pre-allocated geometry slots; bounds worst-case memory
    pub pool_size: usize,
    /// Field sample cache capacity (0 disables the cache)
    pub cache_capacity: usize,

    // === Pacing ===
    /// Maximum queued chunks advanced to generation per tick
    pub chunks_per_frame: usize,

    // === Level of detail ===
    /// Grid cells per chunk side at the highest detail level
    pub resolution: u32,
    /// Sampling stride multiplier at medium detail
    pub medium_stride: u32,
    /// Sampling stride multiplier at low detail
    pub low_stride: u32,

    // === Offload ===
    /// Whether to run field/geometry computation on a background worker
    pub use_background_worker: bool,
    /// Per-request timeout before falling back to synchronous computation
    pub request_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            // Grid
            chunk_size: 64,
            render_distance: 128,
            update_threshold: 16.0,

            // Memory
            pool_size: 36,
            cache_capacity: 8192,

            // Pacing
            chunks_per_frame: 2,

            // Level of detail
            resolution: 32,
            medium_stride: 2,
            low_stride: 4,

            // Offload
            use_background_worker: true,
            request_timeout_ms: 1000,
        }
    }
}

impl StreamConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Stream config not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read stream config: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded stream config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse stream config: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open stream config: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> AuroraResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| AuroraError::Config(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved stream config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.chunk_size = self.chunk_size.clamp(16, 512);
        self.render_distance = self.render_distance.clamp(self.chunk_size, 4096);
        self.update_threshold = self.update_threshold.clamp(0.0, f64::from(self.chunk_size));

        self.pool_size = self.pool_size.clamp(1, 4096);
        self.chunks_per_frame = self.chunks_per_frame.clamp(1, 64);

        self.resolution = self.resolution.clamp(4, 256);
        self.medium_stride = self.medium_stride.clamp(1, self.resolution);
        self.low_stride = self.low_stride.clamp(self.medium_stride, self.resolution);

        self.request_timeout_ms = self.request_timeout_ms.clamp(10, 60_000);
    }

    /// Radius of the required set, in chunks.
    #[must_use]
    pub fn chunk_radius(&self) -> i32 {
        (self.render_distance / self.chunk_size).max(1) as i32
    }
}
