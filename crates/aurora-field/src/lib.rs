//! # Aurora Field
//!
//! The deterministic height/biome/color field for Project Aurora.
//!
//! A [`Field`] is a pure function from a 2D world coordinate and a
//! [`WorldSeed`](aurora_common::WorldSeed) to a [`FieldSample`]: terrain
//! height, biome tag, and surface color. It owns no mutable state beyond
//! seed-derived permutation tables, so one instance can be shared freely
//! across threads behind an `Arc`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod biome;
pub mod cache;
pub mod color;
pub mod height;
pub mod noise;

pub use biome::{Biome, BiomeClassifier, BiomeParams};
pub use cache::{CacheStats, FieldCache};
pub use color::{base_color, ColorMap, Rgb};
pub use height::{HeightField, HeightParams};
pub use noise::SimplexNoise;

use aurora_common::WorldSeed;
use serde::{Deserialize, Serialize};

/// One field evaluation at a world coordinate.
///
/// Not stored anywhere; computed on demand and optionally memoized by
/// [`FieldCache`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    /// Terrain height (unbounded in principle).
    pub height: f64,
    /// Biome tag.
    pub biome: Biome,
    /// Surface color at time zero.
    pub color: Rgb,
}

/// The deterministic world field.
#[derive(Debug, Clone)]
pub struct Field {
    seed: WorldSeed,
    height: HeightField,
    biomes: BiomeClassifier,
    colors: ColorMap,
}

impl Field {
    /// Creates a field with default tuning parameters.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self::with_params(seed, HeightParams::default(), BiomeParams::default())
    }

    /// Creates a field with explicit tuning parameters.
    #[must_use]
    pub fn with_params(seed: WorldSeed, height: HeightParams, biomes: BiomeParams) -> Self {
        tracing::debug!("Field initialized: seed={}", seed.value());
        Self {
            seed,
            height: HeightField::new(seed, height),
            biomes: BiomeClassifier::new(seed, biomes),
            colors: ColorMap::new(seed),
        }
    }

    /// Returns the world seed.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Evaluates the field at a world coordinate.
    ///
    /// Pure and total: any finite coordinate is valid, and repeated calls
    /// return bit-identical results on any thread. Color is sampled at
    /// time zero; renderers wanting the pulse call [`Field::color_at_time`].
    #[must_use]
    pub fn sample(&self, x: f64, z: f64) -> FieldSample {
        let height = self.height.height_at(x, z);
        let biome = self.biomes.classify(x, z, height);
        let color = self.colors.color_at(biome, x, z, 0.0);
        FieldSample { height, biome, color }
    }

    /// Terrain height at a world coordinate.
    #[must_use]
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        self.height.height_at(x, z)
    }

    /// Surface color for a known height at a world coordinate (time zero).
    #[must_use]
    pub fn color_at(&self, height: f64, x: f64, z: f64) -> Rgb {
        let biome = self.biomes.classify(x, z, height);
        self.colors.color_at(biome, x, z, 0.0)
    }

    /// Surface color at a coordinate and time, including the pulse of
    /// time-animated biomes.
    #[must_use]
    pub fn color_at_time(&self, x: f64, z: f64, time: f64) -> Rgb {
        let height = self.height.height_at(x, z);
        let biome = self.biomes.classify(x, z, height);
        self.colors.color_at(biome, x, z, time)
    }

    /// Returns the biome classifier.
    #[must_use]
    pub fn biomes(&self) -> &BiomeClassifier {
        &self.biomes
    }
}
