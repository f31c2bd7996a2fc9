//! Biome classification from independent climate and pattern channels.
//!
//! Classification combines "temperature" and "moisture" noise proxies with
//! height thresholds and pattern generators (cellular, striped, spotted,
//! wave). Biome regions are deliberately non-disjoint; the ordered if-chain
//! in [`BiomeClassifier::classify`] is the documented priority and must not
//! be reordered.

use aurora_common::WorldSeed;
use serde::{Deserialize, Serialize};

use crate::noise::SimplexNoise;

/// Seed channel offsets for the climate and pattern layers.
///
/// Offset past the height channels so no table is shared with terrain.
mod channels {
    pub const TEMPERATURE: u64 = 16;
    pub const MOISTURE: u64 = 17;
    pub const WARP: u64 = 18;
    pub const CELL: u64 = 19;
}

/// Closed set of biome tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    /// Below sea level.
    Ocean,
    /// Narrow band just above sea level.
    Shore,
    /// Cellular crystal formations; color pulses.
    CrystalField,
    /// Striped luminescent vegetation; color pulses.
    NeonGrove,
    /// Spotted fern undergrowth; color pulses.
    FernHollow,
    /// Wave-patterned hot ash flats.
    Ashland,
    /// Cold fallback.
    Tundra,
    /// Hot and dry fallback.
    Desert,
    /// High elevation.
    Mountain,
    /// Default temperate fallback.
    Plains,
}

impl Biome {
    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ocean => "Ocean",
            Self::Shore => "Shore",
            Self::CrystalField => "Crystal Field",
            Self::NeonGrove => "Neon Grove",
            Self::FernHollow => "Fern Hollow",
            Self::Ashland => "Ashland",
            Self::Tundra => "Tundra",
            Self::Desert => "Desert",
            Self::Mountain => "Mountain",
            Self::Plains => "Plains",
        }
    }

    /// Whether this biome's color oscillates over time.
    #[must_use]
    pub const fn pulses(self) -> bool {
        matches!(self, Self::CrystalField | Self::NeonGrove | Self::FernHollow)
    }
}

/// Tuning parameters for biome classification.
#[derive(Debug, Clone)]
pub struct BiomeParams {
    /// Height below which everything is ocean.
    pub sea_level: f64,
    /// Height below which land is shore.
    pub shore_level: f64,
    /// Height above which land is mountain.
    pub mountain_level: f64,
    /// Frequency of the temperature channel.
    pub temperature_frequency: f64,
    /// Frequency of the moisture channel.
    pub moisture_frequency: f64,
    /// Feature-cell size of the cellular pattern, in world units.
    pub cell_size: f64,
    /// Cellular intensity above which crystal fields form.
    pub crystal_threshold: f64,
    /// Stripe intensity above which neon groves form.
    pub neon_threshold: f64,
    /// Spot intensity above which fern hollows form.
    pub fern_threshold: f64,
    /// Wave intensity above which ashlands form.
    pub ash_threshold: f64,
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            sea_level: -8.0,
            shore_level: -4.0,
            mountain_level: 90.0,
            temperature_frequency: 0.0015,
            moisture_frequency: 0.002,
            cell_size: 48.0,
            crystal_threshold: 0.78,
            neon_threshold: 0.82,
            fern_threshold: 0.6,
            ash_threshold: 0.85,
        }
    }
}

/// Deterministic biome classifier.
#[derive(Debug, Clone)]
pub struct BiomeClassifier {
    params: BiomeParams,
    temperature: SimplexNoise,
    moisture: SimplexNoise,
    warp: SimplexNoise,
    cell_seed: u64,
}

impl BiomeClassifier {
    /// Creates a classifier from a world seed and tuning parameters.
    #[must_use]
    pub fn new(seed: WorldSeed, params: BiomeParams) -> Self {
        Self {
            temperature: SimplexNoise::new(seed.channel(channels::TEMPERATURE)),
            moisture: SimplexNoise::new(seed.channel(channels::MOISTURE)),
            warp: SimplexNoise::new(seed.channel(channels::WARP)),
            cell_seed: seed.channel(channels::CELL).value(),
            params,
        }
    }

    /// Returns the tuning parameters.
    #[must_use]
    pub fn params(&self) -> &BiomeParams {
        &self.params
    }

    /// Classifies the biome at a world coordinate with a known height.
    ///
    /// Priority order (load-bearing, do not reorder):
    /// 1. height-gated low biomes (ocean, shore)
    /// 2. pattern-qualified special biomes (crystal, neon, fern, ash)
    /// 3. elevation (mountain)
    /// 4. temperature fallbacks (tundra, desert)
    /// 5. plains
    #[must_use]
    pub fn classify(&self, x: f64, z: f64, height: f64) -> Biome {
        let p = &self.params;

        if height < p.sea_level {
            return Biome::Ocean;
        }
        if height < p.shore_level {
            return Biome::Shore;
        }

        let temperature = self.temperature_at(x, z);
        let moisture = self.moisture_at(x, z);

        if self.cellular(x, z) > p.crystal_threshold && moisture < 0.1 {
            return Biome::CrystalField;
        }
        if self.stripes(x, z) > p.neon_threshold && moisture > 0.25 {
            return Biome::NeonGrove;
        }
        if self.spots(x, z) > p.fern_threshold && moisture > 0.0 {
            return Biome::FernHollow;
        }
        if self.waves(x, z) > p.ash_threshold && temperature > 0.5 {
            return Biome::Ashland;
        }

        if height > p.mountain_level {
            return Biome::Mountain;
        }

        if temperature < -0.45 {
            return Biome::Tundra;
        }
        if temperature > 0.45 && moisture < -0.2 {
            return Biome::Desert;
        }

        Biome::Plains
    }

    /// Temperature proxy in [-1, 1].
    #[must_use]
    pub fn temperature_at(&self, x: f64, z: f64) -> f64 {
        self.temperature.noise2(
            x * self.params.temperature_frequency,
            z * self.params.temperature_frequency,
        )
    }

    /// Moisture proxy in [-1, 1].
    #[must_use]
    pub fn moisture_at(&self, x: f64, z: f64) -> f64 {
        self.moisture
            .noise2(x * self.params.moisture_frequency, z * self.params.moisture_frequency)
    }

    /// Cellular (worley-approximation) pattern intensity in [0, 1].
    ///
    /// One jittered feature point per grid cell; intensity rises toward
    /// the feature point, so thresholding selects cell interiors.
    #[must_use]
    pub fn cellular(&self, x: f64, z: f64) -> f64 {
        let size = self.params.cell_size;
        let cx = (x / size).floor() as i64;
        let cz = (z / size).floor() as i64;

        let mut min_dist = f64::MAX;
        for dz in -1..=1 {
            for dx in -1..=1 {
                let (jx, jz) = self.feature_point(cx + dx, cz + dz);
                let fx = ((cx + dx) as f64 + jx) * size;
                let fz = ((cz + dz) as f64 + jz) * size;
                let d = ((x - fx).powi(2) + (z - fz).powi(2)).sqrt();
                min_dist = min_dist.min(d);
            }
        }

        (1.0 - min_dist / size).clamp(0.0, 1.0)
    }

    /// Striped pattern intensity in [0, 1], warped by low-frequency noise
    /// so stripes bend instead of running straight forever.
    #[must_use]
    pub fn stripes(&self, x: f64, z: f64) -> f64 {
        let warp = self.warp.noise2(x * 0.003, z * 0.003) * 24.0;
        ((x + warp) * 0.04).sin() * 0.5 + 0.5
    }

    /// Spotted pattern intensity in [0, 1].
    #[must_use]
    pub fn spots(&self, x: f64, z: f64) -> f64 {
        (self.warp.noise2(x * 0.015 + 100.0, z * 0.015 - 100.0) * 0.5 + 0.5).clamp(0.0, 1.0)
    }

    /// Wave pattern intensity in [0, 1].
    #[must_use]
    pub fn waves(&self, x: f64, z: f64) -> f64 {
        ((x * 0.01 + (z * 0.007).sin() * 3.0).sin() * (z * 0.01).cos()) * 0.5 + 0.5
    }

    /// Jittered feature point for a cell, in [0, 1)^2 cell-local space.
    fn feature_point(&self, cx: i64, cz: i64) -> (f64, f64) {
        let h = hash2(self.cell_seed, cx, cz);
        let jx = ((h >> 16) & 0xffff) as f64 / 65536.0;
        let jz = ((h >> 32) & 0xffff) as f64 / 65536.0;
        (jx, jz)
    }
}

/// Stable integer hash of a seeded cell coordinate (splitmix64 finalizer).
fn hash2(seed: u64, x: i64, z: i64) -> u64 {
    let mut h = seed
        ^ (x as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (z as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h ^= h >> 30;
    h = h.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^ (h >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> BiomeClassifier {
        BiomeClassifier::new(WorldSeed::new(42), BiomeParams::default())
    }

    #[test]
    fn test_low_height_is_ocean() {
        let c = classifier();
        // Height gates take precedence over every pattern channel
        for i in 0..50 {
            let x = f64::from(i) * 97.0;
            assert_eq!(c.classify(x, -x, -50.0), Biome::Ocean);
        }
    }

    #[test]
    fn test_shore_band() {
        let c = classifier();
        assert_eq!(c.classify(0.0, 0.0, -6.0), Biome::Shore);
    }

    #[test]
    fn test_classification_deterministic() {
        let a = classifier();
        let b = classifier();
        for i in 0..100 {
            let x = f64::from(i) * 53.0;
            let z = f64::from(i) * -29.0;
            assert_eq!(a.classify(x, z, 10.0), b.classify(x, z, 10.0));
        }
    }

    #[test]
    fn test_multiple_biomes_occur() {
        let c = classifier();
        let mut seen = std::collections::HashSet::new();
        for i in 0..4000 {
            let x = f64::from(i) * 37.0;
            let z = f64::from(i) * 61.0;
            seen.insert(c.classify(x, z, 10.0));
        }
        // A mid-height sweep should hit at least the fallbacks plus one
        // special biome.
        assert!(seen.contains(&Biome::Plains));
        assert!(seen.len() >= 3, "only saw {seen:?}");
    }

    #[test]
    fn test_patterns_in_range() {
        let c = classifier();
        for i in 0..500 {
            let x = f64::from(i) * 7.3;
            let z = f64::from(i) * -3.1;
            for v in [c.cellular(x, z), c.stripes(x, z), c.spots(x, z), c.waves(x, z)] {
                assert!((0.0..=1.0).contains(&v), "pattern out of range: {v}");
            }
        }
    }

    #[test]
    fn test_pulsing_biomes() {
        assert!(Biome::CrystalField.pulses());
        assert!(Biome::NeonGrove.pulses());
        assert!(Biome::FernHollow.pulses());
        assert!(!Biome::Plains.pulses());
        assert!(!Biome::Ocean.pulses());
    }
}
