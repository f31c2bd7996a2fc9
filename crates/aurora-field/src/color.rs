//! Surface color synthesis.
//!
//! Each biome has a base RGB plus a small multiplicative variation driven
//! by a low-frequency spatial noise term. Selected biomes additionally
//! pulse with a slow time-based oscillation; sampling at `time = 0` keeps
//! field samples bit-deterministic.

use aurora_common::WorldSeed;
use serde::{Deserialize, Serialize};

use crate::biome::Biome;
use crate::noise::SimplexNoise;

/// Seed channel offset for the color variation layer.
const VARIATION_CHANNEL: u64 = 24;

/// Linear RGB color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red component
    pub r: f32,
    /// Green component
    pub g: f32,
    /// Blue component
    pub b: f32,
}

impl Rgb {
    /// Creates a new color.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Multiplies all components by a scalar and clamps to [0, 1].
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            r: (self.r * factor).clamp(0.0, 1.0),
            g: (self.g * factor).clamp(0.0, 1.0),
            b: (self.b * factor).clamp(0.0, 1.0),
        }
    }

    /// Returns the components as an array, for vertex buffer writes.
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Base color for each biome tag.
#[must_use]
pub const fn base_color(biome: Biome) -> Rgb {
    match biome {
        Biome::Ocean => Rgb::new(0.05, 0.18, 0.42),
        Biome::Shore => Rgb::new(0.72, 0.65, 0.44),
        Biome::CrystalField => Rgb::new(0.55, 0.30, 0.85),
        Biome::NeonGrove => Rgb::new(0.10, 0.90, 0.55),
        Biome::FernHollow => Rgb::new(0.15, 0.48, 0.22),
        Biome::Ashland => Rgb::new(0.35, 0.28, 0.26),
        Biome::Tundra => Rgb::new(0.80, 0.84, 0.90),
        Biome::Desert => Rgb::new(0.82, 0.66, 0.38),
        Biome::Mountain => Rgb::new(0.48, 0.46, 0.50),
        Biome::Plains => Rgb::new(0.35, 0.60, 0.30),
    }
}

/// Spatially-varied, optionally pulsing color map.
#[derive(Debug, Clone)]
pub struct ColorMap {
    variation: SimplexNoise,
}

impl ColorMap {
    /// Strength of the multiplicative spatial variation.
    const VARIATION_STRENGTH: f64 = 0.15;
    /// Frequency of the spatial variation channel.
    const VARIATION_FREQUENCY: f64 = 0.004;

    /// Creates a color map from a world seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            variation: SimplexNoise::new(seed.channel(VARIATION_CHANNEL)),
        }
    }

    /// Surface color at a coordinate, at time `time` (seconds).
    ///
    /// Pass `time = 0.0` for deterministic sampling.
    #[must_use]
    pub fn color_at(&self, biome: Biome, x: f64, z: f64, time: f64) -> Rgb {
        let spatial = self.variation.noise2(
            x * Self::VARIATION_FREQUENCY,
            z * Self::VARIATION_FREQUENCY,
        );

        let mut factor = 1.0 + Self::VARIATION_STRENGTH * spatial;

        if biome.pulses() {
            let wave = (time * 0.5 + x * 0.01 + z * 0.01).sin() * 0.5 + 0.5;
            factor *= 0.7 + 0.3 * wave * (1.0 + spatial);
        }

        #[allow(clippy::cast_possible_truncation)]
        base_color(biome).scaled(factor as f32)
    }

    /// Coordinate-free fallback: color from height banding alone.
    ///
    /// For callers that cannot supply a position (UI previews, minimap
    /// legends); bands track the default biome height gates.
    #[must_use]
    pub fn color_for_height(height: f64) -> Rgb {
        if height < -8.0 {
            base_color(Biome::Ocean)
        } else if height < -4.0 {
            base_color(Biome::Shore)
        } else if height < 40.0 {
            base_color(Biome::Plains)
        } else if height < 90.0 {
            base_color(Biome::Mountain)
        } else {
            Rgb::new(0.92, 0.94, 0.97)
        }
    }
}
