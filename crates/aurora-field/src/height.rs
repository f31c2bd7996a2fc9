//! Layered terrain height synthesis.
//!
//! Height is a sum of fractal base noise plus conditional large-scale
//! modifiers applied by blending thresholds: irregular mountain peaks,
//! flat plateaus, negative-floor valleys, ridge sharpening, and
//! slope-gated erosion. Every constant here is a tuning parameter, not an
//! invariant; the defaults produce plausible alien terrain.

use aurora_common::WorldSeed;

use crate::noise::SimplexNoise;

/// Seed channel offsets for the independent height noise layers.
mod channels {
    pub const BASE: u64 = 0;
    pub const MOUNTAIN: u64 = 1;
    pub const MOUNTAIN_SCALE: u64 = 2;
    pub const PLATEAU: u64 = 3;
    pub const VALLEY: u64 = 4;
    pub const RIDGE: u64 = 5;
    pub const EROSION: u64 = 6;
}

/// Tuning parameters for height synthesis.
#[derive(Debug, Clone)]
pub struct HeightParams {
    /// Amplitude of the fractal base terrain.
    pub base_amplitude: f64,
    /// Frequency of the fractal base terrain.
    pub base_frequency: f64,
    /// Octave count for the base terrain.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f64,

    /// Mountain activation threshold on the mid-frequency channel.
    pub mountain_threshold: f64,
    /// Frequency of the mountain channel.
    pub mountain_frequency: f64,
    /// Minimum of the noise-modulated mountain scale.
    pub mountain_scale_min: f64,
    /// Maximum of the noise-modulated mountain scale.
    pub mountain_scale_max: f64,

    /// Plateau activation threshold.
    pub plateau_threshold: f64,
    /// Flat target height plateaus blend toward.
    pub plateau_height: f64,
    /// Frequency of the plateau channel.
    pub plateau_frequency: f64,

    /// Valley activation threshold (activates below this value).
    pub valley_threshold: f64,
    /// Negative floor valleys blend toward.
    pub valley_floor: f64,
    /// Frequency of the valley channel.
    pub valley_frequency: f64,

    /// Gain of the ridge sharpening term.
    pub ridge_gain: f64,
    /// Frequency of the ridge channel.
    pub ridge_frequency: f64,

    /// Strength of slope-gated erosion.
    pub erosion_strength: f64,
    /// Frequency of the erosion channel.
    pub erosion_frequency: f64,
    /// Slope below which no erosion is applied.
    pub slope_threshold: f64,
    /// Sample spacing for the finite-difference slope estimate.
    pub slope_step: f64,
}

impl Default for HeightParams {
    fn default() -> Self {
        Self {
            base_amplitude: 40.0,
            base_frequency: 0.004,
            octaves: 4,
            persistence: 0.5,

            mountain_threshold: 0.45,
            mountain_frequency: 0.008,
            mountain_scale_min: 70.0,
            mountain_scale_max: 270.0,

            plateau_threshold: 0.6,
            plateau_height: 55.0,
            plateau_frequency: 0.003,

            valley_threshold: -0.55,
            valley_floor: -25.0,
            valley_frequency: 0.0035,

            ridge_gain: 18.0,
            ridge_frequency: 0.02,

            erosion_strength: 9.0,
            erosion_frequency: 0.05,
            slope_threshold: 0.5,
            slope_step: 2.0,
        }
    }
}

/// Deterministic terrain height function.
#[derive(Debug, Clone)]
pub struct HeightField {
    params: HeightParams,
    base: SimplexNoise,
    mountain: SimplexNoise,
    mountain_scale: SimplexNoise,
    plateau: SimplexNoise,
    valley: SimplexNoise,
    ridge: SimplexNoise,
    erosion: SimplexNoise,
}

impl HeightField {
    /// Creates a height field from a world seed and tuning parameters.
    #[must_use]
    pub fn new(seed: WorldSeed, params: HeightParams) -> Self {
        Self {
            base: SimplexNoise::new(seed.channel(channels::BASE)),
            mountain: SimplexNoise::new(seed.channel(channels::MOUNTAIN)),
            mountain_scale: SimplexNoise::new(seed.channel(channels::MOUNTAIN_SCALE)),
            plateau: SimplexNoise::new(seed.channel(channels::PLATEAU)),
            valley: SimplexNoise::new(seed.channel(channels::VALLEY)),
            ridge: SimplexNoise::new(seed.channel(channels::RIDGE)),
            erosion: SimplexNoise::new(seed.channel(channels::EROSION)),
            params,
        }
    }

    /// Returns the tuning parameters.
    #[must_use]
    pub fn params(&self) -> &HeightParams {
        &self.params
    }

    /// Terrain height at a world coordinate. Pure and total: any finite
    /// coordinate is valid and repeated calls are bit-identical.
    #[must_use]
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        let p = &self.params;
        let shaped = self.shape_height(x, z);

        // Ridge sharpening: (1 - |n|)^2 * k
        let rn = self
            .ridge
            .noise2(x * p.ridge_frequency, z * p.ridge_frequency);
        let ridge = (1.0 - rn.abs()).powi(2) * p.ridge_gain;

        // Erosion: subtract noise scaled by estimated local slope, only
        // where the pre-erosion terrain is steep enough.
        let d = p.slope_step;
        let here = shaped;
        let east = self.shape_height(x + d, z);
        let south = self.shape_height(x, z + d);
        let slope = ((east - here).abs() + (south - here).abs()) / d;

        let erosion = if slope > p.slope_threshold {
            let en = self
                .erosion
                .noise2(x * p.erosion_frequency, z * p.erosion_frequency);
            en.abs() * slope * p.erosion_strength
        } else {
            0.0
        };

        shaped + ridge - erosion
    }

    /// Height before the ridge and erosion corrections.
    ///
    /// Sampled three times per output sample for the finite-difference
    /// slope estimate, so the corrections stay out of it.
    fn shape_height(&self, x: f64, z: f64) -> f64 {
        let p = &self.params;

        // Continuous fractal base terrain
        let mut height = self
            .base
            .fbm(x * p.base_frequency, z * p.base_frequency, p.octaves, p.persistence)
            * p.base_amplitude;

        // Mountain modifier: irregular peaks, not a smooth cap. The
        // contribution scale is itself noise-modulated.
        let m = self
            .mountain
            .noise2(x * p.mountain_frequency, z * p.mountain_frequency);
        if m > p.mountain_threshold {
            let s = self
                .mountain_scale
                .noise2(x * p.mountain_frequency * 0.5, z * p.mountain_frequency * 0.5);
            let scale = p.mountain_scale_min
                + (p.mountain_scale_max - p.mountain_scale_min) * (s * 0.5 + 0.5);
            height += (m - p.mountain_threshold) * 2.0 * scale;
        }

        // Plateau modifier: blend accumulated height toward a flat target
        let pl = self
            .plateau
            .noise2(x * p.plateau_frequency, z * p.plateau_frequency);
        if pl > p.plateau_threshold {
            let blend = (pl - p.plateau_threshold) / (1.0 - p.plateau_threshold);
            height += (p.plateau_height - height) * blend;
        }

        // Valley modifier: blend toward a negative floor
        let v = self
            .valley
            .noise2(x * p.valley_frequency, z * p.valley_frequency);
        if v < p.valley_threshold {
            let blend = (p.valley_threshold - v) / (p.valley_threshold + 1.0);
            height += (p.valley_floor - height) * blend;
        }

        height
    }
}
