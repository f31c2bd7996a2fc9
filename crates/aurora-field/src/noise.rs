//! Seeded 2D simplex noise primitive.
//!
//! Based on the simplex noise algorithm by Ken Perlin. The permutation
//! table is derived from the world seed once at construction; identical
//! seeds produce identical tables and therefore identical noise everywhere.
//! Unlike a per-instance scale factor, frequency is applied by the caller
//! so a single table can serve every octave layer of the field.

use aurora_common::WorldSeed;

/// 2D simplex noise generator.
#[derive(Debug, Clone)]
pub struct SimplexNoise {
    /// Permutation table for gradient hashing.
    perm: [u8; 512],
}

impl SimplexNoise {
    /// Skewing factor for 2D simplex noise.
    const F2: f64 = 0.366_025_403_784_438_65; // (sqrt(3) - 1) / 2
    /// Unskewing factor for 2D simplex noise.
    const G2: f64 = 0.211_324_865_405_187_1; // (3 - sqrt(3)) / 6

    /// Gradient vectors for 2D simplex noise.
    const GRAD2: [[f64; 2]; 8] = [
        [1.0, 0.0],
        [-1.0, 0.0],
        [0.0, 1.0],
        [0.0, -1.0],
        [0.707, 0.707],
        [-0.707, 0.707],
        [0.707, -0.707],
        [-0.707, -0.707],
    ];

    /// Creates a noise generator from a world seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];

        let mut rng_state = seed.value();
        let mut p: [u8; 256] = std::array::from_fn(|i| i as u8);

        // Fisher-Yates shuffle with simple LCG random
        for i in (1..256).rev() {
            rng_state = rng_state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1);
            #[allow(clippy::cast_possible_truncation)]
            let j = ((rng_state >> 32) as usize) % (i + 1);
            p.swap(i, j);
        }

        // Duplicate for wrapping
        perm[..256].copy_from_slice(&p);
        perm[256..512].copy_from_slice(&p);

        Self { perm }
    }

    /// Computes 2D simplex noise at the given coordinates.
    ///
    /// Returns a value in the range [-1, 1]. Callers apply frequency by
    /// scaling the inputs.
    #[must_use]
    #[allow(clippy::many_single_char_names)]
    pub fn noise2(&self, x: f64, z: f64) -> f64 {
        // Skew input space to determine simplex cell
        let s = (x + z) * Self::F2;
        let i = (x + s).floor();
        let j = (z + s).floor();

        // Unskew cell origin back to (x, z) space
        let t = (i + j) * Self::G2;
        let x0 = x - (i - t);
        let z0 = z - (j - t);

        // Determine which simplex we're in
        let (i1, j1) = if x0 > z0 { (1, 0) } else { (0, 1) };

        // Offsets for corners
        let x1 = x0 - f64::from(i1) + Self::G2;
        let z1 = z0 - f64::from(j1) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let z2 = z0 - 1.0 + 2.0 * Self::G2;

        // Hash coordinates to gradient indices
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ii = (i as i32 & 255) as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jj = (j as i32 & 255) as usize;

        let gi0 = (self.perm[ii + self.perm[jj] as usize] % 8) as usize;
        let gi1 = (self.perm[ii + i1 as usize + self.perm[jj + j1 as usize] as usize] % 8) as usize;
        let gi2 = (self.perm[ii + 1 + self.perm[jj + 1] as usize] % 8) as usize;

        // Calculate contributions from each corner
        let n0 = Self::contribution(x0, z0, gi0);
        let n1 = Self::contribution(x1, z1, gi1);
        let n2 = Self::contribution(x2, z2, gi2);

        // Sum contributions (scale to [-1, 1])
        70.0 * (n0 + n1 + n2)
    }

    /// Calculates the contribution from a corner.
    fn contribution(x: f64, z: f64, gi: usize) -> f64 {
        let t = 0.5 - x * x - z * z;
        if t < 0.0 {
            0.0
        } else {
            let t2 = t * t;
            t2 * t2 * (Self::GRAD2[gi][0] * x + Self::GRAD2[gi][1] * z)
        }
    }

    /// Generates octaved noise (fractal Brownian motion).
    ///
    /// # Arguments
    /// * `x`, `z` - Pre-scaled coordinates
    /// * `octaves` - Number of octaves
    /// * `persistence` - Amplitude falloff per octave
    #[must_use]
    pub fn fbm(&self, x: f64, z: f64, octaves: u32, persistence: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves {
            total += self.noise2(x * frequency, z * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        total / max_value
    }
}
