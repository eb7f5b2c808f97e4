//! Coherent direction noise for steering digs

use noise::{NoiseFn, Perlin};

use crate::params::DirectionNoiseParams;

/// Seeded multi-octave Perlin noise sampled along a dig's travelled distance.
///
/// One instance is shared by a dig and all of its branches, so the whole
/// tree curves smoothly instead of jittering independently.
pub struct DirectionNoise {
    perlin: Perlin,
    params: DirectionNoiseParams,
}

impl DirectionNoise {
    pub fn new(seed: u32, params: &DirectionNoiseParams) -> Self {
        Self {
            perlin: Perlin::new(seed),
            params: params.clone(),
        }
    }

    /// Noise value in roughly `[-1, 1]` for a travelled `phase` and a
    /// per-dig coordinate offset.
    pub fn sample(&self, phase: f32, x: f32, z: f32) -> f32 {
        let p = &self.params;
        let point = [
            phase as f64 * p.phase_scale * p.frequency,
            x as f64 * p.frequency,
            z as f64 * p.frequency,
        ];
        fbm(&self.perlin, point, p.octaves, p.persistence, p.lacunarity) as f32
    }
}

/// Fractional Brownian Motion - multi-octave noise in any dimension,
/// normalized to roughly `[-1, 1]`
pub(crate) fn fbm<const N: usize>(
    noise: &impl NoiseFn<f64, N>,
    point: [f64; N],
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get(point.map(|c| c * frequency));
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value > 0.0 {
        total / max_value
    } else {
        0.0
    }
}
