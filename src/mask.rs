//! Synthetic rock masks
//!
//! Stand-in for the terrain pipeline that normally decides where rock is:
//! thresholded fBm Perlin noise, optionally ringed by open ground so tunnels
//! have somewhere to lead.

use noise::Perlin;
use serde::{Deserialize, Serialize};

use crate::noise_field::fbm;
use crate::tilemap::Tilemap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskParams {
    /// Noise frequency per cell
    pub frequency: f64,
    pub octaves: u32,
    /// Cells with noise above this are rock
    pub threshold: f64,
    /// Width of the open ring kept along the map edge
    pub open_border: usize,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            frequency: 0.012,
            octaves: 5,
            threshold: -0.05,
            open_border: 0,
        }
    }
}

/// Generate a rock mask from seeded noise.
pub fn generate_rock_mask(width: usize, height: usize, seed: u32, params: &MaskParams) -> Tilemap<bool> {
    let noise = Perlin::new(seed);
    let border = params.open_border;

    Tilemap::from_fn(width, height, |x, z| {
        let in_border = x < border || z < border || x + border >= width || z + border >= height;
        if in_border {
            return false;
        }
        let point = [x as f64 * params.frequency, z as f64 * params.frequency];
        let value = fbm(&noise, point, params.octaves, 0.5, 2.0);
        value > params.threshold
    })
}
