use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::Result;
use crate::grids::CaveGrids;
use crate::tilemap::Tilemap;
use crate::validator::GenerationReport;

const OPEN_GROUND: [u8; 3] = [196, 178, 128];
const SOLID_ROCK: [u8; 3] = [70, 66, 62];

/// Export the caves grid as a PNG: open ground, solid rock, and tunnels
/// colored by width (narrow = blue, wide = red). North is at the top.
pub fn export_caves(mask: &Tilemap<bool>, grids: &CaveGrids, path: &str) -> Result<()> {
    render_caves(mask, grids).save(path)?;
    Ok(())
}

pub fn render_caves(mask: &Tilemap<bool>, grids: &CaveGrids) -> RgbImage {
    let width = grids.width();
    let height = grids.height();
    let max_width = grids
        .caves
        .iter()
        .map(|(_, _, &w)| w)
        .fold(0.0f32, f32::max)
        .max(1.0);

    let mut img: RgbImage = ImageBuffer::new(width as u32, height as u32);
    for z in 0..height {
        for x in 0..width {
            let w = *grids.caves.get(x, z);
            let color = if w > 0.0 {
                spectral_colormap((w / max_width).clamp(0.0, 1.0))
            } else if *mask.get(x, z) {
                SOLID_ROCK
            } else {
                OPEN_GROUND
            };
            img.put_pixel(x as u32, (height - 1 - z) as u32, Rgb(color));
        }
    }

    img
}

/// Export the depth grid as grayscale (brighter = farther from the dig root)
/// with the offset grid in the red channel. Returns `Ok(false)` if the grids
/// were not computed.
pub fn export_depth_offset(grids: &CaveGrids, path: &str) -> Result<bool> {
    let (Some(depth), Some(offset)) = (grids.depth.as_ref(), grids.offset.as_ref()) else {
        return Ok(false);
    };
    let width = grids.width();
    let height = grids.height();

    let mut max_depth = 1.0f32;
    let mut max_offset = 1.0f32;
    for (x, z, &w) in grids.caves.iter() {
        if w > 0.0 {
            max_depth = max_depth.max(depth.get(x, z).abs());
            max_offset = max_offset.max(offset.get(x, z).abs());
        }
    }

    let mut img: RgbImage = ImageBuffer::new(width as u32, height as u32);
    for z in 0..height {
        for x in 0..width {
            let color = if *grids.caves.get(x, z) > 0.0 {
                let d = (depth.get(x, z).abs() / max_depth * 255.0) as u8;
                let o = ((offset.get(x, z) / max_offset) * 0.5 + 0.5).clamp(0.0, 1.0);
                [(o * 255.0) as u8, d, d]
            } else {
                [0, 0, 0]
            };
            img.put_pixel(x as u32, (height - 1 - z) as u32, Rgb(color));
        }
    }

    img.save(path)?;
    Ok(true)
}

/// Write the generation report as pretty JSON.
pub fn write_report(report: &GenerationReport, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Spectral colormap (matplotlib style): dark blue -> cyan -> green -> yellow -> orange -> red
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],  // Dark blue/purple (low)
        [0.20, 0.53, 0.74],  // Blue
        [0.40, 0.76, 0.65],  // Teal
        [0.67, 0.87, 0.64],  // Light green
        [0.90, 0.96, 0.60],  // Yellow-green
        [1.00, 1.00, 0.75],  // Light yellow / white
        [1.00, 0.88, 0.55],  // Yellow
        [0.99, 0.68, 0.38],  // Light orange
        [0.96, 0.43, 0.26],  // Orange
        [0.84, 0.24, 0.31],  // Red
        [0.62, 0.00, 0.26],  // Dark red (high)
    ];

    let t_scaled = t * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];

    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}
