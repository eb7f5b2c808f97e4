//! Cave generation parameters and configuration

use serde::{Deserialize, Serialize};

use crate::error::{CaveError, Result};

/// Upper bound on generation attempts, whatever the configuration asks for.
pub const MAX_ATTEMPTS_CAP: usize = 10;

/// Piecewise-linear curve mapping rock group size (cells) to a base tunnel width.
///
/// Values outside the first/last point are clamped, so very large groups
/// saturate at the width of the last point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidthCurve {
    pub points: Vec<(f32, f32)>,
}

impl WidthCurve {
    pub fn evaluate(&self, x: f32) -> f32 {
        let Some(&(first_x, first_y)) = self.points.first() else {
            return 0.0;
        };
        if x <= first_x {
            return first_y;
        }
        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if x <= x1 {
                let span = x1 - x0;
                if span <= f32::EPSILON {
                    return y1;
                }
                let t = (x - x0) / span;
                return y0 + (y1 - y0) * t;
            }
        }
        self.points[self.points.len() - 1].1
    }

    /// Largest width the curve can produce.
    pub fn max_value(&self) -> f32 {
        self.points.iter().map(|&(_, y)| y).fold(0.0, f32::max)
    }
}

impl Default for WidthCurve {
    fn default() -> Self {
        Self {
            points: vec![(100.0, 2.0), (300.0, 4.0), (3000.0, 5.5)],
        }
    }
}

/// Coherent noise settings for the heading perturbation of a dig.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionNoiseParams {
    /// Base frequency applied to every sample coordinate
    pub frequency: f64,
    /// Number of fBm octaves
    pub octaves: u32,
    /// Amplitude falloff per octave
    pub persistence: f64,
    /// Frequency growth per octave
    pub lacunarity: f64,
    /// Multiplier turning travelled distance into the noise phase axis
    pub phase_scale: f64,
}

impl Default for DirectionNoiseParams {
    fn default() -> Self {
        Self {
            frequency: 0.00205,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            phase_scale: 60.0,
        }
    }
}

/// Every tunable of the cave generator.
///
/// Deserialization fills missing fields from [`Default`], so a JSON file only
/// needs to name the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveParams {
    // =========================================================================
    // Rock Groups
    // =========================================================================

    /// Groups (and surviving fragments) smaller than this get no tunnels
    pub min_group_size: usize,

    /// Erosion/dilation radius of the morphological opening
    pub opening_radius: usize,

    /// Fragments of the opened group survive only if they reach
    /// `min_group_size` and hold at least this share of the group
    pub min_fragment_fraction: f32,

    // =========================================================================
    // Open Tunnels
    // =========================================================================

    /// Open tunnels per 10,000 group cells (before the random 0.9-1.1 factor)
    pub open_tunnels_per_10k: f32,

    pub max_open_tunnels_per_group: usize,

    /// Random edge cells evaluated per open tunnel
    pub open_start_candidates: usize,

    /// Search radius when measuring distance to existing caves
    pub open_start_cave_radius: f32,

    /// Edge cells closer than this to the map boundary are never used as starts
    pub edge_margin: i32,

    /// Longest ray cast when choosing the initial heading
    pub heading_ray_length: usize,

    // =========================================================================
    // Closed Tunnels
    // =========================================================================

    pub closed_tunnels_per_10k: f32,

    pub max_closed_tunnels_per_group: usize,

    /// Random group cells evaluated per closed tunnel
    pub closed_start_candidates: usize,

    /// Search radius when measuring distance to caves or the group boundary
    pub closed_start_cave_radius: f32,

    // =========================================================================
    // Width
    // =========================================================================

    /// Group size to base width
    pub width_curve: WidthCurve,

    pub width_multiplier_min: f32,
    pub width_multiplier_max: f32,

    /// A dig stops once its width falls below this
    pub min_tunnel_width: f32,

    /// Width lost per advanced cell
    pub width_decay_per_cell: f32,

    // =========================================================================
    // Branching
    // =========================================================================

    /// Chance per step, per side, of spawning a branch
    pub branch_chance: f32,

    /// Cells a dig must advance before it may branch
    pub branch_min_distance: usize,

    /// A branch starts this much narrower than its parent (sampled range)
    pub branch_width_offset_min: f32,
    pub branch_width_offset_max: f32,

    /// Heading offset of a right branch in degrees; left branches mirror it
    pub branch_angle_min: f32,
    pub branch_angle_max: f32,

    /// Headings tried when a branch looks for its direction
    pub branch_direction_candidates: usize,

    /// A branch is only dug if its best heading has at least this many
    /// in-group cells ahead
    pub branch_min_clearance: usize,

    /// Longest ray cast when measuring branch clearance
    pub branch_ray_length: usize,

    // =========================================================================
    // Steering
    // =========================================================================

    /// Degrees of heading change per unit of direction noise, per cell
    pub direction_change_speed: f32,

    pub direction_noise: DirectionNoiseParams,

    /// Sub-cell advance increment
    pub step_length: f32,

    // =========================================================================
    // Output
    // =========================================================================

    /// Also produce the depth and offset grids
    pub compute_depth_offset: bool,

    /// Depth/offset discs are this much wider than the carved disc
    pub depth_offset_margin: f32,

    // =========================================================================
    // Validation
    // =========================================================================

    /// Required edge-walkable cells as a share of the map perimeter
    pub min_edge_walkable_fraction: f32,

    /// Explicit edge-walkable requirement; overrides the fraction when set
    pub min_edge_walkable_cells: Option<usize>,

    /// Walkable cells needed on a side whose neighbor region is passable
    pub min_passable_side_cells: usize,

    /// Generation attempts before the best one is forced through
    pub max_attempts: usize,
}

impl Default for CaveParams {
    fn default() -> Self {
        Self {
            min_group_size: 300,
            opening_radius: 6,
            min_fragment_fraction: 0.05,

            open_tunnels_per_10k: 5.8,
            max_open_tunnels_per_group: 3,
            open_start_candidates: 10,
            open_start_cave_radius: 40.0,
            edge_margin: 3,
            heading_ray_length: 40,

            closed_tunnels_per_10k: 2.5,
            max_closed_tunnels_per_group: 1,
            closed_start_candidates: 7,
            closed_start_cave_radius: 30.0,

            width_curve: WidthCurve::default(),
            width_multiplier_min: 0.8,
            width_multiplier_max: 1.0,
            min_tunnel_width: 1.4,
            width_decay_per_cell: 0.034,

            branch_chance: 0.1,
            branch_min_distance: 15,
            branch_width_offset_min: 0.2,
            branch_width_offset_max: 0.4,
            branch_angle_min: 40.0,
            branch_angle_max: 90.0,
            branch_direction_candidates: 6,
            branch_min_clearance: 18,
            branch_ray_length: 50,

            direction_change_speed: 8.0,
            direction_noise: DirectionNoiseParams::default(),
            step_length: 0.5,

            compute_depth_offset: false,
            depth_offset_margin: 2.0,

            min_edge_walkable_fraction: 0.05,
            min_edge_walkable_cells: None,
            min_passable_side_cells: 3,
            max_attempts: MAX_ATTEMPTS_CAP,
        }
    }
}

impl CaveParams {
    /// Load parameters from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let params: CaveParams = serde_json::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Edge-walkable cells an attempt needs on a `width` x `height` map.
    pub fn min_edge_walkable_for(&self, width: usize, height: usize) -> usize {
        match self.min_edge_walkable_cells {
            Some(cells) => cells,
            None => {
                let perimeter = 2 * (width + height);
                (perimeter as f32 * self.min_edge_walkable_fraction).round() as usize
            }
        }
    }

    /// Widest tunnel any dig can start with.
    pub fn max_tunnel_width(&self) -> f32 {
        self.width_curve.max_value() * self.width_multiplier_max.max(self.width_multiplier_min)
    }

    /// Reject parameter sets that cannot terminate or whose ranges are inverted.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(CaveError::InvalidParams(msg.into()))
        }

        if !(self.min_tunnel_width > 0.0) {
            return invalid("min_tunnel_width must be positive");
        }
        if !(self.width_decay_per_cell > 0.0) {
            return invalid("width_decay_per_cell must be positive");
        }
        if !(self.step_length > 0.0) {
            return invalid("step_length must be positive");
        }
        if self.width_multiplier_min > self.width_multiplier_max || self.width_multiplier_min < 0.0 {
            return invalid("width multiplier range is inverted or negative");
        }
        if self.branch_width_offset_min > self.branch_width_offset_max || self.branch_width_offset_min < 0.0 {
            return invalid("branch width offset range is inverted or negative");
        }
        if self.branch_angle_min > self.branch_angle_max {
            return invalid("branch angle range is inverted");
        }
        if !(0.0..=1.0).contains(&self.branch_chance) {
            return invalid("branch_chance must be within [0, 1]");
        }
        if self.width_curve.points.is_empty() {
            return invalid("width_curve needs at least one point");
        }
        if self.width_curve.points.windows(2).any(|p| p[1].0 < p[0].0) {
            return invalid("width_curve points must be sorted by group size");
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_CAP {
            return invalid(format!("max_attempts must be within 1..={}", MAX_ATTEMPTS_CAP));
        }
        if self.open_tunnels_per_10k < 0.0 || self.closed_tunnels_per_10k < 0.0 {
            return invalid("tunnel densities must not be negative");
        }
        if self.direction_noise.octaves == 0 {
            return invalid("direction_noise.octaves must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CaveParams::default().validate().is_ok());
    }

    #[test]
    fn test_width_curve_clamps_and_interpolates() {
        let curve = WidthCurve::default();
        assert_eq!(curve.evaluate(10.0), 2.0);
        assert_eq!(curve.evaluate(200.0), 3.0);
        assert_eq!(curve.evaluate(100_000.0), 5.5);
        assert_eq!(curve.max_value(), 5.5);
    }

    #[test]
    fn test_validation_rejects_non_terminating_decay() {
        let params = CaveParams {
            width_decay_per_cell: 0.0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(CaveError::InvalidParams(_))));
    }

    #[test]
    fn test_validation_caps_attempts() {
        let params = CaveParams {
            max_attempts: MAX_ATTEMPTS_CAP + 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let params: CaveParams = serde_json::from_str(r#"{ "branch_chance": 0.5 }"#).unwrap();
        assert_eq!(params.branch_chance, 0.5);
        assert_eq!(params.min_group_size, 300);
        assert_eq!(params.direction_noise.octaves, 4);
    }

    #[test]
    fn test_min_edge_walkable_from_perimeter() {
        let params = CaveParams::default();
        // Perimeter of 100x50 is 300, 5% of that is 15
        assert_eq!(params.min_edge_walkable_for(100, 50), 15);

        let explicit = CaveParams {
            min_edge_walkable_cells: Some(7),
            ..Default::default()
        };
        assert_eq!(explicit.min_edge_walkable_for(100, 50), 7);
    }
}
