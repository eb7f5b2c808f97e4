//! Tunnel digging
//!
//! A dig is a noise-steered random walk through one rock group. At every cell
//! it paints a disc whose diameter is the current width, then advances one
//! cell along its heading, bends the heading by coherent noise and loses a
//! little width. It ends when the width runs out or it walks off the group.
//!
//! Branches are recursive digs from the current cell. They share the parent's
//! visited set, so a branch crossing its own parent is not a collision.
//!
//! Closed digs must stay inside the group: before each step they scan a ring
//! slightly wider than the disc, and stop on meeting open space or another
//! tunnel.

use std::collections::HashSet;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::grids::CaveGrids;
use crate::noise_field::DirectionNoise;
use crate::params::CaveParams;
use crate::radial::RadialPattern;
use crate::rock_groups::RockGroup;
use crate::tilemap::Cell;

/// Extra radius beyond the disc scanned by closed digs.
const CLOSED_SAFETY_MARGIN: f32 = 1.5;

/// Noise coordinates are the start cell spread this far apart, so digs
/// starting one cell apart still steer differently.
const NOISE_COORD_SCALE: f32 = 200.0;

/// Parameters of one dig call.
#[derive(Clone, Copy, Debug)]
pub struct TunnelSpec {
    pub start: Cell,
    /// Degrees clockwise from +z
    pub heading: f32,
    pub width: f32,
    /// Distance already travelled by the parent when this dig is a branch
    pub distance_from_root: f32,
    pub closed: bool,
}

/// Why a dig stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigEnd {
    /// Width decayed below the minimum
    WidthExhausted,
    /// Next cell is outside the rock group
    LeftGroup,
    /// Closed dig found open space or another tunnel near its path
    Breach,
    /// Closed dig painted over another tunnel
    Collision,
}

/// Counters for a dig and all of its branches.
#[derive(Clone, Debug, Default)]
pub struct DigStats {
    pub cells_advanced: usize,
    pub cells_painted: usize,
    pub branches: usize,
    /// How the root dig ended
    pub end: Option<DigEnd>,
}

impl DigStats {
    fn absorb(&mut self, branch: &DigStats) {
        self.cells_advanced += branch.cells_advanced;
        self.cells_painted += branch.cells_painted;
        self.branches += 1 + branch.branches;
    }
}

/// Unit movement for a heading in degrees: 0 is +z, 90 is +x.
pub fn heading_vector(heading: f32) -> (f32, f32) {
    let rad = heading.to_radians();
    (rad.sin(), rad.cos())
}

fn cell_of((x, z): (f32, f32)) -> Cell {
    (x.floor() as i32, z.floor() as i32)
}

/// Carves tunnels into one rock group.
pub struct TunnelDigger<'a> {
    group: &'a RockGroup,
    grids: &'a mut CaveGrids,
    params: &'a CaveParams,
    radial: &'a RadialPattern,
    noise: DirectionNoise,
}

impl<'a> TunnelDigger<'a> {
    pub fn new(
        group: &'a RockGroup,
        grids: &'a mut CaveGrids,
        params: &'a CaveParams,
        radial: &'a RadialPattern,
        noise: DirectionNoise,
    ) -> Self {
        Self {
            group,
            grids,
            params,
            radial,
            noise,
        }
    }

    /// Dig one tunnel (and its branches) starting at `spec.start`.
    ///
    /// `visited` collects every cell this dig tree painted; pass a fresh set
    /// for each root dig.
    pub fn dig(
        &mut self,
        spec: TunnelSpec,
        visited: &mut HashSet<Cell>,
        rng: &mut ChaCha8Rng,
    ) -> DigStats {
        let params = self.params;
        let mut stats = DigStats::default();
        if spec.width < params.min_tunnel_width {
            stats.end = Some(DigEnd::WidthExhausted);
            return stats;
        }

        let mut pos = (spec.start.0 as f32 + 0.5, spec.start.1 as f32 + 0.5);
        let mut cell = spec.start;
        let mut heading = spec.heading;
        let mut width = spec.width;
        let mut travelled = 0.0f32;
        let mut cells_dug = 0usize;
        let mut branched_right = false;
        let mut branched_left = false;
        let noise_x = spec.start.0 as f32 * NOISE_COORD_SCALE;
        let noise_z = spec.start.1 as f32 * NOISE_COORD_SCALE;

        let end = loop {
            if spec.closed && self.breaches(cell, width, visited) {
                break DigEnd::Breach;
            }

            if cells_dug >= params.branch_min_distance
                && width > params.min_tunnel_width + params.branch_width_offset_max
            {
                let distance = spec.distance_from_root + travelled;
                if !branched_right && rng.gen_bool(params.branch_chance as f64) {
                    branched_right = true;
                    if let Some(branch) =
                        self.branch(cell, heading, 1.0, width, distance, spec.closed, visited, rng)
                    {
                        stats.absorb(&branch);
                    }
                }
                if !branched_left && rng.gen_bool(params.branch_chance as f64) {
                    branched_left = true;
                    if let Some(branch) =
                        self.branch(cell, heading, -1.0, width, distance, spec.closed, visited, rng)
                    {
                        stats.absorb(&branch);
                    }
                }
            }

            let hit_other = self.carve(
                cell,
                width,
                heading,
                spec.distance_from_root + travelled,
                visited,
                &mut stats,
            );
            if hit_other && spec.closed {
                break DigEnd::Collision;
            }

            let (dx, dz) = heading_vector(heading);
            while cell_of(pos) == cell {
                pos.0 += dx * params.step_length;
                pos.1 += dz * params.step_length;
                travelled += params.step_length;
            }
            let next = cell_of(pos);
            if !self.group.contains(next) {
                break DigEnd::LeftGroup;
            }

            // Diagonal moves also fill the shared corner to stay 4-connected
            let corner = (cell.0, next.1);
            if corner != cell && corner != next && self.group.contains(corner) {
                self.grids.raise_width(corner, width);
                if visited.insert(corner) {
                    stats.cells_painted += 1;
                }
            }

            cell = next;
            stats.cells_advanced += 1;
            heading += self.noise.sample(travelled, noise_x, noise_z) * params.direction_change_speed;

            width -= params.width_decay_per_cell;
            if width < params.min_tunnel_width {
                break DigEnd::WidthExhausted;
            }
            cells_dug += 1;
        };

        stats.end = Some(end);
        stats
    }

    /// Whether a closed dig at `center` would reach open space or another tunnel.
    fn breaches(&self, center: Cell, width: f32, visited: &HashSet<Cell>) -> bool {
        self.radial
            .cells_in_radius(width / 2.0 + CLOSED_SAFETY_MARGIN)
            .iter()
            .map(|&(dx, dz)| (center.0 + dx, center.1 + dz))
            .any(|c| !visited.contains(&c) && (!self.group.contains(c) || self.grids.is_carved(c)))
    }

    /// Paint the disc around `center`. Returns true if it touched a cell
    /// carved by some other dig.
    fn carve(
        &mut self,
        center: Cell,
        width: f32,
        heading: f32,
        distance: f32,
        visited: &mut HashSet<Cell>,
        stats: &mut DigStats,
    ) -> bool {
        let mut hit_other = false;

        for &(dx, dz) in self.radial.cells_in_radius(width / 2.0) {
            let c = (center.0 + dx, center.1 + dz);
            if !self.group.contains(c) {
                continue;
            }
            if self.grids.is_carved(c) && !visited.contains(&c) {
                hit_other = true;
            }
            self.grids.raise_width(c, width);
            if visited.insert(c) {
                stats.cells_painted += 1;
            }
        }

        if self.grids.depth.is_some() || self.grids.offset.is_some() {
            self.paint_cross_section(center, width, heading, distance);
        }

        hit_other
    }

    /// Depth runs along the heading from the dig root, offset across it.
    /// Cells owned by a wider tunnel keep that tunnel's values.
    fn paint_cross_section(&mut self, center: Cell, width: f32, heading: f32, distance: f32) {
        let (sin, cos) = heading_vector(heading);
        let radius = width / 2.0 + self.params.depth_offset_margin;

        for &(dx, dz) in self.radial.cells_in_radius(radius) {
            let c = (center.0 + dx, center.1 + dz);
            if !self.group.contains(c) || self.grids.width_at(c) > width {
                continue;
            }
            let (fx, fz) = (dx as f32, dz as f32);
            let along = fx * sin + fz * cos;
            let across = fx * cos - fz * sin;
            self.grids.set_depth_offset(c, distance + along, across);
        }
    }

    /// Try a branch to one side (`side` is 1.0 for right, -1.0 for left).
    /// The heading with the most room ahead wins; cramped branches are skipped.
    #[allow(clippy::too_many_arguments)]
    fn branch(
        &mut self,
        from: Cell,
        heading: f32,
        side: f32,
        width: f32,
        distance: f32,
        closed: bool,
        visited: &mut HashSet<Cell>,
        rng: &mut ChaCha8Rng,
    ) -> Option<DigStats> {
        let params = self.params;
        let mut best: Option<(usize, f32)> = None;

        for _ in 0..params.branch_direction_candidates {
            let dir = heading + side * rng.gen_range(params.branch_angle_min..=params.branch_angle_max);
            let clearance = self.clearance(from, dir);
            if best.map_or(true, |(b, _)| clearance > b) {
                best = Some((clearance, dir));
            }
        }

        let (clearance, dir) = best?;
        if clearance < params.branch_min_clearance {
            return None;
        }

        let offset = rng.gen_range(params.branch_width_offset_min..=params.branch_width_offset_max);
        let spec = TunnelSpec {
            start: from,
            heading: dir,
            width: width - offset,
            distance_from_root: distance,
            closed,
        };
        Some(self.dig(spec, visited, rng))
    }

    /// Cells ahead of `from` along `heading` before leaving the group.
    fn clearance(&self, from: Cell, heading: f32) -> usize {
        let (dx, dz) = heading_vector(heading);
        let origin = (from.0 as f32 + 0.5, from.1 as f32 + 0.5);

        for step in 1..=self.params.branch_ray_length {
            let s = step as f32;
            let c = cell_of((origin.0 + dx * s, origin.1 + dz * s));
            if !self.group.contains(c) {
                return step - 1;
            }
        }
        self.params.branch_ray_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DirectionNoiseParams;
    use crate::tilemap::Tilemap;
    use rand::SeedableRng;

    fn full_group(width: i32, height: i32) -> RockGroup {
        let mut cells = Vec::new();
        for z in 0..height {
            for x in 0..width {
                cells.push((x, z));
            }
        }
        RockGroup::new(cells)
    }

    fn straight_params() -> CaveParams {
        CaveParams {
            branch_chance: 0.0,
            direction_change_speed: 0.0,
            ..Default::default()
        }
    }

    fn spec(start: Cell, heading: f32, width: f32, closed: bool) -> TunnelSpec {
        TunnelSpec {
            start,
            heading,
            width,
            distance_from_root: 0.0,
            closed,
        }
    }

    fn noise() -> DirectionNoise {
        DirectionNoise::new(1, &DirectionNoiseParams::default())
    }

    #[test]
    fn test_width_decays_by_fixed_step() {
        let group = full_group(200, 200);
        let params = straight_params();
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(200, 200, false);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // Width below 2 paints only the center cell, so each cell holds its own width
        let stats = TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((20, 100), 90.0, 1.9, false),
            &mut HashSet::new(),
            &mut rng,
        );

        assert_eq!(stats.end, Some(DigEnd::WidthExhausted));
        assert_eq!(grids.carved_count(), 15);

        let widths: Vec<f32> = (20..35).map(|x| grids.width_at((x, 100))).collect();
        assert_eq!(widths[0], 1.9);
        for pair in widths.windows(2) {
            assert!((pair[0] - pair[1] - params.width_decay_per_cell).abs() < 1e-4);
        }
        assert!(widths.iter().all(|&w| w >= params.min_tunnel_width));
        assert!(!grids.is_carved((35, 100)));
    }

    #[test]
    fn test_dig_narrower_than_minimum_paints_nothing() {
        let group = full_group(50, 50);
        let params = straight_params();
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(50, 50, false);
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        let stats = TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((25, 25), 90.0, 1.2, false),
            &mut HashSet::new(),
            &mut rng,
        );

        assert_eq!(stats.end, Some(DigEnd::WidthExhausted));
        assert_eq!(stats.cells_painted, 0);
        assert_eq!(grids.carved_count(), 0);
    }

    #[test]
    fn test_crossing_tunnels_keep_max_width() {
        let group = full_group(200, 200);
        let params = straight_params();
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(200, 200, false);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((20, 100), 90.0, 1.9, false),
            &mut HashSet::new(),
            &mut rng,
        );
        let before = grids.width_at((25, 100));

        // Northbound tunnel reaches (25, 100) after five cells
        TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((25, 95), 0.0, 1.7, false),
            &mut HashSet::new(),
            &mut rng,
        );
        let mut crossing_width = 1.7f32;
        for _ in 0..5 {
            crossing_width -= params.width_decay_per_cell;
        }

        let after = grids.width_at((25, 100));
        assert_eq!(after, before.max(crossing_width));
        assert_ne!(after, before + crossing_width);
        assert!(grids.is_carved((25, 103)));
    }

    #[test]
    fn test_open_dig_stops_at_group_edge() {
        let cells: Vec<Cell> = (0..30).flat_map(|x| (0..10).map(move |z| (x, z))).collect();
        let group = RockGroup::new(cells);
        let params = straight_params();
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(40, 10, false);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let stats = TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((2, 5), 90.0, 4.0, false),
            &mut HashSet::new(),
            &mut rng,
        );

        assert_eq!(stats.end, Some(DigEnd::LeftGroup));
        assert!(grids.is_carved((29, 5)));
        for x in 30..40 {
            assert!(!grids.is_carved((x, 5)));
        }
    }

    #[test]
    fn test_branches_spawn_on_both_sides() {
        let group = full_group(200, 200);
        let params = CaveParams {
            branch_chance: 1.0,
            direction_change_speed: 0.0,
            ..Default::default()
        };
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(200, 200, false);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let stats = TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((20, 100), 90.0, 5.0, false),
            &mut HashSet::new(),
            &mut rng,
        );

        assert!(stats.branches >= 2);
        let carved: Vec<(usize, usize)> = grids
            .caves
            .iter()
            .filter(|(_, _, &w)| w > 0.0)
            .map(|(x, z, _)| (x, z))
            .collect();
        assert!(carved.iter().any(|&(_, z)| z < 90));
        assert!(carved.iter().any(|&(_, z)| z > 110));
    }

    #[test]
    fn test_closed_dig_never_reaches_open_space() {
        let mask = Tilemap::from_fn(100, 100, |x, z| x > 0 && z > 0 && x < 99 && z < 99);
        let cells: Vec<Cell> = mask
            .iter()
            .filter(|(_, _, &v)| v)
            .map(|(x, z, _)| (x as i32, z as i32))
            .collect();
        let group = RockGroup::new(cells);
        let params = CaveParams {
            branch_chance: 0.3,
            ..Default::default()
        };
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(100, 100, false);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let stats = TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((50, 50), 30.0, 5.0, true),
            &mut HashSet::new(),
            &mut rng,
        );

        assert!(stats.cells_painted > 0);
        for (x, z, &w) in grids.caves.iter() {
            if w <= 0.0 {
                continue;
            }
            for (nx, nz) in mask.neighbors(x, z) {
                assert!(*mask.get(nx, nz), "carved cell ({}, {}) touches open space", x, z);
            }
        }
    }

    #[test]
    fn test_closed_dig_into_existing_tunnel_paints_nothing() {
        let group = full_group(60, 60);
        let params = straight_params();
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(60, 60, false);
        grids.raise_width((31, 30), 3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        let stats = TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((30, 30), 0.0, 3.0, true),
            &mut HashSet::new(),
            &mut rng,
        );

        assert_eq!(stats.end, Some(DigEnd::Breach));
        assert_eq!(stats.cells_painted, 0);
        assert_eq!(grids.carved_count(), 1);
    }

    #[test]
    fn test_cross_section_along_and_across_heading() {
        let group = full_group(100, 100);
        let params = CaveParams {
            compute_depth_offset: true,
            ..straight_params()
        };
        let radial = RadialPattern::new(10.0);
        let mut grids = CaveGrids::new(100, 100, true);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        // Heading east: depth grows with x, offset measures -z
        TunnelDigger::new(&group, &mut grids, &params, &radial, noise()).dig(
            spec((10, 50), 90.0, 4.0, false),
            &mut HashSet::new(),
            &mut rng,
        );

        let depth = grids.depth.as_ref().unwrap();
        let offset = grids.offset.as_ref().unwrap();
        assert!(*depth.get(30, 50) > *depth.get(20, 50));
        assert!(offset.get(20, 50).abs() < 1e-3);
        assert!(*offset.get(20, 49) > 0.5);
        assert!(*offset.get(20, 51) < -0.5);
    }
}
