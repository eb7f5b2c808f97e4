//! Tunnel placement
//!
//! Decides how many tunnels each rock group receives and where they start.
//!
//! Open tunnels start on the group's edge, as far as possible from existing
//! caves, heading toward the deepest part of the group. Closed tunnels start
//! at the interior cell farthest from both caves and the group boundary,
//! with a random heading, and must never break out.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::digger::{DigEnd, DigStats, TunnelDigger, TunnelSpec};
use crate::grids::CaveGrids;
use crate::noise_field::DirectionNoise;
use crate::params::CaveParams;
use crate::radial::RadialPattern;
use crate::rock_groups::RockGroup;
use crate::tilemap::Cell;

/// Compass directions in heading order: N, NE, E, SE, S, SW, W, NW.
const COMPASS: [(i32, i32); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Tunnels dug into one group (or summed over several).
#[derive(Clone, Debug, Default)]
pub struct PlanStats {
    pub open_tunnels: usize,
    pub closed_tunnels: usize,
    /// Closed digs stopped early to avoid breaking out
    pub closed_stopped: usize,
    pub branches: usize,
    pub cells_painted: usize,
}

impl PlanStats {
    pub fn absorb(&mut self, other: &PlanStats) {
        self.open_tunnels += other.open_tunnels;
        self.closed_tunnels += other.closed_tunnels;
        self.closed_stopped += other.closed_stopped;
        self.branches += other.branches;
        self.cells_painted += other.cells_painted;
    }

    fn record(&mut self, dig: &DigStats, closed: bool) {
        if closed {
            self.closed_tunnels += 1;
            if matches!(dig.end, Some(DigEnd::Breach) | Some(DigEnd::Collision)) {
                self.closed_stopped += 1;
            }
        } else {
            self.open_tunnels += 1;
        }
        self.branches += dig.branches;
        self.cells_painted += dig.cells_painted;
    }
}

/// Number of tunnels for a group of `group_size` cells.
///
/// The density estimate is capped, then reduced to a uniform pick in
/// `1..=count` (or `0..=count` when `allow_zero`).
pub fn tunnel_count(
    group_size: usize,
    per_10k: f32,
    cap: usize,
    allow_zero: bool,
    rng: &mut ChaCha8Rng,
) -> usize {
    let estimate = group_size as f32 * rng.gen_range(0.9f32..1.1) * per_10k / 10_000.0;
    let count = (estimate.round().max(0.0) as usize).min(cap);

    if allow_zero {
        rng.gen_range(0..=count)
    } else if count > 0 {
        rng.gen_range(1..=count)
    } else {
        0
    }
}

/// Distance from `cell` to the nearest carved cell within `max_dist`.
///
/// With `open_is_cave`, leaving the group counts as reaching a cave.
/// Returns `max_dist` if nothing was found.
pub fn distance_to_cave(
    cell: Cell,
    group: &RockGroup,
    grids: &CaveGrids,
    radial: &RadialPattern,
    max_dist: f32,
    open_is_cave: bool,
) -> f32 {
    for &(dx, dz) in radial.cells_in_radius(max_dist) {
        let c = (cell.0 + dx, cell.1 + dz);
        if (open_is_cave && !group.contains(c)) || grids.is_carved(c) {
            return ((dx * dx + dz * dz) as f32).sqrt();
        }
    }
    max_dist
}

/// Pick the compass heading with the most group ahead of `start`.
///
/// Each direction scores its own ray length plus half of each neighboring
/// diagonal's, so headings into wide regions beat narrow corridors. Ties are
/// broken at random. Returns `(heading_degrees, score)`.
pub fn best_initial_heading(
    start: Cell,
    group: &RockGroup,
    ray_length: usize,
    rng: &mut ChaCha8Rng,
) -> (f32, f32) {
    let rays: Vec<f32> = COMPASS
        .iter()
        .map(|&(dx, dz)| {
            let mut len = 0usize;
            while len < ray_length {
                let step = len as i32 + 1;
                if !group.contains((start.0 + dx * step, start.1 + dz * step)) {
                    break;
                }
                len += 1;
            }
            len as f32
        })
        .collect();

    let scores: Vec<f32> = (0..8)
        .map(|i| rays[i] + 0.5 * (rays[(i + 7) % 8] + rays[(i + 1) % 8]))
        .collect();
    let best_score = scores.iter().copied().fold(f32::MIN, f32::max);
    let best: Vec<usize> = (0..8).filter(|&i| scores[i] == best_score).collect();
    let pick = best.choose(rng).copied().unwrap_or(0);

    (pick as f32 * 45.0, best_score)
}

/// Places and digs the tunnels of each rock group.
pub struct TunnelPlanner<'a> {
    params: &'a CaveParams,
    radial: &'a RadialPattern,
}

impl<'a> TunnelPlanner<'a> {
    pub fn new(params: &'a CaveParams, radial: &'a RadialPattern) -> Self {
        Self { params, radial }
    }

    /// Dig open tunnels, then closed tunnels, into `group`.
    pub fn plan_group(
        &self,
        group: &RockGroup,
        grids: &mut CaveGrids,
        rng: &mut ChaCha8Rng,
    ) -> PlanStats {
        let base_width = self.params.width_curve.evaluate(group.len() as f32);
        let mut stats = PlanStats::default();

        self.dig_open_tunnels(group, grids, base_width, rng, &mut stats);
        self.dig_closed_tunnels(group, grids, base_width, rng, &mut stats);

        log::debug!(
            "Group of {} cells: base width {:.2}, {} open / {} closed tunnels, {} branches",
            group.len(),
            base_width,
            stats.open_tunnels,
            stats.closed_tunnels,
            stats.branches
        );

        stats
    }

    fn dig_open_tunnels(
        &self,
        group: &RockGroup,
        grids: &mut CaveGrids,
        base_width: f32,
        rng: &mut ChaCha8Rng,
        stats: &mut PlanStats,
    ) {
        let params = self.params;
        let count = tunnel_count(
            group.len(),
            params.open_tunnels_per_10k,
            params.max_open_tunnels_per_group,
            false,
            rng,
        );

        for _ in 0..count {
            let pool = self.edge_cell_pool(group, grids);
            if pool.is_empty() {
                log::warn!(
                    "No usable edge cell in a group of {} cells; starting from a random cell",
                    group.len()
                );
            }

            // (start, heading, distance to cave, heading score)
            let mut best: Option<(Cell, f32, f32, f32)> = None;
            for _ in 0..params.open_start_candidates.max(1) {
                let candidate = match pool.choose(rng) {
                    Some(&cell) => cell,
                    None => match group.cells().choose(rng) {
                        Some(&cell) => cell,
                        None => return,
                    },
                };
                let dist = distance_to_cave(
                    candidate,
                    group,
                    grids,
                    self.radial,
                    params.open_start_cave_radius,
                    false,
                );
                let (heading, score) =
                    best_initial_heading(candidate, group, params.heading_ray_length, rng);

                let better = match best {
                    None => true,
                    Some((_, _, best_dist, best_score)) => {
                        dist > best_dist || (dist == best_dist && score > best_score)
                    }
                };
                if better {
                    best = Some((candidate, heading, dist, score));
                }
            }

            if let Some((start, heading, _, _)) = best {
                let width = self.sample_width(base_width, rng);
                let dig = self.dig(group, grids, start, heading, width, false, rng);
                stats.record(&dig, false);
            }
        }
    }

    fn dig_closed_tunnels(
        &self,
        group: &RockGroup,
        grids: &mut CaveGrids,
        base_width: f32,
        rng: &mut ChaCha8Rng,
        stats: &mut PlanStats,
    ) {
        let params = self.params;
        let count = tunnel_count(
            group.len(),
            params.closed_tunnels_per_10k,
            params.max_closed_tunnels_per_group,
            true,
            rng,
        );

        for _ in 0..count {
            let mut best: Option<(Cell, f32)> = None;
            for _ in 0..params.closed_start_candidates.max(1) {
                let Some(&candidate) = group.cells().choose(rng) else {
                    return;
                };
                let dist = distance_to_cave(
                    candidate,
                    group,
                    grids,
                    self.radial,
                    params.closed_start_cave_radius,
                    true,
                );
                if best.map_or(true, |(_, best_dist)| dist > best_dist) {
                    best = Some((candidate, dist));
                }
            }

            if let Some((start, _)) = best {
                let heading = rng.gen_range(0.0f32..360.0);
                let width = self.sample_width(base_width, rng);
                let dig = self.dig(group, grids, start, heading, width, true, rng);
                stats.record(&dig, true);
            }
        }
    }

    /// Uncarved group edge cells at least `edge_margin` from the map border.
    fn edge_cell_pool(&self, group: &RockGroup, grids: &CaveGrids) -> Vec<Cell> {
        group
            .cells()
            .iter()
            .copied()
            .filter(|&(x, z)| {
                grids.caves.distance_to_edge(x, z) >= self.params.edge_margin
                    && !grids.is_carved((x, z))
                    && group.is_edge_cell((x, z))
            })
            .collect()
    }

    fn sample_width(&self, base_width: f32, rng: &mut ChaCha8Rng) -> f32 {
        let lo = base_width * self.params.width_multiplier_min;
        let hi = base_width * self.params.width_multiplier_max;
        if hi > lo {
            rng.gen_range(lo..=hi)
        } else {
            lo
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn dig(
        &self,
        group: &RockGroup,
        grids: &mut CaveGrids,
        start: Cell,
        heading: f32,
        width: f32,
        closed: bool,
        rng: &mut ChaCha8Rng,
    ) -> DigStats {
        // One noise field per dig tree keeps a tunnel and its branches curving together
        let noise = DirectionNoise::new(rng.gen(), &self.params.direction_noise);
        let spec = TunnelSpec {
            start,
            heading,
            width,
            distance_from_root: 0.0,
            closed,
        };
        let mut visited = HashSet::new();
        TunnelDigger::new(group, grids, self.params, self.radial, noise).dig(spec, &mut visited, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rock_groups::RockGroupExtractor;
    use crate::tilemap::Tilemap;
    use rand::SeedableRng;

    fn rect_group(x0: i32, z0: i32, x1: i32, z1: i32) -> RockGroup {
        let mut cells = Vec::new();
        for z in z0..z1 {
            for x in x0..x1 {
                cells.push((x, z));
            }
        }
        RockGroup::new(cells)
    }

    #[test]
    fn test_tunnel_count_respects_cap() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let open = tunnel_count(100_000, 5.8, 3, false, &mut rng);
            assert!((1..=3).contains(&open));
            let closed = tunnel_count(100_000, 2.5, 1, true, &mut rng);
            assert!(closed <= 1);
        }
        assert_eq!(tunnel_count(0, 5.8, 3, false, &mut rng), 0);
        assert_eq!(tunnel_count(10, 5.8, 3, true, &mut rng), 0);
    }

    #[test]
    fn test_initial_heading_points_into_group() {
        // Long corridor running east from the start cell
        let group = rect_group(10, 40, 90, 60);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (heading, score) = best_initial_heading((11, 50), &group, 40, &mut rng);
        assert_eq!(heading, 90.0);
        assert!(score >= 40.0);
    }

    #[test]
    fn test_distance_to_cave() {
        let group = rect_group(0, 0, 50, 50);
        let radial = RadialPattern::new(40.0);
        let mut grids = CaveGrids::new(50, 50, false);

        assert_eq!(distance_to_cave((25, 25), &group, &grids, &radial, 10.0, false), 10.0);

        grids.raise_width((25, 30), 2.0);
        assert_eq!(distance_to_cave((25, 25), &group, &grids, &radial, 10.0, false), 5.0);

        // Treating the group boundary as a cave finds the edge first
        assert_eq!(distance_to_cave((2, 25), &group, &grids, &radial, 10.0, true), 3.0);
    }

    #[test]
    fn test_edge_pool_respects_map_margin() {
        let params = CaveParams::default();
        let radial = RadialPattern::new(40.0);
        let planner = TunnelPlanner::new(&params, &radial);
        // Group flush with the map's west border
        let group = rect_group(0, 10, 30, 40);
        let grids = CaveGrids::new(60, 60, false);

        let pool = planner.edge_cell_pool(&group, &grids);
        assert!(!pool.is_empty());
        for &(x, z) in &pool {
            assert!(grids.caves.distance_to_edge(x, z) >= params.edge_margin);
            assert!(group.is_edge_cell((x, z)));
        }
        assert!(!pool.contains(&(0, 20)));
    }

    #[test]
    fn test_tunnels_stay_in_their_group() {
        let mask = Tilemap::from_fn(160, 80, |x, z| {
            let in_a = (5..65).contains(&x) && (10..70).contains(&z);
            let in_b = (95..155).contains(&x) && (10..70).contains(&z);
            in_a || in_b
        });
        let params = CaveParams {
            open_tunnels_per_10k: 50.0,
            closed_tunnels_per_10k: 50.0,
            ..Default::default()
        };
        let radial = RadialPattern::new(45.0);
        let groups = RockGroupExtractor::new().extract(&mask, &params);
        assert_eq!(groups.len(), 2);

        let mut grids = CaveGrids::new(160, 80, false);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let stats = TunnelPlanner::new(&params, &radial).plan_group(&groups[0], &mut grids, &mut rng);

        assert!(stats.open_tunnels >= 1);
        assert!(grids.carved_count() > 0);
        for (x, z, &w) in grids.caves.iter() {
            if w > 0.0 {
                let cell = (x as i32, z as i32);
                assert!(groups[0].contains(cell));
                assert!(!groups[1].contains(cell));
            }
        }
    }
}
