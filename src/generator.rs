//! Cave network generation
//!
//! Ties the pipeline together: rock groups are extracted from the mask, each
//! group gets its open and then closed tunnels, and the validator repeats the
//! whole pass with fresh seeds until the network can be entered from the map
//! edges.

use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::grids::CaveGrids;
use crate::params::CaveParams;
use crate::planner::{PlanStats, TunnelPlanner};
use crate::radial::RadialPattern;
use crate::rock_groups::RockGroupExtractor;
use crate::tilemap::Tilemap;
use crate::validator::{BoundaryContext, GenerationReport, NetworkValidator};

/// Accepted grids plus the diagnostics of how they were reached.
#[derive(Clone, Debug)]
pub struct CaveNetwork {
    pub grids: CaveGrids,
    pub report: GenerationReport,
}

/// Owns everything one map generation needs.
///
/// Scratch buffers are reused across attempts. Maps generated in parallel
/// each need their own generator.
pub struct CaveGenerator {
    params: CaveParams,
    radial: RadialPattern,
    extractor: RockGroupExtractor,
}

impl CaveGenerator {
    pub fn new(params: CaveParams) -> Result<Self> {
        params.validate()?;

        let max_width = params.max_tunnel_width();
        let reach = (max_width / 2.0 + params.depth_offset_margin.max(1.5))
            .max(params.open_start_cave_radius)
            .max(params.closed_start_cave_radius);
        let radial = RadialPattern::new(reach);

        Ok(Self {
            params,
            radial,
            extractor: RockGroupExtractor::new(),
        })
    }

    /// One full pipeline pass over `mask` with the given RNG.
    pub fn generate_attempt(&mut self, mask: &Tilemap<bool>, rng: &mut ChaCha8Rng) -> CaveGrids {
        self.generate_attempt_with_stats(mask, rng).0
    }

    fn generate_attempt_with_stats(
        &mut self,
        mask: &Tilemap<bool>,
        rng: &mut ChaCha8Rng,
    ) -> (CaveGrids, PlanStats) {
        let mut grids = CaveGrids::new(mask.width, mask.height, self.params.compute_depth_offset);
        let groups = self.extractor.extract(mask, &self.params);
        let planner = TunnelPlanner::new(&self.params, &self.radial);

        let mut totals = PlanStats::default();
        for group in &groups {
            let stats = planner.plan_group(group, &mut grids, rng);
            totals.absorb(&stats);
        }

        log::debug!(
            "Attempt carved {} cells: {} groups, {} open / {} closed tunnels ({} stopped early), {} branches",
            grids.carved_count(),
            groups.len(),
            totals.open_tunnels,
            totals.closed_tunnels,
            totals.closed_stopped,
            totals.branches
        );

        (grids, totals)
    }

    /// Generate a validated cave network for `mask`.
    ///
    /// `boundary`, when given, adds the requirement that some passable
    /// neighboring region can be reached through the map edge.
    pub fn generate(
        &mut self,
        mask: &Tilemap<bool>,
        seed: u64,
        boundary: Option<&dyn BoundaryContext>,
    ) -> CaveNetwork {
        let validator = NetworkValidator::from_params(&self.params, mask.width, mask.height);
        let (grids, report) = validator.run(mask, seed, boundary, |rng| {
            self.generate_attempt_with_stats(mask, rng).0
        });

        log::info!(
            "Cave network for seed {}: {} carved cells after {} attempt(s){}",
            seed,
            grids.carved_count(),
            report.attempts,
            if report.forced { " (forced)" } else { "" }
        );

        CaveNetwork { grids, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaveError;
    use crate::seeds::attempt_rng;
    use crate::validator::{MapSide, SidePassability};

    fn blob_mask(width: usize, height: usize, radius: f32) -> Tilemap<bool> {
        let cx = width as f32 / 2.0;
        let cz = height as f32 / 2.0;
        Tilemap::from_fn(width, height, |x, z| {
            let dx = x as f32 + 0.5 - cx;
            let dz = z as f32 + 0.5 - cz;
            dx * dx + dz * dz <= radius * radius
        })
    }

    fn busy_params() -> CaveParams {
        CaveParams {
            open_tunnels_per_10k: 40.0,
            closed_tunnels_per_10k: 40.0,
            compute_depth_offset: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let params = CaveParams {
            step_length: 0.0,
            ..Default::default()
        };
        assert!(matches!(CaveGenerator::new(params), Err(CaveError::InvalidParams(_))));
    }

    #[test]
    fn test_carving_stays_inside_rock() {
        let mask = blob_mask(120, 120, 45.0);
        let mut generator = CaveGenerator::new(busy_params()).unwrap();

        for seed in 0..3 {
            let network = generator.generate(&mask, seed, None);
            assert!(network.grids.carved_count() > 0);
            for (x, z, &w) in network.grids.caves.iter() {
                if w > 0.0 {
                    assert!(*mask.get(x, z), "carved open ground at ({}, {})", x, z);
                    assert!(w >= 1.4);
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_grids() {
        let mask = blob_mask(100, 90, 38.0);
        let passable = SidePassability::from_sides(&[MapSide::East]);

        let a = CaveGenerator::new(busy_params()).unwrap().generate(&mask, 1234, Some(&passable));
        let b = CaveGenerator::new(busy_params()).unwrap().generate(&mask, 1234, Some(&passable));

        assert_eq!(a.grids, b.grids);
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn test_reused_generator_is_deterministic() {
        let mask = blob_mask(100, 100, 40.0);
        let mut generator = CaveGenerator::new(busy_params()).unwrap();

        let first = generator.generate(&mask, 99, None);
        let _other = generator.generate(&blob_mask(80, 60, 25.0), 5, None);
        let again = generator.generate(&mask, 99, None);

        assert_eq!(first.grids, again.grids);
    }

    #[test]
    fn test_single_attempt_matches_first_validated_attempt() {
        let mask = blob_mask(100, 100, 40.0);
        let params = CaveParams {
            min_edge_walkable_cells: Some(0),
            ..busy_params()
        };
        let mut generator = CaveGenerator::new(params).unwrap();

        let network = generator.generate(&mask, 77, None);
        assert_eq!(network.report.attempts, 1);

        let single = generator.generate_attempt(&mask, &mut attempt_rng(77, 0));
        assert!(single.carved_count() > 0);
        assert_eq!(single, network.grids);
    }

    #[test]
    fn test_small_rock_region_stays_solid() {
        // 14x14 island next to a large one
        let mask = Tilemap::from_fn(140, 80, |x, z| {
            let small = (10..24).contains(&x) && (30..44).contains(&z);
            let large = (50..130).contains(&x) && (5..75).contains(&z);
            small || large
        });
        let mut generator = CaveGenerator::new(busy_params()).unwrap();

        for seed in 0..3 {
            let network = generator.generate(&mask, seed, None);
            for z in 30..44 {
                for x in 10..24 {
                    assert_eq!(*network.grids.caves.get(x, z), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_no_rock_means_no_caves() {
        let mask = Tilemap::new_with(50, 50, false);
        let mut generator = CaveGenerator::new(CaveParams::default()).unwrap();
        let network = generator.generate(&mask, 3, None);

        assert_eq!(network.grids.carved_count(), 0);
        // Open ground on every edge satisfies the default target at once
        assert_eq!(network.report.attempts, 1);
        assert!(!network.report.forced);
    }

    #[test]
    fn test_impossible_target_uses_every_attempt() {
        let mask = blob_mask(80, 80, 30.0);
        let params = CaveParams {
            min_edge_walkable_cells: Some(4 * 80 + 1),
            max_attempts: 10,
            ..busy_params()
        };
        let mut generator = CaveGenerator::new(params).unwrap();
        let network = generator.generate(&mask, 11, None);

        assert_eq!(network.report.attempts, 10);
        assert!(network.report.forced);
        assert!(network.report.edge_walkable < network.report.required_edge_walkable);
    }

    #[test]
    fn test_closed_tunnels_never_touch_open_ground() {
        let mask = Tilemap::from_fn(100, 100, |x, z| x > 0 && z > 0 && x < 99 && z < 99);
        let params = CaveParams {
            open_tunnels_per_10k: 0.0,
            closed_tunnels_per_10k: 100.0,
            max_closed_tunnels_per_group: 3,
            ..Default::default()
        };
        let mut generator = CaveGenerator::new(params).unwrap();

        for seed in 0..6 {
            let network = generator.generate(&mask, seed, None);
            for (x, z, &w) in network.grids.caves.iter() {
                if w <= 0.0 {
                    continue;
                }
                for (nx, nz) in mask.neighbors(x, z) {
                    assert!(*mask.get(nx, nz), "closed tunnel breached at ({}, {})", x, z);
                }
            }
        }
    }
}
