//! Network validation and retry
//!
//! A generated network is only useful if the map can be entered from its
//! boundary. Each attempt is scored by the walkable cells along the four map
//! edges; the first attempt reaching the target is accepted. When the retry
//! budget runs out, the best attempt seen is accepted anyway and the shortfall
//! is logged as a warning.

use serde::{Deserialize, Serialize};

use rand_chacha::ChaCha8Rng;

use crate::grids::CaveGrids;
use crate::params::{CaveParams, MAX_ATTEMPTS_CAP};
use crate::seeds::attempt_rng;
use crate::tilemap::Tilemap;

/// One side of the map. North is the last row (`z = height - 1`), East the
/// last column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapSide {
    North,
    East,
    South,
    West,
}

impl MapSide {
    pub const ALL: [MapSide; 4] = [MapSide::North, MapSide::East, MapSide::South, MapSide::West];

    pub fn display_name(&self) -> &'static str {
        match self {
            MapSide::North => "north",
            MapSide::East => "east",
            MapSide::South => "south",
            MapSide::West => "west",
        }
    }

    /// Parse a side name (or its first letter), case-insensitive.
    pub fn parse(name: &str) -> Option<MapSide> {
        match name.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Some(MapSide::North),
            "east" | "e" => Some(MapSide::East),
            "south" | "s" => Some(MapSide::South),
            "west" | "w" => Some(MapSide::West),
            _ => None,
        }
    }
}

/// What lies beyond the map edges.
pub trait BoundaryContext {
    /// Whether the neighboring region across `side` can be walked into.
    fn side_is_passable(&self, side: MapSide) -> bool;
}

/// Fixed passability per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidePassability {
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

impl SidePassability {
    pub fn from_sides(sides: &[MapSide]) -> Self {
        let mut result = Self::default();
        for side in sides {
            match side {
                MapSide::North => result.north = true,
                MapSide::East => result.east = true,
                MapSide::South => result.south = true,
                MapSide::West => result.west = true,
            }
        }
        result
    }
}

impl BoundaryContext for SidePassability {
    fn side_is_passable(&self, side: MapSide) -> bool {
        match side {
            MapSide::North => self.north,
            MapSide::East => self.east,
            MapSide::South => self.south,
            MapSide::West => self.west,
        }
    }
}

/// Longest contiguous run of walkable cells along each map side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeWalkability {
    pub north: usize,
    pub east: usize,
    pub south: usize,
    pub west: usize,
}

impl EdgeWalkability {
    /// A cell is walkable when it is open ground or carved rock.
    pub fn measure(mask: &Tilemap<bool>, caves: &Tilemap<f32>) -> Self {
        let width = mask.width;
        let height = mask.height;
        if width == 0 || height == 0 {
            return Self::default();
        }
        let walkable = |x: usize, z: usize| !*mask.get(x, z) || *caves.get(x, z) > 0.0;

        Self {
            north: longest_run((0..width).map(|x| walkable(x, height - 1))),
            east: longest_run((0..height).map(|z| walkable(width - 1, z))),
            south: longest_run((0..width).map(|x| walkable(x, 0))),
            west: longest_run((0..height).map(|z| walkable(0, z))),
        }
    }

    pub fn side(&self, side: MapSide) -> usize {
        match side {
            MapSide::North => self.north,
            MapSide::East => self.east,
            MapSide::South => self.south,
            MapSide::West => self.west,
        }
    }

    pub fn total(&self) -> usize {
        self.north + self.east + self.south + self.west
    }
}

fn longest_run(cells: impl Iterator<Item = bool>) -> usize {
    let mut best = 0;
    let mut current = 0;
    for walkable in cells {
        if walkable {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Diagnostic summary of a generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Attempts actually generated
    pub attempts: usize,
    /// Index of the attempt whose grids were returned
    pub accepted_attempt: usize,
    /// Edge-walkable cells of the returned attempt
    pub edge_walkable: usize,
    pub required_edge_walkable: usize,
    pub edges: EdgeWalkability,
    /// True if no attempt met the target and the best one was used
    pub forced: bool,
}

#[derive(Clone, Copy)]
enum ValidatorState {
    Generating { attempt: usize },
    Accepted { attempt: usize, forced: bool },
}

/// Accepts or rejects generation attempts by boundary connectivity.
#[derive(Clone, Debug)]
pub struct NetworkValidator {
    pub min_edge_walkable: usize,
    pub min_passable_side_cells: usize,
    pub max_attempts: usize,
}

impl NetworkValidator {
    pub fn from_params(params: &CaveParams, width: usize, height: usize) -> Self {
        Self {
            min_edge_walkable: params.min_edge_walkable_for(width, height),
            min_passable_side_cells: params.min_passable_side_cells,
            max_attempts: params.max_attempts.clamp(1, MAX_ATTEMPTS_CAP),
        }
    }

    /// Whether an attempt with these edges is good enough.
    ///
    /// With a boundary context that has at least one passable side, one of
    /// those sides must also have `min_passable_side_cells` walkable cells.
    pub fn accepts(&self, edges: &EdgeWalkability, boundary: Option<&dyn BoundaryContext>) -> bool {
        if edges.total() < self.min_edge_walkable {
            return false;
        }
        let Some(boundary) = boundary else {
            return true;
        };

        let passable: Vec<MapSide> = MapSide::ALL
            .iter()
            .copied()
            .filter(|&side| boundary.side_is_passable(side))
            .collect();
        if passable.is_empty() {
            return true;
        }
        passable
            .iter()
            .any(|&side| edges.side(side) >= self.min_passable_side_cells)
    }

    /// Run attempts until one is accepted or the budget is spent.
    ///
    /// Attempt `i` gets an RNG seeded from `(root_seed, i)`. Rejected attempts
    /// are dropped, except the best-scoring one which is kept as fallback.
    pub fn run<F>(
        &self,
        mask: &Tilemap<bool>,
        root_seed: u64,
        boundary: Option<&dyn BoundaryContext>,
        mut generate: F,
    ) -> (CaveGrids, GenerationReport)
    where
        F: FnMut(&mut ChaCha8Rng) -> CaveGrids,
    {
        let mut best: Option<(usize, CaveGrids, EdgeWalkability)> = None;
        let mut state = ValidatorState::Generating { attempt: 0 };

        let (accepted_attempt, forced) = loop {
            match state {
                ValidatorState::Generating { attempt } => {
                    let mut rng = attempt_rng(root_seed, attempt);
                    let grids = generate(&mut rng);
                    let edges = EdgeWalkability::measure(mask, &grids.caves);
                    let accepted = self.accepts(&edges, boundary);

                    log::info!(
                        "Cave attempt {}/{}: {} edge-walkable cells (need {}){}",
                        attempt + 1,
                        self.max_attempts,
                        edges.total(),
                        self.min_edge_walkable,
                        if accepted { ", accepted" } else { "" }
                    );

                    let improves = best
                        .as_ref()
                        .map_or(true, |(_, _, b)| edges.total() > b.total());
                    if accepted || improves {
                        best = Some((attempt, grids, edges));
                    }

                    state = if accepted {
                        ValidatorState::Accepted { attempt, forced: false }
                    } else if attempt + 1 >= self.max_attempts {
                        let best_attempt = best.as_ref().map_or(attempt, |(i, _, _)| *i);
                        ValidatorState::Accepted { attempt: best_attempt, forced: true }
                    } else {
                        ValidatorState::Generating { attempt: attempt + 1 }
                    };
                }
                ValidatorState::Accepted { attempt, forced } => break (attempt, forced),
            }
        };

        let attempts = if forced { self.max_attempts } else { accepted_attempt + 1 };
        let (_, grids, edges) = match best {
            Some(best) => best,
            // max_attempts is at least 1, so an attempt always ran
            None => (0, CaveGrids::new(mask.width, mask.height, false), EdgeWalkability::default()),
        };

        if forced {
            log::warn!(
                "No cave network reached {} edge-walkable cells in {} attempts; using attempt {} with {}",
                self.min_edge_walkable,
                attempts,
                accepted_attempt + 1,
                edges.total()
            );
        }

        let report = GenerationReport {
            attempts,
            accepted_attempt,
            edge_walkable: edges.total(),
            required_edge_walkable: self.min_edge_walkable,
            edges,
            forced,
        };
        (grids, report)
    }
}
