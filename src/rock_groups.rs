//! Rock group extraction
//!
//! Splits the rock mask into 4-connected groups and cleans each one up before
//! any tunnel is planned:
//! 1. Flood-fill every unvisited rock cell into a raw group
//! 2. Morphological opening (erosion then dilation) trims spurs and noise
//! 3. Small fragments left disconnected by the opening are dropped
//! 4. Groups still below the minimum size are discarded entirely

use std::collections::{HashMap, HashSet, VecDeque};

use crate::params::CaveParams;
use crate::tilemap::{Cell, Tilemap};

const CARDINALS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// A cleaned connected region of rock eligible for tunneling.
#[derive(Clone, Debug)]
pub struct RockGroup {
    cells: Vec<Cell>,
    members: HashSet<Cell>,
}

impl RockGroup {
    pub fn new(cells: Vec<Cell>) -> Self {
        let members = cells.iter().copied().collect();
        Self { cells, members }
    }

    /// Cells in a stable order; random picks index into this.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.members.contains(&cell)
    }

    /// Whether any 4-neighbor of `cell` lies outside the group.
    pub fn is_edge_cell(&self, (x, z): Cell) -> bool {
        CARDINALS
            .iter()
            .any(|&(dx, dz)| !self.contains((x + dx, z + dz)))
    }
}

/// Segments rock masks into [`RockGroup`]s.
///
/// Holds its flood-fill scratch buffers so repeated attempts on the same map
/// reuse them. Each concurrent generation needs its own extractor.
pub struct RockGroupExtractor {
    visited: Tilemap<bool>,
    queue: VecDeque<Cell>,
}

impl Default for RockGroupExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RockGroupExtractor {
    pub fn new() -> Self {
        Self {
            visited: Tilemap::new(0, 0),
            queue: VecDeque::new(),
        }
    }

    /// Extract every rock group that is large enough to receive tunnels.
    pub fn extract(&mut self, mask: &Tilemap<bool>, params: &CaveParams) -> Vec<RockGroup> {
        let width = mask.width;
        let height = mask.height;

        if self.visited.width != width || self.visited.height != height {
            self.visited = Tilemap::new(width, height);
        } else {
            self.visited.fill(false);
        }

        let mut groups = Vec::new();
        let mut raw_count = 0usize;

        for z in 0..height {
            for x in 0..width {
                if !*mask.get(x, z) || *self.visited.get(x, z) {
                    continue;
                }

                let raw = self.flood_fill_mask(mask, (x as i32, z as i32));
                raw_count += 1;

                // Cheap early out: opening only ever removes cells
                if raw.len() < params.min_group_size {
                    continue;
                }

                let opened = morphological_open(&raw, params.opening_radius, mask);
                let pruned = prune_fragments(
                    &opened,
                    params.min_group_size,
                    params.min_fragment_fraction,
                );

                if pruned.len() >= params.min_group_size {
                    groups.push(RockGroup::new(pruned));
                }
            }
        }

        log::debug!(
            "Rock mask {}x{}: {} raw groups, {} eligible for tunnels",
            width,
            height,
            raw_count,
            groups.len()
        );

        groups
    }

    /// 4-connected flood fill over the mask starting at `start`.
    fn flood_fill_mask(&mut self, mask: &Tilemap<bool>, start: Cell) -> Vec<Cell> {
        let mut cells = Vec::new();
        self.queue.clear();
        self.queue.push_back(start);
        self.visited.set(start.0 as usize, start.1 as usize, true);

        while let Some((x, z)) = self.queue.pop_front() {
            cells.push((x, z));
            for (nx, nz) in mask.neighbors(x as usize, z as usize) {
                if *mask.get(nx, nz) && !*self.visited.get(nx, nz) {
                    self.visited.set(nx, nz, true);
                    self.queue.push_back((nx as i32, nz as i32));
                }
            }
        }

        cells
    }
}

/// Erode then dilate a cell set by `radius` steps of 4-connectivity.
///
/// Off-map cells count as outside, so erosion eats in from the map border
/// too. Dilation never grows past the original set. The result keeps the
/// input order.
pub fn morphological_open(cells: &[Cell], radius: usize, mask: &Tilemap<bool>) -> Vec<Cell> {
    if radius == 0 || cells.is_empty() {
        return cells.to_vec();
    }

    let members: HashSet<Cell> = cells.iter().copied().collect();
    let inside = |c: Cell| mask.contains(c.0, c.1) && members.contains(&c);
    let radius = radius as u32;

    // Erosion: distance (in steps) from each cell to the nearest outside cell
    let mut depth: HashMap<Cell, u32> = HashMap::with_capacity(cells.len());
    let mut queue = VecDeque::new();
    for &cell in cells {
        let touches_outside = CARDINALS
            .iter()
            .any(|&(dx, dz)| !inside((cell.0 + dx, cell.1 + dz)));
        if touches_outside {
            depth.insert(cell, 1);
            queue.push_back(cell);
        }
    }
    while let Some(cell) = queue.pop_front() {
        let d = depth[&cell];
        for &(dx, dz) in &CARDINALS {
            let next = (cell.0 + dx, cell.1 + dz);
            if inside(next) && !depth.contains_key(&next) {
                depth.insert(next, d + 1);
                queue.push_back(next);
            }
        }
    }

    // Dilation: grow the survivors back, but only over original cells
    let mut reach: HashMap<Cell, u32> = HashMap::with_capacity(cells.len());
    for &cell in cells {
        if depth.get(&cell).map_or(true, |&d| d > radius) {
            reach.insert(cell, 0);
            queue.push_back(cell);
        }
    }
    while let Some(cell) = queue.pop_front() {
        let r = reach[&cell];
        if r >= radius {
            continue;
        }
        for &(dx, dz) in &CARDINALS {
            let next = (cell.0 + dx, cell.1 + dz);
            if inside(next) && !reach.contains_key(&next) {
                reach.insert(next, r + 1);
                queue.push_back(next);
            }
        }
    }

    cells
        .iter()
        .copied()
        .filter(|c| reach.contains_key(c))
        .collect()
}

/// Split a cell set into its 4-connected components, in first-seen order.
pub fn connected_components(cells: &[Cell]) -> Vec<Vec<Cell>> {
    let members: HashSet<Cell> = cells.iter().copied().collect();
    let mut seen: HashSet<Cell> = HashSet::with_capacity(cells.len());
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for &start in cells {
        if !seen.insert(start) {
            continue;
        }
        let mut component = Vec::new();
        queue.push_back(start);
        while let Some(cell) = queue.pop_front() {
            component.push(cell);
            for &(dx, dz) in &CARDINALS {
                let next = (cell.0 + dx, cell.1 + dz);
                if members.contains(&next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }

    components
}

/// Drop fragments smaller than `min_size` or smaller than `min_fraction` of
/// the whole set. A fragment survives only if it passes both. The result
/// keeps the input order.
pub fn prune_fragments(cells: &[Cell], min_size: usize, min_fraction: f32) -> Vec<Cell> {
    let total = cells.len();
    let mut dropped: HashSet<Cell> = HashSet::new();

    for component in connected_components(cells) {
        let too_small = component.len() < min_size;
        let too_minor = (component.len() as f32) < total as f32 * min_fraction;
        if too_small || too_minor {
            dropped.extend(component);
        }
    }

    if dropped.is_empty() {
        return cells.to_vec();
    }
    cells
        .iter()
        .copied()
        .filter(|c| !dropped.contains(c))
        .collect()
}
