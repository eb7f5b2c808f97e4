//! Distance-ordered cell offsets
//!
//! A disc of any radius up to the pattern's maximum is a prefix of the
//! sorted offset list, so painting a disc, scanning a safety ring and finding
//! the nearest cave all walk the same table outward from the center.

/// Integer offsets sorted by distance from the origin.
#[derive(Clone, Debug)]
pub struct RadialPattern {
    offsets: Vec<(i32, i32)>,
    dist_sq: Vec<i32>,
}

impl RadialPattern {
    pub fn new(max_radius: f32) -> Self {
        let max_radius = max_radius.max(0.0);
        let reach = max_radius.ceil() as i32;
        let limit = max_radius * max_radius;

        let mut entries: Vec<(i32, i32, i32)> = Vec::new();
        for dz in -reach..=reach {
            for dx in -reach..=reach {
                let d2 = dx * dx + dz * dz;
                if d2 as f32 <= limit {
                    entries.push((d2, dz, dx));
                }
            }
        }
        entries.sort_unstable();

        Self {
            offsets: entries.iter().map(|&(_, dz, dx)| (dx, dz)).collect(),
            dist_sq: entries.iter().map(|&(d2, _, _)| d2).collect(),
        }
    }

    /// Offsets `(dx, dz)` with `dx² + dz² <= radius²`, nearest first.
    ///
    /// Radii beyond the pattern's maximum are truncated to it.
    pub fn cells_in_radius(&self, radius: f32) -> &[(i32, i32)] {
        if radius < 0.0 {
            return &[];
        }
        let limit = radius * radius;
        let count = self.dist_sq.partition_point(|&d2| d2 as f32 <= limit);
        &self.offsets[..count]
    }
}
