/// Signed `(x, z)` grid coordinate used by the carving algorithms.
///
/// Offsets from the radial pattern can step off the map, so the algorithms
/// work in `i32` and only convert to `usize` when touching a [`Tilemap`].
pub type Cell = (i32, i32);

/// A bounded 2D grid stored row-major.
///
/// Cave maps are plain rectangles: nothing wraps, and coordinates outside
/// `0..width` / `0..height` are treated as absent rather than clamped.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a map by evaluating `f(x, z)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for z in 0..height {
            for x in 0..width {
                data.push(f(x, z));
            }
        }
        Self { width, height, data }
    }

    fn index(&self, x: usize, z: usize) -> usize {
        debug_assert!(x < self.width && z < self.height);
        z * self.width + x
    }

    pub fn get(&self, x: usize, z: usize) -> &T {
        &self.data[self.index(x, z)]
    }

    pub fn get_mut(&mut self, x: usize, z: usize) -> &mut T {
        let idx = self.index(x, z);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, z: usize, value: T) {
        let idx = self.index(x, z);
        self.data[idx] = value;
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Whether a signed coordinate lies on the map.
    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && z >= 0 && (x as usize) < self.width && (z as usize) < self.height
    }

    /// Get a cell by signed coordinate, `None` when off the map.
    pub fn try_get(&self, x: i32, z: i32) -> Option<&T> {
        if self.contains(x, z) {
            Some(self.get(x as usize, z as usize))
        } else {
            None
        }
    }

    /// Mutable counterpart of [`Tilemap::try_get`].
    pub fn try_get_mut(&mut self, x: i32, z: i32) -> Option<&mut T> {
        if self.contains(x, z) {
            Some(self.get_mut(x as usize, z as usize))
        } else {
            None
        }
    }

    /// Distance in cells from `(x, z)` to the nearest map edge.
    pub fn distance_to_edge(&self, x: i32, z: i32) -> i32 {
        let right = self.width as i32 - 1 - x;
        let top = self.height as i32 - 1 - z;
        x.min(z).min(right).min(top)
    }

    /// Get the on-map 4-connected neighbors (left, right, down, up).
    pub fn neighbors(&self, x: usize, z: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(4);

        if x > 0 {
            result.push((x - 1, z));
        }
        if x + 1 < self.width {
            result.push((x + 1, z));
        }
        if z > 0 {
            result.push((x, z - 1));
        }
        if z + 1 < self.height {
            result.push((x, z + 1));
        }

        result
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let z = idx / width;
            (x, z, val)
        })
    }
}

impl Tilemap<bool> {
    /// Number of cells set to `true`.
    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_do_not_wrap() {
        let map = Tilemap::new_with(4, 3, 1u8);
        assert!(map.contains(0, 0));
        assert!(map.contains(3, 2));
        assert!(!map.contains(4, 0));
        assert!(!map.contains(-1, 1));
        assert!(map.try_get(0, 3).is_none());

        // Corner cells only have two neighbors
        assert_eq!(map.neighbors(0, 0).len(), 2);
        assert_eq!(map.neighbors(1, 1).len(), 4);
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let map = Tilemap::from_fn(3, 2, |x, z| x + z * 10);
        assert_eq!(*map.get(2, 1), 12);
        let collected: Vec<usize> = map.iter().map(|(_, _, &v)| v).collect();
        assert_eq!(collected, vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_distance_to_edge() {
        let map = Tilemap::new_with(10, 6, false);
        assert_eq!(map.distance_to_edge(0, 3), 0);
        assert_eq!(map.distance_to_edge(4, 3), 2);
        assert_eq!(map.distance_to_edge(8, 2), 1);
    }
}
