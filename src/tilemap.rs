/// A bounded 2D grid of cells, row-major, with no wrapping at the edges.
///
/// Used for terrain rasters and for the scratch cost rasters built by the
/// street refiner.
#[derive(Clone, Debug)]
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

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// 8-connected neighbors that fall inside the grid, with the step
    /// length in cells (1 for cardinal, sqrt 2 for diagonal moves).
    pub fn neighbors_8(&self, x: usize, y: usize) -> Vec<(usize, usize, f32)> {
        let mut result = Vec::with_capacity(8);

        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if self.in_bounds(nx, ny) {
                    let step = if dx != 0 && dy != 0 {
                        std::f32::consts::SQRT_2
                    } else {
                        1.0
                    };
                    result.push((nx as usize, ny as usize, step));
                }
            }
        }

        result
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % self.width;
            let y = idx / self.width;
            (x, y, val)
        })
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }
}

impl Tilemap<f32> {
    /// Bilinear sample at fractional cell coordinates, clamped to the grid.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let v00 = *self.get(x0, y0);
        let v10 = *self.get(x1, y0);
        let v01 = *self.get(x0, y1);
        let v11 = *self.get(x1, y1);

        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        v0 * (1.0 - fy) + v1 * fy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_respect_bounds() {
        let map: Tilemap<u8> = Tilemap::new(4, 4);

        // Corner cells only see three neighbors, interior cells see eight
        assert_eq!(map.neighbors_8(0, 0).len(), 3);
        assert_eq!(map.neighbors_8(1, 1).len(), 8);

        let diagonal = map
            .neighbors_8(1, 1)
            .into_iter()
            .find(|&(x, y, _)| x == 2 && y == 2)
            .unwrap();
        assert!((diagonal.2 - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_interpolation() {
        let mut map = Tilemap::new_with(2, 2, 0.0f32);
        map.set(1, 0, 10.0);
        map.set(1, 1, 10.0);

        assert!((map.sample_bilinear(0.5, 0.5) - 5.0).abs() < 1e-5);
        // Outside samples clamp to the edge
        assert!((map.sample_bilinear(5.0, 0.0) - 10.0).abs() < 1e-5);
    }
}
