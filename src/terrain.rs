//! Terrain query adapter
//!
//! The street generator never owns terrain; it asks a [`TerrainQuery`] for
//! height, slope, water and biome at world positions. Implementations must be
//! deterministic and side-effect free so settlements can be generated in
//! parallel against one shared raster.

use glam::Vec2;
use noise::{NoiseFn, Perlin, Seedable};
use serde::{Deserialize, Serialize};

use crate::tilemap::Tilemap;

/// Surface classification as reported by the terrain provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    #[default]
    Grassland,
    Farmland,
    Forest,
    Marsh,
    Rock,
    Beach,
    Sea,
    River,
    Lake,
}

impl Biome {
    /// Open water that streets may only cross at a large cost.
    pub fn is_water(&self) -> bool {
        matches!(self, Biome::Sea | Biome::River | Biome::Lake)
    }

}

/// Read-only terrain sampling used by every generation stage.
pub trait TerrainQuery: Sync {
    /// Surface height in meters.
    fn height(&self, pos: Vec2) -> f32;

    /// Gradient magnitude (rise over run, dimensionless).
    fn slope(&self, pos: Vec2) -> f32;

    fn biome(&self, pos: Vec2) -> Biome;

    fn is_water(&self, pos: Vec2) -> bool {
        self.biome(pos).is_water()
    }
}

/// Perfectly flat dry land.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatTerrain {
    pub height: f32,
    pub biome: Biome,
}

impl TerrainQuery for FlatTerrain {
    fn height(&self, _pos: Vec2) -> f32 {
        self.height
    }

    fn slope(&self, _pos: Vec2) -> f32 {
        0.0
    }

    fn biome(&self, _pos: Vec2) -> Biome {
        self.biome
    }
}

/// Precomputed height and biome raster anchored in world space.
///
/// Cell `(x, y)` covers the square starting at `origin + (x, y) * cell_size`.
/// Heights are sampled bilinearly, biomes by nearest cell; positions outside
/// the raster clamp to the border.
#[derive(Clone, Debug)]
pub struct TerrainRaster {
    heights: Tilemap<f32>,
    biomes: Tilemap<Biome>,
    origin: Vec2,
    cell_size: f32,
}

/// Parameters for the synthetic noise raster.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseTerrainParams {
    /// World position of cell (0, 0)
    pub origin: Vec2,
    /// Raster size in cells
    pub width: usize,
    pub height: usize,
    /// Cell edge length in meters
    pub cell_size: f32,
    /// Peak-to-peak height variation in meters
    pub amplitude: f32,
    /// Noise features per kilometer
    pub frequency: f32,
    pub octaves: u32,
    /// Heights below this become sea
    pub sea_level: f32,
}

impl Default for NoiseTerrainParams {
    fn default() -> Self {
        Self {
            origin: Vec2::new(-256.0, -256.0),
            width: 256,
            height: 256,
            cell_size: 2.0,
            amplitude: 40.0,
            frequency: 3.0,
            octaves: 4,
            sea_level: -15.0,
        }
    }
}

impl TerrainRaster {
    /// Build from matching height and biome grids. Returns `None` when the
    /// grids differ in size, are empty, or the cell size is not positive.
    pub fn new(
        heights: Tilemap<f32>,
        biomes: Tilemap<Biome>,
        origin: Vec2,
        cell_size: f32,
    ) -> Option<Self> {
        if heights.width != biomes.width
            || heights.height != biomes.height
            || heights.width == 0
            || heights.height == 0
            || cell_size <= 0.0
        {
            return None;
        }
        Some(Self {
            heights,
            biomes,
            origin,
            cell_size,
        })
    }

    /// Build from a heightmap alone, classifying cells below `sea_level` as
    /// sea and steep cells as rock.
    pub fn from_heights(
        heights: Tilemap<f32>,
        origin: Vec2,
        cell_size: f32,
        sea_level: f32,
    ) -> Option<Self> {
        let biomes = Tilemap::new(heights.width, heights.height);
        let mut raster = Self::new(heights, biomes, origin, cell_size)?;
        raster.classify_biomes(sea_level);
        Some(raster)
    }

    /// Synthetic fBm Perlin terrain for demos and batch runs without a
    /// provider.
    pub fn from_noise(params: &NoiseTerrainParams, seed: u64) -> Option<Self> {
        let noise = Perlin::new(1).set_seed(seed as u32);
        let mut heights = Tilemap::new_with(params.width, params.height, 0.0f32);

        let scale = params.frequency as f64 * params.cell_size as f64 / 1000.0;
        for (x, y, h) in heights.iter_mut() {
            let nx = x as f64 * scale;
            let ny = y as f64 * scale;
            let n = fbm_noise(&noise, nx, ny, params.octaves, 0.5, 2.0) as f32;
            *h = n * params.amplitude * 0.5;
        }

        Self::from_heights(heights, params.origin, params.cell_size, params.sea_level)
    }

    fn classify_biomes(&mut self, sea_level: f32) {
        for y in 0..self.heights.height {
            for x in 0..self.heights.width {
                let h = *self.heights.get(x, y);
                let pos = self.cell_center(x, y);
                let biome = if h < sea_level {
                    Biome::Sea
                } else if h < sea_level + 1.0 {
                    Biome::Beach
                } else if self.slope(pos) > 0.8 {
                    Biome::Rock
                } else {
                    Biome::Grassland
                };
                self.biomes.set(x, y, biome);
            }
        }
    }

    /// Overwrite the biome of every cell whose center lies within `radius`
    /// of `center`.
    pub fn paint_biome(&mut self, center: Vec2, radius: f32, biome: Biome) {
        for y in 0..self.biomes.height {
            for x in 0..self.biomes.width {
                if self.cell_center(x, y).distance(center) <= radius {
                    self.biomes.set(x, y, biome);
                }
            }
        }
    }

    fn cell_center(&self, x: usize, y: usize) -> Vec2 {
        self.origin + (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * self.cell_size
    }

    /// Fractional cell coordinates where integer values land on cell centers.
    fn to_cell(&self, pos: Vec2) -> Vec2 {
        (pos - self.origin) / self.cell_size - Vec2::splat(0.5)
    }
}

impl TerrainQuery for TerrainRaster {
    fn height(&self, pos: Vec2) -> f32 {
        let c = self.to_cell(pos);
        self.heights.sample_bilinear(c.x, c.y)
    }

    fn slope(&self, pos: Vec2) -> f32 {
        let d = self.cell_size;
        let gx = (self.height(pos + Vec2::new(d, 0.0)) - self.height(pos - Vec2::new(d, 0.0))) / (2.0 * d);
        let gy = (self.height(pos + Vec2::new(0.0, d)) - self.height(pos - Vec2::new(0.0, d))) / (2.0 * d);
        (gx * gx + gy * gy).sqrt()
    }

    fn biome(&self, pos: Vec2) -> Biome {
        let c = self.to_cell(pos).round();
        let x = c.x.clamp(0.0, (self.biomes.width - 1) as f32) as usize;
        let y = c.y.clamp(0.0, (self.biomes.height - 1) as f32) as usize;
        *self.biomes.get(x, y)
    }
}

/// Fractional Brownian motion over a 2D noise function, normalized to [-1, 1].
fn fbm_noise(
    noise: &impl NoiseFn<f64, 2>,
    x: f64,
    y: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves.max(1) {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rise_per_meter: f32) -> TerrainRaster {
        // 50 x 50 cells of 2 m, height rising along +x
        let mut heights = Tilemap::new_with(50, 50, 0.0f32);
        for (x, _, h) in heights.iter_mut() {
            *h = (x as f32 * 2.0 + 1.0) * rise_per_meter;
        }
        TerrainRaster::from_heights(heights, Vec2::ZERO, 2.0, -100.0).unwrap()
    }

    #[test]
    fn test_flat_terrain() {
        let flat = FlatTerrain::default();
        assert_eq!(flat.height(Vec2::new(10.0, -4.0)), 0.0);
        assert_eq!(flat.slope(Vec2::ZERO), 0.0);
        assert!(!flat.is_water(Vec2::ZERO));
    }

    #[test]
    fn test_raster_slope_matches_ramp() {
        let raster = ramp(0.5);
        let slope = raster.slope(Vec2::new(50.0, 50.0));
        assert!((slope - 0.5).abs() < 1e-3, "slope was {}", slope);

        // Height interpolates between cell centers
        let h = raster.height(Vec2::new(10.0, 10.0));
        assert!((h - 5.0).abs() < 1e-3, "height was {}", h);
    }

    #[test]
    fn test_painted_water() {
        let mut raster = ramp(0.0);
        raster.paint_biome(Vec2::new(50.0, 50.0), 6.0, Biome::River);
        assert!(raster.is_water(Vec2::new(50.0, 50.0)));
        assert!(!raster.is_water(Vec2::new(10.0, 10.0)));
        assert_eq!(raster.biome(Vec2::new(50.0, 51.0)), Biome::River);
    }

    #[test]
    fn test_mismatched_grids_rejected() {
        let heights = Tilemap::new_with(4, 4, 0.0f32);
        let biomes: Tilemap<Biome> = Tilemap::new(3, 4);
        assert!(TerrainRaster::new(heights, biomes, Vec2::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_noise_raster_is_deterministic() {
        let params = NoiseTerrainParams {
            width: 32,
            height: 32,
            ..Default::default()
        };
        let a = TerrainRaster::from_noise(&params, 7).unwrap();
        let b = TerrainRaster::from_noise(&params, 7).unwrap();
        let p = params.origin + Vec2::new(21.3, 40.7);
        assert_eq!(a.height(p), b.height(p));
        assert_eq!(a.biome(p), b.biome(p));
    }
}
