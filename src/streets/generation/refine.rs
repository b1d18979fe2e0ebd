//! Terrain-aware refiner
//!
//! Reroutes a single growth step that climbs too steeply or crosses water.
//! A small cost raster is laid over the step's neighborhood and searched with
//! A*; the cell path is simplified back into a polyline whose endpoints are
//! exactly the requested ones.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec2;

use crate::geometry;
use crate::streets::config::RefinerConfig;
use crate::terrain::TerrainQuery;
use crate::tilemap::Tilemap;

/// Node for the A* priority queue
#[derive(Clone, Copy, Debug)]
struct PathNode {
    x: usize,
    y: usize,
    /// Cost so far plus the straight-line estimate to the goal
    priority: f32,
    cost: f32,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for PathNode {}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
    }
}

/// Whether the straight step from `from` to `to` is too steep or wet to
/// accept as is. Samples every `sample_spacing` meters, endpoints included.
pub fn step_is_rough(
    from: Vec2,
    to: Vec2,
    terrain: &dyn TerrainQuery,
    max_slope: f32,
    sample_spacing: f32,
) -> bool {
    let length = from.distance(to);
    let samples = ((length / sample_spacing.max(0.1)).ceil() as usize).max(1);
    (0..=samples).any(|i| {
        let p = from.lerp(to, i as f32 / samples as f32);
        terrain.slope(p) > max_slope || terrain.is_water(p)
    })
}

/// Least-cost route from `from` to `to` over the terrain.
///
/// Each move costs its length scaled by `1 + slope * slope_cost_multiplier`,
/// plus `water_penalty` when it enters a water cell. Cells steeper than
/// `cliff_slope` are impassable. Returns `None` when no route exists inside
/// the search window or the expansion budget runs out.
pub fn refine_step(
    from: Vec2,
    to: Vec2,
    terrain: &dyn TerrainQuery,
    slope_cost_multiplier: f32,
    config: &RefinerConfig,
) -> Option<Vec<Vec2>> {
    let lo = from.min(to) - Vec2::splat(config.search_margin);
    let hi = from.max(to) + Vec2::splat(config.search_margin);
    let extent = hi - lo;

    // Coarsen the raster when the window would exceed the cell budget
    let max_cells = config.max_cells_per_side.max(4) as f32;
    let cell = config
        .cell_size
        .max(extent.x / (max_cells - 1.0))
        .max(extent.y / (max_cells - 1.0));
    let width = (extent.x / cell).ceil() as usize + 1;
    let height = (extent.y / cell).ceil() as usize + 1;

    let to_world = |x: usize, y: usize| lo + Vec2::new(x as f32, y as f32) * cell;
    let to_cell = |p: Vec2| {
        let c = ((p - lo) / cell).round();
        (
            (c.x.max(0.0) as usize).min(width - 1),
            (c.y.max(0.0) as usize).min(height - 1),
        )
    };

    // Slope and water per cell, sampled once
    let mut slopes: Tilemap<f32> = Tilemap::new(width, height);
    let mut water: Tilemap<bool> = Tilemap::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let p = to_world(x, y);
            slopes.set(x, y, terrain.slope(p));
            water.set(x, y, terrain.is_water(p));
        }
    }

    let (start_x, start_y) = to_cell(from);
    let (end_x, end_y) = to_cell(to);
    let goal = to_world(end_x, end_y);

    let mut cost_map: HashMap<(usize, usize), f32> = HashMap::new();
    let mut came_from: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    let mut pq = BinaryHeap::new();

    cost_map.insert((start_x, start_y), 0.0);
    pq.push(PathNode {
        x: start_x,
        y: start_y,
        priority: to_world(start_x, start_y).distance(goal),
        cost: 0.0,
    });

    let mut expansions = 0usize;
    let mut cells: Option<Vec<(usize, usize)>> = None;

    while let Some(PathNode { x, y, cost, .. }) = pq.pop() {
        if x == end_x && y == end_y {
            let mut path = vec![(x, y)];
            let mut current = (x, y);
            while let Some(&prev) = came_from.get(&current) {
                path.push(prev);
                current = prev;
            }
            path.reverse();
            cells = Some(path);
            break;
        }

        // Skip if we've found a better path to this node
        if let Some(&best_cost) = cost_map.get(&(x, y)) {
            if cost > best_cost {
                continue;
            }
        }

        expansions += 1;
        if expansions > config.max_expansions {
            break;
        }

        for (nx, ny, step) in slopes.neighbors_8(x, y) {
            let move_cost = move_cost(
                step * cell,
                *slopes.get(nx, ny),
                *water.get(nx, ny),
                slope_cost_multiplier,
                config,
            );
            if move_cost == f32::INFINITY {
                continue;
            }

            let new_cost = cost + move_cost;
            let better = cost_map
                .get(&(nx, ny))
                .map_or(true, |&existing| new_cost < existing);
            if better {
                cost_map.insert((nx, ny), new_cost);
                came_from.insert((nx, ny), (x, y));
                pq.push(PathNode {
                    x: nx,
                    y: ny,
                    priority: new_cost + to_world(nx, ny).distance(goal),
                    cost: new_cost,
                });
            }
        }
    }

    let Some(cells) = cells else {
        tracing::debug!(
            target: "settlement_streets::refine",
            expansions,
            width,
            height,
            "refine.no_route"
        );
        return None;
    };

    let mut points: Vec<Vec2> = cells.iter().map(|&(x, y)| to_world(x, y)).collect();
    points[0] = from;
    if points.len() == 1 {
        points.push(to);
    } else {
        let last = points.len() - 1;
        points[last] = to;
    }
    let points = geometry::simplify_polyline(&points, config.simplify_epsilon);

    tracing::trace!(
        target: "settlement_streets::refine",
        expansions,
        vertices = points.len(),
        "refine.routed"
    );
    Some(points)
}

/// Cost of entering a cell; infinite when the cell is a cliff.
fn move_cost(
    distance: f32,
    slope: f32,
    is_water: bool,
    slope_cost_multiplier: f32,
    config: &RefinerConfig,
) -> f32 {
    if slope > config.cliff_slope {
        return f32::INFINITY;
    }
    let mut cost = distance * (1.0 + slope * slope_cost_multiplier);
    if is_water {
        cost += config.water_penalty;
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{Biome, FlatTerrain};

    /// Flat land with a steep wall along x in [-3, 3] except for a gap at
    /// y > 15.
    struct Wall;

    impl TerrainQuery for Wall {
        fn height(&self, _pos: Vec2) -> f32 {
            0.0
        }
        fn slope(&self, pos: Vec2) -> f32 {
            if pos.x.abs() <= 3.0 && pos.y <= 15.0 {
                5.0
            } else {
                0.0
            }
        }
        fn biome(&self, _pos: Vec2) -> Biome {
            Biome::Grassland
        }
    }

    /// A river band along x in [-4, 4].
    struct River;

    impl TerrainQuery for River {
        fn height(&self, _pos: Vec2) -> f32 {
            0.0
        }
        fn slope(&self, _pos: Vec2) -> f32 {
            0.0
        }
        fn biome(&self, pos: Vec2) -> Biome {
            if pos.x.abs() <= 4.0 {
                Biome::River
            } else {
                Biome::Grassland
            }
        }
    }

    #[test]
    fn test_flat_route_is_straight() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(20.0, 0.0);
        let path = refine_step(from, to, &FlatTerrain::default(), 10.0, &RefinerConfig::default()).unwrap();

        assert_eq!(path.first().copied(), Some(from));
        assert_eq!(path.last().copied(), Some(to));
        // Simplification collapses the cell staircase
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_route_detours_around_cliff() {
        let from = Vec2::new(-10.0, 0.0);
        let to = Vec2::new(10.0, 0.0);
        assert!(step_is_rough(from, to, &Wall, 0.3, 1.0));

        let path = refine_step(from, to, &Wall, 10.0, &RefinerConfig::default()).unwrap();
        assert_eq!(path[0], from);
        assert_eq!(*path.last().unwrap(), to);
        // Goes through the gap above the wall
        assert!(path.iter().any(|p| p.y > 15.0));
        assert!(geometry::polyline_length(&path) > from.distance(to));
    }

    #[test]
    fn test_enclosed_target_has_no_route() {
        struct Pit;
        impl TerrainQuery for Pit {
            fn height(&self, _pos: Vec2) -> f32 {
                0.0
            }
            fn slope(&self, pos: Vec2) -> f32 {
                // Ring of cliffs around the target
                let d = pos.distance(Vec2::new(10.0, 0.0));
                if (3.0..=7.0).contains(&d) {
                    9.0
                } else {
                    0.0
                }
            }
            fn biome(&self, _pos: Vec2) -> Biome {
                Biome::Grassland
            }
        }

        let route = refine_step(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), &Pit, 10.0, &RefinerConfig::default());
        assert!(route.is_none());
    }

    #[test]
    fn test_water_is_crossed_when_unavoidable() {
        // The river spans the whole search window, so the route must cross it
        let from = Vec2::new(-10.0, 0.0);
        let to = Vec2::new(10.0, 0.0);
        assert!(step_is_rough(from, to, &River, 0.3, 1.0));

        let path = refine_step(from, to, &River, 10.0, &RefinerConfig::default()).unwrap();
        assert_eq!(*path.last().unwrap(), to);
        // Crosses straight over rather than wandering inside the river
        assert!(geometry::polyline_length(&path) < 30.0);
    }

    #[test]
    fn test_smooth_step_is_not_rough() {
        assert!(!step_is_rough(
            Vec2::ZERO,
            Vec2::new(20.0, 5.0),
            &FlatTerrain::default(),
            0.3,
            2.0
        ));
    }
}
