//! Street skeleton growth
//!
//! Space colonization: every unreached attractor pulls on the closest active
//! node within `influence_radius`, nodes step toward the weighted pull, and
//! attractors within `kill_radius` of a new node are consumed. Steps that
//! climb too steeply or cross water are rerouted by the refiner.

use std::collections::BTreeMap;

use glam::Vec2;

use crate::geometry;
use crate::streets::config::{RefinerConfig, SkeletonConfig};
use crate::streets::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::streets::network::StreetNetwork;
use crate::streets::types::{Attractor, AttractorKind, EntryPoint, NodeId, SegmentOrigin, StreetType};
use crate::terrain::TerrainQuery;

use super::refine;

/// Result of one growth run.
#[derive(Clone, Debug)]
pub struct SkeletonOutcome {
    pub network: StreetNetwork,
    pub attractors: Vec<Attractor>,
    pub iterations: usize,
    /// Steps that went through the refiner
    pub refined_steps: usize,
    /// Candidates rejected by the boundary, spacing, angle or terrain checks
    pub rejected: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl SkeletonOutcome {
    pub fn unreached(&self) -> usize {
        self.attractors.iter().filter(|a| !a.reached).count()
    }
}

/// A proposed growth step from an active node.
#[derive(Clone, Debug)]
struct Candidate {
    source: NodeId,
    direction: Vec2,
    step: f32,
    /// Heaviest attractor pulling on the source (0 for momentum steps)
    weight: f32,
}

/// Grow the street skeleton from `seeds` toward `attractors`.
///
/// The first seed becomes the network's primary entry. Growth stays inside
/// `boundary` (within `boundary_tolerance`). The loop ends when no node is
/// active, every attractor is reached, or `max_iterations` runs out; the
/// last case still returns the partial skeleton with a growth-stall
/// diagnostic.
pub fn grow_skeleton(
    seeds: &[EntryPoint],
    mut attractors: Vec<Attractor>,
    boundary: &[Vec2],
    terrain: &dyn TerrainQuery,
    config: &SkeletonConfig,
    refiner: &RefinerConfig,
) -> SkeletonOutcome {
    let mut network = StreetNetwork::new();
    let mut active: Vec<bool> = Vec::new();
    let mut diagnostics = Vec::new();

    for (i, seed) in seeds.iter().enumerate() {
        let id = network.add_node(seed.position);
        let node = network.node_mut(id);
        node.heading = seed.direction.normalize_or_zero();
        node.is_entry = true;
        if i == 0 {
            network.set_primary_entry(id);
        }
        active.push(true);
        mark_reached(&mut network, &mut attractors, id, config.kill_radius);
    }

    let min_angle = config.min_branch_angle.to_radians();
    let max_angle = config.max_branch_angle.to_radians();
    let mut iterations = 0;
    let mut refined_steps = 0;
    let mut rejected = 0;

    while iterations < config.max_iterations {
        if attractors.iter().all(|a| a.reached) || !active.iter().any(|&a| a) {
            break;
        }
        iterations += 1;

        // Phase 1: each unreached attractor pulls on its closest active node
        let mut assigned: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
        for (ai, attractor) in attractors.iter().enumerate() {
            if attractor.reached {
                continue;
            }
            let mut best: Option<(NodeId, f32)> = None;
            for node in network.nodes() {
                if !active[node.id.index()] {
                    continue;
                }
                let d = node.position.distance(attractor.position);
                if d <= config.influence_radius && best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((node.id, d));
                }
            }
            if let Some((id, _)) = best {
                assigned.entry(id).or_default().push(ai);
            }
        }

        // Phase 2: one candidate per active node
        let mut candidates = Vec::new();
        let active_ids: Vec<NodeId> = network
            .nodes()
            .filter(|n| active[n.id.index()])
            .map(|n| n.id)
            .collect();
        for id in active_ids {
            let node = network.node(id);
            let pos = node.position;
            match assigned.get(&id) {
                Some(pulling) => {
                    let mut direction = Vec2::ZERO;
                    let mut nearest = f32::INFINITY;
                    let mut weight: f32 = 0.0;
                    for &ai in pulling {
                        let a = &attractors[ai];
                        let d = pos.distance(a.position);
                        if d > geometry::EPSILON {
                            direction += (a.position - pos) / d * (a.weight / d);
                        }
                        nearest = nearest.min(d);
                        weight = weight.max(a.weight);
                    }
                    let direction = direction.try_normalize().unwrap_or(node.heading);
                    if direction == Vec2::ZERO {
                        active[id.index()] = false;
                        continue;
                    }
                    candidates.push(Candidate {
                        source: id,
                        direction,
                        step: config.segment_length.min(nearest),
                        weight,
                    });
                }
                None => {
                    // Leaves keep their heading while something lies ahead
                    let leaf = network.degree(id) <= 1;
                    let ahead = node.heading != Vec2::ZERO
                        && attractors.iter().any(|a| {
                            !a.reached
                                && a.position.distance(pos) <= config.influence_radius
                                && (a.position - pos).dot(node.heading) > 0.0
                        });
                    if leaf && ahead {
                        candidates.push(Candidate {
                            source: id,
                            direction: node.heading,
                            step: config.segment_length,
                            weight: 0.0,
                        });
                    } else {
                        active[id.index()] = false;
                    }
                }
            }
        }

        // Newest tips first, then the strongest pull
        candidates.sort_by(|a, b| {
            b.source
                .cmp(&a.source)
                .then(b.weight.total_cmp(&a.weight))
        });

        // Phase 3: accept up to the per-iteration branch budget
        let mut accepted = 0;
        for candidate in candidates {
            if accepted >= config.max_branches_per_iteration {
                break;
            }
            let source = candidate.source;
            let source_node = network.node(source);
            let from = source_node.position;

            let mut direction = candidate.direction;
            if source_node.parent.is_some() && source_node.heading != Vec2::ZERO {
                let heading = source_node.heading;
                if geometry::angle_between(direction, -heading) < min_angle {
                    active[source.index()] = false;
                    rejected += 1;
                    continue;
                }
                let turn = geometry::signed_angle(heading, direction);
                if turn.abs() > max_angle {
                    direction = geometry::rotate(heading, max_angle.copysign(turn));
                }
            }

            let mut to = from + direction * candidate.step;
            let mut reaches_entry = false;
            if let Some(entry) = attractors.iter().find(|a| {
                !a.reached && a.kind == AttractorKind::External && a.position.distance(to) <= config.kill_radius
            }) {
                to = entry.position;
                reaches_entry = true;
            }

            if !geometry::point_in_or_on_polygon(to, boundary, config.boundary_tolerance) {
                active[source.index()] = false;
                rejected += 1;
                continue;
            }
            if network
                .nodes()
                .any(|n| n.id != source && n.position.distance(to) < config.min_node_spacing)
            {
                active[source.index()] = false;
                rejected += 1;
                continue;
            }

            let points = if refine::step_is_rough(from, to, terrain, config.max_slope, refiner.cell_size) {
                let route = refine::refine_step(from, to, terrain, config.slope_cost_multiplier, refiner)
                    .filter(|route| {
                        route
                            .iter()
                            .all(|&p| geometry::point_in_or_on_polygon(p, boundary, config.boundary_tolerance))
                    });
                match route {
                    Some(route) => {
                        refined_steps += 1;
                        route
                    }
                    None => {
                        active[source.index()] = false;
                        rejected += 1;
                        continue;
                    }
                }
            } else {
                vec![from, to]
            };

            let heading = points
                .len()
                .checked_sub(2)
                .map(|i| (to - points[i]).normalize_or_zero())
                .unwrap_or(direction);
            let id = network.add_node(to);
            {
                let node = network.node_mut(id);
                node.parent = Some(source);
                node.heading = if heading == Vec2::ZERO { direction } else { heading };
                node.is_entry = reaches_entry;
            }
            active.push(true);
            network.add_segment(source, id, StreetType::Secondary, SegmentOrigin::Skeleton, points);
            mark_reached(&mut network, &mut attractors, id, config.kill_radius);
            accepted += 1;
        }
    }

    let unreached = attractors.iter().filter(|a| !a.reached).count();
    if unreached > 0 {
        let key_unreached = attractors
            .iter()
            .filter(|a| !a.reached && a.kind == AttractorKind::KeyBuilding)
            .count();
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::GrowthStall,
            Severity::Warning,
            format!(
                "{} of {} attractors unreached after {} iterations ({} key buildings)",
                unreached,
                attractors.len(),
                iterations,
                key_unreached
            ),
        ));
    }

    tracing::info!(
        target: "settlement_streets::skeleton",
        iterations,
        nodes = network.node_count(),
        segments = network.segment_count(),
        refined_steps,
        rejected,
        unreached,
        "skeleton.grown"
    );

    SkeletonOutcome {
        network,
        attractors,
        iterations,
        refined_steps,
        rejected,
        diagnostics,
    }
}

/// Consume every unreached attractor within `kill_radius` of `node`.
fn mark_reached(network: &mut StreetNetwork, attractors: &mut [Attractor], node: NodeId, kill_radius: f32) {
    let pos = network.position(node);
    for attractor in attractors.iter_mut() {
        if attractor.reached || attractor.position.distance(pos) > kill_radius {
            continue;
        }
        attractor.reached = true;
        attractor.reached_by = Some(node);
        if attractor.kind == AttractorKind::KeyBuilding {
            network.node_mut(node).is_key_building = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streets::types::RoadClass;
    use crate::terrain::{Biome, FlatTerrain};

    fn square(half: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(-half, -half),
            Vec2::new(half, -half),
            Vec2::new(half, half),
            Vec2::new(-half, half),
        ]
    }

    fn test_config() -> SkeletonConfig {
        SkeletonConfig {
            segment_length: 20.0,
            kill_radius: 12.0,
            max_iterations: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_grows_from_entry_to_center() {
        let boundary = square(100.0);
        let entry = EntryPoint::new(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Road);
        let mut attractors = vec![Attractor::new(Vec2::ZERO, 1.0, AttractorKind::KeyBuilding)];
        attractors[0].key_building = Some(0);

        let outcome = grow_skeleton(
            &[entry],
            attractors,
            &boundary,
            &FlatTerrain::default(),
            &test_config(),
            &RefinerConfig::default(),
        );

        assert!(outcome.attractors[0].reached);
        assert_eq!(outcome.unreached(), 0);
        assert!(outcome.diagnostics.is_empty());

        let network = &outcome.network;
        let root = network.primary_entry().unwrap();
        assert_eq!(network.position(root), Vec2::new(100.0, 0.0));
        let hub = outcome.attractors[0].reached_by.unwrap();
        assert!(network.position(hub).distance(Vec2::ZERO) <= 12.0);
        assert!(network.node(hub).is_key_building);
        assert!(network.is_reachable(root, hub));

        // Every node stays inside the boundary
        for node in network.nodes() {
            assert!(geometry::point_in_or_on_polygon(node.position, &boundary, 0.5));
        }
    }

    #[test]
    fn test_stall_reports_unreached_attractors() {
        let boundary = square(100.0);
        let entry = EntryPoint::new(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Road);
        let attractors = vec![
            Attractor::new(Vec2::new(-80.0, 0.0), 1.0, AttractorKind::KeyBuilding),
            Attractor::new(Vec2::new(0.0, 80.0), 1.0, AttractorKind::KeyBuilding),
        ];
        let config = SkeletonConfig {
            max_iterations: 2,
            ..test_config()
        };

        let outcome = grow_skeleton(
            &[entry],
            attractors,
            &boundary,
            &FlatTerrain::default(),
            &config,
            &RefinerConfig::default(),
        );

        assert_eq!(outcome.iterations, 2);
        assert!(outcome.unreached() > 0);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::GrowthStall);
        // Partial skeleton is still returned
        assert!(outcome.network.segment_count() > 0);
    }

    #[test]
    fn test_external_entry_is_snapped() {
        let boundary = square(100.0);
        let primary = EntryPoint::new(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Road);
        let attractors = vec![Attractor::new(Vec2::new(-100.0, 0.0), 0.6, AttractorKind::External)];

        let outcome = grow_skeleton(
            &[primary],
            attractors,
            &boundary,
            &FlatTerrain::default(),
            &test_config(),
            &RefinerConfig::default(),
        );

        assert!(outcome.attractors[0].reached);
        let node = outcome.attractors[0].reached_by.unwrap();
        assert_eq!(outcome.network.position(node), Vec2::new(-100.0, 0.0));
        assert!(outcome.network.node(node).is_entry);
    }

    #[test]
    fn test_turns_stay_within_branch_angle() {
        // The second attractor sits behind the entry heading
        let boundary = square(100.0);
        let entry = EntryPoint::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), RoadClass::Lane);
        let attractors = vec![
            Attractor::new(Vec2::new(40.0, 0.0), 1.0, AttractorKind::Boundary),
            Attractor::new(Vec2::new(-60.0, 0.0), 1.0, AttractorKind::Boundary),
        ];
        let config = SkeletonConfig {
            kill_radius: 21.0,
            max_iterations: 10,
            ..test_config()
        };

        let outcome = grow_skeleton(
            &[entry],
            attractors,
            &boundary,
            &FlatTerrain::default(),
            &config,
            &RefinerConfig::default(),
        );

        // No grown node ever steps back past its parent
        for node in outcome.network.nodes() {
            if let Some(parent) = node.parent {
                let back = outcome.network.position(parent) - node.position;
                let heading = outcome.network.node(parent).heading;
                if outcome.network.node(parent).parent.is_some() {
                    assert!(geometry::angle_between(-back, heading).to_degrees() <= 45.0 + 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_cliff_step_is_rerouted_or_dropped() {
        struct Ridge;
        impl TerrainQuery for Ridge {
            fn height(&self, _pos: Vec2) -> f32 {
                0.0
            }
            fn slope(&self, pos: Vec2) -> f32 {
                if (pos.x - 50.0).abs() < 2.0 && pos.y.abs() < 15.0 {
                    3.0
                } else {
                    0.0
                }
            }
            fn biome(&self, _pos: Vec2) -> Biome {
                Biome::Grassland
            }
        }

        let boundary = square(100.0);
        let entry = EntryPoint::new(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Road);
        let attractors = vec![Attractor::new(Vec2::ZERO, 1.0, AttractorKind::KeyBuilding)];

        let outcome = grow_skeleton(
            &[entry],
            attractors,
            &boundary,
            &Ridge,
            &test_config(),
            &RefinerConfig::default(),
        );

        // The direct line from the entry is blocked
        assert!(refine::step_is_rough(Vec2::new(100.0, 0.0), Vec2::ZERO, &Ridge, 2.9, 0.5));
        assert!(outcome.refined_steps >= 1);

        // Streets reach the far side of the ridge
        assert!(outcome.network.nodes().any(|n| n.position.x < 48.0));
        // ...but only by bending around its ends
        let (core_a, core_b) = (Vec2::new(50.0, -13.0), Vec2::new(50.0, 13.0));
        for seg in outcome.network.segments() {
            for w in seg.points.windows(2) {
                assert!(
                    geometry::segment_intersection(w[0], w[1], core_a, core_b).is_none(),
                    "segment {} crosses the ridge between ({}, {}) and ({}, {})",
                    seg.id.0,
                    w[0].x,
                    w[0].y,
                    w[1].x,
                    w[1].y
                );
            }
        }
        assert!(outcome.network.segments().any(|s| s.points.len() > 2));
    }
}
