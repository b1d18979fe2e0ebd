//! Street hierarchy
//!
//! Ranks every segment: the shortest route from the primary entry to the
//! most important reached landmark is the main street, skeleton streets near
//! the entry are secondary, and the rest are tertiary. Large graphs also get
//! rear access lanes behind deep street frontages.

use std::collections::HashSet;

use glam::Vec2;

use crate::geometry;
use crate::streets::config::{HierarchyConfig, LotConfig};
use crate::streets::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::streets::network::StreetNetwork;
use crate::streets::types::{
    Attractor, AttractorKind, Block, BlockId, NodeId, SegmentId, SegmentOrigin, StreetType,
};

use super::blocks::{edge_street_overlaps, node_on_edge};

const STREET_SNAP: f32 = 0.05;

#[derive(Clone, Debug, Default)]
pub struct HierarchyOutcome {
    /// Blocks after rear access lanes were cut in
    pub blocks: Vec<Block>,
    /// End of the main street
    pub main_target: Option<NodeId>,
    pub main_segments: Vec<SegmentId>,
    pub rear_lanes: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Assign street types and widths, then add rear access lanes where the
/// graph is large enough.
pub fn assign_hierarchy(
    network: &mut StreetNetwork,
    attractors: &[Attractor],
    blocks: Vec<Block>,
    center: Vec2,
    config: &HierarchyConfig,
    lots: &LotConfig,
) -> HierarchyOutcome {
    let mut outcome = HierarchyOutcome::default();

    let Some(primary) = network.primary_entry() else {
        for seg in network.segments_mut() {
            seg.street_type = StreetType::Tertiary;
            seg.width = config.tertiary_width;
        }
        outcome.blocks = blocks;
        return outcome;
    };

    let target = main_street_target(network, attractors).or_else(|| {
        outcome.diagnostics.push(Diagnostic::new(
            DiagnosticKind::ConnectivityViolation,
            Severity::Info,
            "no key building reached; main street runs toward the settlement center",
        ));
        network.nearest_node(center)
    });

    let main: HashSet<SegmentId> = target
        .and_then(|t| network.shortest_path(primary, t))
        .unwrap_or_default()
        .into_iter()
        .collect();
    let hops = network.hop_distances(primary);

    for seg in network.segments_mut() {
        let near_hop = [seg.from, seg.to]
            .iter()
            .filter_map(|n| hops.get(n))
            .min()
            .copied()
            .unwrap_or(u32::MAX);
        seg.street_type = if main.contains(&seg.id) {
            StreetType::Main
        } else {
            match seg.origin {
                SegmentOrigin::Skeleton if near_hop < config.secondary_max_hops => StreetType::Secondary,
                SegmentOrigin::Skeleton | SegmentOrigin::Infill => StreetType::Tertiary,
                SegmentOrigin::RearAccess => StreetType::RearAccess,
            }
        };
        seg.width = config.width_for(seg.street_type);
    }

    let mut main_segments: Vec<SegmentId> = main.into_iter().collect();
    main_segments.sort();
    outcome.main_segments = main_segments;
    outcome.main_target = target;

    if network.segment_count() >= config.rear_access_min_segments {
        let mut result = Vec::with_capacity(blocks.len());
        for block in blocks {
            match add_rear_lane(network, &block, config, lots) {
                Some((front, back)) => {
                    outcome.rear_lanes += 1;
                    for outline in [front, back] {
                        let mut piece = Block::new(block.id, outline);
                        piece.is_exterior = block.is_exterior;
                        piece.needs_manual_review = block.needs_manual_review;
                        result.push(piece);
                    }
                }
                None => result.push(block),
            }
        }
        for (i, block) in result.iter_mut().enumerate() {
            block.id = BlockId(i as u32);
        }
        outcome.blocks = result;
    } else {
        outcome.blocks = blocks;
    }

    tracing::info!(
        target: "settlement_streets::hierarchy",
        main = network.count_by_type(StreetType::Main),
        secondary = network.count_by_type(StreetType::Secondary),
        tertiary = network.count_by_type(StreetType::Tertiary),
        rear_access = outcome.rear_lanes,
        "hierarchy.assigned"
    );
    outcome
}

/// Node that reached the heaviest key building, lowest attractor index on
/// ties.
fn main_street_target(network: &StreetNetwork, attractors: &[Attractor]) -> Option<NodeId> {
    let mut best: Option<(f32, NodeId)> = None;
    for attractor in attractors {
        if attractor.kind != AttractorKind::KeyBuilding || !attractor.reached {
            continue;
        }
        let Some(node) = attractor.reached_by else {
            continue;
        };
        if best.map_or(true, |(w, _)| attractor.weight > w) {
            best = Some((attractor.weight, network.resolve(node)));
        }
    }
    best.map(|(_, node)| node)
}

/// Cut a lane parallel to the block's longest street frontage, one lot
/// depth in. Returns the front and back pieces.
fn add_rear_lane(
    network: &mut StreetNetwork,
    block: &Block,
    config: &HierarchyConfig,
    lots: &LotConfig,
) -> Option<(Vec<Vec2>, Vec<Vec2>)> {
    if block.needs_manual_review {
        return None;
    }
    let poly = &block.boundary;

    // Longest street frontage
    let mut frontage: Option<(usize, f32)> = None;
    for i in 0..poly.len() {
        let (a, b) = geometry::edge(poly, i);
        let covered: f32 = edge_street_overlaps(a, b, network, STREET_SNAP)
            .iter()
            .filter(|(seg, _, _)| network.segment(*seg).street_type != StreetType::RearAccess)
            .map(|(_, t0, t1)| (t1 - t0) * a.distance(b))
            .sum();
        if covered > 0.0 && frontage.map_or(true, |(_, best)| covered > best) {
            frontage = Some((i, covered));
        }
    }
    let (edge, _) = frontage?;
    let (a, b) = geometry::edge(poly, edge);
    let len = a.distance(b);
    if len <= geometry::EPSILON {
        return None;
    }
    let along = (b - a) / len;
    let inward = along.perp();
    let mid = (a + b) * 0.5;

    let depth = geometry::first_ray_hit(mid + inward * 0.01, inward, poly, &[edge])?.distance;
    if depth <= config.rear_access_depth_factor * lots.target_depth {
        return None;
    }

    let anchor = mid + inward * lots.target_depth;
    let right = geometry::first_ray_hit(anchor, along, poly, &[])?;
    let left = geometry::first_ray_hit(anchor, -along, poly, &[])?;
    if left.edge == right.edge || left.point.distance(right.point) < 2.0 * lots.min_frontage {
        return None;
    }
    let (back, front) = geometry::split_polygon(poly, (right.edge, right.point), (left.edge, left.point))?;

    let (la, lb) = geometry::edge(poly, left.edge);
    let (ra, rb) = geometry::edge(poly, right.edge);
    let from = node_on_edge(network, la, lb, left.point, STREET_SNAP);
    let to = node_on_edge(network, ra, rb, right.point, STREET_SNAP);
    let seg = network.add_segment(from, to, StreetType::RearAccess, SegmentOrigin::RearAccess, Vec::new())?;
    network.segment_mut(seg).width = config.rear_access_width;

    // The front piece is the one holding the frontage midpoint
    if geometry::point_in_or_on_polygon(mid, &front, STREET_SNAP) {
        Some((front, back))
    } else {
        Some((back, front))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Entry at the east end of a straight street with a side street.
    fn sample_network() -> (StreetNetwork, Vec<NodeId>) {
        let mut network = StreetNetwork::new();
        let points = [
            Vec2::new(100.0, 0.0),
            Vec2::new(80.0, 0.0),
            Vec2::new(60.0, 0.0),
            Vec2::new(40.0, 0.0),
            Vec2::new(60.0, 20.0),
            Vec2::new(60.0, 40.0),
        ];
        let ids: Vec<NodeId> = points.iter().map(|&p| network.add_node(p)).collect();
        network.set_primary_entry(ids[0]);
        for (a, b) in [(0, 1), (1, 2), (2, 3), (2, 4), (4, 5)] {
            network.add_segment(ids[a], ids[b], StreetType::Secondary, SegmentOrigin::Skeleton, Vec::new());
        }
        (network, ids)
    }

    #[test]
    fn test_main_street_follows_heaviest_landmark() {
        let (mut network, ids) = sample_network();
        let mut church = Attractor::new(Vec2::new(40.0, 0.0), 1.0, AttractorKind::KeyBuilding);
        church.reached = true;
        church.reached_by = Some(ids[3]);
        let mut well = Attractor::new(Vec2::new(60.0, 40.0), 0.5, AttractorKind::KeyBuilding);
        well.reached = true;
        well.reached_by = Some(ids[5]);

        let config = HierarchyConfig {
            secondary_max_hops: 3,
            ..Default::default()
        };
        let outcome = assign_hierarchy(
            &mut network,
            &[well, church],
            Vec::new(),
            Vec2::ZERO,
            &config,
            &LotConfig::default(),
        );

        assert_eq!(outcome.main_target, Some(ids[3]));
        assert_eq!(outcome.main_segments.len(), 3);
        assert_eq!(network.count_by_type(StreetType::Main), 3);
        // Side street: first hop within range, second beyond
        let side = network.segment_between(ids[2], ids[4]).unwrap();
        assert_eq!(network.segment(side).street_type, StreetType::Secondary);
        let far = network.segment_between(ids[4], ids[5]).unwrap();
        assert_eq!(network.segment(far).street_type, StreetType::Tertiary);

        // Widths strictly decrease with level
        for seg in network.segments() {
            assert_eq!(seg.width, config.width_for(seg.street_type));
        }
    }

    #[test]
    fn test_fallback_target_is_near_center() {
        let (mut network, ids) = sample_network();
        let outcome = assign_hierarchy(
            &mut network,
            &[],
            Vec::new(),
            Vec2::new(38.0, 2.0),
            &HierarchyConfig::default(),
            &LotConfig::default(),
        );
        assert_eq!(outcome.main_target, Some(ids[3]));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn test_rear_lane_splits_deep_block() {
        // A 60 x 100 block fronting a street along its south side
        let mut network = StreetNetwork::new();
        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(60.0, 0.0),
            Vec2::new(60.0, 100.0),
            Vec2::new(0.0, 100.0),
        ];
        let ids: Vec<NodeId> = corners.iter().map(|&p| network.add_node(p)).collect();
        network.set_primary_entry(ids[0]);
        network.add_segment(ids[0], ids[1], StreetType::Secondary, SegmentOrigin::Skeleton, Vec::new());
        let block = Block::new(BlockId(0), corners.to_vec());

        let config = HierarchyConfig {
            rear_access_min_segments: 1,
            ..Default::default()
        };
        let outcome = assign_hierarchy(
            &mut network,
            &[],
            vec![block],
            Vec2::new(30.0, 50.0),
            &config,
            &LotConfig::default(),
        );

        assert_eq!(outcome.rear_lanes, 1);
        assert_eq!(outcome.blocks.len(), 2);
        assert_eq!(network.count_by_type(StreetType::RearAccess), 1);
        let lane = network.segments().find(|s| s.street_type == StreetType::RearAccess).unwrap();
        assert_eq!(lane.width, config.rear_access_width);
        let (p, q) = lane.chord();
        assert!((p.y - 25.0).abs() < 1e-3 && (q.y - 25.0).abs() < 1e-3);
        // Front piece is one lot deep
        assert!((outcome.blocks[0].area - 60.0 * 25.0).abs() < 0.1);
    }
}
