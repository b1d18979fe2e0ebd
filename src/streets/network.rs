//! Street network arena
//!
//! Nodes and segments live in index-stable vectors. Nothing is physically
//! deleted: merged nodes point at their survivor through `merged_into`, and
//! removed segments keep their slot with `removed = true`. Every public lookup
//! resolves node ids first, so ids handed out earlier stay usable.

use std::collections::{HashMap, VecDeque};

use glam::Vec2;
use pathfinding::prelude::dijkstra;

use crate::geometry;

use super::types::{NodeId, SegmentId, SegmentOrigin, StreetNode, StreetSegment, StreetType};

/// Upper bound on splits performed by one [`StreetNetwork::finalize`] call.
const MAX_FINALIZE_SPLITS: usize = 10_000;

/// Merge and finalize rounds tried by [`StreetNetwork::consolidate`].
const MAX_CONSOLIDATE_ROUNDS: usize = 8;

/// Nodes this close to the settlement outline keep their position on merge.
const ANCHOR_TOLERANCE: f32 = 0.5;

/// Outcome of [`StreetNetwork::merge_nearby_nodes`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    /// Number of clusters collapsed
    pub clusters: usize,
    /// Nodes redirected to a survivor
    pub merged_nodes: usize,
    pub removed_loops: usize,
    pub removed_duplicates: usize,
}

/// Outcome of [`StreetNetwork::finalize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    pub crossings: usize,
    pub t_junctions: usize,
    /// True when the split cap stopped the pass early
    pub capped: bool,
}

/// Outcome of [`StreetNetwork::consolidate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsolidateReport {
    pub rounds: usize,
    pub merged_nodes: usize,
    pub crossings: usize,
    pub t_junctions: usize,
    /// Finalize hit its split cap, or nodes closer than the merge radius
    /// were still left after the last round
    pub capped: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StreetNetwork {
    nodes: Vec<StreetNode>,
    segments: Vec<StreetSegment>,
    primary_entry: Option<NodeId>,
}

impl StreetNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn add_node(&mut self, position: Vec2) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(StreetNode {
            id,
            position,
            parent: None,
            heading: Vec2::ZERO,
            edges: Vec::new(),
            is_entry: false,
            is_key_building: false,
            merged_into: None,
        });
        id
    }

    /// Follow merge redirects to the surviving node.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(next) = self.nodes[current.index()].merged_into {
            current = next;
        }
        current
    }

    pub fn node(&self, id: NodeId) -> &StreetNode {
        &self.nodes[self.resolve(id).index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut StreetNode {
        let id = self.resolve(id);
        &mut self.nodes[id.index()]
    }

    pub fn position(&self, id: NodeId) -> Vec2 {
        self.node(id).position
    }

    /// Surviving (non-merged) nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &StreetNode> {
        self.nodes.iter().filter(|n| n.merged_into.is_none())
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn set_primary_entry(&mut self, id: NodeId) {
        self.primary_entry = Some(id);
        self.node_mut(id).is_entry = true;
    }

    pub fn primary_entry(&self) -> Option<NodeId> {
        self.primary_entry.map(|id| self.resolve(id))
    }

    /// Nearest surviving node to `pos`, lowest id on ties.
    pub fn nearest_node(&self, pos: Vec2) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for node in self.nodes() {
            let d = node.position.distance(pos);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((node.id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn find_node_near(&self, pos: Vec2, tolerance: f32) -> Option<NodeId> {
        self.nearest_node(pos)
            .filter(|&id| self.position(id).distance(pos) <= tolerance)
    }

    // =========================================================================
    // Segments
    // =========================================================================

    /// Connect two nodes. `points` may carry refined geometry; its endpoints
    /// are snapped onto the nodes. Self-loops are refused.
    pub fn add_segment(
        &mut self,
        from: NodeId,
        to: NodeId,
        street_type: StreetType,
        origin: SegmentOrigin,
        points: Vec<Vec2>,
    ) -> Option<SegmentId> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        if from == to {
            return None;
        }

        let mut points = if points.len() >= 2 {
            points
        } else {
            vec![self.position(from), self.position(to)]
        };
        let last = points.len() - 1;
        points[0] = self.position(from);
        points[last] = self.position(to);

        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(StreetSegment {
            id,
            from,
            to,
            street_type,
            width: 0.0,
            length: geometry::polyline_length(&points),
            points,
            origin,
            removed: false,
        });
        self.nodes[from.index()].edges.push(id);
        self.nodes[to.index()].edges.push(id);
        Some(id)
    }

    pub fn segment(&self, id: SegmentId) -> &StreetSegment {
        &self.segments[id.index()]
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> &mut StreetSegment {
        &mut self.segments[id.index()]
    }

    /// Live segments in id order.
    pub fn segments(&self) -> impl Iterator<Item = &StreetSegment> {
        self.segments.iter().filter(|s| !s.removed)
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut StreetSegment> {
        self.segments.iter_mut().filter(|s| !s.removed)
    }

    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    /// Neighboring nodes with the connecting segment.
    pub fn neighbors(&self, id: NodeId) -> Vec<(NodeId, SegmentId)> {
        let id = self.resolve(id);
        self.nodes[id.index()]
            .edges
            .iter()
            .filter(|&&s| !self.segments[s.index()].removed)
            .map(|&s| (self.segments[s.index()].other_end(id), s))
            .collect()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors(id).len()
    }

    pub fn segment_between(&self, a: NodeId, b: NodeId) -> Option<SegmentId> {
        let b = self.resolve(b);
        self.neighbors(a)
            .into_iter()
            .filter(|&(n, _)| n == b)
            .map(|(_, s)| s)
            .min_by(|&x, &y| {
                self.segment(x)
                    .length
                    .total_cmp(&self.segment(y).length)
                    .then(x.cmp(&y))
            })
    }

    pub fn total_length(&self) -> f32 {
        self.segments().map(|s| s.length).sum()
    }

    pub fn count_by_type(&self, street_type: StreetType) -> usize {
        self.segments().filter(|s| s.street_type == street_type).count()
    }

    /// Split a segment at `pos`, returning the node now sitting there.
    /// Positions within `tolerance` of an endpoint reuse that endpoint.
    pub fn split_segment_at(&mut self, id: SegmentId, pos: Vec2, tolerance: f32) -> NodeId {
        let seg = self.segment(id);
        let (from, to) = (seg.from, seg.to);
        if self.position(from).distance(pos) <= tolerance {
            return from;
        }
        if self.position(to).distance(pos) <= tolerance {
            return to;
        }
        let node = self.add_node(pos);
        self.split_segment_with_node(id, node);
        node
    }

    /// Split a segment so that it passes through an existing node. The
    /// original id keeps the `from` half; the new segment takes the rest.
    pub fn split_segment_with_node(&mut self, id: SegmentId, node: NodeId) -> Option<SegmentId> {
        let node = self.resolve(node);
        let pos = self.position(node);
        let seg = self.segments[id.index()].clone();
        if seg.removed || seg.from == node || seg.to == node {
            return None;
        }

        // Piece of the polyline closest to the split point
        let mut piece = 0;
        let mut best = f32::INFINITY;
        for (i, w) in seg.points.windows(2).enumerate() {
            let d = geometry::distance_to_segment(pos, w[0], w[1]);
            if d < best {
                best = d;
                piece = i;
            }
        }

        let mut first: Vec<Vec2> = seg.points[..=piece].to_vec();
        first.push(pos);
        let mut second = vec![pos];
        second.extend_from_slice(&seg.points[piece + 1..]);

        let new_id = SegmentId(self.segments.len() as u32);
        {
            let s = &mut self.segments[id.index()];
            s.to = node;
            s.length = geometry::polyline_length(&first);
            s.points = first;
        }
        self.segments.push(StreetSegment {
            id: new_id,
            from: node,
            to: seg.to,
            street_type: seg.street_type,
            width: seg.width,
            length: geometry::polyline_length(&second),
            points: second,
            origin: seg.origin,
            removed: false,
        });

        for e in self.nodes[seg.to.index()].edges.iter_mut() {
            if *e == id {
                *e = new_id;
            }
        }
        self.nodes[node.index()].edges.push(id);
        self.nodes[node.index()].edges.push(new_id);
        Some(new_id)
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Collapse nodes within `radius` of each other onto their centroid.
    ///
    /// Clusters are seeded greedily in id order; the lowest id survives and
    /// inherits the entry/key-building flags. A cluster holding an entry node
    /// or a node on `boundary` collapses onto that node's position instead,
    /// so streets keep meeting the settlement outline. Incident segments are
    /// redirected, self-loops dropped, and parallel duplicates reduced to
    /// the lowest segment id.
    pub fn merge_nearby_nodes(&mut self, radius: f32, boundary: &[Vec2]) -> MergeReport {
        let mut report = MergeReport::default();
        let live: Vec<NodeId> = self.nodes().map(|n| n.id).collect();
        let mut absorbed = vec![false; self.nodes.len()];

        for (i, &seed) in live.iter().enumerate() {
            if absorbed[seed.index()] {
                continue;
            }
            let seed_pos = self.nodes[seed.index()].position;
            let mut cluster = vec![seed];
            for &other in &live[i + 1..] {
                if !absorbed[other.index()]
                    && self.nodes[other.index()].position.distance(seed_pos) <= radius
                {
                    cluster.push(other);
                }
            }
            if cluster.len() < 2 {
                continue;
            }

            let anchor = cluster
                .iter()
                .map(|id| &self.nodes[id.index()])
                .find(|n| n.is_entry || geometry::distance_to_polygon(n.position, boundary) <= ANCHOR_TOLERANCE)
                .map(|n| n.position);
            let centroid = anchor.unwrap_or_else(|| {
                geometry::vertex_average(
                    &cluster
                        .iter()
                        .map(|id| self.nodes[id.index()].position)
                        .collect::<Vec<_>>(),
                )
            });
            for &other in &cluster[1..] {
                absorbed[other.index()] = true;
                let (is_entry, is_key) = {
                    let n = &mut self.nodes[other.index()];
                    n.merged_into = Some(seed);
                    (n.is_entry, n.is_key_building)
                };
                let survivor = &mut self.nodes[seed.index()];
                survivor.is_entry |= is_entry;
                survivor.is_key_building |= is_key;
                report.merged_nodes += 1;
            }
            self.nodes[seed.index()].position = centroid;
            report.clusters += 1;
        }

        if report.clusters == 0 {
            return report;
        }

        let mut seen: HashMap<(NodeId, NodeId), SegmentId> = HashMap::new();
        for idx in 0..self.segments.len() {
            if self.segments[idx].removed {
                continue;
            }
            let from = self.resolve(self.segments[idx].from);
            let to = self.resolve(self.segments[idx].to);
            if from == to {
                self.segments[idx].removed = true;
                report.removed_loops += 1;
                continue;
            }
            let key = if from < to { (from, to) } else { (to, from) };
            if let Some(&kept) = seen.get(&key) {
                // Keep the higher-ranked type on the survivor
                let street_type = self.segments[idx].street_type;
                let survivor = &mut self.segments[kept.index()];
                survivor.street_type = survivor.street_type.min(street_type);
                self.segments[idx].removed = true;
                report.removed_duplicates += 1;
                continue;
            }
            seen.insert(key, SegmentId(idx as u32));

            let from_pos = self.nodes[from.index()].position;
            let to_pos = self.nodes[to.index()].position;
            let seg = &mut self.segments[idx];
            seg.from = from;
            seg.to = to;
            let last = seg.points.len() - 1;
            seg.points[0] = from_pos;
            seg.points[last] = to_pos;
            seg.length = geometry::polyline_length(&seg.points);
        }

        self.rebuild_adjacency();
        report
    }

    /// Merge nodes within `radius` and make the network planar again,
    /// repeating until no two live nodes are within `radius` of each other.
    /// Crossing splits can leave fresh nodes next to old ones, hence the
    /// rounds.
    pub fn consolidate(&mut self, radius: f32, tolerance: f32, boundary: &[Vec2]) -> ConsolidateReport {
        let mut report = ConsolidateReport::default();
        while report.rounds < MAX_CONSOLIDATE_ROUNDS {
            report.rounds += 1;
            if radius > 0.0 {
                report.merged_nodes += self.merge_nearby_nodes(radius, boundary).merged_nodes;
            }
            let finalized = self.finalize(tolerance);
            report.crossings += finalized.crossings;
            report.t_junctions += finalized.t_junctions;
            if finalized.capped {
                report.capped = true;
                return report;
            }
            if radius <= 0.0 || self.closest_node_pair().map_or(true, |(_, _, d)| d > radius) {
                return report;
            }
        }
        report.capped = true;
        report
    }

    /// The two live nodes closest to each other, lowest ids on ties.
    pub fn closest_node_pair(&self) -> Option<(NodeId, NodeId, f32)> {
        let live: Vec<&StreetNode> = self.nodes().collect();
        let mut best: Option<(NodeId, NodeId, f32)> = None;
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                let d = a.position.distance(b.position);
                if best.map_or(true, |(_, _, best_d)| d < best_d) {
                    best = Some((a.id, b.id, d));
                }
            }
        }
        best
    }

    /// Recompute every node's incident segment list from the live segments.
    pub fn rebuild_adjacency(&mut self) {
        for node in self.nodes.iter_mut() {
            node.edges.clear();
        }
        for seg in self.segments.iter().filter(|s| !s.removed) {
            self.nodes[seg.from.index()].edges.push(seg.id);
            self.nodes[seg.to.index()].edges.push(seg.id);
        }
    }

    // =========================================================================
    // Planarity
    // =========================================================================

    /// Make the network planar: every proper crossing gets a shared node
    /// splitting both segments, and every node lying on another segment's
    /// interior splits that segment.
    pub fn finalize(&mut self, tolerance: f32) -> FinalizeReport {
        let mut report = FinalizeReport::default();

        while let Some((a, b, point)) = self.first_crossing() {
            if report.crossings + report.t_junctions >= MAX_FINALIZE_SPLITS {
                report.capped = true;
                return report;
            }
            let node = self
                .endpoint_near(a, point, tolerance)
                .or_else(|| self.endpoint_near(b, point, tolerance))
                .unwrap_or_else(|| self.add_node(point));
            self.split_segment_with_node(a, node);
            self.split_segment_with_node(b, node);
            report.crossings += 1;
        }

        while let Some((node, seg)) = self.first_t_junction(tolerance) {
            if report.crossings + report.t_junctions >= MAX_FINALIZE_SPLITS {
                report.capped = true;
                return report;
            }
            self.split_segment_with_node(seg, node);
            report.t_junctions += 1;
        }

        report
    }

    fn endpoint_near(&self, seg: SegmentId, point: Vec2, tolerance: f32) -> Option<NodeId> {
        let s = self.segment(seg);
        [s.from, s.to]
            .into_iter()
            .find(|&n| self.position(n).distance(point) <= tolerance)
    }

    /// Pairs of live segments that cross without sharing a node.
    pub fn crossing_pairs(&self) -> Vec<(SegmentId, SegmentId, Vec2)> {
        let live: Vec<&StreetSegment> = self.segments().collect();
        let mut pairs = Vec::new();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                if let Some(point) = segments_cross(a, b) {
                    pairs.push((a.id, b.id, point));
                }
            }
        }
        pairs
    }

    fn first_crossing(&self) -> Option<(SegmentId, SegmentId, Vec2)> {
        let live: Vec<&StreetSegment> = self.segments().collect();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                if let Some(point) = segments_cross(a, b) {
                    return Some((a.id, b.id, point));
                }
            }
        }
        None
    }

    fn first_t_junction(&self, tolerance: f32) -> Option<(NodeId, SegmentId)> {
        for node in self.nodes().filter(|n| !n.edges.is_empty()) {
            for seg in self.segments() {
                if seg.from == node.id || seg.to == node.id {
                    continue;
                }
                let (a, b) = (self.position(seg.from), self.position(seg.to));
                if a.distance(node.position) <= tolerance || b.distance(node.position) <= tolerance {
                    continue;
                }
                if geometry::distance_to_polyline(node.position, &seg.points) <= tolerance {
                    return Some((node.id, seg.id));
                }
            }
        }
        None
    }

    // =========================================================================
    // Graph queries
    // =========================================================================

    /// Shortest path by street length, as the segments along it.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<SegmentId>> {
        let start = self.resolve(from);
        let goal = self.resolve(to);
        let (path, _cost) = dijkstra(
            &start,
            |&n| {
                self.neighbors(n)
                    .into_iter()
                    .map(|(m, s)| (m, (self.segment(s).length * 100.0).round() as u64))
                    .collect::<Vec<_>>()
            },
            |&n| n == goal,
        )?;
        Some(
            path.windows(2)
                .filter_map(|w| self.segment_between(w[0], w[1]))
                .collect(),
        )
    }

    /// Hop counts from `start` to every reachable surviving node.
    pub fn hop_distances(&self, start: NodeId) -> HashMap<NodeId, u32> {
        let start = self.resolve(start);
        let mut hops = HashMap::new();
        let mut queue = VecDeque::new();
        hops.insert(start, 0);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            let next_hop = hops[&current] + 1;
            for (neighbor, _) in self.neighbors(current) {
                if !hops.contains_key(&neighbor) {
                    hops.insert(neighbor, next_hop);
                    queue.push_back(neighbor);
                }
            }
        }
        hops
    }

    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        self.hop_distances(from).contains_key(&self.resolve(to))
    }
}

/// Crossing point of two segments' polylines when they do not share a node.
fn segments_cross(a: &StreetSegment, b: &StreetSegment) -> Option<Vec2> {
    if a.from == b.from || a.from == b.to || a.to == b.from || a.to == b.to {
        return None;
    }
    for pa in a.points.windows(2) {
        for pb in b.points.windows(2) {
            if let Some(hit) = geometry::proper_crossing(pa[0], pa[1], pb[0], pb[1]) {
                return Some(hit.point);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn street(network: &mut StreetNetwork, a: NodeId, b: NodeId) -> SegmentId {
        network
            .add_segment(a, b, StreetType::Secondary, SegmentOrigin::Skeleton, Vec::new())
            .unwrap()
    }

    #[test]
    fn test_add_segment_refuses_loops() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::ZERO);
        assert!(network
            .add_segment(a, a, StreetType::Tertiary, SegmentOrigin::Infill, Vec::new())
            .is_none());
    }

    #[test]
    fn test_merge_collapses_close_nodes() {
        // Two nodes 3 m apart, both connected to the same far node
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::new(0.0, 0.0));
        let b = network.add_node(Vec2::new(3.0, 0.0));
        let c = network.add_node(Vec2::new(50.0, 0.0));
        let d = network.add_node(Vec2::new(0.0, 50.0));
        street(&mut network, a, c);
        street(&mut network, b, c);
        street(&mut network, a, b);
        street(&mut network, b, d);

        let report = network.merge_nearby_nodes(5.0, &[]);

        assert_eq!(report.clusters, 1);
        assert_eq!(report.merged_nodes, 1);
        // a-b became a loop, b-c duplicated a-c
        assert_eq!(report.removed_loops, 1);
        assert_eq!(report.removed_duplicates, 1);

        // b redirects to a, which sits at the centroid
        assert_eq!(network.resolve(b), a);
        assert!((network.position(b) - Vec2::new(1.5, 0.0)).length() < 1e-5);
        assert_eq!(network.node_count(), 3);
        assert_eq!(network.segment_count(), 2);
        assert_eq!(network.degree(a), 2);

        // No two live segments join the same pair of nodes
        let mut pairs: Vec<(NodeId, NodeId)> = network
            .segments()
            .map(|s| if s.from < s.to { (s.from, s.to) } else { (s.to, s.from) })
            .collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), network.segment_count());

        // Geometry follows the moved node
        let ad = network.segment_between(a, d).unwrap();
        assert_eq!(network.segment(ad).points[0], Vec2::new(1.5, 0.0));
    }

    #[test]
    fn test_merge_keeps_outline_nodes_in_place() {
        let outline = vec![
            Vec2::new(-50.0, -50.0),
            Vec2::new(50.0, -50.0),
            Vec2::new(50.0, 50.0),
            Vec2::new(-50.0, 50.0),
        ];
        let mut network = StreetNetwork::new();
        let inner = network.add_node(Vec2::new(47.0, 1.0));
        let edge = network.add_node(Vec2::new(50.0, 0.0));
        let center = network.add_node(Vec2::ZERO);
        street(&mut network, center, inner);
        street(&mut network, inner, edge);

        let report = network.merge_nearby_nodes(5.0, &outline);

        assert_eq!(report.merged_nodes, 1);
        assert_eq!(network.resolve(edge), inner);
        // Survivor moved onto the outline rather than to the centroid
        assert_eq!(network.position(inner), Vec2::new(50.0, 0.0));
        assert_eq!(network.segment_count(), 1);
    }

    #[test]
    fn test_consolidate_repeats_until_no_close_nodes() {
        // Nodes every 3 m: one greedy pass leaves 7.5 and 12 within 5 m
        let mut network = StreetNetwork::new();
        let chain: Vec<NodeId> = (0..5)
            .map(|i| network.add_node(Vec2::new(3.0 * i as f32, 0.0)))
            .collect();
        for w in chain.windows(2) {
            street(&mut network, w[0], w[1]);
        }
        let far = network.add_node(Vec2::new(6.0, 40.0));
        street(&mut network, chain[2], far);

        let report = network.consolidate(5.0, 0.05, &[]);

        assert_eq!(report.rounds, 2);
        assert_eq!(report.merged_nodes, 3);
        assert!(!report.capped);
        let (_, _, closest) = network.closest_node_pair().unwrap();
        assert!(closest > 5.0);
        assert_eq!(network.node_count(), 3);
        assert!(network.crossing_pairs().is_empty());
    }

    #[test]
    fn test_consolidate_without_radius_only_finalizes() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::new(0.0, 0.0));
        let b = network.add_node(Vec2::new(2.0, 0.0));
        let c = network.add_node(Vec2::new(2.0, 30.0));
        street(&mut network, a, b);
        street(&mut network, b, c);

        let report = network.consolidate(0.0, 0.05, &[]);

        assert_eq!(report.rounds, 1);
        assert_eq!(report.merged_nodes, 0);
        assert_eq!(network.node_count(), 3);
    }

    #[test]
    fn test_finalize_splits_crossings() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::new(-10.0, 0.0));
        let b = network.add_node(Vec2::new(10.0, 0.0));
        let c = network.add_node(Vec2::new(0.0, -10.0));
        let d = network.add_node(Vec2::new(0.0, 10.0));
        street(&mut network, a, b);
        street(&mut network, c, d);

        let report = network.finalize(0.01);
        assert_eq!(report.crossings, 1);
        assert_eq!(network.segment_count(), 4);
        assert!(network.crossing_pairs().is_empty());

        let center = network.find_node_near(Vec2::ZERO, 1e-3).unwrap();
        assert_eq!(network.degree(center), 4);
    }

    #[test]
    fn test_finalize_snaps_t_junctions() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::new(0.0, 0.0));
        let b = network.add_node(Vec2::new(20.0, 0.0));
        let c = network.add_node(Vec2::new(10.0, 0.0));
        let d = network.add_node(Vec2::new(10.0, 10.0));
        street(&mut network, a, b);
        street(&mut network, c, d);

        let report = network.finalize(0.01);
        assert_eq!(report.t_junctions, 1);
        assert_eq!(network.degree(c), 3);
        assert!(network.is_reachable(a, d));
    }

    #[test]
    fn test_split_keeps_refined_geometry() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::new(0.0, 0.0));
        let b = network.add_node(Vec2::new(20.0, 0.0));
        let seg = network
            .add_segment(
                a,
                b,
                StreetType::Secondary,
                SegmentOrigin::Skeleton,
                vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 5.0), Vec2::new(20.0, 0.0)],
            )
            .unwrap();

        let mid = network.split_segment_at(seg, Vec2::new(15.0, 2.5), 0.01);
        let first = network.segment(seg);
        assert_eq!(first.to, mid);
        assert_eq!(first.points.len(), 3);
        let second = network.segment_between(mid, b).unwrap();
        assert_eq!(network.segment(second).points.len(), 2);
        let total = network.total_length();
        assert!((total - 2.0 * (125.0f32).sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_shortest_path_prefers_shorter_route() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::new(0.0, 0.0));
        let b = network.add_node(Vec2::new(10.0, 0.0));
        let c = network.add_node(Vec2::new(5.0, 30.0));
        let direct = street(&mut network, a, b);
        street(&mut network, a, c);
        street(&mut network, c, b);

        let path = network.shortest_path(a, b).unwrap();
        assert_eq!(path, vec![direct]);

        let hops = network.hop_distances(a);
        assert_eq!(hops[&b], 1);
        assert_eq!(hops[&c], 1);
    }
}
