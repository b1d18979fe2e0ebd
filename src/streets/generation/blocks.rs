//! Block identification
//!
//! Builds a planar graph from the live street geometry plus the settlement
//! outline, then walks its bounded faces. Each counter-clockwise face is a
//! block; the unbounded face and the clockwise rims of detached pieces come
//! out with negative area and are dropped.

use std::collections::HashSet;

use glam::Vec2;

use crate::geometry;
use crate::streets::config::BlockConfig;
use crate::streets::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::streets::network::StreetNetwork;
use crate::streets::types::{Block, BlockId, NodeId, SegmentId};

/// Street vertices this close to another piece's interior join it. Matches
/// the tolerance growth allows around the outline.
pub const JOIN_TOLERANCE: f32 = 0.5;

#[derive(Clone, Debug, Default)]
pub struct BlockOutcome {
    pub blocks: Vec<Block>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Planar graph with snapped vertices and undirected edges.
#[derive(Debug, Default)]
struct PlanarGraph {
    vertices: Vec<Vec2>,
    edges: Vec<(usize, usize)>,
    edge_set: HashSet<(usize, usize)>,
    snap: f32,
}

impl PlanarGraph {
    fn new(snap: f32) -> Self {
        Self {
            snap,
            ..Default::default()
        }
    }

    fn vertex(&mut self, p: Vec2) -> usize {
        if let Some(i) = self.vertices.iter().position(|v| v.distance(p) <= self.snap) {
            return i;
        }
        self.vertices.push(p);
        self.vertices.len() - 1
    }

    fn add_edge(&mut self, a: Vec2, b: Vec2) {
        let u = self.vertex(a);
        let v = self.vertex(b);
        if u == v {
            return;
        }
        let key = (u.min(v), u.max(v));
        if self.edge_set.insert(key) {
            self.edges.push(key);
        }
    }

    /// Bounded faces as vertex index loops, face on the left of each step.
    fn faces(&self) -> Vec<Vec<usize>> {
        let n = self.vertices.len();
        // Half-edge 2k runs u->v for edge k, 2k+1 runs v->u
        let origin = |h: usize| {
            let (u, v) = self.edges[h / 2];
            if h % 2 == 0 {
                u
            } else {
                v
            }
        };
        let dest = |h: usize| origin(h ^ 1);

        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        for h in 0..self.edges.len() * 2 {
            outgoing[origin(h)].push(h);
        }
        for (v, list) in outgoing.iter_mut().enumerate() {
            let at = self.vertices[v];
            list.sort_by(|&a, &b| {
                let da = self.vertices[dest(a)] - at;
                let db = self.vertices[dest(b)] - at;
                da.y.atan2(da.x).total_cmp(&db.y.atan2(db.x)).then(a.cmp(&b))
            });
        }

        // next(u->v) is the outgoing edge at v just clockwise of v->u
        let next = |h: usize| {
            let v = dest(h);
            let list = &outgoing[v];
            let twin = h ^ 1;
            let pos = list.iter().position(|&e| e == twin).unwrap_or(0);
            list[(pos + list.len() - 1) % list.len()]
        };

        let total = self.edges.len() * 2;
        let mut visited = vec![false; total];
        let mut faces = Vec::new();
        for start in 0..total {
            if visited[start] {
                continue;
            }
            let mut face = Vec::new();
            let mut h = start;
            while !visited[h] && face.len() <= total {
                visited[h] = true;
                face.push(origin(h));
                h = next(h);
            }
            faces.push(face);
        }
        faces
    }
}

/// Trace the blocks enclosed by `network` and `boundary`.
pub fn identify_blocks(network: &StreetNetwork, boundary: &[Vec2], config: &BlockConfig) -> BlockOutcome {
    let mut pieces: Vec<(Vec2, Vec2)> = Vec::new();
    for seg in network.segments() {
        for w in seg.points.windows(2) {
            if w[0].distance(w[1]) > config.snap_tolerance {
                pieces.push((w[0], w[1]));
            }
        }
    }
    for i in 0..boundary.len() {
        pieces.push(geometry::edge(boundary, i));
    }

    let mut graph = PlanarGraph::new(config.snap_tolerance);
    for (a, b) in split_pieces(&pieces) {
        graph.add_edge(a, b);
    }

    let mut outcome = BlockOutcome::default();
    for loop_indices in graph.faces() {
        let loop_indices = remove_spikes(loop_indices);
        if loop_indices.len() < 3 {
            continue;
        }
        let outline: Vec<Vec2> = loop_indices.iter().map(|&i| graph.vertices[i]).collect();
        if geometry::signed_area(&outline) <= geometry::EPSILON {
            continue;
        }
        if !geometry::point_in_polygon(interior_point(&outline), boundary) {
            continue;
        }

        let id = BlockId(outcome.blocks.len() as u32);
        let mut block = Block::new(id, outline);
        block.segments = block_segments(&block.boundary, network, config.snap_tolerance.max(0.01));
        block.is_exterior = block
            .boundary
            .iter()
            .any(|&p| geometry::distance_to_polygon(p, boundary) <= JOIN_TOLERANCE);

        if block.area < config.min_block_area {
            block.needs_manual_review = true;
            outcome.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::GeometryDegenerate,
                    Severity::Warning,
                    format!("block {} has area {:.2} below the minimum", id.0, block.area),
                )
                .with_block(id),
            );
        }
        outcome.blocks.push(block);
    }

    tracing::debug!(
        target: "settlement_streets::blocks",
        vertices = graph.vertices.len(),
        edges = graph.edges.len(),
        blocks = outcome.blocks.len(),
        "blocks.identified"
    );
    outcome
}

/// Cut every piece wherever another piece crosses it or ends on it.
fn split_pieces(pieces: &[(Vec2, Vec2)]) -> Vec<(Vec2, Vec2)> {
    let mut out = Vec::new();
    for (i, &(a, b)) in pieces.iter().enumerate() {
        let len = a.distance(b);
        let mut cuts: Vec<(f32, Vec2)> = Vec::new();
        for (j, &(c, d)) in pieces.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(hit) = geometry::proper_crossing(a, b, c, d) {
                cuts.push((hit.t, hit.point));
            }
            for p in [c, d] {
                let (closest, t) = geometry::closest_point_on_segment(p, a, b);
                let interior = t * len > JOIN_TOLERANCE && (1.0 - t) * len > JOIN_TOLERANCE;
                if interior && closest.distance(p) <= JOIN_TOLERANCE {
                    cuts.push((t, p));
                }
            }
        }
        cuts.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut start = a;
        for (_, p) in cuts {
            if p.distance(start) > geometry::EPSILON {
                out.push((start, p));
                start = p;
            }
        }
        if b.distance(start) > geometry::EPSILON {
            out.push((start, b));
        }
    }
    out
}

/// Drop dead-end excursions (`.. a b a ..`) and repeated vertices.
fn remove_spikes(mut face: Vec<usize>) -> Vec<usize> {
    loop {
        face.dedup();
        while face.len() > 1 && face.first() == face.last() {
            face.pop();
        }
        let n = face.len();
        if n < 3 {
            return face;
        }
        let tip = (0..n).find(|&i| face[(i + n - 1) % n] == face[(i + 1) % n]);
        match tip {
            Some(i) => {
                // Remove the tip and the repeated vertex after it
                let after = (i + 1) % n;
                let (first, second) = if i < after { (after, i) } else { (i, after) };
                face.remove(first);
                face.remove(second);
            }
            None => return face,
        }
    }
}

/// A point strictly inside a simple polygon.
fn interior_point(poly: &[Vec2]) -> Vec2 {
    let c = geometry::centroid(poly);
    if geometry::point_in_polygon(c, poly) {
        return c;
    }
    for i in 0..poly.len() {
        let (a, b) = geometry::edge(poly, i);
        let len = a.distance(b);
        if len <= geometry::EPSILON {
            continue;
        }
        let inside = (a + b) * 0.5 + (b - a).perp() / len * (len * 0.01).min(0.1);
        if geometry::point_in_polygon(inside, poly) {
            return inside;
        }
    }
    c
}

/// Refresh every block's street list against the current network.
pub fn attach_segments(blocks: &mut [Block], network: &StreetNetwork, tolerance: f32) {
    for block in blocks.iter_mut() {
        block.segments = block_segments(&block.boundary, network, tolerance);
    }
}

/// Street segments running along a block outline, in first-seen order.
fn block_segments(outline: &[Vec2], network: &StreetNetwork, tolerance: f32) -> Vec<SegmentId> {
    let mut ids = Vec::new();
    for i in 0..outline.len() {
        let (a, b) = geometry::edge(outline, i);
        for (seg, _, _) in edge_street_overlaps(a, b, network, tolerance) {
            if !ids.contains(&seg) {
                ids.push(seg);
            }
        }
    }
    ids
}

/// Street pieces lying along the edge `a-b`, as the segment and the
/// overlapping parameter interval on the edge, sorted by start.
pub fn edge_street_overlaps(
    a: Vec2,
    b: Vec2,
    network: &StreetNetwork,
    tolerance: f32,
) -> Vec<(SegmentId, f32, f32)> {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= geometry::EPSILON * geometry::EPSILON {
        return Vec::new();
    }
    let len = len_sq.sqrt();
    let line_distance = |p: Vec2| (p - a).perp_dot(ab).abs() / len;

    let mut hits = Vec::new();
    for seg in network.segments() {
        for w in seg.points.windows(2) {
            let (p, q) = (w[0], w[1]);
            if line_distance(p) > tolerance || line_distance(q) > tolerance {
                continue;
            }
            let tp = (p - a).dot(ab) / len_sq;
            let tq = (q - a).dot(ab) / len_sq;
            let t0 = tp.min(tq).max(0.0);
            let t1 = tp.max(tq).min(1.0);
            if (t1 - t0) * len > tolerance {
                hits.push((seg.id, t0, t1));
            }
        }
    }
    hits.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
    hits
}

/// Node for a cut endpoint at `pos` on the block edge `a-b`.
///
/// Reuses a node already within `tolerance`; otherwise splits the street
/// running along that edge under `pos`. Stretches of the edge carried only
/// by the settlement outline get a free-standing node, so a cut never
/// splits an unrelated street passing nearby.
pub fn node_on_edge(network: &mut StreetNetwork, a: Vec2, b: Vec2, pos: Vec2, tolerance: f32) -> NodeId {
    if let Some(node) = network.find_node_near(pos, tolerance) {
        return node;
    }
    let len = a.distance(b).max(geometry::EPSILON);
    let t = (pos - a).dot(b - a) / (len * len);
    let slack = tolerance / len;
    let street = edge_street_overlaps(a, b, network, tolerance)
        .into_iter()
        .find(|&(_, t0, t1)| t >= t0 - slack && t <= t1 + slack)
        .map(|(seg, _, _)| seg);
    match street {
        Some(seg) => network.split_segment_at(seg, pos, tolerance),
        None => network.add_node(pos),
    }
}
