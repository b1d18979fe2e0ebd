//! Geometry kernel for the settlement plane
//!
//! Polygon and polyline primitives shared by every street generation stage:
//! signed area, centroid, containment, segment intersection, ray casting,
//! chord splitting, offsets and Douglas-Peucker simplification.
//!
//! Polygons are open vertex lists (the closing edge is implicit) and are
//! expected to be wound counter-clockwise unless a function says otherwise.

use glam::Vec2;

/// Tolerance used for parametric comparisons and degenerate-length checks.
pub const EPSILON: f32 = 1e-4;

/// Result of intersecting two finite segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentHit {
    pub point: Vec2,
    /// Parameter along the first segment (0 at its start, 1 at its end)
    pub t: f32,
    /// Parameter along the second segment
    pub u: f32,
}

/// A ray hitting one edge of a polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Distance along the (normalized) ray direction
    pub distance: f32,
    /// Index of the polygon edge that was hit (edge i runs from vertex i to i+1)
    pub edge: usize,
    pub point: Vec2,
}

/// Shoelace signed area: positive for counter-clockwise polygons.
pub fn signed_area(poly: &[Vec2]) -> f32 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

pub fn polygon_area(poly: &[Vec2]) -> f32 {
    signed_area(poly).abs()
}

/// Closed perimeter of a polygon.
pub fn perimeter(poly: &[Vec2]) -> f32 {
    if poly.len() < 2 {
        return 0.0;
    }
    (0..poly.len())
        .map(|i| poly[i].distance(poly[(i + 1) % poly.len()]))
        .sum()
}

/// Open length of a polyline.
pub fn polyline_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

pub fn vertex_average(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    points.iter().copied().sum::<Vec2>() / points.len() as f32
}

/// Area-weighted centroid, falling back to the vertex average for
/// polygons with (near) zero area.
pub fn centroid(poly: &[Vec2]) -> Vec2 {
    let area = signed_area(poly);
    if area.abs() < EPSILON {
        return vertex_average(poly);
    }
    let mut c = Vec2::ZERO;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let cross = a.x * b.y - b.x * a.y;
        c += (a + b) * cross;
    }
    c / (6.0 * area)
}

pub fn is_ccw(poly: &[Vec2]) -> bool {
    signed_area(poly) > 0.0
}

/// Reverse the vertex order in place if the polygon is wound clockwise.
pub fn ensure_ccw(poly: &mut [Vec2]) {
    if signed_area(poly) < 0.0 {
        poly.reverse();
    }
}

/// Even-odd containment test. Points exactly on an edge may go either way;
/// callers that care combine this with [`distance_to_polygon`].
pub fn point_in_polygon(p: Vec2, poly: &[Vec2]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let pi = poly[i];
        let pj = poly[j];
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Closest point on segment `a-b` to `p`, with its parameter along the segment.
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> (Vec2, f32) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON * EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

pub fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    closest_point_on_segment(p, a, b).0.distance(p)
}

/// Distance from `p` to an open polyline.
pub fn distance_to_polyline(p: Vec2, points: &[Vec2]) -> f32 {
    match points.len() {
        0 => f32::INFINITY,
        1 => points[0].distance(p),
        _ => points
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f32::INFINITY, f32::min),
    }
}

/// Distance from `p` to the closed outline of a polygon.
pub fn distance_to_polygon(p: Vec2, poly: &[Vec2]) -> f32 {
    let mut best = f32::INFINITY;
    for i in 0..poly.len() {
        let (a, b) = edge(poly, i);
        best = best.min(distance_to_segment(p, a, b));
    }
    best
}

/// Inside the polygon or within `tolerance` of its outline.
pub fn point_in_or_on_polygon(p: Vec2, poly: &[Vec2], tolerance: f32) -> bool {
    point_in_polygon(p, poly) || distance_to_polygon(p, poly) <= tolerance
}

/// Edge `i` of a closed polygon as `(start, end)`.
pub fn edge(poly: &[Vec2], i: usize) -> (Vec2, Vec2) {
    (poly[i], poly[(i + 1) % poly.len()])
}

/// Index and length of the longest edge.
pub fn longest_edge(poly: &[Vec2]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for i in 0..poly.len() {
        let (a, b) = edge(poly, i);
        let len = a.distance(b);
        match best {
            Some((_, best_len)) if best_len >= len => {}
            _ => best = Some((i, len)),
        }
    }
    best
}

/// Intersection of segments `a1-a2` and `b1-b2`, endpoints included.
/// Parallel and collinear segments report no hit.
pub fn segment_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<SegmentHit> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.perp_dot(s);
    if denom.abs() < 1e-9 {
        return None;
    }
    let qp = b1 - a1;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(SegmentHit { point: a1 + r * t, t, u })
    } else {
        None
    }
}

/// Intersection strictly inside both segments (neither touches at an endpoint).
pub fn proper_crossing(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<SegmentHit> {
    segment_intersection(a1, a2, b1, b2).filter(|hit| {
        hit.t > EPSILON && hit.t < 1.0 - EPSILON && hit.u > EPSILON && hit.u < 1.0 - EPSILON
    })
}

/// Cast a ray against a single segment. `dir` must be normalized; returns the
/// distance along the ray when the hit lies ahead of `origin`.
pub fn ray_segment(origin: Vec2, dir: Vec2, a: Vec2, b: Vec2) -> Option<(f32, Vec2)> {
    let s = b - a;
    let denom = dir.perp_dot(s);
    if denom.abs() < 1e-9 {
        return None;
    }
    let qp = a - origin;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(dir) / denom;
    if t > EPSILON && (-EPSILON..=1.0 + EPSILON).contains(&u) {
        Some((t, origin + dir * t))
    } else {
        None
    }
}

/// All hits of a ray against a polygon outline, nearest first.
pub fn ray_polygon_hits(origin: Vec2, dir: Vec2, poly: &[Vec2]) -> Vec<RayHit> {
    let mut hits: Vec<RayHit> = (0..poly.len())
        .filter_map(|i| {
            let (a, b) = edge(poly, i);
            ray_segment(origin, dir, a, b).map(|(distance, point)| RayHit {
                distance,
                edge: i,
                point,
            })
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.edge.cmp(&b.edge)));
    hits
}

/// Nearest hit of a ray against a polygon, skipping the listed edges.
pub fn first_ray_hit(origin: Vec2, dir: Vec2, poly: &[Vec2], skip: &[usize]) -> Option<RayHit> {
    ray_polygon_hits(origin, dir, poly)
        .into_iter()
        .find(|hit| !skip.contains(&hit.edge))
}

/// Split a CCW polygon along the chord from `a` (a point on edge `a.0`) to
/// `b` (a point on edge `b.0`). Both halves keep CCW winding.
pub fn split_polygon(
    poly: &[Vec2],
    a: (usize, Vec2),
    b: (usize, Vec2),
) -> Option<(Vec<Vec2>, Vec<Vec2>)> {
    let n = poly.len();
    let (ea, pa) = a;
    let (eb, pb) = b;
    if n < 3 || ea == eb || ea >= n || eb >= n {
        return None;
    }

    let mut first = vec![pa];
    let mut i = (ea + 1) % n;
    loop {
        first.push(poly[i]);
        if i == eb {
            break;
        }
        i = (i + 1) % n;
    }
    first.push(pb);

    let mut second = vec![pb];
    let mut i = (eb + 1) % n;
    loop {
        second.push(poly[i]);
        if i == ea {
            break;
        }
        i = (i + 1) % n;
    }
    second.push(pa);

    let first = dedup_vertices(&first, EPSILON * 10.0);
    let second = dedup_vertices(&second, EPSILON * 10.0);
    if first.len() < 3 || second.len() < 3 {
        return None;
    }
    if signed_area(&first) <= EPSILON || signed_area(&second) <= EPSILON {
        return None;
    }
    Some((first, second))
}

/// Remove consecutive duplicate vertices, including across the closing edge.
pub fn dedup_vertices(poly: &[Vec2], tolerance: f32) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::with_capacity(poly.len());
    for &p in poly {
        if out.last().map_or(true, |last| last.distance(p) > tolerance) {
            out.push(p);
        }
    }
    while out.len() > 1 && out[0].distance(out[out.len() - 1]) <= tolerance {
        out.pop();
    }
    out
}

/// Offset a polyline to its left by `distance` (negative offsets go right).
/// Interior joints use a mitre clamped to twice the offset.
pub fn offset_polyline(points: &[Vec2], distance: f32) -> Vec<Vec2> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let normals: Vec<Vec2> = points
        .windows(2)
        .map(|w| (w[1] - w[0]).normalize_or_zero().perp())
        .collect();

    let mut out = Vec::with_capacity(points.len());
    for (i, &p) in points.iter().enumerate() {
        let n = if i == 0 {
            normals[0]
        } else if i == points.len() - 1 {
            normals[normals.len() - 1]
        } else {
            let n1 = normals[i - 1];
            let joint = (n1 + normals[i]).normalize_or_zero();
            let cos = joint.dot(n1);
            if joint == Vec2::ZERO || cos < 0.5 {
                // Near-reversal: mitre would explode
                joint * 2.0
            } else {
                joint / cos
            }
        };
        out.push(p + n * distance);
    }
    out
}

/// Douglas-Peucker simplification, keeping both endpoints.
pub fn simplify_polyline(points: &[Vec2], epsilon: f32) -> Vec<Vec2> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut index = start;
        for i in (start + 1)..end {
            let d = distance_to_segment(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Unsigned angle between two directions in radians (0..=PI).
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    signed_angle(a, b).abs()
}

/// Signed angle that rotates `from` onto `to` (counter-clockwise positive).
pub fn signed_angle(from: Vec2, to: Vec2) -> f32 {
    from.perp_dot(to).atan2(from.dot(to))
}

pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Regular polygon approximating a circle, CCW, starting at angle 0.
pub fn circle_polygon(center: Vec2, radius: f32, segments: usize) -> Vec<Vec2> {
    let segments = segments.max(3);
    (0..segments)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / segments as f32;
            center + Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

/// Point at arc length `s` along a closed polygon outline.
pub fn point_along_outline(poly: &[Vec2], s: f32) -> Vec2 {
    let total = perimeter(poly);
    if poly.is_empty() || total <= 0.0 {
        return poly.first().copied().unwrap_or(Vec2::ZERO);
    }
    let mut remaining = s.rem_euclid(total);
    for i in 0..poly.len() {
        let (a, b) = edge(poly, i);
        let len = a.distance(b);
        if remaining <= len && len > 0.0 {
            return a.lerp(b, remaining / len);
        }
        remaining -= len;
    }
    poly[0]
}

/// Part of `subject` inside the convex counter-clockwise polygon `clip`
/// (Sutherland-Hodgman). Empty when nothing is left.
pub fn clip_to_convex(subject: &[Vec2], clip: &[Vec2]) -> Vec<Vec2> {
    let mut output = subject.to_vec();
    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let (a, b) = edge(clip, i);
        let inside = |p: Vec2| (b - a).perp_dot(p - a) >= -EPSILON;
        let input = std::mem::take(&mut output);
        for j in 0..input.len() {
            let (p, q) = edge(&input, j);
            match (inside(p), inside(q)) {
                (true, true) => output.push(q),
                (true, false) => output.extend(line_crossing(p, q, a, b)),
                (false, true) => {
                    output.extend(line_crossing(p, q, a, b));
                    output.push(q);
                }
                (false, false) => {}
            }
        }
    }
    let output = dedup_vertices(&output, EPSILON * 10.0);
    if output.len() < 3 {
        return Vec::new();
    }
    output
}

/// Where segment `p-q` meets the infinite line through `a-b`.
fn line_crossing(p: Vec2, q: Vec2, a: Vec2, b: Vec2) -> Option<Vec2> {
    let dir = b - a;
    let denom = dir.perp_dot(q - p);
    if denom.abs() <= f32::EPSILON {
        return None;
    }
    let t = dir.perp_dot(a - p) / denom;
    Some(p.lerp(q, t.clamp(0.0, 1.0)))
}

/// `inner` lies within `outer`: every vertex of `inner` is inside or within
/// `tolerance` of `outer`, and no vertex of `outer` pokes into `inner`.
pub fn polygon_contains(outer: &[Vec2], inner: &[Vec2], tolerance: f32) -> bool {
    inner.iter().all(|&p| point_in_or_on_polygon(p, outer, tolerance))
        && !outer
            .iter()
            .any(|&q| point_in_polygon(q, inner) && distance_to_polygon(q, inner) > tolerance)
}

/// Separating-axis overlap test for two convex polygons. Polygons that only
/// touch (overlap depth at most `tolerance` on some axis) do not overlap.
pub fn convex_polygons_overlap(a: &[Vec2], b: &[Vec2], tolerance: f32) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    for poly in [a, b] {
        for i in 0..poly.len() {
            let (p, q) = edge(poly, i);
            let axis = (q - p).perp().normalize_or_zero();
            if axis == Vec2::ZERO {
                continue;
            }
            let (a_min, a_max) = project(a, axis);
            let (b_min, b_max) = project(b, axis);
            if a_max <= b_min + tolerance || b_max <= a_min + tolerance {
                return false;
            }
        }
    }
    true
}

fn project(poly: &[Vec2], axis: Vec2) -> (f32, f32) {
    poly.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}
