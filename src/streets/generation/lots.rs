//! Lot subdivision
//!
//! Each block edge that runs along a street is a frontage. Frontages are cut
//! into lots of randomized width, longest frontage first, and every lot is
//! extruded inward as deep as the block allows up to the target depth.

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::geometry;
use crate::streets::config::LotConfig;
use crate::streets::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::streets::network::StreetNetwork;
use crate::streets::types::{Block, Lot, LotId, SegmentId, StreetType};

use super::blocks::edge_street_overlaps;

const FRONTAGE_SNAP: f32 = 0.05;
/// Lots may touch along shared sides but not overlap by more than this.
const OVERLAP_TOLERANCE: f32 = 0.01;
/// Lot vertices may sit this far outside their block.
const CONTAIN_TOLERANCE: f32 = 1e-3;

#[derive(Clone, Debug, Default)]
pub struct LotOutcome {
    pub lots: Vec<Lot>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A stretch of block edge along one street.
#[derive(Clone, Copy, Debug)]
struct Frontage {
    start: Vec2,
    end: Vec2,
    edge: usize,
    street: SegmentId,
}

impl Frontage {
    fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Lot widths for a frontage of `length` meters, summing to `length`.
///
/// Empty below `min_frontage`; a single lot up to `max_frontage *
/// corner_bonus`. Longer frontages get a corner lot at each end drawn from
/// `[min_frontage, max_frontage] * corner_bonus` and interior lots from
/// `[min_frontage, max_frontage]`. A leftover shorter than
/// `1.5 * min_frontage` is spread over the lots in proportion to their room
/// below the upper bound; a longer one is shared evenly with the last
/// interior lot.
pub fn frontage_widths(length: f32, config: &LotConfig, rng: &mut ChaCha8Rng) -> Vec<f32> {
    let min = config.min_frontage;
    let max = config.max_frontage;
    let corner_min = min * config.corner_bonus;
    let corner_max = max * config.corner_bonus;
    if length < min {
        return Vec::new();
    }
    if length <= corner_max {
        return vec![length];
    }

    let first = draw(rng, corner_min, corner_max);
    let last = draw(rng, corner_min, corner_max);
    if first + last >= length {
        return vec![length * 0.5, length * 0.5];
    }

    let middle = length - first - last;
    let mut interior = Vec::new();
    let mut used = 0.0;
    loop {
        let w = draw(rng, min, max);
        if used + w > middle {
            break;
        }
        interior.push(w);
        used += w;
    }

    let mut widths = Vec::with_capacity(interior.len() + 3);
    widths.push(first);
    widths.extend(interior);
    widths.push(last);

    let remainder = middle - used;
    if remainder >= 1.5 * min {
        let at = widths.len() - 1;
        if at > 1 {
            let shared = (widths[at - 1] + remainder) * 0.5;
            widths[at - 1] = shared;
            widths.insert(at, shared);
        } else {
            widths.insert(at, remainder);
        }
        return widths;
    }

    let end = widths.len() - 1;
    let upper = |i: usize| if i == 0 || i == end { corner_max } else { max };
    let room: f32 = (0..widths.len()).map(|i| upper(i) - widths[i]).sum();
    let count = widths.len() as f32;
    for (i, w) in widths.iter_mut().enumerate() {
        if room >= remainder && room > 0.0 {
            *w += remainder * (upper(i) - *w) / room;
        } else {
            *w += remainder / count;
        }
    }
    widths
}

fn draw(rng: &mut ChaCha8Rng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// Cut every block's street frontages into lots.
pub fn subdivide_lots(
    blocks: &[Block],
    network: &StreetNetwork,
    config: &LotConfig,
    rng: &mut ChaCha8Rng,
) -> LotOutcome {
    let mut outcome = LotOutcome::default();

    for block in blocks {
        let mut frontages = block_frontages(block, network, config);
        frontages.sort_by(|a, b| {
            b.length()
                .total_cmp(&a.length())
                .then(a.edge.cmp(&b.edge))
        });

        let mut accepted: Vec<Lot> = Vec::new();
        for frontage in frontages {
            subdivide_frontage(block, &frontage, config, rng, &mut accepted, &mut outcome.diagnostics);
        }
        for mut lot in accepted {
            lot.id = LotId(outcome.lots.len() as u32);
            outcome.lots.push(lot);
        }
    }

    tracing::info!(
        target: "settlement_streets::lots",
        blocks = blocks.len(),
        lots = outcome.lots.len(),
        corners = outcome.lots.iter().filter(|l| l.is_corner).count(),
        "lots.subdivided"
    );
    outcome
}

fn block_frontages(block: &Block, network: &StreetNetwork, config: &LotConfig) -> Vec<Frontage> {
    let poly = &block.boundary;
    let mut frontages = Vec::new();
    for edge in 0..poly.len() {
        let (a, b) = geometry::edge(poly, edge);
        for (street, t0, t1) in edge_street_overlaps(a, b, network, FRONTAGE_SNAP) {
            let rear = network.segment(street).street_type == StreetType::RearAccess;
            if rear && !config.frontage_on_rear_access {
                continue;
            }
            frontages.push(Frontage {
                start: a.lerp(b, t0),
                end: a.lerp(b, t1),
                edge,
                street,
            });
        }
    }
    frontages
}

fn subdivide_frontage(
    block: &Block,
    frontage: &Frontage,
    config: &LotConfig,
    rng: &mut ChaCha8Rng,
    accepted: &mut Vec<Lot>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let poly = &block.boundary;
    let length = frontage.length();
    let widths = frontage_widths(length, config, rng);
    if widths.is_empty() {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::GeometryDegenerate,
                Severity::Info,
                format!("collapsed frontage of {:.1} m on block {}", length, block.id.0),
            )
            .with_block(block.id)
            .with_segment(frontage.street),
        );
        return;
    }

    let along = (frontage.end - frontage.start) / length;
    let inward = inward_normal(poly, frontage, along);

    let count = widths.len();
    let mut offset = 0.0;
    for (i, width) in widths.into_iter().enumerate() {
        let front_left = frontage.start + along * offset;
        let front_right = frontage.start + along * (offset + width);
        offset += width;

        let depth = lot_depth(poly, frontage.edge, front_left, front_right, inward).min(config.target_depth);
        if depth < config.min_depth {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::GeometryDegenerate,
                    Severity::Info,
                    format!("lot of depth {:.1} m dropped on block {}", depth, block.id.0),
                )
                .with_block(block.id),
            );
            continue;
        }

        let side = if inward.dot(along.perp()) >= 0.0 { depth } else { -depth };
        let back = geometry::offset_polyline(&[front_left, front_right], side);
        let mut boundary = vec![front_left, front_right, back[1], back[0]];
        geometry::ensure_ccw(&mut boundary);
        if !geometry::polygon_contains(poly, &boundary, CONTAIN_TOLERANCE) {
            // Converging block sides near a frontage end: keep the part
            // of the rectangle inside the block
            let clipped = geometry::clip_to_convex(poly, &boundary);
            let usable = !clipped.is_empty()
                && geometry::polygon_area(&clipped) >= 0.5 * width * config.min_depth
                && clipped
                    .iter()
                    .all(|&p| geometry::point_in_or_on_polygon(p, poly, CONTAIN_TOLERANCE));
            if !usable {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::GeometryDegenerate,
                        Severity::Info,
                        format!("lot clipped away on block {}", block.id.0),
                    )
                    .with_block(block.id),
                );
                continue;
            }
            boundary = clipped;
            geometry::ensure_ccw(&mut boundary);
        }

        if accepted
            .iter()
            .any(|lot| geometry::convex_polygons_overlap(&boundary, &lot.boundary, OVERLAP_TOLERANCE))
        {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::GeometryDegenerate,
                    Severity::Info,
                    format!("overlapping lot dropped on block {}", block.id.0),
                )
                .with_block(block.id),
            );
            continue;
        }

        accepted.push(Lot {
            id: LotId(0),
            block: block.id,
            boundary,
            frontage: (front_left, front_right),
            frontage_width: width,
            depth,
            is_corner: i == 0 || i == count - 1,
            street: frontage.street,
        });
    }
}

/// Unit normal pointing from the frontage into the block.
fn inward_normal(poly: &[Vec2], frontage: &Frontage, along: Vec2) -> Vec2 {
    let left = along.perp();
    let mid = (frontage.start + frontage.end) * 0.5;
    if geometry::point_in_polygon(mid + left * 0.5, poly) {
        return left;
    }
    if geometry::point_in_polygon(mid - left * 0.5, poly) {
        return -left;
    }
    if (geometry::centroid(poly) - mid).dot(left) >= 0.0 {
        left
    } else {
        -left
    }
}

/// Shortest inward ray to the block outline, from near both front corners
/// and the middle.
fn lot_depth(poly: &[Vec2], edge: usize, front_left: Vec2, front_right: Vec2, inward: Vec2) -> f32 {
    let width = front_left.distance(front_right);
    let inset = (width * 0.1).min(0.5);
    let along = (front_right - front_left).normalize_or_zero();
    let samples = [
        front_left + along * inset,
        (front_left + front_right) * 0.5,
        front_right - along * inset,
    ];
    samples
        .iter()
        .map(|&p| {
            geometry::first_ray_hit(p + inward * 0.01, inward, poly, &[edge])
                .map_or(0.0, |hit| hit.distance + 0.01)
        })
        .fold(f32::INFINITY, f32::min)
}
