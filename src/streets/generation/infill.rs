//! Block regularization
//!
//! Oversized blocks are cut in two by an infill street running across from
//! their longest edge, recursively, until every piece fits the target size
//! or the depth cap is reached. Crowded nodes are merged afterwards by
//! [`StreetNetwork::consolidate`].

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::geometry;
use crate::streets::config::InfillConfig;
use crate::streets::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::streets::network::StreetNetwork;
use crate::streets::types::{Block, BlockId, SegmentOrigin, StreetType};

use super::blocks::node_on_edge;

/// How close a cut endpoint must be to a street to join it.
const STREET_SNAP: f32 = 0.05;

#[derive(Clone, Debug, Default)]
pub struct InfillOutcome {
    pub blocks: Vec<Block>,
    /// Infill streets added
    pub splits: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Exceeds the perimeter or area limit.
pub fn is_oversized(poly: &[Vec2], config: &InfillConfig) -> bool {
    geometry::perimeter(poly) > config.max_perimeter || geometry::polygon_area(poly) > config.max_area
}

/// Split every oversized block with infill streets added to `network`.
///
/// Blocks already flagged for review pass through untouched. Returned blocks
/// are renumbered; pieces that could not be brought under the limits are
/// flagged `needs_manual_review` with a diagnostic.
pub fn regularize_blocks(
    blocks: Vec<Block>,
    network: &mut StreetNetwork,
    config: &InfillConfig,
    rng: &mut ChaCha8Rng,
) -> InfillOutcome {
    let mut outcome = InfillOutcome::default();
    let mut leaves: Vec<(Vec<Vec2>, bool)> = Vec::new();

    for block in blocks {
        if block.needs_manual_review {
            leaves.push((block.boundary, true));
            continue;
        }
        let mut splitter = Splitter {
            network: &mut *network,
            config,
            rng: &mut *rng,
            splits: 0,
            diagnostics: &mut outcome.diagnostics,
            source: block.id,
        };
        splitter.split(block.boundary, 0, &mut leaves);
        outcome.splits += splitter.splits;
    }

    for (i, (outline, flagged)) in leaves.into_iter().enumerate() {
        if outline.len() < 3 {
            continue;
        }
        let mut block = Block::new(BlockId(i as u32), outline);
        block.needs_manual_review = flagged;
        outcome.blocks.push(block);
    }
    for (i, block) in outcome.blocks.iter_mut().enumerate() {
        block.id = BlockId(i as u32);
    }

    tracing::info!(
        target: "settlement_streets::infill",
        splits = outcome.splits,
        blocks = outcome.blocks.len(),
        flagged = outcome.blocks.iter().filter(|b| b.needs_manual_review).count(),
        "infill.regularized"
    );
    outcome
}

struct Splitter<'a> {
    network: &'a mut StreetNetwork,
    config: &'a InfillConfig,
    rng: &'a mut ChaCha8Rng,
    splits: usize,
    diagnostics: &'a mut Vec<Diagnostic>,
    source: BlockId,
}

impl Splitter<'_> {
    fn split(&mut self, poly: Vec<Vec2>, depth: u32, leaves: &mut Vec<(Vec<Vec2>, bool)>) {
        if !is_oversized(&poly, self.config) {
            leaves.push((poly, false));
            return;
        }
        if depth >= self.config.max_split_depth {
            self.flag(format!("block {} still oversized at split depth {}", self.source.0, depth));
            leaves.push((poly, true));
            return;
        }

        match self.cut(&poly) {
            Some((first, second)) => {
                self.split(first, depth + 1, leaves);
                self.split(second, depth + 1, leaves);
            }
            None => {
                self.flag(format!("block {} could not be split", self.source.0));
                leaves.push((poly, true));
            }
        }
    }

    /// Cut across the longest edge near its midpoint, adding the infill
    /// street. Returns both halves.
    fn cut(&mut self, poly: &[Vec2]) -> Option<(Vec<Vec2>, Vec<Vec2>)> {
        let (edge, len) = geometry::longest_edge(poly)?;
        let (a, b) = geometry::edge(poly, edge);
        if len <= geometry::EPSILON {
            return None;
        }

        let spread = self.config.size_variation * self.config.target_block_width;
        let jitter = if spread > 0.0 {
            self.rng.gen_range(-spread..=spread)
        } else {
            0.0
        };
        let t = (0.5 + jitter / len).clamp(0.1, 0.9);
        let start = a.lerp(b, t);
        let inward = (b - a).perp() / len;

        let hit = geometry::first_ray_hit(start + inward * 0.01, inward, poly, &[edge])?;
        if hit.distance < 0.25 * self.config.target_block_depth {
            return None;
        }
        let (first, second) = geometry::split_polygon(poly, (edge, start), (hit.edge, hit.point))?;
        let min_area = self.config.min_sub_block_area;
        if geometry::polygon_area(&first) < min_area || geometry::polygon_area(&second) < min_area {
            return None;
        }

        let (c, d) = geometry::edge(poly, hit.edge);
        let from = node_on_edge(self.network, a, b, start, STREET_SNAP);
        let to = node_on_edge(self.network, c, d, hit.point, STREET_SNAP);
        self.network
            .add_segment(from, to, StreetType::Tertiary, SegmentOrigin::Infill, Vec::new())?;
        self.splits += 1;
        Some((first, second))
    }

    fn flag(&mut self, message: String) {
        self.diagnostics.push(
            Diagnostic::new(DiagnosticKind::GeometryDegenerate, Severity::Warning, message).with_block(self.source),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streets::types::NodeId;
    use rand::SeedableRng;

    fn rectangle_network(w: f32, h: f32) -> (StreetNetwork, Vec<Vec2>) {
        let corners = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(w, 0.0),
            Vec2::new(w, h),
            Vec2::new(0.0, h),
        ];
        let mut network = StreetNetwork::new();
        let ids: Vec<NodeId> = corners.iter().map(|&p| network.add_node(p)).collect();
        for i in 0..4 {
            network.add_segment(ids[i], ids[(i + 1) % 4], StreetType::Secondary, SegmentOrigin::Skeleton, Vec::new());
        }
        (network, corners)
    }

    #[test]
    fn test_single_split_of_long_block() {
        // 75 x 50: perimeter 250 against a limit of 200
        let (mut network, corners) = rectangle_network(75.0, 50.0);
        let config = InfillConfig {
            max_perimeter: 200.0,
            max_area: 1.0e6,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let outcome = regularize_blocks(vec![Block::new(BlockId(0), corners)], &mut network, &config, &mut rng);

        assert_eq!(outcome.splits, 1);
        assert_eq!(outcome.blocks.len(), 2);
        assert_eq!(network.segments().filter(|s| s.is_infill()).count(), 1);
        for block in &outcome.blocks {
            assert!(block.perimeter <= 200.0);
            assert!(!block.needs_manual_review);
        }
        let total: f32 = outcome.blocks.iter().map(|b| b.area).sum();
        assert!((total - 3750.0).abs() < 0.5);

        // The infill street joins the two long sides
        let infill = network.segments().find(|s| s.is_infill()).unwrap();
        assert_eq!(network.degree(infill.from), 3);
        assert_eq!(network.degree(infill.to), 3);
    }

    #[test]
    fn test_small_block_is_untouched() {
        let (mut network, corners) = rectangle_network(30.0, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let outcome = regularize_blocks(
            vec![Block::new(BlockId(0), corners)],
            &mut network,
            &InfillConfig::default(),
            &mut rng,
        );
        assert_eq!(outcome.splits, 0);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(network.segment_count(), 4);
    }

    #[test]
    fn test_depth_cap_flags_block() {
        let (mut network, corners) = rectangle_network(400.0, 300.0);
        let config = InfillConfig {
            max_split_depth: 1,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let outcome = regularize_blocks(vec![Block::new(BlockId(0), corners)], &mut network, &config, &mut rng);

        assert_eq!(outcome.splits, 1);
        assert!(outcome.blocks.iter().all(|b| b.needs_manual_review));
        assert!(outcome
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::GeometryDegenerate));
        assert_eq!(outcome.diagnostics.len(), 2);
    }

    #[test]
    fn test_repeated_splits_reach_target() {
        let (mut network, corners) = rectangle_network(200.0, 120.0);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let config = InfillConfig::default();

        let outcome = regularize_blocks(vec![Block::new(BlockId(0), corners)], &mut network, &config, &mut rng);

        assert!(outcome.splits >= 3);
        for block in outcome.blocks.iter().filter(|b| !b.needs_manual_review) {
            assert!(!is_oversized(&block.boundary, &config));
        }
        // Ids are dense
        for (i, block) in outcome.blocks.iter().enumerate() {
            assert_eq!(block.id, BlockId(i as u32));
        }
    }
}
