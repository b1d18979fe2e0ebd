//! Final layout checks
//!
//! Street and reachability problems are only reported. Oversized blocks are
//! flagged for review and out-of-bounds lots are dropped, each with a
//! diagnostic.

use crate::streets::config::{LotConfig, StreetGenConfig};
use crate::streets::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::streets::network::StreetNetwork;
use crate::streets::types::{Attractor, Block, Lot};

use super::infill::is_oversized;

const WIDTH_TOLERANCE: f32 = 1e-3;

/// Frontage width within the (corner) limits and depth within
/// `[min_depth, target_depth]`.
pub fn lot_in_bounds(lot: &Lot, config: &LotConfig) -> bool {
    let upper = if lot.is_corner {
        config.max_frontage * config.corner_bonus
    } else {
        config.max_frontage
    };
    let width_ok =
        lot.frontage_width >= config.min_frontage - WIDTH_TOLERANCE && lot.frontage_width <= upper + WIDTH_TOLERANCE;
    let depth_ok =
        lot.depth >= config.min_depth - WIDTH_TOLERANCE && lot.depth <= config.target_depth + WIDTH_TOLERANCE;
    width_ok && depth_ok
}

/// Check reachability, planarity, block size and lot bounds.
pub fn validate_layout(
    network: &StreetNetwork,
    attractors: &[Attractor],
    blocks: &mut [Block],
    lots: &mut Vec<Lot>,
    config: &StreetGenConfig,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let Some(primary) = network.primary_entry() {
        let hops = network.hop_distances(primary);
        for (i, attractor) in attractors.iter().enumerate() {
            let Some(node) = attractor.reached_by else {
                continue;
            };
            if !hops.contains_key(&network.resolve(node)) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ConnectivityViolation,
                    Severity::Warning,
                    format!("attractor {} was reached but is cut off from the primary entry", i),
                ));
            }
        }
        let stranded = network
            .nodes()
            .filter(|n| !n.edges.is_empty() && !hops.contains_key(&n.id))
            .count();
        if stranded > 0 {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ConnectivityViolation,
                Severity::Warning,
                format!("{} street nodes are unreachable from the primary entry", stranded),
            ));
        }
    }

    for (a, b, point) in network.crossing_pairs() {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::GeometryDegenerate,
                Severity::Warning,
                format!(
                    "segments {} and {} cross at ({:.1}, {:.1}) without a junction",
                    a.0, b.0, point.x, point.y
                ),
            )
            .with_segment(a),
        );
    }

    for block in blocks.iter_mut() {
        if !block.needs_manual_review && is_oversized(&block.boundary, &config.infill) {
            block.needs_manual_review = true;
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::GeometryDegenerate,
                    Severity::Warning,
                    format!(
                        "block {} exceeds the size limits (perimeter {:.1}, area {:.1})",
                        block.id.0, block.perimeter, block.area
                    ),
                )
                .with_block(block.id),
            );
        }
    }

    lots.retain(|lot| {
        if lot_in_bounds(lot, &config.lots) {
            return true;
        }
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::GeometryDegenerate,
                Severity::Warning,
                format!(
                    "lot {} is out of bounds (frontage {:.2}, depth {:.2})",
                    lot.id.0, lot.frontage_width, lot.depth
                ),
            )
            .with_block(lot.block)
            .with_segment(lot.street),
        );
        false
    });

    tracing::debug!(
        target: "settlement_streets::validate",
        findings = diagnostics.len(),
        "validate.done"
    );
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streets::types::{AttractorKind, BlockId, LotId, SegmentId, SegmentOrigin, StreetType};
    use glam::Vec2;

    #[test]
    fn test_clean_network_has_no_findings() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::ZERO);
        let b = network.add_node(Vec2::new(20.0, 0.0));
        network.set_primary_entry(a);
        network.add_segment(a, b, StreetType::Main, SegmentOrigin::Skeleton, Vec::new());
        let mut attractor = Attractor::new(Vec2::new(22.0, 0.0), 1.0, AttractorKind::KeyBuilding);
        attractor.reached = true;
        attractor.reached_by = Some(b);

        let findings = validate_layout(&network, &[attractor], &mut [], &mut Vec::new(), &StreetGenConfig::default());
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_detached_street_is_reported() {
        let mut network = StreetNetwork::new();
        let a = network.add_node(Vec2::ZERO);
        let b = network.add_node(Vec2::new(20.0, 0.0));
        let c = network.add_node(Vec2::new(0.0, 50.0));
        let d = network.add_node(Vec2::new(20.0, 50.0));
        network.set_primary_entry(a);
        network.add_segment(a, b, StreetType::Main, SegmentOrigin::Skeleton, Vec::new());
        network.add_segment(c, d, StreetType::Tertiary, SegmentOrigin::Infill, Vec::new());
        let mut attractor = Attractor::new(Vec2::new(20.0, 50.0), 0.5, AttractorKind::KeyBuilding);
        attractor.reached = true;
        attractor.reached_by = Some(d);

        let findings = validate_layout(&network, &[attractor], &mut [], &mut Vec::new(), &StreetGenConfig::default());
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|d| d.kind == DiagnosticKind::ConnectivityViolation));
    }

    #[test]
    fn test_out_of_bounds_lot_is_dropped() {
        let network = StreetNetwork::new();
        let lot = Lot {
            id: LotId(0),
            block: BlockId(0),
            boundary: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(30.0, 0.0),
                Vec2::new(30.0, 20.0),
                Vec2::new(0.0, 20.0),
            ],
            frontage: (Vec2::new(0.0, 0.0), Vec2::new(30.0, 0.0)),
            frontage_width: 30.0,
            depth: 20.0,
            is_corner: false,
            street: SegmentId(0),
        };
        let mut lots = vec![lot];
        let findings = validate_layout(&network, &[], &mut [], &mut lots, &StreetGenConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, DiagnosticKind::GeometryDegenerate);
        assert!(lots.is_empty());
    }

    #[test]
    fn test_oversized_block_is_flagged() {
        let network = StreetNetwork::new();
        let big = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(200.0, 0.0),
            Vec2::new(200.0, 200.0),
            Vec2::new(0.0, 200.0),
        ];
        let block = Block::new(BlockId(0), big.clone());
        let mut flagged = Block::new(BlockId(1), big);
        flagged.needs_manual_review = true;

        let mut blocks = vec![block, flagged];
        let findings = validate_layout(&network, &[], &mut blocks, &mut Vec::new(), &StreetGenConfig::default());
        // Already flagged blocks are not reported twice
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].block, Some(BlockId(0)));
        assert!(blocks.iter().all(|b| b.needs_manual_review));
    }
}
