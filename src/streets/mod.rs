//! Settlement street network generation
//!
//! Turns a settlement outline, its road entry points and a handful of key
//! buildings into a street graph, the blocks it encloses and the building
//! lots along each block's street frontage:
//! - Attractors are placed on key buildings, secondary entries and the outline
//! - A skeleton grows from the primary entry toward them (space colonization),
//!   detouring around steep or wet ground
//! - Faces of the planar street graph become blocks; oversized blocks are cut
//!   by infill streets
//! - Streets are ranked main/secondary/tertiary/rear access
//! - Blocks are subdivided into lots along their frontage
//!
//! Every run is a pure function of its inputs and the settlement seed.

pub mod config;
pub mod diagnostics;
pub mod generation;
pub mod network;
pub mod types;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::seeds::SettlementSeeds;
use crate::terrain::TerrainQuery;

pub use config::StreetGenConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, GenerationFailure, Severity, StreetGenError};
pub use network::StreetNetwork;
pub use types::{
    Attractor, Block, EntryPoint, KeyBuilding, KeyBuildingKind, Lot, RoadClass, Settlement, SettlementType,
    StreetType,
};

use generation::{
    assign_hierarchy, attach_segments, build_attractors, grow_skeleton, identify_blocks, is_oversized,
    place_key_buildings, regularize_blocks, sort_entries, subdivide_lots, validate_layout,
};

/// Boundaries below this area (m²) are degenerate.
const MIN_BOUNDARY_AREA: f32 = 1.0;

/// Summary numbers for one generated layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStats {
    pub nodes: usize,
    pub segments: usize,
    pub main_segments: usize,
    pub secondary_segments: usize,
    pub tertiary_segments: usize,
    pub rear_access_segments: usize,
    pub total_street_length: f32,
    pub blocks: usize,
    pub blocks_needing_review: usize,
    pub lots: usize,
    pub corner_lots: usize,
    pub growth_iterations: usize,
    pub unreached_attractors: usize,
    pub infill_streets: usize,
    pub merged_nodes: usize,
}

/// Finished street layout for one settlement.
#[derive(Clone, Debug)]
pub struct StreetLayout {
    pub settlement: u32,
    pub network: StreetNetwork,
    /// Attractors with their final `reached` state
    pub attractors: Vec<Attractor>,
    pub key_buildings: Vec<KeyBuilding>,
    pub blocks: Vec<Block>,
    pub lots: Vec<Lot>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: LayoutStats,
}

/// One settlement's inputs for a batch run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementJob {
    #[serde(flatten)]
    pub settlement: Settlement,
    pub entries: Vec<EntryPoint>,
    /// Derived with [`place_key_buildings`] when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_buildings: Option<Vec<KeyBuilding>>,
}

/// Generate the street layout for one settlement with seeds derived from
/// `settlement.seed`.
///
/// `key_buildings: None` places a default set for the settlement type; an
/// empty slice is valid and gives a boundary-driven layout.
pub fn generate_streets(
    settlement: &Settlement,
    entries: &[EntryPoint],
    key_buildings: Option<&[KeyBuilding]>,
    terrain: &dyn TerrainQuery,
    config: &StreetGenConfig,
) -> Result<StreetLayout, GenerationFailure> {
    let seeds = SettlementSeeds::from_master(settlement.seed);
    generate_streets_with_seeds(settlement, entries, key_buildings, terrain, config, &seeds)
}

/// [`generate_streets`] with explicit per-stage seeds.
pub fn generate_streets_with_seeds(
    settlement: &Settlement,
    entries: &[EntryPoint],
    key_buildings: Option<&[KeyBuilding]>,
    terrain: &dyn TerrainQuery,
    config: &StreetGenConfig,
    seeds: &SettlementSeeds,
) -> Result<StreetLayout, GenerationFailure> {
    let mut diagnostics = Diagnostics::new();
    let fail = |error: StreetGenError, mut diagnostics: Diagnostics| {
        diagnostics.push(Diagnostic::from(&error));
        GenerationFailure {
            settlement: settlement.id,
            error,
            diagnostics: diagnostics.into_vec(),
        }
    };

    // Phase 0: reject inputs that cannot produce a layout
    let checked = config
        .validate()
        .and_then(|_| check_settlement(settlement))
        .and_then(|_| check_entries(settlement, entries));
    let entries = match checked {
        Ok(entries) => entries,
        Err(error) => return Err(fail(error, diagnostics)),
    };
    let boundary = settlement.boundary_polygon(config.attractors.circle_segments);
    if let Err(error) = check_boundary(&boundary) {
        return Err(fail(error, diagnostics));
    }

    tracing::info!(
        target: "settlement_streets::pipeline",
        settlement = settlement.id,
        settlement_type = settlement.settlement_type.display_name(),
        radius = settlement.radius,
        entries = entries.len(),
        seed = seeds.master,
        "pipeline.start"
    );

    // Phase 1: primary entry and attractors
    let entries = sort_entries(&entries);
    let primary = entries[0];
    let key_buildings = match key_buildings {
        Some(buildings) => buildings.to_vec(),
        None => {
            let mut rng = ChaCha8Rng::seed_from_u64(seeds.key_buildings);
            place_key_buildings(settlement, &boundary, &primary, terrain, &mut rng)
        }
    };
    let attractors = build_attractors(settlement, &boundary, &entries, &key_buildings, &config.attractors);

    // Phase 2: organic skeleton from the primary entry
    let skeleton = grow_skeleton(
        &[primary],
        attractors,
        &boundary,
        terrain,
        &config.skeleton,
        &config.refiner,
    );
    diagnostics.extend(skeleton.diagnostics);
    let mut network = skeleton.network;
    let attractors = skeleton.attractors;
    let growth_iterations = skeleton.iterations;

    let report = network.finalize(config.blocks.snap_tolerance);
    warn_if_capped(report.capped, "growth", &mut diagnostics);

    // Phase 3: blocks, re-traced after every infill pass
    let traced = identify_blocks(&network, &boundary, &config.blocks);
    let mut blocks = traced.blocks;
    // Only the last trace's degenerate faces are reported
    let mut trace_diagnostics = traced.diagnostics;

    let mut infill_rng = ChaCha8Rng::seed_from_u64(seeds.infill);
    let mut infill_streets = 0;
    for pass in 0..config.infill.max_passes {
        let infill = regularize_blocks(blocks, &mut network, &config.infill, &mut infill_rng);
        infill_streets += infill.splits;
        diagnostics.extend(infill.diagnostics);
        tracing::debug!(
            target: "settlement_streets::pipeline",
            pass,
            splits = infill.splits,
            "pipeline.infill_pass"
        );
        if infill.splits == 0 {
            blocks = infill.blocks;
            break;
        }
        let report = network.finalize(config.blocks.snap_tolerance);
        warn_if_capped(report.capped, "infill", &mut diagnostics);
        let traced = identify_blocks(&network, &boundary, &config.blocks);
        blocks = carry_review_flags(traced.blocks, &infill.blocks);
        trace_diagnostics = traced.diagnostics;
    }

    // Crowded intersections collapse once all cuts are in
    let consolidated = network.consolidate(config.infill.merge_radius, config.blocks.snap_tolerance, &boundary);
    warn_if_capped(consolidated.capped, "node merging", &mut diagnostics);
    let mut merged_nodes = consolidated.merged_nodes;
    if consolidated.merged_nodes > 0 {
        let traced = identify_blocks(&network, &boundary, &config.blocks);
        blocks = carry_review_flags(traced.blocks, &blocks);
        trace_diagnostics = traced.diagnostics;
    }
    diagnostics.extend(trace_diagnostics);
    for block in blocks.iter_mut() {
        if !block.needs_manual_review && is_oversized(&block.boundary, &config.infill) {
            block.needs_manual_review = true;
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::GeometryDegenerate,
                    Severity::Warning,
                    format!(
                        "block {} still exceeds the size limits after {} infill passes",
                        block.id.0, config.infill.max_passes
                    ),
                )
                .with_block(block.id),
            );
        }
    }

    // Phase 4: street hierarchy and rear access
    let hierarchy = assign_hierarchy(
        &mut network,
        &attractors,
        blocks,
        settlement.center,
        &config.hierarchy,
        &config.lots,
    );
    diagnostics.extend(hierarchy.diagnostics);
    let mut blocks = hierarchy.blocks;
    if hierarchy.rear_lanes > 0 {
        let consolidated = network.consolidate(config.infill.merge_radius, config.blocks.snap_tolerance, &boundary);
        warn_if_capped(consolidated.capped, "rear access merging", &mut diagnostics);
        merged_nodes += consolidated.merged_nodes;
        if consolidated.merged_nodes > 0 {
            let traced = identify_blocks(&network, &boundary, &config.blocks);
            blocks = carry_review_flags(traced.blocks, &blocks);
            diagnostics.extend(traced.diagnostics);
        }
    }
    attach_segments(&mut blocks, &network, config.blocks.snap_tolerance);

    // Phase 5: lots
    let mut lot_rng = ChaCha8Rng::seed_from_u64(seeds.lots);
    let subdivided = subdivide_lots(&blocks, &network, &config.lots, &mut lot_rng);
    diagnostics.extend(subdivided.diagnostics);
    let mut lots = subdivided.lots;

    // Phase 6: validation
    let findings = validate_layout(&network, &attractors, &mut blocks, &mut lots, config);
    diagnostics.extend(findings);

    let stats = LayoutStats {
        nodes: network.node_count(),
        segments: network.segment_count(),
        main_segments: network.count_by_type(StreetType::Main),
        secondary_segments: network.count_by_type(StreetType::Secondary),
        tertiary_segments: network.count_by_type(StreetType::Tertiary),
        rear_access_segments: network.count_by_type(StreetType::RearAccess),
        total_street_length: network.total_length(),
        blocks: blocks.len(),
        blocks_needing_review: blocks.iter().filter(|b| b.needs_manual_review).count(),
        lots: lots.len(),
        corner_lots: lots.iter().filter(|l| l.is_corner).count(),
        growth_iterations,
        unreached_attractors: attractors.iter().filter(|a| !a.reached).count(),
        infill_streets,
        merged_nodes,
    };

    tracing::info!(
        target: "settlement_streets::pipeline",
        settlement = settlement.id,
        nodes = stats.nodes,
        segments = stats.segments,
        blocks = stats.blocks,
        lots = stats.lots,
        length = stats.total_street_length,
        diagnostics = diagnostics.entries().len(),
        "pipeline.done"
    );

    Ok(StreetLayout {
        settlement: settlement.id,
        network,
        attractors,
        key_buildings,
        blocks,
        lots,
        diagnostics: diagnostics.into_vec(),
        stats,
    })
}

/// Run independent settlements in parallel. Results keep the input order.
pub fn generate_batch(
    jobs: &[SettlementJob],
    terrain: &dyn TerrainQuery,
    config: &StreetGenConfig,
) -> Vec<Result<StreetLayout, GenerationFailure>> {
    jobs.par_iter()
        .map(|job| {
            generate_streets(
                &job.settlement,
                &job.entries,
                job.key_buildings.as_deref(),
                terrain,
                config,
            )
        })
        .collect()
}

fn check_settlement(settlement: &Settlement) -> Result<(), StreetGenError> {
    if !settlement.center.is_finite() {
        return Err(StreetGenError::InvalidSettlement(format!(
            "center ({}, {}) is not finite",
            settlement.center.x, settlement.center.y
        )));
    }
    if !settlement.radius.is_finite() || settlement.radius <= 0.0 {
        return Err(StreetGenError::InvalidSettlement(format!(
            "radius must be positive, got {}",
            settlement.radius
        )));
    }
    Ok(())
}

/// Entries with a usable inward direction. A zero direction points at the
/// settlement center.
fn check_entries(settlement: &Settlement, entries: &[EntryPoint]) -> Result<Vec<EntryPoint>, StreetGenError> {
    if entries.is_empty() {
        return Err(StreetGenError::NoEntryPoints);
    }
    let mut checked = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        if !entry.position.is_finite() || !entry.direction.is_finite() {
            return Err(StreetGenError::InvalidSettlement(format!(
                "entry point {} has non-finite coordinates",
                i
            )));
        }
        let mut entry = *entry;
        if entry.direction.length_squared() <= geometry::EPSILON * geometry::EPSILON {
            entry.direction = (settlement.center - entry.position).normalize_or_zero();
        }
        if entry.direction == Vec2::ZERO {
            return Err(StreetGenError::InvalidSettlement(format!(
                "entry point {} sits on the center and has no direction",
                i
            )));
        }
        checked.push(entry);
    }
    Ok(checked)
}

fn check_boundary(boundary: &[Vec2]) -> Result<(), StreetGenError> {
    if boundary.len() < 3 {
        return Err(StreetGenError::DegenerateBoundary(format!(
            "{} distinct vertices",
            boundary.len()
        )));
    }
    if boundary.iter().any(|p| !p.is_finite()) {
        return Err(StreetGenError::DegenerateBoundary("non-finite vertex".to_string()));
    }
    let area = geometry::polygon_area(boundary);
    if area < MIN_BOUNDARY_AREA {
        return Err(StreetGenError::DegenerateBoundary(format!("area {:.3} m²", area)));
    }
    Ok(())
}

/// Keep the review flag of any split-pass block whose interior holds the
/// re-traced block's centroid.
/// Record a warning when a merge or planarity pass stopped at its cap.
fn warn_if_capped(capped: bool, stage: &str, diagnostics: &mut Diagnostics) {
    if capped {
        tracing::warn!(target: "settlement_streets::pipeline", stage, "pipeline.capped");
        diagnostics.warn(
            DiagnosticKind::GeometryDegenerate,
            format!("{} stopped at its iteration limit; the street graph may not be fully resolved", stage),
        );
    }
}

fn carry_review_flags(mut traced: Vec<Block>, previous: &[Block]) -> Vec<Block> {
    for block in traced.iter_mut() {
        let centroid = block.centroid();
        if previous
            .iter()
            .any(|p| p.needs_manual_review && geometry::point_in_polygon(centroid, &p.boundary))
        {
            block.needs_manual_review = true;
        }
    }
    traced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::FlatTerrain;

    fn square(center: Vec2, half: f32) -> Vec<Vec2> {
        vec![
            center + Vec2::new(-half, -half),
            center + Vec2::new(half, -half),
            center + Vec2::new(half, half),
            center + Vec2::new(-half, half),
        ]
    }

    /// Square settlement of radius 100 with an east entry and a church at
    /// the center.
    fn church_square() -> (Settlement, Vec<EntryPoint>, Vec<KeyBuilding>, StreetGenConfig) {
        let settlement = Settlement::new(1, Vec2::ZERO, 100.0, 42).with_boundary(square(Vec2::ZERO, 100.0));
        let entries = vec![EntryPoint::new(
            Vec2::new(100.0, 0.0),
            Vec2::new(-1.0, 0.0),
            RoadClass::Road,
        )];
        let church = KeyBuilding::new(KeyBuildingKind::Church, Vec2::ZERO, 15.0, 1.0);
        let mut config = StreetGenConfig::default();
        config.skeleton.segment_length = 20.0;
        config.skeleton.kill_radius = 12.0;
        config.skeleton.max_iterations = 100;
        (settlement, entries, vec![church], config)
    }

    #[test]
    fn test_main_street_reaches_center() {
        let (settlement, entries, buildings, config) = church_square();
        let layout = generate_streets(&settlement, &entries, Some(&buildings), &FlatTerrain::default(), &config)
            .expect("layout");

        let primary = layout.network.primary_entry().expect("primary entry");
        let hops = layout.network.hop_distances(primary);
        // Some node within the kill radius of the center is connected to the entry
        assert!(layout
            .network
            .nodes()
            .any(|n| n.position.length() <= config.skeleton.kill_radius && hops.contains_key(&n.id)));
        assert!(layout.stats.main_segments > 0);
    }

    #[test]
    fn test_layout_invariants_hold() {
        let (settlement, entries, buildings, config) = church_square();
        let layout = generate_streets(&settlement, &entries, Some(&buildings), &FlatTerrain::default(), &config)
            .expect("layout");

        // No crossings survive finalization
        assert!(layout.network.crossing_pairs().is_empty());

        // Blocks are CCW and either small enough or flagged
        for block in &layout.blocks {
            assert!(geometry::is_ccw(&block.boundary));
            assert!(block.perimeter <= config.infill.max_perimeter || block.needs_manual_review);
        }

        // Lots respect the frontage and depth bounds
        let eps = 1e-3;
        for lot in &layout.lots {
            assert!(lot.frontage_width >= config.lots.min_frontage - eps);
            assert!(lot.frontage_width <= config.lots.max_frontage * config.lots.corner_bonus + eps);
            assert!(lot.depth >= config.lots.min_depth - eps);
            assert!(geometry::is_ccw(&lot.boundary));
        }

        // Reached attractors stay reachable from the primary entry
        let primary = layout.network.primary_entry().expect("primary entry");
        let hops = layout.network.hop_distances(primary);
        for attractor in layout.attractors.iter().filter(|a| a.reached) {
            let node = attractor.reached_by.expect("reached by a node");
            assert!(hops.contains_key(&layout.network.resolve(node)));
        }
    }

    /// Circular hamlets, villages and towns with two entries each; the last
    /// variant disables infill so no cuts are made.
    fn sample_layouts() -> Vec<StreetLayout> {
        let kinds = [SettlementType::Hamlet, SettlementType::Village, SettlementType::Town];
        let mut layouts = Vec::new();
        for (i, kind) in kinds.into_iter().enumerate() {
            for seed in 1..4u64 {
                let radius = 90.0 + 40.0 * i as f32;
                let settlement = Settlement::new(seed as u32, Vec2::ZERO, radius, seed).with_type(kind);
                let entries = vec![
                    EntryPoint::new(Vec2::new(radius, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Road),
                    EntryPoint::new(Vec2::new(0.0, -radius), Vec2::new(0.0, 1.0), RoadClass::Lane),
                ];
                let mut config = StreetGenConfig::default();
                if seed == 3 {
                    config.infill.max_perimeter = 1.0e6;
                    config.infill.max_area = 1.0e9;
                }
                let layout = generate_streets(&settlement, &entries, None, &FlatTerrain::default(), &config)
                    .expect("layout");
                if seed == 3 {
                    assert_eq!(layout.stats.infill_streets, 0);
                }
                layouts.push(layout);
            }
        }
        layouts
    }

    #[test]
    fn test_no_intersections_within_merge_radius() {
        let radius = StreetGenConfig::default().infill.merge_radius;
        for layout in sample_layouts() {
            if let Some((a, b, d)) = layout.network.closest_node_pair() {
                assert!(
                    d > radius,
                    "settlement {}: nodes {} and {} are {:.2} m apart",
                    layout.settlement,
                    a.0,
                    b.0,
                    d
                );
            }
            assert!(layout.network.crossing_pairs().is_empty());
        }
    }

    #[test]
    fn test_lots_lie_inside_their_blocks() {
        for layout in sample_layouts() {
            for lot in &layout.lots {
                let block = layout
                    .blocks
                    .iter()
                    .find(|b| b.id == lot.block)
                    .expect("lot block exists");
                for &p in &lot.boundary {
                    assert!(
                        geometry::point_in_or_on_polygon(p, &block.boundary, 1e-3),
                        "settlement {}: lot {} vertex ({}, {}) outside block {}",
                        layout.settlement,
                        lot.id.0,
                        p.x,
                        p.y,
                        block.id.0
                    );
                }
            }
        }
    }

    #[test]
    fn test_lots_on_l_shaped_block_do_not_overlap() {
        let outline = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(80.0, 0.0),
            Vec2::new(80.0, 40.0),
            Vec2::new(40.0, 40.0),
            Vec2::new(40.0, 80.0),
            Vec2::new(0.0, 80.0),
        ];
        let mut network = StreetNetwork::new();
        let ids: Vec<_> = outline.iter().map(|&p| network.add_node(p)).collect();
        for i in 0..ids.len() {
            network.add_segment(
                ids[i],
                ids[(i + 1) % ids.len()],
                StreetType::Secondary,
                types::SegmentOrigin::Skeleton,
                Vec::new(),
            );
        }
        let block = Block::new(types::BlockId(0), outline);
        let config = StreetGenConfig::default();

        for seed in 0..5 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let outcome = subdivide_lots(&[block.clone()], &network, &config.lots, &mut rng);

            // Lots come from several sides of the L, not just the longest
            let mut streets: Vec<_> = outcome.lots.iter().map(|l| l.street).collect();
            streets.sort();
            streets.dedup();
            assert!(streets.len() >= 3, "seed {}: lots on {} streets", seed, streets.len());

            for (i, a) in outcome.lots.iter().enumerate() {
                assert!(geometry::polygon_contains(&block.boundary, &a.boundary, 1e-3));
                for b in &outcome.lots[i + 1..] {
                    assert!(
                        !geometry::convex_polygons_overlap(&a.boundary, &b.boundary, 0.01),
                        "seed {}: lots {} and {} overlap",
                        seed,
                        a.id.0,
                        b.id.0
                    );
                }
            }
        }
    }

    #[test]
    fn test_capped_passes_are_reported() {
        let mut diagnostics = Diagnostics::new();
        warn_if_capped(false, "growth", &mut diagnostics);
        assert!(diagnostics.is_empty());

        warn_if_capped(true, "node merging", &mut diagnostics);
        assert_eq!(diagnostics.count(DiagnosticKind::GeometryDegenerate), 1);
        assert_eq!(diagnostics.entries()[0].severity, Severity::Warning);
        assert!(diagnostics.entries()[0].message.contains("node merging"));
    }

    #[test]
    fn test_identical_inputs_give_identical_layouts() {
        let (settlement, entries, buildings, config) = church_square();
        let terrain = FlatTerrain::default();
        let a = generate_streets(&settlement, &entries, Some(&buildings), &terrain, &config).expect("first");
        let b = generate_streets(&settlement, &entries, Some(&buildings), &terrain, &config).expect("second");

        let positions = |l: &StreetLayout| l.network.nodes().map(|n| n.position).collect::<Vec<_>>();
        let segments = |l: &StreetLayout| {
            l.network
                .segments()
                .map(|s| (s.from, s.to, s.street_type, s.points.clone()))
                .collect::<Vec<_>>()
        };
        let lots = |l: &StreetLayout| l.lots.iter().map(|lot| lot.boundary.clone()).collect::<Vec<_>>();

        assert_eq!(positions(&a), positions(&b));
        assert_eq!(segments(&a), segments(&b));
        assert_eq!(lots(&a), lots(&b));
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn test_no_entries_fails_with_input_error() {
        let (settlement, _, buildings, config) = church_square();
        let failure = generate_streets(&settlement, &[], Some(&buildings), &FlatTerrain::default(), &config)
            .expect_err("no entries");
        assert_eq!(failure.error, StreetGenError::NoEntryPoints);
        assert_eq!(failure.diagnostics.len(), 1);
        assert_eq!(failure.diagnostics[0].kind, DiagnosticKind::InputError);
    }

    #[test]
    fn test_degenerate_boundary_fails() {
        let (settlement, entries, buildings, config) = church_square();
        let flat = settlement.with_boundary(vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0)]);
        let failure = generate_streets(&flat, &entries, Some(&buildings), &FlatTerrain::default(), &config)
            .expect_err("collinear boundary");
        assert!(matches!(failure.error, StreetGenError::DegenerateBoundary(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_growth() {
        let (settlement, entries, buildings, mut config) = church_square();
        config.lots.min_frontage = 20.0;
        let failure = generate_streets(&settlement, &entries, Some(&buildings), &FlatTerrain::default(), &config)
            .expect_err("bad config");
        assert!(matches!(failure.error, StreetGenError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_key_buildings_is_valid() {
        let (settlement, entries, _, config) = church_square();
        let layout = generate_streets(&settlement, &entries, Some(&[]), &FlatTerrain::default(), &config)
            .expect("boundary-driven layout");
        assert!(layout.key_buildings.is_empty());
        assert!(layout.network.segment_count() > 0);
    }

    #[test]
    fn test_default_key_buildings_are_placed() {
        let (settlement, entries, _, config) = church_square();
        let town = settlement.with_type(SettlementType::Town);
        let layout = generate_streets(&town, &entries, None, &FlatTerrain::default(), &config).expect("layout");
        assert!(layout
            .key_buildings
            .iter()
            .any(|b| b.kind == KeyBuildingKind::Market));
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let (settlement, entries, buildings, config) = church_square();
        let mut jobs = Vec::new();
        for id in 0..4u32 {
            let mut s = settlement.clone();
            s.id = id;
            s.seed = 100 + id as u64;
            jobs.push(SettlementJob {
                settlement: s,
                entries: if id == 2 { Vec::new() } else { entries.clone() },
                key_buildings: Some(buildings.clone()),
            });
        }
        let results = generate_batch(&jobs, &FlatTerrain::default(), &config);
        assert_eq!(results.len(), 4);
        for (id, result) in results.iter().enumerate() {
            match result {
                Ok(layout) => assert_eq!(layout.settlement, id as u32),
                Err(failure) => {
                    assert_eq!(id, 2);
                    assert_eq!(failure.settlement, 2);
                }
            }
        }
    }

    #[test]
    fn test_job_parses_from_json() {
        let json = r#"{
            "id": 7,
            "center": [0.0, 0.0],
            "radius": 80.0,
            "seed": 3,
            "type": "hamlet",
            "entries": [{"position": [80.0, 0.0], "direction": [-1.0, 0.0], "roadClass": "track"}]
        }"#;
        let job: SettlementJob = serde_json::from_str(json).expect("parse job");
        assert_eq!(job.settlement.id, 7);
        assert_eq!(job.settlement.settlement_type, SettlementType::Hamlet);
        assert_eq!(job.entries[0].road_class, RoadClass::Track);
        assert!(job.key_buildings.is_none());
    }
}
