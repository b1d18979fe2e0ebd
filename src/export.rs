//! Layout serialization
//!
//! [`LayoutDocument`] is the JSON shape handed to downstream building and
//! mesh generators; [`to_geojson`] is for inspecting a layout in GIS tools.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use glam::Vec2;
use serde::Serialize;
use serde_json::{json, Value};

use crate::streets::types::{BlockId, LotId, NodeId, SegmentId, StreetType};
use crate::streets::{Diagnostic, GenerationFailure, KeyBuilding, LayoutStats, StreetLayout};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    pub pos: Vec2,
    pub is_entry: bool,
    pub is_key_building: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub street_type: StreetType,
    pub width: f32,
    pub length: f32,
    pub points: Vec<Vec2>,
    pub is_infill: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub id: BlockId,
    pub boundary: Vec<Vec2>,
    pub is_exterior: bool,
    pub needs_manual_review: bool,
    pub area: f32,
    pub perimeter: f32,
    pub segments: Vec<SegmentId>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotRecord {
    pub id: LotId,
    pub block_id: BlockId,
    pub boundary: Vec<Vec2>,
    pub frontage: [Vec2; 2],
    pub frontage_width: f32,
    pub depth: f32,
    pub is_corner: bool,
    pub street_id: SegmentId,
}

/// Complete output for one settlement.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    pub settlement: u32,
    pub nodes: Vec<NodeRecord>,
    pub segments: Vec<SegmentRecord>,
    pub blocks: Vec<BlockRecord>,
    pub lots: Vec<LotRecord>,
    pub key_buildings: Vec<KeyBuilding>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: LayoutStats,
}

/// Output for a settlement whose run was rejected.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDocument {
    pub settlement: u32,
    pub error: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl LayoutDocument {
    pub fn from_layout(layout: &StreetLayout) -> Self {
        let network = &layout.network;

        let nodes = network
            .nodes()
            .map(|n| NodeRecord {
                id: n.id,
                pos: n.position,
                is_entry: n.is_entry,
                is_key_building: n.is_key_building,
            })
            .collect();

        let segments = network
            .segments()
            .map(|s| SegmentRecord {
                id: s.id,
                from: network.resolve(s.from),
                to: network.resolve(s.to),
                street_type: s.street_type,
                width: s.width,
                length: s.length,
                points: s.points.clone(),
                is_infill: s.is_infill(),
            })
            .collect();

        let blocks = layout
            .blocks
            .iter()
            .map(|b| BlockRecord {
                id: b.id,
                boundary: b.boundary.clone(),
                is_exterior: b.is_exterior,
                needs_manual_review: b.needs_manual_review,
                area: b.area,
                perimeter: b.perimeter,
                segments: b.segments.clone(),
            })
            .collect();

        let lots = layout
            .lots
            .iter()
            .map(|l| LotRecord {
                id: l.id,
                block_id: l.block,
                boundary: l.boundary.clone(),
                frontage: [l.frontage.0, l.frontage.1],
                frontage_width: l.frontage_width,
                depth: l.depth,
                is_corner: l.is_corner,
                street_id: l.street,
            })
            .collect();

        Self {
            settlement: layout.settlement,
            nodes,
            segments,
            blocks,
            lots,
            key_buildings: layout.key_buildings.clone(),
            diagnostics: layout.diagnostics.clone(),
            stats: layout.stats.clone(),
        }
    }
}

impl FailureDocument {
    pub fn from_failure(failure: &GenerationFailure) -> Self {
        Self {
            settlement: failure.settlement,
            error: failure.error.to_string(),
            diagnostics: failure.diagnostics.clone(),
        }
    }
}

/// Streets as LineStrings and lots as Polygons in one FeatureCollection.
pub fn to_geojson(layout: &StreetLayout) -> Value {
    let mut features = Vec::new();

    for seg in layout.network.segments() {
        let coords: Vec<[f32; 2]> = seg.points.iter().map(|p| [p.x, p.y]).collect();
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": coords },
            "properties": {
                "kind": "street",
                "id": seg.id,
                "type": seg.street_type,
                "level": seg.street_type.level(),
                "name": seg.street_type.display_name(),
                "width": seg.width,
                "length": seg.length,
                "isInfill": seg.is_infill(),
            }
        }));
    }

    for lot in &layout.lots {
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [closed_ring(&lot.boundary)] },
            "properties": {
                "kind": "lot",
                "id": lot.id,
                "blockId": lot.block,
                "streetId": lot.street,
                "frontageWidth": lot.frontage_width,
                "depth": lot.depth,
                "isCorner": lot.is_corner,
            }
        }));
    }

    for building in &layout.key_buildings {
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [building.position.x, building.position.y] },
            "properties": {
                "kind": "key_building",
                "name": building.kind.display_name(),
                "radius": building.radius,
            }
        }));
    }

    json!({
        "type": "FeatureCollection",
        "properties": { "settlement": layout.settlement },
        "features": features,
    })
}

/// GeoJSON rings repeat their first position at the end.
fn closed_ring(outline: &[Vec2]) -> Vec<[f32; 2]> {
    let mut ring: Vec<[f32; 2]> = outline.iter().map(|p| [p.x, p.y]).collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}

/// Write the layout document as pretty JSON.
pub fn export_layout_json(layout: &StreetLayout, path: &Path) -> std::io::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &LayoutDocument::from_layout(layout))?;
    Ok(())
}

pub fn export_failure_json(failure: &GenerationFailure, path: &Path) -> std::io::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &FailureDocument::from_failure(failure))?;
    Ok(())
}

pub fn export_geojson(layout: &StreetLayout, path: &Path) -> std::io::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &to_geojson(layout))?;
    Ok(())
}
