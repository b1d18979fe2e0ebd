//! Street layout types
//!
//! Settlement inputs (settlement, entry points, key buildings), growth
//! attractors, and the produced nodes, segments, blocks and lots.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::geometry;

/// Stable index of a node in the street network arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Stable index of a segment in the street network arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u32);

impl SegmentId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotId(pub u32);

// =============================================================================
// INPUTS
// =============================================================================

/// Size class of a settlement; drives the default key building set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementType {
    Hamlet,
    #[default]
    Village,
    Town,
}

impl SettlementType {
    pub fn display_name(&self) -> &'static str {
        match self {
            SettlementType::Hamlet => "Hamlet",
            SettlementType::Village => "Village",
            SettlementType::Town => "Town",
        }
    }
}

/// Settlement definition produced upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: u32,
    pub center: Vec2,
    pub radius: f32,
    pub seed: u64,
    #[serde(default, rename = "type")]
    pub settlement_type: SettlementType,
    /// Explicit outline; a circle of `radius` is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Vec<Vec2>>,
}

impl Settlement {
    pub fn new(id: u32, center: Vec2, radius: f32, seed: u64) -> Self {
        Self {
            id,
            center,
            radius,
            seed,
            settlement_type: SettlementType::default(),
            boundary: None,
        }
    }

    pub fn with_type(mut self, settlement_type: SettlementType) -> Self {
        self.settlement_type = settlement_type;
        self
    }

    pub fn with_boundary(mut self, boundary: Vec<Vec2>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// The settlement outline, CCW. Explicit boundaries are normalized;
    /// otherwise a regular polygon with `circle_segments` sides.
    pub fn boundary_polygon(&self, circle_segments: usize) -> Vec<Vec2> {
        let mut poly = match &self.boundary {
            Some(points) => geometry::dedup_vertices(points, geometry::EPSILON),
            None => geometry::circle_polygon(self.center, self.radius, circle_segments),
        };
        geometry::ensure_ccw(&mut poly);
        poly
    }
}

/// Importance of the inter-settlement road arriving at an entry point.
/// Ordering is ascending importance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    Footpath,
    Track,
    #[default]
    Lane,
    Road,
    Highway,
}

/// Where an inter-settlement road meets the settlement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub position: Vec2,
    /// Heading into the settlement (need not be normalized)
    pub direction: Vec2,
    #[serde(default)]
    pub road_class: RoadClass,
}

impl EntryPoint {
    pub fn new(position: Vec2, direction: Vec2, road_class: RoadClass) -> Self {
        Self {
            position,
            direction,
            road_class,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBuildingKind {
    Church,
    Market,
    Inn,
    Well,
    Green,
    #[default]
    Other,
}

impl KeyBuildingKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            KeyBuildingKind::Church => "Church",
            KeyBuildingKind::Market => "Market",
            KeyBuildingKind::Inn => "Inn",
            KeyBuildingKind::Well => "Well",
            KeyBuildingKind::Green => "Green",
            KeyBuildingKind::Other => "Other",
        }
    }
}

/// A landmark the street network must reach.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBuilding {
    #[serde(default)]
    pub kind: KeyBuildingKind,
    pub position: Vec2,
    pub radius: f32,
    /// Importance; becomes the attractor weight
    pub weight: f32,
}

impl KeyBuilding {
    pub fn new(kind: KeyBuildingKind, position: Vec2, radius: f32, weight: f32) -> Self {
        Self {
            kind,
            position,
            radius,
            weight,
        }
    }
}

// =============================================================================
// GROWTH
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttractorKind {
    KeyBuilding,
    Boundary,
    LotFrontage,
    /// A secondary entry point the skeleton has to connect to
    External,
}

/// Weighted growth target for the skeleton grower.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attractor {
    pub position: Vec2,
    pub weight: f32,
    pub kind: AttractorKind,
    pub reached: bool,
    /// Node that reached this attractor (resolve through merges before use)
    pub reached_by: Option<NodeId>,
    /// Index into the key building list for `KeyBuilding` attractors
    pub key_building: Option<usize>,
}

impl Attractor {
    pub fn new(position: Vec2, weight: f32, kind: AttractorKind) -> Self {
        Self {
            position,
            weight,
            kind,
            reached: false,
            reached_by: None,
            key_building: None,
        }
    }
}

// =============================================================================
// NETWORK
// =============================================================================

/// Hierarchy level of a street, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreetType {
    Main,
    Secondary,
    Tertiary,
    RearAccess,
}

impl StreetType {
    /// 1 for the main street down to 4 for rear access lanes.
    pub fn level(&self) -> u8 {
        match self {
            StreetType::Main => 1,
            StreetType::Secondary => 2,
            StreetType::Tertiary => 3,
            StreetType::RearAccess => 4,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StreetType::Main => "Main Street",
            StreetType::Secondary => "Street",
            StreetType::Tertiary => "Lane",
            StreetType::RearAccess => "Rear Access",
        }
    }

    pub fn all() -> &'static [StreetType] {
        &[
            StreetType::Main,
            StreetType::Secondary,
            StreetType::Tertiary,
            StreetType::RearAccess,
        ]
    }
}

/// Which stage created a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentOrigin {
    Skeleton,
    Infill,
    RearAccess,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreetNode {
    pub id: NodeId,
    pub position: Vec2,
    /// Growth parent; `None` for seeds and nodes added after growth
    pub parent: Option<NodeId>,
    /// Growth heading used for momentum and branch-angle limits
    pub heading: Vec2,
    /// Incident segments (rebuilt after merges)
    pub edges: Vec<SegmentId>,
    pub is_entry: bool,
    pub is_key_building: bool,
    /// Surviving node when this one was merged away
    pub merged_into: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreetSegment {
    pub id: SegmentId,
    pub from: NodeId,
    pub to: NodeId,
    pub street_type: StreetType,
    pub width: f32,
    /// Polyline from `from` to `to`, endpoints included
    pub points: Vec<Vec2>,
    pub length: f32,
    pub origin: SegmentOrigin,
    pub removed: bool,
}

impl StreetSegment {
    pub fn is_infill(&self) -> bool {
        self.origin == SegmentOrigin::Infill
    }

    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.from == node {
            self.to
        } else {
            self.from
        }
    }

    pub fn chord(&self) -> (Vec2, Vec2) {
        let a = self.points.first().copied().unwrap_or(Vec2::ZERO);
        let b = self.points.last().copied().unwrap_or(a);
        (a, b)
    }
}

// =============================================================================
// BLOCKS AND LOTS
// =============================================================================

/// A face of the planar street graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: BlockId,
    /// CCW outline
    pub boundary: Vec<Vec2>,
    /// Street segments running along the outline
    pub segments: Vec<SegmentId>,
    pub area: f32,
    pub perimeter: f32,
    pub is_exterior: bool,
    pub needs_manual_review: bool,
}

impl Block {
    pub fn new(id: BlockId, mut boundary: Vec<Vec2>) -> Self {
        geometry::ensure_ccw(&mut boundary);
        let area = geometry::polygon_area(&boundary);
        let perimeter = geometry::perimeter(&boundary);
        Self {
            id,
            boundary,
            segments: Vec::new(),
            area,
            perimeter,
            is_exterior: false,
            needs_manual_review: false,
        }
    }

    pub fn centroid(&self) -> Vec2 {
        geometry::centroid(&self.boundary)
    }
}

/// A building plot facing one street.
#[derive(Clone, Debug, PartialEq)]
pub struct Lot {
    pub id: LotId,
    pub block: BlockId,
    /// CCW outline: front-left, front-right, rear-right, rear-left
    pub boundary: Vec<Vec2>,
    /// The piece of block edge the lot fronts onto
    pub frontage: (Vec2, Vec2),
    pub frontage_width: f32,
    pub depth: f32,
    pub is_corner: bool,
    pub street: SegmentId,
}
