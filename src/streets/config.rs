//! Street generation parameters
//!
//! Every stage reads its own section of [`StreetGenConfig`]. All sections
//! deserialize with `#[serde(default)]`, so a JSON document only needs to name
//! the values it overrides.

use serde::{Deserialize, Serialize};

use super::diagnostics::StreetGenError;

/// Complete configuration for one street generation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreetGenConfig {
    pub attractors: AttractorConfig,
    pub skeleton: SkeletonConfig,
    pub refiner: RefinerConfig,
    pub blocks: BlockConfig,
    pub infill: InfillConfig,
    pub hierarchy: HierarchyConfig,
    pub lots: LotConfig,
}

/// Attractor set construction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttractorConfig {
    /// Evenly spaced perimeter attractors
    pub boundary_count: usize,
    /// Boundary attractors are pulled toward the center to this fraction
    /// of their distance (0.0-1.0)
    pub boundary_inset: f32,
    pub boundary_weight: f32,
    /// Grid spacing of interior lot-frontage attractors in meters (0 disables)
    pub frontage_spacing: f32,
    pub frontage_weight: f32,
    /// Weight of an external (secondary entry) attractor per road class step
    pub external_weight_per_class: f32,
    /// Sides of the polygon used when a settlement has no explicit outline
    pub circle_segments: usize,
}

impl Default for AttractorConfig {
    fn default() -> Self {
        Self {
            boundary_count: 8,
            boundary_inset: 0.7,
            boundary_weight: 0.3,
            frontage_spacing: 55.0,
            frontage_weight: 0.15,
            external_weight_per_class: 0.2,
            circle_segments: 24,
        }
    }
}

/// Space-colonization skeleton growth
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkeletonConfig {
    /// Step length of one growth iteration in meters
    pub segment_length: f32,
    /// Attractors within this distance of a new node count as reached
    pub kill_radius: f32,
    /// Attractors farther than this from a node do not pull on it
    pub influence_radius: f32,
    /// Cap on new segments per iteration
    pub max_branches_per_iteration: usize,
    /// Candidates folding back within this angle of their parent are
    /// rejected (degrees)
    pub min_branch_angle: f32,
    /// Maximum turn relative to the parent heading (degrees)
    pub max_branch_angle: f32,
    pub max_iterations: usize,
    /// Steeper steps are handed to the refiner
    pub max_slope: f32,
    /// Cost per unit slope in the refiner's cost raster
    pub slope_cost_multiplier: f32,
    /// Candidates closer than this to an existing node are rejected
    pub min_node_spacing: f32,
    /// Tolerance for candidates lying on the settlement outline
    pub boundary_tolerance: f32,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            segment_length: 20.0,
            kill_radius: 12.0,
            influence_radius: 250.0,
            max_branches_per_iteration: 4,
            min_branch_angle: 30.0,
            max_branch_angle: 45.0,
            max_iterations: 200,
            max_slope: 0.3,
            slope_cost_multiplier: 10.0,
            min_node_spacing: 5.0,
            boundary_tolerance: 0.5,
        }
    }
}

/// Terrain-aware local rerouting
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefinerConfig {
    /// Cost raster cell size in meters
    pub cell_size: f32,
    /// Padding around the endpoints' bounding box in meters
    pub search_margin: f32,
    /// Upper bound on raster cells per side
    pub max_cells_per_side: usize,
    /// Upper bound on settled cells before giving up
    pub max_expansions: usize,
    /// Added once per water cell entered
    pub water_penalty: f32,
    /// Slopes above this are impassable
    pub cliff_slope: f32,
    /// Douglas-Peucker tolerance for the returned polyline
    pub simplify_epsilon: f32,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            cell_size: 2.0,
            search_margin: 20.0,
            max_cells_per_side: 96,
            max_expansions: 20_000,
            water_penalty: 1000.0,
            cliff_slope: 1.0,
            simplify_epsilon: 1.0,
        }
    }
}

/// Planar face enumeration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockConfig {
    /// Vertices closer than this are the same planar vertex
    pub snap_tolerance: f32,
    /// Faces below this area are degenerate
    pub min_block_area: f32,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            snap_tolerance: 0.05,
            min_block_area: 1.0,
        }
    }
}

/// Block regularization (infill streets)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfillConfig {
    pub target_block_width: f32,
    pub target_block_depth: f32,
    pub max_perimeter: f32,
    pub max_area: f32,
    /// Split jitter as a fraction of `target_block_width`
    pub size_variation: f32,
    /// Nodes closer than this collapse after splitting
    pub merge_radius: f32,
    pub max_split_depth: u32,
    /// Split/re-trace rounds run by the pipeline
    pub max_passes: u32,
    /// Sub-blocks smaller than this abort a split
    pub min_sub_block_area: f32,
}

impl Default for InfillConfig {
    fn default() -> Self {
        Self {
            target_block_width: 40.0,
            target_block_depth: 30.0,
            max_perimeter: 320.0,
            max_area: 6000.0,
            size_variation: 0.2,
            merge_radius: 5.0,
            max_split_depth: 4,
            max_passes: 3,
            min_sub_block_area: 60.0,
        }
    }
}

/// Street hierarchy and widths
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HierarchyConfig {
    pub main_width: f32,
    pub secondary_width: f32,
    pub tertiary_width: f32,
    pub rear_access_width: f32,
    /// Skeleton segments within this many hops of the primary entry become
    /// secondary streets
    pub secondary_max_hops: u32,
    /// Rear access lanes are only added to graphs with at least this many
    /// segments
    pub rear_access_min_segments: usize,
    /// A block needs this many lot depths behind its frontage to get a lane
    pub rear_access_depth_factor: f32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            main_width: 8.0,
            secondary_width: 6.0,
            tertiary_width: 4.0,
            rear_access_width: 2.5,
            secondary_max_hops: 6,
            rear_access_min_segments: 40,
            rear_access_depth_factor: 2.5,
        }
    }
}

impl HierarchyConfig {
    pub fn width_for(&self, street_type: super::types::StreetType) -> f32 {
        use super::types::StreetType;
        match street_type {
            StreetType::Main => self.main_width,
            StreetType::Secondary => self.secondary_width,
            StreetType::Tertiary => self.tertiary_width,
            StreetType::RearAccess => self.rear_access_width,
        }
    }
}

/// Lot subdivision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LotConfig {
    pub min_frontage: f32,
    pub max_frontage: f32,
    /// Width multiplier for the first and last lot on a frontage
    pub corner_bonus: f32,
    pub target_depth: f32,
    pub min_depth: f32,
    /// Whether rear access lanes count as frontage
    pub frontage_on_rear_access: bool,
}

impl Default for LotConfig {
    fn default() -> Self {
        Self {
            min_frontage: 6.0,
            max_frontage: 15.0,
            corner_bonus: 1.25,
            target_depth: 25.0,
            min_depth: 8.0,
            frontage_on_rear_access: false,
        }
    }
}

fn require(condition: bool, message: &str) -> Result<(), StreetGenError> {
    if condition {
        Ok(())
    } else {
        Err(StreetGenError::InvalidConfig(message.to_string()))
    }
}

fn positive(value: f32, name: &str) -> Result<(), StreetGenError> {
    require(value.is_finite() && value > 0.0, &format!("{} must be positive", name))
}

impl StreetGenConfig {
    /// Reject configurations no stage can honor. Runs before growth.
    pub fn validate(&self) -> Result<(), StreetGenError> {
        let a = &self.attractors;
        require(
            (0.0..=1.0).contains(&a.boundary_inset),
            "attractors.boundaryInset must be within 0..=1",
        )?;
        require(a.frontage_spacing >= 0.0, "attractors.frontageSpacing must not be negative")?;
        require(a.circle_segments >= 3, "attractors.circleSegments must be at least 3")?;

        let s = &self.skeleton;
        positive(s.segment_length, "skeleton.segmentLength")?;
        positive(s.kill_radius, "skeleton.killRadius")?;
        positive(s.influence_radius, "skeleton.influenceRadius")?;
        positive(s.max_slope, "skeleton.maxSlope")?;
        require(s.max_branches_per_iteration > 0, "skeleton.maxBranchesPerIteration must be positive")?;
        require(
            s.min_branch_angle >= 0.0 && s.min_branch_angle < 180.0,
            "skeleton.minBranchAngle must be within 0..180",
        )?;
        require(
            s.max_branch_angle > 0.0 && s.max_branch_angle <= 180.0,
            "skeleton.maxBranchAngle must be within 0..=180",
        )?;
        require(
            s.min_branch_angle < s.max_branch_angle,
            "skeleton.minBranchAngle must be below skeleton.maxBranchAngle",
        )?;
        require(
            s.slope_cost_multiplier >= 0.0,
            "skeleton.slopeCostMultiplier must not be negative",
        )?;

        let r = &self.refiner;
        positive(r.cell_size, "refiner.cellSize")?;
        positive(r.cliff_slope, "refiner.cliffSlope")?;
        require(r.max_cells_per_side >= 4, "refiner.maxCellsPerSide must be at least 4")?;

        positive(self.blocks.snap_tolerance, "blocks.snapTolerance")?;

        let i = &self.infill;
        positive(i.target_block_width, "infill.targetBlockWidth")?;
        positive(i.target_block_depth, "infill.targetBlockDepth")?;
        positive(i.max_perimeter, "infill.maxPerimeter")?;
        positive(i.max_area, "infill.maxArea")?;
        require(i.size_variation >= 0.0, "infill.sizeVariation must not be negative")?;
        require(i.merge_radius >= 0.0, "infill.mergeRadius must not be negative")?;

        let h = &self.hierarchy;
        positive(h.rear_access_width, "hierarchy.rearAccessWidth")?;
        require(
            h.main_width > h.secondary_width
                && h.secondary_width > h.tertiary_width
                && h.tertiary_width > h.rear_access_width,
            "hierarchy widths must be strictly decreasing from main to rear access",
        )?;

        let l = &self.lots;
        positive(l.min_frontage, "lots.minFrontage")?;
        positive(l.min_depth, "lots.minDepth")?;
        require(l.max_frontage >= l.min_frontage, "lots.maxFrontage must be >= lots.minFrontage")?;
        require(l.corner_bonus >= 1.0, "lots.cornerBonus must be at least 1")?;
        require(
            l.max_frontage * l.corner_bonus >= 2.0 * l.min_frontage,
            "lots.maxFrontage * lots.cornerBonus must be at least twice lots.minFrontage",
        )?;
        require(l.target_depth >= l.min_depth, "lots.targetDepth must be >= lots.minDepth")?;

        Ok(())
    }
}
