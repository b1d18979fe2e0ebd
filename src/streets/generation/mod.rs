//! Street generation stages
//!
//! Each stage is a free function over the shared
//! [`StreetNetwork`](crate::streets::network::StreetNetwork); the pipeline
//! in [`crate::streets`] runs them in order.

pub mod attractors;
pub mod blocks;
pub mod hierarchy;
pub mod infill;
pub mod lots;
pub mod refine;
pub mod skeleton;
pub mod validate;

pub use attractors::{build_attractors, place_key_buildings, sort_entries};
pub use blocks::{attach_segments, edge_street_overlaps, identify_blocks, node_on_edge, BlockOutcome};
pub use hierarchy::{assign_hierarchy, HierarchyOutcome};
pub use infill::{is_oversized, regularize_blocks, InfillOutcome};
pub use lots::{frontage_widths, subdivide_lots, LotOutcome};
pub use refine::{refine_step, step_is_rough};
pub use skeleton::{grow_skeleton, SkeletonOutcome};
pub use validate::{lot_in_bounds, validate_layout};
