//! Settlement street network generation library
//!
//! Re-exports modules for use by binaries and tools.

pub mod export;
pub mod geometry;
pub mod seeds;
pub mod streets;
pub mod terrain;
pub mod tilemap;

pub use seeds::SettlementSeeds;
pub use streets::{
    generate_batch, generate_streets, generate_streets_with_seeds, GenerationFailure, SettlementJob,
    StreetGenConfig, StreetLayout,
};
pub use terrain::{FlatTerrain, TerrainQuery, TerrainRaster};
