//! Seed management for street generation
//!
//! Each randomized stage gets its own seed, derived from the settlement's
//! master seed by default. Overriding one stage (for example the lot widths)
//! leaves every other stage's output unchanged.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Seeds for the randomized street generation stages.
///
/// Skeleton growth and hierarchy assignment are order-driven and take no
/// seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementSeeds {
    /// Master seed (the settlement's own seed)
    pub master: u64,
    /// Default key building placement (well jitter)
    pub key_buildings: u64,
    /// Block regularizer split jitter
    pub infill: u64,
    /// Lot frontage widths
    pub lots: u64,
    /// Synthetic terrain raster noise
    pub terrain: u64,
}

impl SettlementSeeds {
    /// Create seeds from a master seed, deriving all sub-seeds deterministically.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            key_buildings: derive_seed(master, "key_buildings"),
            infill: derive_seed(master, "infill"),
            lots: derive_seed(master, "lots"),
            terrain: derive_seed(master, "terrain"),
        }
    }

    /// Create a builder for customizing individual seeds
    pub fn builder(master: u64) -> SettlementSeedsBuilder {
        SettlementSeedsBuilder::new(master)
    }
}

/// Builder for customizing individual seeds while deriving others from master
pub struct SettlementSeedsBuilder {
    seeds: SettlementSeeds,
}

impl SettlementSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: SettlementSeeds::from_master(master),
        }
    }

    pub fn key_buildings(mut self, seed: u64) -> Self {
        self.seeds.key_buildings = seed;
        self
    }

    pub fn infill(mut self, seed: u64) -> Self {
        self.seeds.infill = seed;
        self
    }

    pub fn lots(mut self, seed: u64) -> Self {
        self.seeds.lots = seed;
        self
    }

    pub fn terrain(mut self, seed: u64) -> Self {
        self.seeds.terrain = seed;
        self
    }

    pub fn build(self) -> SettlementSeeds {
        self.seeds
    }
}

/// Derive a sub-seed from a master seed and a stage name.
fn derive_seed(master: u64, stage: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    stage.hash(&mut hasher);
    hasher.finish()
}

impl std::fmt::Display for SettlementSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SettlementSeeds {{ master: {}, key_buildings: {}, infill: {}, lots: {}, terrain: {} }}",
            self.master, self.key_buildings, self.infill, self.lots, self.terrain,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        let seeds1 = SettlementSeeds::from_master(12345);
        let seeds2 = SettlementSeeds::from_master(12345);
        assert_eq!(seeds1, seeds2);
    }

    #[test]
    fn test_different_stages_get_different_seeds() {
        let seeds = SettlementSeeds::from_master(12345);

        assert_ne!(seeds.infill, seeds.lots);
        assert_ne!(seeds.lots, seeds.key_buildings);
        assert_ne!(seeds.key_buildings, seeds.terrain);
    }

    #[test]
    fn test_builder_override() {
        let seeds = SettlementSeeds::builder(12345).lots(99999).build();

        // Lots overridden, the rest still derived from master
        assert_eq!(seeds.lots, 99999);
        let default_seeds = SettlementSeeds::from_master(12345);
        assert_eq!(seeds.infill, default_seeds.infill);
        assert_eq!(seeds.terrain, default_seeds.terrain);
    }
}
