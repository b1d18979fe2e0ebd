//! Attractor set construction
//!
//! Turns key buildings, secondary entries and boundary samples into the
//! weighted growth targets the skeleton grower chases. Also provides the
//! default key building layout for settlements that arrive without one.

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::geometry;
use crate::streets::config::AttractorConfig;
use crate::streets::types::{
    Attractor, AttractorKind, EntryPoint, KeyBuilding, KeyBuildingKind, Settlement, SettlementType,
};
use crate::terrain::TerrainQuery;

/// Entry points ordered by road importance, most important first. Equal
/// classes keep their input order.
pub fn sort_entries(entries: &[EntryPoint]) -> Vec<EntryPoint> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| b.road_class.cmp(&a.road_class));
    sorted
}

/// Build the attractor list for one settlement.
///
/// `entries` must already be sorted; the first one seeds growth and every
/// other entry becomes an external attractor. Order of the result: key
/// buildings, external entries, boundary samples, frontage grid.
pub fn build_attractors(
    settlement: &Settlement,
    boundary: &[Vec2],
    entries: &[EntryPoint],
    key_buildings: &[KeyBuilding],
    config: &AttractorConfig,
) -> Vec<Attractor> {
    let mut attractors = Vec::new();

    for (i, building) in key_buildings.iter().enumerate() {
        let mut attractor = Attractor::new(building.position, building.weight, AttractorKind::KeyBuilding);
        attractor.key_building = Some(i);
        attractors.push(attractor);
    }

    for entry in entries.iter().skip(1) {
        let weight = config.external_weight_per_class * (entry.road_class as u8 + 1) as f32;
        attractors.push(Attractor::new(entry.position, weight, AttractorKind::External));
    }

    // Evenly spaced along the outline, pulled toward the center
    let perimeter = geometry::perimeter(boundary);
    if config.boundary_count > 0 && perimeter > 0.0 {
        for k in 0..config.boundary_count {
            let s = perimeter * k as f32 / config.boundary_count as f32;
            let on_outline = geometry::point_along_outline(boundary, s);
            let position = settlement.center + (on_outline - settlement.center) * config.boundary_inset;
            attractors.push(Attractor::new(position, config.boundary_weight, AttractorKind::Boundary));
        }
    }

    if config.frontage_spacing > 0.0 {
        let spacing = config.frontage_spacing;
        let reach = boundary
            .iter()
            .map(|p| p.distance(settlement.center))
            .fold(0.0f32, f32::max);
        let steps = (reach / spacing).ceil() as i32;
        for iy in -steps..=steps {
            for ix in -steps..=steps {
                let position = settlement.center + Vec2::new(ix as f32, iy as f32) * spacing;
                if !geometry::point_in_polygon(position, boundary)
                    || geometry::distance_to_polygon(position, boundary) < spacing * 0.5
                {
                    continue;
                }
                let crowded = attractors
                    .iter()
                    .any(|a| a.position.distance(position) < spacing * 0.5);
                if !crowded {
                    attractors.push(Attractor::new(position, config.frontage_weight, AttractorKind::LotFrontage));
                }
            }
        }
    }

    tracing::debug!(
        target: "settlement_streets::attractors",
        settlement = settlement.id,
        total = attractors.len(),
        key_buildings = key_buildings.len(),
        external = entries.len().saturating_sub(1),
        "attractors.built"
    );

    attractors
}

/// Default key buildings for a settlement type.
///
/// Church on the highest ground near the center, market and inn along the
/// primary entry axis, a jittered well, and a green beside the church for
/// villages. Each placement keeps clear of earlier buildings and stays
/// inside the boundary.
pub fn place_key_buildings(
    settlement: &Settlement,
    boundary: &[Vec2],
    primary: &EntryPoint,
    terrain: &dyn TerrainQuery,
    rng: &mut ChaCha8Rng,
) -> Vec<KeyBuilding> {
    let center = settlement.center;
    let radius = settlement.radius;
    let inward = primary.direction.normalize_or_zero();
    let mut buildings: Vec<KeyBuilding> = Vec::new();

    let church_pos = find_high_point(center, radius * 0.3, terrain);
    let church_pos = keep_inside(church_pos, center, boundary);
    buildings.push(KeyBuilding::new(KeyBuildingKind::Church, church_pos, 15.0, 1.0));

    if matches!(settlement.settlement_type, SettlementType::Town | SettlementType::Village) {
        let pos = primary.position + inward * (radius * 0.4);
        let pos = keep_inside(avoid_collision(pos, &buildings, 25.0), center, boundary);
        buildings.push(KeyBuilding::new(KeyBuildingKind::Market, pos, 20.0, 0.9));
    }

    if settlement.settlement_type != SettlementType::Hamlet {
        let pos = primary.position + inward * 30.0;
        let pos = keep_inside(avoid_collision(pos, &buildings, 15.0), center, boundary);
        buildings.push(KeyBuilding::new(KeyBuildingKind::Inn, pos, 10.0, 0.7));
    }

    let jitter = Vec2::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0));
    let pos = keep_inside(avoid_collision(center + jitter, &buildings, 10.0), center, boundary);
    buildings.push(KeyBuilding::new(KeyBuildingKind::Well, pos, 5.0, 0.5));

    if settlement.settlement_type == SettlementType::Village {
        let pos = church_pos + Vec2::new(25.0, 0.0);
        let pos = keep_inside(avoid_collision(pos, &buildings, 20.0), center, boundary);
        buildings.push(KeyBuilding::new(KeyBuildingKind::Green, pos, 25.0, 0.5));
    }

    tracing::debug!(
        target: "settlement_streets::attractors",
        settlement = settlement.id,
        settlement_type = settlement.settlement_type.display_name(),
        count = buildings.len(),
        "attractors.key_buildings_placed"
    );

    buildings
}

/// Highest sample on 16 rays at 4 radii (plus the center) within
/// `search_radius`.
fn find_high_point(center: Vec2, search_radius: f32, terrain: &dyn TerrainQuery) -> Vec2 {
    let mut best = center;
    let mut best_height = terrain.height(center);
    for i in 0..16 {
        let angle = std::f32::consts::TAU * i as f32 / 16.0;
        let dir = Vec2::new(angle.cos(), angle.sin());
        for step in 1..=4 {
            let pos = center + dir * (search_radius * step as f32 / 4.0);
            let h = terrain.height(pos);
            if h > best_height {
                best_height = h;
                best = pos;
            }
        }
    }
    best
}

/// Push `pos` away from the first building it crowds, up to 10 times.
fn avoid_collision(mut pos: Vec2, existing: &[KeyBuilding], clearance: f32) -> Vec2 {
    for _ in 0..10 {
        let Some(hit) = existing
            .iter()
            .find(|b| pos.distance(b.position) < clearance + b.radius)
        else {
            break;
        };
        let away = (pos - hit.position).try_normalize().unwrap_or(Vec2::X);
        pos += away * 5.0;
    }
    pos
}

/// Pull `pos` toward the center until it lies inside the boundary.
fn keep_inside(mut pos: Vec2, center: Vec2, boundary: &[Vec2]) -> Vec2 {
    for _ in 0..20 {
        if geometry::point_in_polygon(pos, boundary) {
            return pos;
        }
        pos = center + (pos - center) * 0.85;
    }
    center
}
