//! Debug tool for comparing street generation parameters
//! Generates one settlement under several settings and writes ASCII maps
//! side by side with summary numbers

use std::fs::File;
use std::io::{BufWriter, Write};

use glam::Vec2;
use settlement_streets::seeds::SettlementSeeds;
use settlement_streets::streets::types::{
    EntryPoint, KeyBuilding, KeyBuildingKind, RoadClass, Settlement, SettlementType, StreetType,
};
use settlement_streets::streets::{generate_streets_with_seeds, StreetGenConfig, StreetLayout};
use settlement_streets::terrain::{NoiseTerrainParams, TerrainRaster};
use settlement_streets::tilemap::Tilemap;

const SEED: u64 = 42;
const RADIUS: f32 = 160.0;
/// Meters per ASCII cell
const CELL: f32 = 5.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    println!("Generating street comparison...");

    let settlement = Settlement::new(1, Vec2::ZERO, RADIUS, SEED).with_type(SettlementType::Town);
    let entries = vec![
        EntryPoint::new(Vec2::new(RADIUS, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Highway),
        EntryPoint::new(Vec2::new(0.0, -RADIUS), Vec2::new(0.0, 1.0), RoadClass::Lane),
        EntryPoint::new(Vec2::new(-110.0, 110.0), Vec2::new(1.0, -1.0), RoadClass::Track),
    ];
    let buildings = vec![
        KeyBuilding::new(KeyBuildingKind::Church, Vec2::new(-10.0, 15.0), 15.0, 1.0),
        KeyBuilding::new(KeyBuildingKind::Market, Vec2::new(60.0, -10.0), 20.0, 0.9),
        KeyBuilding::new(KeyBuildingKind::Well, Vec2::new(-60.0, -50.0), 5.0, 0.5),
    ];

    let params = NoiseTerrainParams {
        origin: Vec2::splat(-RADIUS * 1.5),
        width: (RADIUS * 3.0 / 2.0) as usize,
        height: (RADIUS * 3.0 / 2.0) as usize,
        ..Default::default()
    };
    let Some(terrain) = TerrainRaster::from_noise(&params, SettlementSeeds::from_master(SEED).terrain) else {
        eprintln!("Failed to build terrain raster");
        return;
    };

    let variants: Vec<(&str, Box<dyn Fn(&mut StreetGenConfig, &mut SettlementSeeds)>)> = vec![
        ("1. Default Params", Box::new(|_c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {})),

        ("2. Short Steps", Box::new(|c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {
            c.skeleton.segment_length = 12.0;
            c.skeleton.kill_radius = 8.0;
        })),

        ("3. Wide Branching", Box::new(|c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {
            c.skeleton.max_branch_angle = 75.0;
            c.skeleton.max_branches_per_iteration = 8;
        })),

        ("4. No Frontage Attractors", Box::new(|c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {
            c.attractors.frontage_spacing = 0.0;
        })),

        ("5. Small Blocks", Box::new(|c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {
            c.infill.max_perimeter = 200.0;
            c.infill.max_area = 2500.0;
        })),

        ("6. Narrow Lots", Box::new(|c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {
            c.lots.min_frontage = 5.0;
            c.lots.max_frontage = 9.0;
        })),

        ("7. Other Lot Seed", Box::new(|_c: &mut StreetGenConfig, s: &mut SettlementSeeds| {
            *s = SettlementSeeds::builder(SEED).lots(SEED ^ 0xFFFF).build();
        })),

        ("8. Flat Slope Cost", Box::new(|c: &mut StreetGenConfig, _s: &mut SettlementSeeds| {
            c.skeleton.max_slope = 10.0;
            c.skeleton.slope_cost_multiplier = 0.0;
        })),
    ];

    let Ok(file) = File::create("streets_comparison.txt") else {
        eprintln!("Failed to create streets_comparison.txt");
        return;
    };
    let mut out = BufWriter::new(file);

    println!(
        "{:<28} {:>6} {:>6} {:>8} {:>6} {:>6} {:>6} {:>6}",
        "variant", "nodes", "segs", "length", "blocks", "review", "lots", "diags"
    );
    for (name, tweak) in &variants {
        let mut config = StreetGenConfig::default();
        let mut seeds = SettlementSeeds::from_master(SEED);
        tweak(&mut config, &mut seeds);

        match generate_streets_with_seeds(&settlement, &entries, Some(&buildings), &terrain, &config, &seeds) {
            Ok(layout) => {
                let s = &layout.stats;
                println!(
                    "{:<28} {:>6} {:>6} {:>8.0} {:>6} {:>6} {:>6} {:>6}",
                    name,
                    s.nodes,
                    s.segments,
                    s.total_street_length,
                    s.blocks,
                    s.blocks_needing_review,
                    s.lots,
                    layout.diagnostics.len()
                );
                let _ = writeln!(out, "== {} ==", name);
                let _ = write_ascii(&mut out, &layout);
                let _ = writeln!(out);
            }
            Err(failure) => println!("{:<28} FAILED: {}", name, failure.error),
        }
    }

    println!("Saved streets_comparison.txt");
}

/// Lots as '.', streets by level ('#' main, '=' secondary, '-' tertiary,
/// ':' rear access), entries as 'E'.
fn write_ascii(out: &mut impl Write, layout: &StreetLayout) -> std::io::Result<()> {
    let size = (RADIUS * 2.4 / CELL) as usize;
    let origin = Vec2::splat(-RADIUS * 1.2);
    let mut grid = Tilemap::new_with(size, size, ' ');

    let plot = |grid: &mut Tilemap<char>, p: Vec2, c: char| {
        let cell = (p - origin) / CELL;
        if grid.in_bounds(cell.x as i64, cell.y as i64) && cell.x >= 0.0 && cell.y >= 0.0 {
            // Rows run north to south
            grid.set(cell.x as usize, size - 1 - cell.y as usize, c);
        }
    };

    for lot in &layout.lots {
        let center = lot.boundary.iter().copied().sum::<Vec2>() / lot.boundary.len() as f32;
        plot(&mut grid, center, '.');
    }

    // Draw lower levels first so main streets stay visible at junctions
    for street_type in StreetType::all().iter().rev() {
        let c = street_char(*street_type);
        for seg in layout.network.segments().filter(|s| s.street_type == *street_type) {
            for w in seg.points.windows(2) {
                let steps = (w[0].distance(w[1]) / (CELL * 0.5)).ceil().max(1.0) as usize;
                for i in 0..=steps {
                    plot(&mut grid, w[0].lerp(w[1], i as f32 / steps as f32), c);
                }
            }
        }
    }

    for node in layout.network.nodes().filter(|n| n.is_entry) {
        plot(&mut grid, node.position, 'E');
    }

    let legend: Vec<String> = StreetType::all()
        .iter()
        .map(|t| format!("{} {}", street_char(*t), t.display_name()))
        .collect();
    writeln!(out, "{}, . lot, E entry", legend.join(", "))?;

    for y in 0..grid.height {
        let row: String = (0..grid.width).map(|x| *grid.get(x, y)).collect();
        writeln!(out, "{}", row.trim_end())?;
    }
    Ok(())
}

fn street_char(street_type: StreetType) -> char {
    match street_type {
        StreetType::Main => '#',
        StreetType::Secondary => '=',
        StreetType::Tertiary => '-',
        StreetType::RearAccess => ':',
    }
}
