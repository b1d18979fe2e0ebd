use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use glam::Vec2;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use settlement_streets::export;
use settlement_streets::seeds::SettlementSeeds;
use settlement_streets::streets::types::{EntryPoint, RoadClass, Settlement, SettlementType};
use settlement_streets::streets::{generate_batch, SettlementJob, StreetGenConfig};
use settlement_streets::terrain::{FlatTerrain, NoiseTerrainParams, TerrainQuery, TerrainRaster};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TerrainSource {
    /// Level ground everywhere
    Flat,
    /// Synthetic fBm noise raster around the settlements
    Noise,
}

#[derive(Parser, Debug)]
#[command(name = "settlement_streets")]
#[command(about = "Generate settlement street networks, blocks and building lots")]
struct Args {
    /// Input JSON with `settlements` (and optional `config`); a demo village
    /// is generated when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the layout files
    #[arg(short, long, default_value = "streets_out")]
    output: PathBuf,

    /// Configuration JSON overriding the input document's `config`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only generate the settlement with this id
    #[arg(long)]
    settlement: Option<u32>,

    /// Override every settlement's seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Terrain provider
    #[arg(long, value_enum, default_value_t = TerrainSource::Flat)]
    terrain: TerrainSource,

    /// Also write a GeoJSON FeatureCollection per settlement
    #[arg(long)]
    geojson: bool,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("no settlement with id {0} in the input")]
    UnknownSettlement(u32),
    #[error("could not build a terrain raster around the settlements")]
    Terrain,
    #[error("{0} of {1} settlements failed")]
    Failed(usize, usize),
}

/// Batch input document.
#[derive(Debug, Deserialize)]
struct InputDocument {
    settlements: Vec<SettlementJob>,
    #[serde(default)]
    config: StreetGenConfig,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "settlement_streets::cli", "{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn run(args: &Args) -> Result<(), CliError> {
    let mut document = match &args.input {
        Some(path) => read_json::<InputDocument>(path)?,
        None => demo_document(),
    };
    if let Some(path) = &args.config {
        document.config = read_json(path)?;
    }

    let mut jobs = document.settlements;
    if let Some(id) = args.settlement {
        jobs.retain(|job| job.settlement.id == id);
        if jobs.is_empty() {
            return Err(CliError::UnknownSettlement(id));
        }
    }
    if let Some(seed) = args.seed {
        for job in jobs.iter_mut() {
            job.settlement.seed = seed;
        }
    }

    println!("Generating streets for {} settlement(s)", jobs.len());

    let terrain: Box<dyn TerrainQuery> = match args.terrain {
        TerrainSource::Flat => Box::new(FlatTerrain::default()),
        TerrainSource::Noise => Box::new(noise_terrain(&jobs)?),
    };

    let results = generate_batch(&jobs, terrain.as_ref(), &document.config);

    fs::create_dir_all(&args.output).map_err(|source| CliError::Write {
        path: args.output.clone(),
        source,
    })?;

    let mut failed = 0;
    for result in &results {
        match result {
            Ok(layout) => {
                let path = args.output.join(format!("settlement_{}.json", layout.settlement));
                export::export_layout_json(layout, &path).map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?;
                if args.geojson {
                    let geo_path = args.output.join(format!("settlement_{}.geojson", layout.settlement));
                    export::export_geojson(layout, &geo_path).map_err(|source| CliError::Write {
                        path: geo_path.clone(),
                        source,
                    })?;
                }
                println!(
                    "  Settlement {}: {} nodes, {} streets ({:.0} m), {} blocks, {} lots, {} diagnostics -> {}",
                    layout.settlement,
                    layout.stats.nodes,
                    layout.stats.segments,
                    layout.stats.total_street_length,
                    layout.stats.blocks,
                    layout.stats.lots,
                    layout.diagnostics.len(),
                    path.display()
                );
            }
            Err(failure) => {
                failed += 1;
                let path = args.output.join(format!("settlement_{}.failed.json", failure.settlement));
                export::export_failure_json(failure, &path).map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?;
                println!("  Settlement {}: FAILED ({})", failure.settlement, failure.error);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Failed(failed, results.len()));
    }
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Noise raster covering every settlement with a margin, seeded from the
/// first settlement.
fn noise_terrain(jobs: &[SettlementJob]) -> Result<TerrainRaster, CliError> {
    let mut lo = Vec2::splat(f32::MAX);
    let mut hi = Vec2::splat(f32::MIN);
    for job in jobs {
        let r = Vec2::splat(job.settlement.radius * 1.5);
        lo = lo.min(job.settlement.center - r);
        hi = hi.max(job.settlement.center + r);
    }
    let Some(first) = jobs.first() else {
        return Err(CliError::Terrain);
    };

    let defaults = NoiseTerrainParams::default();
    let size = hi - lo;
    let params = NoiseTerrainParams {
        origin: lo,
        width: (size.x / defaults.cell_size).ceil().max(1.0) as usize,
        height: (size.y / defaults.cell_size).ceil().max(1.0) as usize,
        ..defaults
    };
    let seeds = SettlementSeeds::from_master(first.settlement.seed);
    tracing::info!(
        target: "settlement_streets::cli",
        width = params.width,
        height = params.height,
        seed = seeds.terrain,
        "terrain.noise"
    );
    TerrainRaster::from_noise(&params, seeds.terrain).ok_or(CliError::Terrain)
}

/// A village with two entry roads and default key buildings.
fn demo_document() -> InputDocument {
    let settlement = Settlement::new(1, Vec2::ZERO, 150.0, 42).with_type(SettlementType::Village);
    let entries = vec![
        EntryPoint::new(Vec2::new(150.0, 0.0), Vec2::new(-1.0, 0.0), RoadClass::Road),
        EntryPoint::new(Vec2::new(-40.0, -145.0), Vec2::new(0.3, 1.0), RoadClass::Track),
    ];
    InputDocument {
        settlements: vec![SettlementJob {
            settlement,
            entries,
            key_buildings: None,
        }],
        config: StreetGenConfig::default(),
    }
}
