use std::path::PathBuf;

use clap::Parser;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use cave_tunnels::export;
use cave_tunnels::mask::{generate_rock_mask, MaskParams};
use cave_tunnels::{CaveError, CaveGenerator, CaveNetwork, CaveParams, MapSide, SidePassability, Tilemap};

#[derive(Parser, Debug)]
#[command(name = "cave_tunnels")]
#[command(about = "Carve procedural cave tunnels through a noise-generated rock map")]
struct Args {
    /// Width of the map in cells
    #[arg(short = 'W', long, default_value = "250")]
    width: usize,

    /// Height of the map in cells
    #[arg(short = 'H', long, default_value = "250")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON file overriding cave parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Rock threshold for the synthetic mask (-1.0 to 1.0, lower = more rock)
    #[arg(long, default_value = "-0.05")]
    rock_threshold: f64,

    /// Keep an open ring of this many cells around the map
    #[arg(long, default_value = "0")]
    open_border: usize,

    /// Also compute depth and offset grids
    #[arg(long)]
    depth: bool,

    /// Comma-separated sides whose neighboring region is passable (e.g. "north,east")
    #[arg(long)]
    passable: Option<String>,

    /// Output PNG for the caves grid
    #[arg(short, long, default_value = "caves.png")]
    output: String,

    /// Write the generation report as JSON
    #[arg(long)]
    report: Option<String>,

    /// Generate this many maps in parallel (seeds seed, seed+1, ...)
    #[arg(long, default_value = "1")]
    batch: usize,
}

fn main() {
    let args = Args::parse();
    init_logging();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), CaveError> {
    let mut params = match &args.params {
        Some(path) => CaveParams::from_json_file(path)?,
        None => CaveParams::default(),
    };
    if args.depth {
        params.compute_depth_offset = true;
    }
    params.validate()?;

    let boundary = match &args.passable {
        Some(list) => Some(parse_sides(list)?),
        None => None,
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mask_params = MaskParams {
        threshold: args.rock_threshold,
        open_border: args.open_border,
        ..Default::default()
    };

    println!("Generating caves with seed: {}", seed);
    println!("Map size: {}x{}", args.width, args.height);

    let batch = args.batch.max(1);
    let results: Vec<(u64, Tilemap<bool>, CaveNetwork)> = (0..batch as u64)
        .into_par_iter()
        .map(|i| -> Result<_, CaveError> {
            let map_seed = seed.wrapping_add(i);
            let mask = generate_rock_mask(args.width, args.height, map_seed as u32, &mask_params);
            // Each map owns its generator and scratch buffers
            let mut generator = CaveGenerator::new(params.clone())?;
            let network = generator.generate(
                &mask,
                map_seed,
                boundary.as_ref().map(|b| b as &dyn cave_tunnels::BoundaryContext),
            );
            Ok((map_seed, mask, network))
        })
        .collect::<Result<_, _>>()?;

    for (index, (map_seed, mask, network)) in results.iter().enumerate() {
        let report = &network.report;
        let rock = mask.count_true();
        println!(
            "Map {} (seed {}): {} rock cells ({:.1}%), {} carved",
            index,
            map_seed,
            rock,
            100.0 * rock as f64 / (args.width * args.height).max(1) as f64,
            network.grids.carved_count()
        );
        println!(
            "  Attempts: {} (accepted #{}{}), edge-walkable cells: {} of {} required",
            report.attempts,
            report.accepted_attempt + 1,
            if report.forced { ", forced" } else { "" },
            report.edge_walkable,
            report.required_edge_walkable
        );
        for side in MapSide::ALL {
            println!("    {:>5}: {}", side.display_name(), report.edges.side(side));
        }

        let output = indexed_path(&args.output, index, batch);
        export::export_caves(mask, &network.grids, &output)?;
        println!("  Saved caves map: {}", output);

        if network.grids.depth.is_some() {
            let depth_path = indexed_path(&args.output.replace(".png", "_depth.png"), index, batch);
            if export::export_depth_offset(&network.grids, &depth_path)? {
                println!("  Saved depth/offset map: {}", depth_path);
            }
        }

        if let Some(report_path) = &args.report {
            let report_path = indexed_path(report_path, index, batch);
            export::write_report(report, &report_path)?;
            println!("  Saved report: {}", report_path);
        }
    }

    Ok(())
}

/// Library diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
/// The summary stays on stdout.
fn init_logging() {
    install_logger(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));
}

/// Installs the global subscriber; `log` records from the library are
/// forwarded to it.
fn install_logger(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_sides(list: &str) -> Result<SidePassability, CaveError> {
    let mut sides = Vec::new();
    for name in list.split(',').filter(|s| !s.trim().is_empty()) {
        match MapSide::parse(name) {
            Some(side) => sides.push(side),
            None => {
                return Err(CaveError::InvalidParams(format!("unknown map side '{}'", name.trim())))
            }
        }
    }
    Ok(SidePassability::from_sides(&sides))
}

/// `caves.png` stays as is for a single map and becomes `caves_2.png` in a batch.
fn indexed_path(path: &str, index: usize, batch: usize) -> String {
    if batch <= 1 {
        return path.to_string();
    }
    match path.rfind('.') {
        Some(dot) => format!("{}_{}{}", &path[..dot], index, &path[dot..]),
        None => format!("{}_{}", path, index),
    }
}
