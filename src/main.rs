//! # geonav CLI
//!
//! Routes between two coordinates over a road network graph stored as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use geonav::{LazyAStar, MemoryNodeStore, SearchConfig};

/// Command-line interface for geonav
#[derive(Parser)]
#[command(name = "geonav")]
#[command(about = "Shortest route over a lazily loaded road network")]
#[command(long_about = "Finds a route between two coordinates, each snapped to its nearest node:
  geonav --graph skane.json --from 55.603765,13.004886 --to 55.596479,13.037026
  geonav --graph skane.json --from 55.60,13.00 --to 55.59,13.03 --config search.toml --json")]
struct Cli {
    /// Graph file: {\"nodes\": [{\"id\", \"lat\", \"lon\", \"neighbors\"}]}
    #[arg(long)]
    graph: PathBuf,

    /// Start coordinate as LAT,LON
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    from: (f64, f64),

    /// Destination coordinate as LAT,LON
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    to: (f64, f64),

    /// Search configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the route as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_coordinate(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{s}'"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude '{lat}': {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude '{lon}': {e}"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("coordinate out of range: {lat},{lon}"));
    }
    Ok((lat, lon))
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .init();

    let config = match &cli.config {
        Some(path) => SearchConfig::from_file(path)?,
        None => SearchConfig::default(),
    };

    let store = MemoryNodeStore::from_json_file(&cli.graph)
        .with_context(|| format!("loading graph {}", cli.graph.display()))?;
    log::info!("loaded {} nodes from {}", store.len(), cli.graph.display());

    let planner = LazyAStar::new(Arc::new(store), config)?;
    let (from_lat, from_lon) = cli.from;
    let (to_lat, to_lon) = cli.to;
    let route = planner.route(from_lat, from_lon, to_lat, to_lon).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&route)?);
    } else if route.is_found() {
        println!("cost: {:.3}", route.cost);
        for node in &route.path {
            println!("{}\t{:.6}\t{:.6}", node.id, node.lat, node.lon);
        }
    } else {
        println!("no route found");
    }

    Ok(())
}
