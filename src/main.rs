use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hearthgrid::{
    scenario::{ScenarioLoader, Theme},
    Orientation, SharedSettlement, Snapshot, TilePos,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Grid settlement simulation runner")]
struct Cli {
    /// Built-in theme to play
    #[arg(long, default_value = "kingdom")]
    theme: String,

    /// Load the theme from a YAML file instead of the built-ins
    #[arg(long)]
    theme_file: Option<PathBuf>,

    #[arg(long, default_value = "Player")]
    player: String,

    #[arg(long, default_value = "Hearth")]
    settlement: String,

    /// Override the theme's terrain seed
    #[arg(long)]
    seed: Option<u64>,

    /// Turns to advance (turn-based themes)
    #[arg(long, default_value_t = 10)]
    ticks: u64,

    /// Seconds of passive accrual (timer-driven themes)
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Placement issued before time advances, as kind@x,z[:orientation]
    #[arg(long = "place")]
    placements: Vec<PlaceArg>,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone)]
struct PlaceArg {
    kind: String,
    origin: TilePos,
    orientation: Orientation,
}

impl FromStr for PlaceArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = value
            .split_once('@')
            .ok_or_else(|| format!("expected kind@x,z, got '{value}'"))?;
        let (coords, orientation) = match rest.split_once(':') {
            Some((coords, orientation)) => (coords, orientation.parse()?),
            None => (rest, Orientation::North),
        };
        let (x, z) = coords
            .split_once(',')
            .ok_or_else(|| format!("expected x,z coordinates, got '{coords}'"))?;
        let parse = |raw: &str| {
            raw.trim()
                .parse::<i32>()
                .map_err(|err| format!("bad coordinate '{raw}': {err}"))
        };
        Ok(Self {
            kind: kind.trim().to_string(),
            origin: TilePos::new(parse(x)?, parse(z)?),
            orientation,
        })
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let theme = match &cli.theme_file {
        Some(path) => ScenarioLoader::new(".").load(path)?,
        None => Theme::builtin(&cli.theme)?,
    };
    let mut config = theme.config.clone();
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    let passive = config.tick.is_passive();

    let shared = SharedSettlement::initialize(&cli.player, &cli.settlement, theme.catalog.clone(), config)
        .with_context(|| format!("Failed to start a settlement with theme '{}'", theme.name))?;

    {
        let mut settlement = shared.lock();
        for place in &cli.placements {
            let kind = settlement
                .catalog()
                .building_kind(&place.kind)
                .map_err(|err| anyhow!("--place {}: {err}", place.kind))?;
            match settlement.request_placement(kind, place.origin, place.orientation) {
                Ok(id) => info!(structure = %id, kind = %place.kind, "scripted placement accepted"),
                Err(err) => warn!(kind = %place.kind, origin = %place.origin, %err, "scripted placement rejected"),
            }
        }
    }

    if passive {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli.seconds)) => {}
            _ = tokio::signal::ctrl_c() => info!("interrupted"),
        }
        shared.stop_accrual();
    } else {
        let mut settlement = shared.lock();
        for _ in 0..cli.ticks {
            settlement.advance_tick()?;
        }
    }
    let snapshot = shared.lock().snapshot();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&theme.name, &snapshot);
    }
    Ok(())
}

fn print_summary(theme: &str, snapshot: &Snapshot) {
    println!(
        "{} of {} ({theme}): tick {}, level {}, {} structures",
        snapshot.settlement_name,
        snapshot.player_name,
        snapshot.tick,
        snapshot.level,
        snapshot.structures.len()
    );
    for (resource, balance) in &snapshot.resources {
        println!("  {resource:<16} {balance}");
    }
}
