//! CLI binary for the national road map: executes line-oriented road and route
//! commands against an in-memory map.

mod parser;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roads_core::RoadMap;
use roads_core::config::MapConfig;
use roads_core::map::MapStats;
use serde::Serialize;
use session::{Session, Summary};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "roads", about = "National road map command interpreter")]
struct Cli {
    /// Project root directory holding `.roads/config.toml` (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Seed for the index priorities (overrides the configured seed)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute commands, printing route descriptions and `ERROR <line>` reports
    Run {
        /// Command file (reads standard input if not specified)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Execute commands silently, then print map statistics as JSON
    Stats {
        /// Command file (reads standard input if not specified)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct StatsReport {
    lines: usize,
    failed: usize,
    #[serde(flatten)]
    map: MapStats,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn load_config(cli: &Cli) -> Result<MapConfig> {
    let project_root = get_project_root(cli)?;
    let mut config = MapConfig::load(&project_root).with_context(|| {
        format!(
            "failed to load config from {}",
            project_root.join(".roads").display()
        )
    })?;
    if let Some(seed) = cli.seed {
        config.index.seed = seed;
    }
    Ok(config)
}

fn open_input(input: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Some(Commands::Stats { input }) => cmd_stats(&config, input.as_deref()),
        Some(Commands::Run { input }) => cmd_run(&config, input.as_deref()),
        None => cmd_run(&config, None),
    }
}

fn cmd_run(config: &MapConfig, input: Option<&Path>) -> Result<()> {
    let reader = open_input(input)?;
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut session = Session::new(
        RoadMap::with_config(config),
        BufWriter::new(stdout.lock()),
        stderr.lock(),
    );
    let Summary { lines, failed } = session.run(reader)?;
    tracing::info!(lines, failed, "input processed");
    Ok(())
}

fn cmd_stats(config: &MapConfig, input: Option<&Path>) -> Result<()> {
    let reader = open_input(input)?;
    let mut session = Session::new(RoadMap::with_config(config), io::sink(), io::sink());
    let Summary { lines, failed } = session.run(reader)?;

    let report = StatsReport {
        lines,
        failed,
        map: session.map().stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
