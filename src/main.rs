mod camera;
mod canvas;
mod config;
mod engine;
mod event;
mod feed;
mod geo;
mod help;
mod live;
mod logging;
mod map;
mod palette;
mod path;
mod queue;
mod regions;
mod settings;
mod stats;
mod sync;
mod terminal;
mod timestamp;

use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{LiveConfig, Overrides};
use feed::FeedError;
use geo::{lat_lon_to_xy, Resolution, ViewBox};
use logging::LogTarget;
use map::{MapAsset, MapError};
use settings::{Settings, SettingsError};
use stats::Aggregates;
use std::io;
use std::path::PathBuf;
use std::process;
use terminal::Terminal;
use thiserror::Error;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("no location known for {0}")]
    Unresolved(String),
}

#[derive(Parser)]
#[command(name = "threatmap")]
#[command(version)]
#[command(about = "Terminal world map of live honeypot attacks", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/threatmap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Default)]
struct FeedArgs {
    /// Base URL serving attacks.json and summary.json
    #[arg(long, conflicts_with = "dir")]
    url: Option<String>,

    /// Directory holding attacks.json and summary.json
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Synthetic attacks, no sensor needed
    #[arg(long, conflicts_with_all = ["url", "dir"])]
    demo: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Animated attack map with live feed and charts
    Live {
        #[command(flatten)]
        feed: FeedArgs,

        /// GeoJSON map asset (path or http(s) URL)
        #[arg(short, long)]
        map: Option<String>,

        /// Poll interval in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Seconds an attack waits before it is drawn on the map
        #[arg(short, long)]
        delay: Option<u64>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Fetch one snapshot and print aggregate statistics
    Stats {
        #[command(flatten)]
        feed: FeedArgs,
    },

    /// Resolve a place to map coordinates
    Locate {
        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        country: Option<String>,

        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,

        /// Project with this map's view box instead of 360×180
        #[arg(short, long)]
        map: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("threatmap: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let explicit = cli.config.is_some();
    let loaded = match Settings::load_from(&cli.config.clone().unwrap_or_else(Settings::config_path)) {
        Err(e) if explicit => return Err(e.into()),
        other => other,
    };

    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|s| s.log.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let target = match &cli.command {
        Commands::Live { .. } => LogTarget::File(
            loaded
                .as_ref()
                .ok()
                .and_then(|s| s.log.file.clone())
                .unwrap_or_else(logging::default_log_file),
        ),
        _ => LogTarget::Stderr,
    };
    let _guard = logging::init(&level, target)?;

    let settings = loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring settings file");
        Settings::default()
    });

    let result = dispatch(cli.command, &settings);
    if let Err(e) = &result {
        tracing::error!(error = %e, "exiting");
    }
    result
}

fn dispatch(command: Commands, settings: &Settings) -> Result<(), AppError> {
    match command {
        Commands::Live {
            feed,
            map,
            interval,
            delay,
            fps,
        } => {
            let overrides = Overrides {
                map,
                interval_ms: interval,
                delay_secs: delay,
                fps,
                ..feed_overrides(feed)
            };
            let config = LiveConfig::resolve(settings, &overrides);
            tracing::info!(feed = ?config.feed, map = %config.map, "starting live view");
            let mut term = Terminal::new(true)?;
            term.clear_screen()?;
            live::run(&mut term, &config)?;
        }
        Commands::Stats { feed } => {
            let config = LiveConfig::resolve(settings, &feed_overrides(feed));
            print_stats(&config)?;
        }
        Commands::Locate {
            city,
            country,
            lat,
            lon,
            map,
        } => {
            let view_box = match map {
                Some(path) => MapAsset::load(&path)?.view_box(),
                None => ViewBox::default(),
            };
            let place = [city.as_deref(), country.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
            let (lat, lon, resolution) = match (lat, lon) {
                (Some(lat), Some(lon)) => (lat, lon, Resolution::Explicit),
                _ => geo::lookup(city.as_deref(), country.as_deref())
                    .ok_or_else(|| AppError::Unresolved(place.clone()))?,
            };
            let point = lat_lon_to_xy(lat, lon, view_box);
            println!(
                "{} ({:.4}, {:.4}) -> x={:.2} y={:.2} [{:?}, view box {}×{}]",
                if place.is_empty() { "point" } else { place.as_str() },
                lat,
                lon,
                point.x,
                point.y,
                resolution,
                view_box.width,
                view_box.height
            );
        }
    }

    Ok(())
}

fn feed_overrides(feed: FeedArgs) -> Overrides {
    Overrides {
        url: feed.url,
        dir: feed.dir,
        demo: feed.demo,
        ..Overrides::default()
    }
}

/// One synchronous fetch. Events are required, the summary is best effort.
fn print_stats(config: &LiveConfig) -> Result<(), AppError> {
    let feed = config.feed.open();
    tracing::info!(source = %feed.describe(), "fetching snapshot");
    let events = feed.fetch_events()?;
    let summary = match feed.fetch_summary() {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::warn!(error = %e, "summary unavailable, deriving statistics locally");
            None
        }
    };
    let aggregates = Aggregates::compute(&events, summary.as_ref(), Utc::now());
    print!("{}", aggregates.report());
    Ok(())
}
