use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::catalog::{CatalogSearch, SpotifyClient};
use crate::config;
use crate::domain::track::TrackRecord;
use crate::http::{auth::RevealAuth, server::HttpServer};
use crate::reveal::{executor, poller::RevealPoller};
use crate::storage::operations::{Storage, TimelineFilter};
use crate::throwback;

#[derive(Parser)]
#[command(name = "sundaydeck")]
#[command(version = "0.1")]
#[command(about = "Shared weekly song timeline with a Sunday reveal")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server together with the weekly reveal poller
    Serve,
    /// Reveal all hidden songs now
    Reveal,
    /// Show time left until the next reveal
    Countdown,
    /// Pick a song from an earlier month
    Throwback,
    /// List the timeline, newest first
    List {
        /// Include songs still waiting for the reveal
        #[arg(short, long)]
        include_unrevealed: bool,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let cfg = config::Config::load(&cli.config)?;
    let schedule = cfg.reveal.schedule()?;

    match &cli.command {
        Commands::Serve => {
            let storage = Arc::new(Mutex::new(
                Storage::new(&cfg.database).context("Failed to initialize storage")?,
            ));

            RevealPoller::new(Arc::clone(&storage), schedule, cfg.reveal.poll_interval()?).spawn();

            let mut http_server = HttpServer::new(storage, cfg.http)
                .with_schedule(schedule)
                .with_auth(RevealAuth::from_config(&cfg.reveal));

            match cfg.catalog {
                Some(catalog) => {
                    let client: Arc<dyn CatalogSearch> = Arc::new(SpotifyClient::new(catalog)?);
                    http_server = http_server.with_catalog(client);
                }
                None => warn!("No catalog credentials configured, song search is disabled"),
            }

            info!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::Reveal => {
            let mut storage = Storage::new(&cfg.database)?;
            let outcome = executor::reveal(&mut storage, Utc::now())?;

            if outcome.is_empty() {
                println!("No unrevealed songs found");
            } else {
                println!("Revealed {} songs:", outcome.revealed_count);
                for id in &outcome.revealed_ids {
                    println!("    - {id}");
                }
            }
        }

        Commands::Countdown => {
            let mut storage = Storage::new(&cfg.database)?;
            let now = Utc::now();
            let countdown = schedule.countdown(now);

            println!("Next reveal at {}", schedule.next_reveal_instant(now));
            println!(
                "  {}d {}h {}m {}s left, {} songs waiting",
                countdown.days,
                countdown.hours,
                countdown.minutes,
                countdown.seconds,
                storage.count_hidden()?
            );
            if let Some(last) = storage.last_reveal()? {
                println!(
                    "Last reveal at {} showed {} songs",
                    last.revealed_at, last.revealed_count
                );
            }
        }

        Commands::Throwback => {
            let mut storage = Storage::new(&cfg.database)?;
            let records = storage.all_tracks()?;

            match throwback::select_throwback(&records, Utc::now(), &mut rand::rng()) {
                Some(track) => print_track(track),
                None => println!("No throwback songs available"),
            }
        }

        Commands::List { include_unrevealed } => {
            let mut storage = Storage::new(&cfg.database)?;
            let filter = TimelineFilter {
                include_unrevealed: *include_unrevealed,
                ..Default::default()
            };

            for track in storage.list_tracks(&filter)? {
                print_track(&track);
            }
        }
    }

    Ok(())
}

fn print_track(track: &TrackRecord) {
    let hidden = if track.revealed { "" } else { " [HIDDEN]" };
    println!(
        "{}  {} - {} ({}){hidden}",
        track.added_at.format("%Y-%m-%d"),
        track.metadata.artist,
        track.metadata.name,
        track.metadata.added_by,
    );
    if let Some(note) = &track.memory_note {
        println!("    \"{note}\"");
    }
}
