//! `clap`-derived entry point (spec §6 Ingest CLI, §9 EXPANSION): the
//! `ingest` subcommand matches spec.md exactly; `serve` is the ambient
//! addition that starts the axum/WS surface the spec's interfaces assume
//! runs somewhere.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::api::{self, AppState};
use crate::config::Settings;
use crate::ingest::{self, IngestOutcome, MetaOverrides};
use crate::store::Store;

#[derive(Parser)]
#[command(name = "musica")]
#[command(version)]
#[command(about = "Shazam-style acoustic fingerprinting core", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one file or a directory of reference audio (spec §6).
    Ingest {
        /// File or directory to index. Defaults to `MUSICA_SONGS_DIR`.
        path: Option<PathBuf>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[arg(long)]
        album: Option<String>,

        /// Print store stats and exit without indexing anything.
        #[arg(long)]
        stats: bool,
    },

    /// Start the WS/REST server.
    Serve,
}

/// Runs the parsed CLI. Returns the process exit code (spec §6: 0 success,
/// 1 path not found or no files matched).
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    let store = match Store::connect(&settings.db_path) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to open fingerprint store");
            return 1;
        }
    };

    match cli.command {
        Commands::Ingest { path, title, artist, album, stats } => {
            run_ingest(&store, &settings, path, title, artist, album, stats)
        }
        Commands::Serve => {
            run_serve(store, &settings).await;
            0
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_ingest(
    store: &Store,
    settings: &Settings,
    path: Option<PathBuf>,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    stats_only: bool,
) -> i32 {
    if stats_only {
        return print_stats(store);
    }

    let target = path.unwrap_or_else(|| PathBuf::from(&settings.songs_dir));
    if !target.exists() {
        error!(path = %target.display(), "path not found");
        return 1;
    }

    let files = match ingest::collect_audio_files(&target) {
        Ok(files) => files,
        Err(e) => {
            error!(error = %e, "failed to walk ingest path");
            return 1;
        }
    };

    if files.is_empty() {
        warn!(path = %target.display(), "no audio files found");
        return 1;
    }

    info!(count = files.len(), "indexing files");
    let overrides = MetaOverrides { title, artist, album };

    let mut indexed = 0usize;
    for file in &files {
        match ingest::ingest_file(store, file, overrides.clone()) {
            Ok(IngestOutcome::Indexed { title, fingerprint_count, elapsed_secs, .. }) => {
                info!(file = %file.display(), title, fingerprint_count, elapsed_secs, "indexed");
                indexed += 1;
            }
            Ok(IngestOutcome::AlreadyIndexed { song_id }) => {
                info!(file = %file.display(), song_id, "already indexed, skipping");
            }
            Err(e) => {
                // Never aborts the batch (spec §7 propagation policy).
                error!(file = %file.display(), error = %e, "failed to index");
            }
        }
    }

    info!(indexed, total = files.len(), "ingestion complete");
    print_stats(store);
    0
}

fn print_stats(store: &Store) -> i32 {
    match store.stats() {
        Ok(stats) => {
            info!(songs = stats.song_count, fingerprints = stats.fingerprint_count, "store stats");
            0
        }
        Err(e) => {
            error!(error = %e, "failed to read store stats");
            1
        }
    }
}

async fn run_serve(store: Store, settings: &Settings) {
    let state = AppState::new(store);
    let app = api::router(state, settings);

    let addr = format!("{}:{}", settings.host, settings.port);
    info!(%addr, "starting musica server");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind listener");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
    }
}
