//! # Image Dispatch — a durable task broker for image generation work
//!
//! A small HTTP service that lets requestors submit image-generation prompts
//! and workers claim, process, and complete them. Tasks persist in an
//! embedded transactional store (sled) so the queue survives a restart.
//!
//! ## Usage
//!
//! ```bash
//! # Run the server with defaults (DB_PATH=db/image_tasks.db, IMAGES_DIR=images)
//! image-dispatch
//!
//! # Override bind address, database, and artifact directory
//! image-dispatch --host 0.0.0.0 --port 9000 --db-path /data/tasks.db --images-dir /data/images
//!
//! # Check queue progress without starting the server
//! image-dispatch progress --db-path /data/tasks.db
//! ```
//!
//! ## Graceful shutdown
//!
//! `Ctrl+C` stops the listener and flushes the store before exit.

use std::error::Error;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use image_dispatch::app_state::AppState;
use image_dispatch::logging::init_logging;
use image_dispatch::storage::Store;
use image_dispatch::{config, server};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address (overrides the default 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides the default 8000)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the embedded store directory (overrides DB_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Directory sidecar artifacts are written to (overrides IMAGES_DIR)
    #[arg(long)]
    images_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print queue counts and completion percentage, then exit.
    Progress,
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Create the Tokio runtime explicitly so we control shutdown.
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Box::<dyn Error + Send + Sync>::from(format!("failed to create runtime: {e}")))?;

    let result = runtime.block_on(async_main());

    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    result
}

async fn async_main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();

    init_logging();

    let mut config = config::load_config();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.store.db_path = db_path.into();
    }
    if let Some(images_dir) = args.images_dir {
        config.store.images_dir = images_dir.into();
    }

    if let Some(Command::Progress) = args.command {
        return print_progress(&config.store.db_path);
    }

    let start_time = std::time::Instant::now();

    let app_state = AppState::new(&config)?;
    info!(db_path = %config.store.db_path.display(), images_dir = %config.store.images_dir.display(), "image dispatch service starting");

    if let Err(e) = server::run_server(app_state.clone(), &config.server).await {
        error!(error = %e, "server exited with error");
        app_state.shutdown().await;
        return Err(e);
    }

    info!(runtime_secs = %start_time.elapsed().as_secs_f64(), "shutdown complete");

    Ok(())
}

/// `progress` subcommand: open the store, print counts and the completion
/// percentage, then exit without starting the HTTP server.
fn print_progress(db_path: &std::path::Path) -> Result<(), Box<dyn Error + Send + Sync>> {
    let store = Store::open(db_path)?;
    let counts = store.counts()?;
    let total = counts.pending + counts.processing + counts.completed;

    println!("{} {} {}", counts.pending, counts.completed, counts.processing);
    if total == 0 {
        println!("Progress: 0.00% (no tasks)");
    } else {
        let progress = counts.completed as f64 / total as f64 * 100.0;
        println!("Progress: {progress:.2}%");
    }

    Ok(())
}
