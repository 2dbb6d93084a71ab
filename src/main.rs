mod app;
mod chat;
mod config;
mod input;
mod model;
mod mood;
mod physics;
mod render;
mod scheduler;
mod sim;
mod stats;
mod storage;

use anyhow::Result;
use clap::Parser;
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing_subscriber::EnvFilter;

/// Milliseconds on the session clock.
pub(crate) type Millis = u64;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    let (paths, dir_err) = match config::project_paths() {
        Ok(p) => (p, None),
        Err(e) => (config::fallback_paths(), Some(e)),
    };
    init_logging(&paths.log_path);
    tracing::info!("tamagotchia {}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = dir_err {
        tracing::warn!("{e:#}; saving under {}", paths.save_path.display());
    }
    app::run(cli, paths).await
}

// The terminal is in raw mode, so logs go to a file. No file, no logs.
fn init_logging(path: &Path) {
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}
