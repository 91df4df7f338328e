//! `segfetch serve`: expose one file to segment clients.

use anyhow::{Context, Result};
use segfetch_core::config::ServerConfig;
use segfetch_core::server::SegmentServer;
use std::path::PathBuf;

/// Binds the listener and runs the accept loop until the process is killed.
pub async fn run_serve(cfg: ServerConfig, file: Option<PathBuf>) -> Result<()> {
    let file = file
        .or_else(|| cfg.file.clone())
        .context("no file to serve: pass FILE or set server.file in config.toml")?;
    let server = SegmentServer::from_config(&cfg, file.clone())?;
    let addr = server.local_addr()?;

    let rate = match cfg.max_bytes_per_sec {
        Some(r) if r > 0 => format!("{} B/s per connection", r),
        _ => "unlimited".to_string(),
    };
    println!("Serving {} on {} ({})", file.display(), addr, rate);

    tokio::task::spawn_blocking(move || server.serve())
        .await
        .context("dispatcher thread failed")?
        .context("accept loop stopped")?;
    Ok(())
}
