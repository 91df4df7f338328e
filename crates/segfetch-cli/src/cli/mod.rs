//! CLI for segfetch.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use segfetch_core::config;
use std::path::PathBuf;

use commands::{run_checksum, run_fetch, run_plan, run_serve};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "segfetch")]
#[command(about = "segfetch: parallel segmented file transfer over TCP", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Size of the file being fetched: given directly or taken from a local copy.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct SizeArgs {
    /// Total file size in bytes.
    #[arg(long)]
    pub size: Option<u64>,
    /// Take the size from this local file.
    #[arg(long, value_name = "PATH")]
    pub size_of: Option<PathBuf>,
}

/// How to split the file into segments.
#[derive(Debug, Clone, Default, Args)]
pub struct SplitArgs {
    /// Comma-separated segment lengths; 0 or negative splits the rest evenly.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, conflicts_with = "count")]
    pub segments: Vec<i64>,
    /// Split into N near-equal segments.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
    /// Upper bound on the number of segments (default from config).
    #[arg(long, value_name = "N")]
    pub max_segments: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Serve a single file to segment clients.
    Serve {
        /// File to serve (default from config).
        file: Option<PathBuf>,
        /// TCP port to listen on.
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind.
        #[arg(long)]
        bind: Option<String>,
        /// Per-connection rate limit in bytes per second (0 = unlimited).
        #[arg(long, value_name = "BYTES_PER_SEC")]
        rate: Option<u64>,
        /// Chunk size in bytes for reads and writes.
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,
        /// Listen queue length.
        #[arg(long)]
        backlog: Option<i32>,
    },

    /// Fetch a file from a segment server over parallel connections.
    Fetch {
        /// Output file path.
        #[arg(long, short, default_value = "downloaded.txt")]
        output: PathBuf,
        #[command(flatten)]
        size: SizeArgs,
        #[command(flatten)]
        split: SplitArgs,
        /// Server host.
        #[arg(long)]
        host: Option<String>,
        /// Server port.
        #[arg(long)]
        port: Option<u16>,
        /// Per-segment receive timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Expected SHA-256 of the whole file; a mismatch fails the command.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Print the segment plan without transferring anything.
    Plan {
        #[command(flatten)]
        size: SizeArgs,
        #[command(flatten)]
        split: SplitArgs,
    },

    /// Compute SHA-256 of a file (e.g. to compare served and fetched copies).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve {
                file,
                port,
                bind,
                rate,
                chunk_size,
                backlog,
            } => {
                let mut server_cfg = cfg.server.clone();
                if let Some(port) = port {
                    server_cfg.port = port;
                }
                if let Some(bind) = bind {
                    server_cfg.bind_addr = bind;
                }
                if let Some(rate) = rate {
                    server_cfg.max_bytes_per_sec = Some(rate);
                }
                if let Some(chunk_size) = chunk_size {
                    server_cfg.chunk_size = chunk_size;
                }
                if let Some(backlog) = backlog {
                    server_cfg.backlog = backlog;
                }
                run_serve(server_cfg, file).await?
            }
            CliCommand::Fetch {
                output,
                size,
                split,
                host,
                port,
                timeout,
                sha256,
            } => {
                let mut client_cfg = cfg.client.clone();
                if let Some(host) = host {
                    client_cfg.host = host;
                }
                if let Some(port) = port {
                    client_cfg.port = port;
                }
                if let Some(timeout) = timeout {
                    client_cfg.recv_timeout_secs = timeout;
                }
                run_fetch(&client_cfg, &size, &split, &output, sha256.as_deref()).await?
            }
            CliCommand::Plan { size, split } => run_plan(&cfg.client, &size, &split)?,
            CliCommand::Checksum { path } => run_checksum(&path).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
