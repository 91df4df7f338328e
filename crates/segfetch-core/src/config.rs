use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default TCP port shared by `serve` and `fetch`.
pub const DEFAULT_PORT: u16 = 27015;

/// Server-side settings (`[server]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind_addr: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Listen queue length passed to `listen(2)`.
    pub backlog: i32,
    /// Bytes read from the served file and written per chunk.
    pub chunk_size: usize,
    /// Per-connection bandwidth cap in bytes per second (None or 0 = no cap).
    pub max_bytes_per_sec: Option<u64>,
    /// Seconds a stalled client may block a handler (request read or response write).
    pub request_timeout_secs: u64,
    /// File served when none is given on the command line.
    pub file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backlog: 5,
            chunk_size: 1024,
            max_bytes_per_sec: Some(10 * 1024),
            request_timeout_secs: 10,
            file: None,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Client-side settings (`[client]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Maximum number of segments (and concurrent connections) per transfer.
    pub max_segments: usize,
    /// Seconds allowed for establishing each segment connection.
    pub connect_timeout_secs: u64,
    /// Seconds a segment read may block without receiving any bytes.
    pub recv_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_segments: 100,
            connect_timeout_secs: 5,
            recv_timeout_secs: 5,
        }
    }
}

/// Global configuration loaded from `~/.config/segfetch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegfetchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SegfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SegfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SegfetchConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SegfetchConfig::default();
        assert_eq!(cfg.server.port, 27015);
        assert_eq!(cfg.server.backlog, 5);
        assert_eq!(cfg.server.chunk_size, 1024);
        assert_eq!(cfg.server.max_bytes_per_sec, Some(10 * 1024));
        assert_eq!(cfg.client.host, "127.0.0.1");
        assert_eq!(cfg.client.max_segments, 100);
        assert_eq!(cfg.client.recv_timeout_secs, 5);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SegfetchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SegfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.port, cfg.server.port);
        assert_eq!(parsed.server.max_bytes_per_sec, cfg.server.max_bytes_per_sec);
        assert_eq!(parsed.client.max_segments, cfg.client.max_segments);
    }

    #[test]
    fn config_toml_partial_sections_use_defaults() {
        let toml = r#"
            [server]
            port = 9000
            max_bytes_per_sec = 0

            [client]
            max_segments = 8
        "#;
        let cfg: SegfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.max_bytes_per_sec, Some(0));
        assert_eq!(cfg.server.chunk_size, 1024);
        assert_eq!(cfg.client.max_segments, 8);
        assert_eq!(cfg.client.port, DEFAULT_PORT);
        assert!(cfg.server.file.is_none());
    }

    #[test]
    fn config_toml_empty_is_default() {
        let cfg: SegfetchConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0");
        assert_eq!(cfg.client.connect_timeout_secs, 5);
    }

    #[test]
    fn request_timeout_never_zero() {
        let cfg = ServerConfig {
            request_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.request_timeout(), Duration::from_secs(1));
    }
}
