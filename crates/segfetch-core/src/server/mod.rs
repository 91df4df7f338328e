//! Segment server: serves byte ranges of one file over TCP.
//!
//! The dispatcher accepts connections in a serial loop and hands each one to
//! its own handler thread without waiting on it. Handler outcomes flow to a
//! supervisor thread for logging and counting.

mod handler;
mod supervisor;

pub use handler::{handle_connection, HandlerError, HandlerPhase, HandlerSummary};
pub use supervisor::{ServerStats, StatsSnapshot};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::throttle::Throttle;

use supervisor::{HandlerOutcome, HandlerReport};

// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

// Socket setters reject a zero deadline; a missing one lets a stalled peer hold its handler.
const MIN_IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection settings shared read-only by every handler.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// The single file this server exposes.
    pub file: PathBuf,
    pub chunk_size: usize,
    pub throttle: Throttle,
    /// Read/write deadline on client sockets.
    pub io_timeout: Duration,
}

impl ServerOptions {
    pub fn from_config(cfg: &ServerConfig, file: PathBuf) -> Self {
        Self {
            file,
            chunk_size: cfg.chunk_size.max(1),
            throttle: Throttle::new(cfg.max_bytes_per_sec),
            io_timeout: cfg.request_timeout(),
        }
    }

    /// Read/write deadline applied to client sockets, never below one second.
    pub fn socket_timeout(&self) -> Duration {
        self.io_timeout.max(MIN_IO_TIMEOUT)
    }
}

/// Bound listener plus the options its handlers run with.
pub struct SegmentServer {
    listener: TcpListener,
    opts: Arc<ServerOptions>,
    stats: Arc<ServerStats>,
}

/// Binds a TCP listener with an explicit listen queue length.
fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.max(1))?;
    Ok(socket.into())
}

impl SegmentServer {
    pub fn bind(addr: SocketAddr, backlog: i32, opts: ServerOptions) -> io::Result<Self> {
        let listener = bind_listener(addr, backlog)?;
        Ok(Self {
            listener,
            opts: Arc::new(opts),
            stats: Arc::new(ServerStats::default()),
        })
    }

    /// Resolves `bind_addr:port` from config and checks that `file` can be opened.
    pub fn from_config(cfg: &ServerConfig, file: PathBuf) -> Result<Self> {
        let size = std::fs::metadata(&file)
            .with_context(|| format!("cannot serve {}", file.display()))?
            .len();
        std::fs::File::open(&file).with_context(|| format!("cannot open {}", file.display()))?;
        let addr = (cfg.bind_addr.as_str(), cfg.port)
            .to_socket_addrs()
            .with_context(|| format!("invalid bind address {}:{}", cfg.bind_addr, cfg.port))?
            .next()
            .with_context(|| format!("no address for {}:{}", cfg.bind_addr, cfg.port))?;
        let server = Self::bind(addr, cfg.backlog, ServerOptions::from_config(cfg, file))
            .with_context(|| format!("bind {}", addr))?;
        tracing::info!(
            %addr,
            file = %server.opts.file.display(),
            size,
            rate = ?server.opts.throttle.bytes_per_sec(),
            "segment server bound"
        );
        Ok(server)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the accept loop on the calling thread. Only returns on startup failure.
    pub fn serve(self) -> io::Result<()> {
        let (reports, _supervisor) = supervisor::spawn_supervisor(Arc::clone(&self.stats))?;
        for conn in self.listener.incoming() {
            match conn {
                Ok(stream) => {
                    self.stats.record_accept();
                    dispatch(stream, &self.opts, &reports);
                }
                Err(e) => {
                    tracing::warn!("accept failed: {}", e);
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }
        Ok(())
    }

    /// Runs the accept loop on a background thread.
    pub fn spawn(self) -> io::Result<ServerHandle> {
        let addr = self.local_addr()?;
        let stats = self.stats();
        let thread = thread::Builder::new()
            .name("segment-dispatcher".to_string())
            .spawn(move || self.serve())?;
        Ok(ServerHandle {
            addr,
            stats,
            _thread: thread,
        })
    }
}

/// Hands `stream` to a new handler thread and returns immediately.
fn dispatch(stream: TcpStream, opts: &Arc<ServerOptions>, reports: &mpsc::Sender<HandlerReport>) {
    let peer = stream
        .peer_addr()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
    tracing::debug!(%peer, "connection accepted");

    let opts_h = Arc::clone(opts);
    let reports_h = reports.clone();
    let spawned = thread::Builder::new()
        .name(format!("handler-{}", peer))
        .spawn(move || {
            supervisor::run_supervised(peer, &reports_h, || handle_connection(stream, &opts_h));
        });
    if let Err(e) = spawned {
        let _ = reports.send(HandlerReport {
            peer,
            outcome: HandlerOutcome::NotStarted(e),
        });
    }
}

/// Handle to a server running on a background thread. The dispatcher has no
/// shutdown signal; it lives until the process exits.
pub struct ServerHandle {
    addr: SocketAddr,
    stats: Arc<ServerStats>,
    _thread: thread::JoinHandle<io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Polls until at least `n` handlers have finished or `timeout` passes.
    pub fn wait_for_finished(&self, n: u64, timeout: Duration) -> StatsSnapshot {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let snap = self.stats.snapshot();
            if snap.finished() >= n || std::time::Instant::now() >= deadline {
                return snap;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}
