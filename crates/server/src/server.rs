//! Share server.
//!
//! Binds a TCP port, serves the shared file over HTTP/1.1, and stops either
//! when the shutdown token is cancelled or, with auto-close, after the first
//! completed download.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::file::SharedFile;
use crate::handler::{self, ShareState};
use crate::port::random_port;

/// Random ports tried before giving up when no port is configured.
const BIND_ATTEMPTS: usize = 8;

/// Pause after a failed accept.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How long open connections get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on. `None` picks a random ephemeral port; `Some(0)`
    /// lets the OS choose.
    pub port: Option<u16>,
    /// Address to listen on.
    pub bind: Ipv4Addr,
    /// Stop after the first completed download.
    pub auto_close: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind: Ipv4Addr::UNSPECIFIED,
            auto_close: false,
        }
    }
}

/// Why [`ShareServer::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Auto-close fired after a completed download.
    Downloaded,
    /// The shutdown token was cancelled.
    Interrupted,
}

/// HTTP server for a single shared file.
pub struct ShareServer {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    state: Arc<ShareState>,
    auto_close: bool,
    cancel: CancellationToken,
}

impl ShareServer {
    /// Binds the listening socket.
    ///
    /// An explicit port that is taken yields [`ServerError::PortInUse`]. A
    /// random port that is taken is retried with a fresh one.
    pub async fn bind(config: ServerConfig, file: SharedFile) -> Result<Self, ServerError> {
        let listener = match config.port {
            Some(port) => bind_port(config.bind, port).await?,
            None => bind_random(config.bind, random_port).await?,
        };
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, "bound share listener");

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            state: Arc::new(ShareState::new(file)),
            auto_close: config.auto_close,
            cancel: CancellationToken::new(),
        })
    }

    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the file being shared.
    pub fn file(&self) -> &SharedFile {
        &self.state.file
    }

    /// Number of downloads that delivered the whole file.
    pub fn downloads(&self) -> u64 {
        self.state.downloads()
    }

    /// Requests a graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serves requests until shutdown or, with auto-close, the first
    /// completed download.
    ///
    /// Open connections are given [`SHUTDOWN_GRACE`] to finish before this
    /// returns. May only be called once.
    pub async fn run(&self) -> Result<ShareOutcome, ServerError> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or(ServerError::AlreadyRunning)?;

        tracing::info!(
            local_addr = %self.local_addr,
            file = %self.state.file.path().display(),
            auto_close = self.auto_close,
            "share server listening"
        );

        let graceful = GracefulShutdown::new();
        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break ShareOutcome::Interrupted,

                _ = self.state.completed.notified(), if self.auto_close => {
                    break ShareOutcome::Downloaded;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let state = Arc::clone(&self.state);
                            let service = service_fn(move |req| {
                                handler::handle(req, Arc::clone(&state), peer_addr)
                            });
                            let conn = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), service);
                            let conn = graceful.watch(conn);
                            tokio::spawn(async move {
                                if let Err(e) = conn.await {
                                    tracing::debug!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                            // Persistent errors such as EMFILE would spin.
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        };

        drop(listener);
        tracing::info!(?outcome, "share server shutting down");

        if tokio::time::timeout(SHUTDOWN_GRACE, graceful.shutdown())
            .await
            .is_err()
        {
            tracing::warn!("connections still open after {SHUTDOWN_GRACE:?}, closing anyway");
        }

        Ok(outcome)
    }
}

async fn bind_port(ip: Ipv4Addr, port: u16) -> Result<TcpListener, ServerError> {
    match TcpListener::bind(SocketAddr::from((ip, port))).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == ErrorKind::AddrInUse => Err(ServerError::PortInUse(port)),
        Err(e) => Err(e.into()),
    }
}

/// Binds the first free port drawn from `next_port`, giving up after
/// [`BIND_ATTEMPTS`] taken ports.
async fn bind_random(
    ip: Ipv4Addr,
    mut next_port: impl FnMut() -> u16,
) -> Result<TcpListener, ServerError> {
    let mut attempt = 1;
    loop {
        match bind_port(ip, next_port()).await {
            Err(ServerError::PortInUse(port)) if attempt < BIND_ATTEMPTS => {
                tracing::debug!(port, attempt, "random port in use, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::EPHEMERAL_PORTS;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn share(name: &str, contents: &[u8]) -> (tempfile::TempDir, SharedFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        let file = SharedFile::resolve(&path).unwrap();
        (dir, file)
    }

    fn local_config(auto_close: bool) -> ServerConfig {
        ServerConfig {
            port: Some(0),
            bind: Ipv4Addr::LOCALHOST,
            auto_close,
        }
    }

    async fn start(
        config: ServerConfig,
        file: SharedFile,
    ) -> (Arc<ShareServer>, tokio::task::JoinHandle<ShareOutcome>) {
        let server = Arc::new(ShareServer::bind(config, file).await.unwrap());
        let server2 = Arc::clone(&server);
        let handle = tokio::spawn(async move { server2.run().await.unwrap() });
        (server, handle)
    }

    fn url(server: &ShareServer) -> String {
        server.file().url(Ipv4Addr::LOCALHOST.into(), server.port())
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    #[tokio::test]
    async fn unset_port_binds_in_ephemeral_range() {
        let (_dir, file) = share("a.txt", b"a");
        let config = ServerConfig {
            bind: Ipv4Addr::LOCALHOST,
            ..ServerConfig::default()
        };

        let server = ShareServer::bind(config, file).await.unwrap();

        assert!(EPHEMERAL_PORTS.contains(&server.port()));
    }

    #[tokio::test]
    async fn random_bind_retries_past_taken_port() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let free_port = {
            let spare = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            spare.local_addr().unwrap().port()
        };
        let mut ports = vec![taken_port, free_port].into_iter();
        let mut drawn = 0;

        let listener = bind_random(Ipv4Addr::LOCALHOST, || {
            drawn += 1;
            ports.next().unwrap_or(0)
        })
        .await
        .unwrap();

        assert_eq!(listener.local_addr().unwrap().port(), free_port);
        assert_eq!(drawn, 2);
    }

    #[tokio::test]
    async fn random_bind_gives_up_after_attempts() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let mut drawn = 0;

        let result = bind_random(Ipv4Addr::LOCALHOST, || {
            drawn += 1;
            taken_port
        })
        .await;

        match result {
            Err(ServerError::PortInUse(p)) => assert_eq!(p, taken_port),
            Err(e) => panic!("expected PortInUse, got {e}"),
            Ok(_) => panic!("expected PortInUse, bind succeeded"),
        }
        assert_eq!(drawn, BIND_ATTEMPTS);
    }

    #[test]
    fn accept_backoff_is_short_but_nonzero() {
        assert!(!ACCEPT_ERROR_BACKOFF.is_zero());
        assert!(ACCEPT_ERROR_BACKOFF < SHUTDOWN_GRACE);
    }

    #[tokio::test]
    async fn explicit_port_in_use() {
        let (_dir, file) = share("a.txt", b"a");
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig {
            port: Some(port),
            bind: Ipv4Addr::LOCALHOST,
            auto_close: false,
        };

        match ShareServer::bind(config, file).await {
            Err(ServerError::PortInUse(p)) => assert_eq!(p, port),
            Err(e) => panic!("expected PortInUse, got {e}"),
            Ok(_) => panic!("expected PortInUse, bind succeeded"),
        }
    }

    #[tokio::test]
    async fn serves_file_bytes_unchanged() {
        let contents = pattern(300_000);
        let (_dir, file) = share("data.bin", &contents);
        let (server, handle) = start(local_config(false), file).await;

        let resp = reqwest::get(url(&server)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"],
            "application/octet-stream"
        );
        let body = resp.bytes().await.unwrap();
        assert_eq!(body.as_ref(), contents.as_slice());

        server.shutdown();
        assert_eq!(handle.await.unwrap(), ShareOutcome::Interrupted);
    }

    #[tokio::test]
    async fn other_paths_not_found() {
        let (_dir, file) = share("data.bin", b"data");
        let (server, handle) = start(local_config(false), file).await;
        let base = format!("http://127.0.0.1:{}", server.port());

        for path in ["/", "/other.bin", "/data.bin.bak"] {
            let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
            assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND, "path {path}");
        }

        server.shutdown();
        handle.await.unwrap();
        assert_eq!(server.downloads(), 0);
    }

    #[tokio::test]
    async fn text_and_markdown_content_types() {
        let (_dir, md) = share("notes.md", b"# Notes");
        let (md_server, md_handle) = start(local_config(false), md).await;
        let resp = reqwest::get(url(&md_server)).await.unwrap();
        assert_eq!(resp.headers()["content-type"], "text/markdown; charset=utf-8");
        md_server.shutdown();
        md_handle.await.unwrap();

        let (_dir, txt) = share("notes.txt", b"notes");
        let (txt_server, txt_handle) = start(local_config(false), txt).await;
        let resp = reqwest::get(url(&txt_server)).await.unwrap();
        assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
        txt_server.shutdown();
        txt_handle.await.unwrap();
    }

    #[tokio::test]
    async fn auto_close_stops_after_first_download() {
        let contents = pattern(64 * 1024);
        let (_dir, file) = share("once.bin", &contents);
        let (server, handle) = start(local_config(true), file).await;

        let body = reqwest::get(url(&server))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(body.as_ref(), contents.as_slice());

        let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("server should stop after the download")
            .unwrap();
        assert_eq!(outcome, ShareOutcome::Downloaded);
        assert_eq!(server.downloads(), 1);

        // Listener is closed.
        assert!(reqwest::get(url(&server)).await.is_err());
    }

    #[tokio::test]
    async fn keep_alive_serves_repeated_downloads() {
        let contents = pattern(10_000);
        let (_dir, file) = share("many.bin", &contents);
        let (server, handle) = start(local_config(false), file).await;

        for _ in 0..3 {
            let body = reqwest::get(url(&server))
                .await
                .unwrap()
                .bytes()
                .await
                .unwrap();
            assert_eq!(body.as_ref(), contents.as_slice());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.downloads(), 3);
        assert!(!handle.is_finished());

        server.shutdown();
        assert_eq!(handle.await.unwrap(), ShareOutcome::Interrupted);
    }

    #[tokio::test]
    async fn head_does_not_trigger_auto_close() {
        let (_dir, file) = share("head.txt", b"hello");
        let (server, handle) = start(local_config(true), file).await;

        let client = reqwest::Client::new();
        let resp = client.head(url(&server)).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.headers()["content-length"], "5");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert_eq!(server.downloads(), 0);

        server.shutdown();
        assert_eq!(handle.await.unwrap(), ShareOutcome::Interrupted);
    }

    #[tokio::test]
    async fn aborted_download_does_not_trigger_auto_close() {
        // Large enough that socket buffers cannot absorb the whole body.
        let contents = vec![0x5au8; 32 * 1024 * 1024];
        let (_dir, file) = share("big.bin", &contents);
        let (server, handle) = start(local_config(true), file).await;

        let mut stream = tokio::net::TcpStream::connect(server.local_addr())
            .await
            .unwrap();
        stream
            .write_all(b"GET /big.bin HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 16 * 1024];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0);
        assert!(buf.starts_with(b"HTTP/1.1 200"));
        drop(stream);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!handle.is_finished());
        assert_eq!(server.downloads(), 0);

        server.shutdown();
        assert_eq!(handle.await.unwrap(), ShareOutcome::Interrupted);
    }

    #[tokio::test]
    async fn run_twice_is_rejected() {
        let (_dir, file) = share("a.txt", b"a");
        let (server, handle) = start(local_config(false), file).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(server.run().await, Err(ServerError::AlreadyRunning)));

        server.shutdown();
        handle.await.unwrap();
    }
}
