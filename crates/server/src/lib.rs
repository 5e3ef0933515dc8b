//! Single-file HTTP server for fast-share.
//!
//! Serves exactly one path, `/<file name>`, over plain HTTP/1.1 and answers
//! everything else with 404. With auto-close enabled the accept loop stops
//! after the first download whose full byte count reached the client side of
//! the connection, then drains open connections before returning.

mod body;
mod content_type;
mod file;
mod handler;
mod port;
mod server;

pub use content_type::content_type_for;
pub use file::SharedFile;
pub use port::{EPHEMERAL_PORTS, random_port};
pub use server::{ServerConfig, ShareOutcome, ShareServer};

/// Errors produced by the share server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("file does not exist: {0}")]
    FileNotFound(std::path::PathBuf),

    #[error("not a regular file: {0}")]
    NotAFile(std::path::PathBuf),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("server already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
