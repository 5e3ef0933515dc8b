//! fast-share: share a single file over HTTP on the local network.

mod cli;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fast_share_server::{ServerError, ShareOutcome, ShareServer, SharedFile};

use cli::{Args, ShareConfig};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,fast_share_server=info";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(ShareConfig::from(args)).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ShareConfig) -> anyhow::Result<ExitCode> {
    let file = match SharedFile::resolve(&config.file) {
        Ok(file) => file,
        Err(ServerError::FileNotFound(path)) => {
            eprintln!("Error: File does not exist: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(ServerError::NotAFile(path)) => {
            eprintln!("Error: Not a regular file: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("failed to resolve file"),
    };

    let auto_close = config.server.auto_close;
    let bind = config.server.bind;
    let server = match ShareServer::bind(config.server, file).await {
        Ok(server) => Arc::new(server),
        Err(ServerError::PortInUse(port)) => {
            eprintln!("Error: Port {port} is already in use.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("failed to start server"),
    };

    let hosts = output::share_hosts(bind);
    println!(
        "{}",
        output::banner(server.file(), server.port(), &hosts, auto_close)
    );

    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_server.shutdown(),
            Err(e) => tracing::error!("failed to listen for Ctrl+C: {e}"),
        }
    });

    match server.run().await? {
        ShareOutcome::Downloaded => println!("\nFile downloaded. Server is shutting down..."),
        ShareOutcome::Interrupted => println!("\nShutting down the server ..."),
    }

    Ok(ExitCode::SUCCESS)
}
