//! Command-line arguments and the configuration derived from them.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use fast_share_server::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "fast-share", version)]
#[command(about = "Share a single file over HTTP on the local network")]
#[command(after_help = "\
Examples:
  fast-share myfile.txt                 Share on a random port
  fast-share -p 8000 myfile.txt         Share on port 8000
  fast-share --auto-close myfile.txt    Exit after the first download")]
pub struct Args {
    /// File to share
    pub file: PathBuf,

    /// Port to listen on (default: random port in 10000-65535)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Exit after the first completed download
    #[arg(long, overrides_with = "keep_alive")]
    pub auto_close: bool,

    /// Keep serving after downloads (default)
    #[arg(long, overrides_with = "auto_close")]
    pub keep_alive: bool,

    /// IPv4 address to listen on
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub bind: Ipv4Addr,
}

/// Everything needed to run one share.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub file: PathBuf,
    pub server: ServerConfig,
}

impl From<Args> for ShareConfig {
    fn from(args: Args) -> Self {
        Self {
            file: args.file,
            server: ServerConfig {
                port: args.port,
                bind: args.bind,
                auto_close: args.auto_close && !args.keep_alive,
            },
        }
    }
}
