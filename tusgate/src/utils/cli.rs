use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_TUS_BINARY, DEFAULT_TUS_HOST, DEFAULT_TUS_PORT};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Gateway listening host
    #[arg(long, env = "TUSGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Gateway listening port
    #[arg(short, long, env = "TUSGATE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Content store root path
    #[arg(
        long,
        env = "TUSGATE_CONTENT_ROOT",
        default_value = "/var/lib/tusgate/objects"
    )]
    pub content_root: PathBuf,

    /// Address the tus server listens on, as `host:port`
    #[arg(long, env = "TUS_HOST", default_value_t = format!("{DEFAULT_TUS_HOST}:{DEFAULT_TUS_PORT}"))]
    pub tus_host: String,

    /// Run the tus server with `-behind-proxy` and relay X-Forwarded-* headers
    #[arg(long, env = "TUS_BEHIND_PROXY")]
    pub tus_behind_proxy: bool,

    /// Externally reachable origin session URLs are issued under
    #[arg(long, env = "TUS_EXT_ORIGIN")]
    pub tus_ext_origin: Option<String>,

    /// tus server binary
    #[arg(long, env = "TUS_BINARY", default_value = DEFAULT_TUS_BINARY)]
    pub tus_binary: PathBuf,

    /// Directory the tus upload directory is created in (defaults to the system temp dir)
    #[arg(long, env = "TUS_DATA_ROOT")]
    pub tus_data_root: Option<PathBuf>,

    /// Seconds to wait for the tus server to accept requests
    #[arg(long, env = "TUS_READY_TIMEOUT_SECS", default_value_t = 10)]
    pub tus_ready_timeout_secs: u64,
}
