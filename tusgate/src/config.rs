use std::path::PathBuf;
use std::time::Duration;

use crate::error::TusError;

pub const DEFAULT_TUS_HOST: &str = "localhost";
pub const DEFAULT_TUS_PORT: u16 = 1080;
pub const DEFAULT_TUS_BINARY: &str = "tusd";

/// Subdirectory of the data root the helper writes uploads into.
pub const UPLOAD_DIR_NAME: &str = "tusd-uploads";

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub content_root: PathBuf,
    pub tus: TusConfig,
}

#[derive(Clone, Debug)]
pub struct TusConfig {
    /// `host:port` the helper listens on. Either half may be left out.
    pub listen: String,
    pub behind_proxy: bool,
    /// Externally reachable origin (e.g. `https://uploads.example.com`).
    /// Falls back to the listen address when unset.
    pub ext_origin: Option<String>,
    pub binary: PathBuf,
    pub data_root: PathBuf,
    pub ready_timeout: Duration,
}

impl Default for TusConfig {
    fn default() -> Self {
        Self {
            listen: format!("{DEFAULT_TUS_HOST}:{DEFAULT_TUS_PORT}"),
            behind_proxy: false,
            ext_origin: None,
            binary: PathBuf::from(DEFAULT_TUS_BINARY),
            data_root: std::env::temp_dir(),
            ready_timeout: Duration::from_secs(10),
        }
    }
}

impl TusConfig {
    /// Splits `listen` into host and port, filling in `localhost:1080`
    /// for whatever part is missing.
    pub fn listen_addr(&self) -> Result<(String, u16), TusError> {
        let (host, port) = match self.listen.split_once(':') {
            Some((host, port)) => (host.trim(), port.trim()),
            None => (self.listen.trim(), ""),
        };

        let host = if host.is_empty() {
            DEFAULT_TUS_HOST.to_string()
        } else {
            host.to_string()
        };
        let port = if port.is_empty() {
            DEFAULT_TUS_PORT
        } else {
            port.parse::<u16>()
                .map_err(|_| TusError::InvalidListenAddr(self.listen.clone()))?
        };
        Ok((host, port))
    }

    /// Directory the helper stores upload data and `.info` sidecars in.
    pub fn data_dir(&self) -> PathBuf {
        self.data_root.join(UPLOAD_DIR_NAME)
    }

    pub fn origin(&self) -> Result<String, TusError> {
        match &self.ext_origin {
            Some(origin) => Ok(origin.trim_end_matches('/').to_string()),
            None => {
                let (host, port) = self.listen_addr()?;
                Ok(format!("http://{host}:{port}"))
            }
        }
    }

    /// Creation endpoint session URLs are issued under, `<origin>/files/`.
    pub fn base_url(&self) -> Result<String, TusError> {
        Ok(format!("{}/files/", self.origin()?))
    }

    /// Local address polled while waiting for the helper to come up.
    pub fn probe_url(&self) -> Result<String, TusError> {
        let (host, port) = self.listen_addr()?;
        Ok(format!("http://{host}:{port}/files/"))
    }
}
