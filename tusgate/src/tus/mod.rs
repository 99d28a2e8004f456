//! Supervision of a tusd server and the upload sessions brokered through it.
//!
//! [`TusServer`] owns at most one tusd child process. Clients are handed a
//! session URL by [`TusServer::create`] and then upload directly to tusd;
//! once the transfer is complete [`TusServer::finish`] moves the file tusd
//! wrote into a [`ContentStore`].
//!
//! `start`, `stop`, `create` and `finish` are serialized on one lock, so the
//! process handle and the session registry only ever change one operation at
//! a time. The byte transfer itself never passes through this lock.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, StatusCode};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::TusConfig;
use crate::error::TusError;
use crate::storage::{ContentStore, MetaObject};

pub mod process;
pub mod session;

use process::{HelperProcess, helper_args};
use session::{SessionRegistry, sidecar_file_name, upload_file_name};

pub const TUS_VERSION: &str = "1.0.0";

const TUS_RESUMABLE: &str = "tus-resumable";
const UPLOAD_LENGTH: &str = "upload-length";
const UPLOAD_METADATA: &str = "upload-metadata";

/// Headers a reverse proxy sets that tusd needs to build external URLs.
pub const FORWARDED_HEADERS: [&str; 3] =
    ["x-forwarded-host", "x-forwarded-proto", "x-forwarded-port"];

struct Inner {
    process: Option<HelperProcess>,
    sessions: SessionRegistry,
}

pub struct TusServer {
    config: TusConfig,
    data_dir: PathBuf,
    client: Client,
    inner: Mutex<Inner>,
}

impl TusServer {
    pub fn new(config: TusConfig) -> Self {
        TusServer {
            data_dir: config.data_dir(),
            config,
            client: Client::new(),
            inner: Mutex::new(Inner {
                process: None,
                sessions: SessionRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &TusConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Launches tusd unless it is already running, and waits until it
    /// answers on its listen address.
    pub async fn start(&self) -> Result<(), TusError> {
        let mut inner = self.inner.lock().await;
        if let Some(process) = inner.process.as_mut() {
            if process.is_alive() {
                return Ok(());
            }
            inner.process = None;
        }

        let (host, port) = self.config.listen_addr()?;
        let probe_url = self.config.probe_url()?;
        fs::create_dir_all(&self.data_dir).await?;

        let args = helper_args(&self.data_dir, &host, port, self.config.behind_proxy);
        let mut process = HelperProcess::spawn(&self.config.binary, args)?;
        if let Err(err) = process
            .wait_ready(&self.client, &probe_url, self.config.ready_timeout)
            .await
        {
            process.kill().await;
            return Err(err);
        }

        info!(
            func = "start",
            pid = process.pid(),
            data_dir = %self.data_dir.display(),
            "Tus server started"
        );
        inner.process = Some(process);
        inner.sessions.clear();
        Ok(())
    }

    /// Kills tusd if it is running. Uploads in flight are cut off.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        match inner.process.take() {
            Some(mut process) => {
                process.kill().await;
                info!(func = "stop", pid = process.pid(), "Tus server stopped");
            }
            None => info!(func = "stop", "Tus server stopped (was not running)"),
        }
    }

    pub async fn is_running(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let alive = inner.process.as_mut().is_some_and(|p| p.is_alive());
        if !alive {
            inner.process = None;
        }
        alive
    }

    pub async fn pid(&self) -> Option<u32> {
        let inner = self.inner.lock().await;
        inner.process.as_ref().map(HelperProcess::pid)
    }

    pub async fn session_location(&self, oid: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.sessions.get(oid).map(str::to_string)
    }

    /// Registers a tus upload of `size` bytes for `oid` and returns the
    /// session URL the client should upload to. `inbound` holds the headers
    /// of the request being served; forwarding headers are relayed from it
    /// when tusd runs behind a proxy.
    pub async fn create(
        &self,
        oid: &str,
        size: u64,
        inbound: &HeaderMap,
    ) -> Result<String, TusError> {
        let mut inner = self.inner.lock().await;
        if oid.is_empty() {
            return Err(TusError::InvalidObjectId);
        }

        let base_url = self.config.base_url()?;
        info!(func = "create", oid, "Creating POST tus upload at {base_url}");

        let metadata = format!("oid {oid}");
        let mut request = self
            .client
            .post(&base_url)
            .header(TUS_RESUMABLE, TUS_VERSION)
            .header(UPLOAD_LENGTH, size.to_string())
            .header(UPLOAD_METADATA, &metadata);
        if self.config.behind_proxy {
            for name in FORWARDED_HEADERS {
                if let Some(value) = inbound.get(name) {
                    request = request.header(name, value.clone());
                }
            }
        }
        info!(func = "create", oid, "Upload-Metadata: {metadata}");

        let response = request.send().await?;
        if response.status() != StatusCode::CREATED {
            return Err(TusError::UnexpectedStatus(response.status()));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(TusError::MissingLocation)?
            .to_string();

        if inner.sessions.insert(oid, location.clone()).is_some() {
            warn!(func = "create", oid, "replaced existing tus session");
        }
        Ok(location)
    }

    /// Moves the finished upload for `oid` into `store`.
    ///
    /// The size handed to the store is read from the file tusd wrote, not the
    /// size given to [`TusServer::create`]. The upload file, its `.info`
    /// sidecar and the session are only dropped once the store accepted the
    /// data; on a store error everything is left in place so the call can be
    /// retried.
    pub async fn finish(
        &self,
        oid: &str,
        store: &dyn ContentStore,
    ) -> Result<MetaObject, TusError> {
        let mut inner = self.inner.lock().await;
        let location = inner
            .sessions
            .get(oid)
            .ok_or_else(|| TusError::UploadUnknown(oid.to_string()))?;
        let name = upload_file_name(location)
            .ok_or_else(|| TusError::InvalidLocation(location.to_string()))?;
        let data_path = self.data_dir.join(name);
        let info_path = self.data_dir.join(sidecar_file_name(name));

        let unavailable = |source: std::io::Error| TusError::FinishedUpload {
            path: data_path.clone(),
            source,
        };
        let size = fs::metadata(&data_path).await.map_err(unavailable)?.len();
        let mut file = fs::File::open(&data_path).await.map_err(unavailable)?;

        let meta = MetaObject::new(oid, size);
        store
            .put(&meta, &mut file)
            .await
            .map_err(|source| TusError::Store {
                oid: oid.to_string(),
                source,
            })?;
        drop(file);

        remove_artifact(&data_path).await;
        remove_artifact(&info_path).await;
        inner.sessions.remove(oid);

        info!(func = "finish", oid, size, "Moved tus upload into content store");
        Ok(meta)
    }
}

async fn remove_artifact(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!(func = "finish", "Failed to remove {:?}: {e}", path);
    }
}
