//! Lifecycle of the tusd child process.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use reqwest::{Client, Method};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::TusError;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READY_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Command line the tus server is launched with.
pub fn helper_args(data_dir: &Path, host: &str, port: u16, behind_proxy: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-upload-dir".into(),
        data_dir.as_os_str().to_owned(),
        "-host".into(),
        host.into(),
        "-port".into(),
        port.to_string().into(),
    ];
    if behind_proxy {
        args.push("-behind-proxy".into());
    }
    args
}

/// A running tus server together with the tasks relaying its output.
pub struct HelperProcess {
    child: Child,
    pid: u32,
    relays: Vec<JoinHandle<()>>,
}

impl HelperProcess {
    pub fn spawn(binary: &Path, args: Vec<OsString>) -> Result<Self, TusError> {
        debug!("Launching tus server {:?} with {:?}", binary, args);
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TusError::Spawn {
                binary: binary.display().to_string(),
                source,
            })?;

        // `child` is killed on drop if either pipe is missing.
        let stdout = child
            .stdout
            .take()
            .ok_or(TusError::OutputStream("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TusError::OutputStream("stderr"))?;

        Ok(HelperProcess {
            pid: child.id().unwrap_or_default(),
            relays: vec![relay_output(stdout, "stdout"), relay_output(stderr, "stderr")],
            child,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Reaps the child if it has exited.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(func = "monitor", pid = self.pid, %status, "tus server exited");
                false
            }
            Err(e) => {
                warn!(func = "monitor", pid = self.pid, "failed to poll tus server: {e}");
                false
            }
        }
    }

    /// Polls `probe_url` until the server answers with any HTTP response.
    pub async fn wait_ready(
        &mut self,
        client: &Client,
        probe_url: &str,
        ready_timeout: Duration,
    ) -> Result<(), TusError> {
        let deadline = Instant::now() + ready_timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(TusError::ExitedEarly(status));
            }

            match client
                .request(Method::OPTIONS, probe_url)
                .timeout(READY_PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(response) => {
                    debug!(status = %response.status(), "tus server answered readiness probe");
                    return Ok(());
                }
                Err(e) => debug!("tus server not ready yet: {e}"),
            }

            if Instant::now() >= deadline {
                return Err(TusError::NotReady(ready_timeout));
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Kills the process without waiting for a graceful shutdown, then
    /// lets the relays drain whatever output is left.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(func = "stop", pid = self.pid, "failed to kill tus server: {e}");
        }
        for relay in &mut self.relays {
            if timeout(RELAY_DRAIN_TIMEOUT, &mut *relay).await.is_err() {
                relay.abort();
            }
        }
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        for relay in &self.relays {
            relay.abort();
        }
    }
}

/// Logs every line the process writes to `stream`. The pipe is read until
/// EOF, so the process never sees a closed output stream while it runs.
fn relay_output<R>(reader: R, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    info!(func = "relay", stream, "{line}");
                }
                Err(e) => {
                    warn!(func = "relay", stream, "failed to read tus server output: {e}");
                    // Keep the pipe open and discard the rest.
                    if let Err(e) = io::copy(&mut reader, &mut io::sink()).await {
                        warn!(func = "relay", stream, "stopped draining tus server output: {e}");
                    }
                    break;
                }
            }
        }
    })
}
