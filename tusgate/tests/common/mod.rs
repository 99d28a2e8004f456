#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::io::{self, AsyncRead, AsyncReadExt};
use tusgate::config::TusConfig;
use tusgate::storage::{ContentStore, MetaObject};

pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn tus_config(addr: SocketAddr, data_root: &Path) -> TusConfig {
    TusConfig {
        listen: addr.to_string(),
        ext_origin: Some(format!("http://{addr}")),
        data_root: data_root.to_path_buf(),
        ready_timeout: Duration::from_secs(5),
        ..TusConfig::default()
    }
}

/// Counts how many critical sections are active at once.
#[derive(Default)]
pub struct Tracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
    entered: AtomicUsize,
}

impl Tracker {
    pub async fn section(&self, hold: Duration) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.entered.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

/// Stand-in for the tus control API.
pub struct StubTus {
    pub status: StatusCode,
    pub location: Option<String>,
    pub requests: Mutex<Vec<HeaderMap>>,
    pub tracker: Option<Arc<Tracker>>,
    pub delay: Option<Duration>,
    created: AtomicUsize,
}

impl StubTus {
    pub fn new(status: StatusCode, location: Option<&str>) -> Self {
        StubTus {
            status,
            location: location.map(str::to_string),
            requests: Mutex::new(Vec::new()),
            tracker: None,
            delay: None,
            created: AtomicUsize::new(0),
        }
    }

    /// Answers 201 with a fresh `Location` per request.
    pub fn sequential(tracker: Arc<Tracker>) -> Self {
        StubTus {
            tracker: Some(tracker),
            ..StubTus::new(StatusCode::CREATED, None)
        }
    }

    /// Holds every create request for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/files/", post(create_file).options(probe_files))
            .with_state(self)
    }

    pub fn requests(&self) -> Vec<HeaderMap> {
        self.requests.lock().unwrap().clone()
    }
}

async fn probe_files(State(stub): State<Arc<StubTus>>) -> StatusCode {
    if let Some(tracker) = &stub.tracker {
        tracker.section(Duration::from_millis(50)).await;
    }
    StatusCode::NO_CONTENT
}

async fn create_file(State(stub): State<Arc<StubTus>>, headers: HeaderMap) -> impl IntoResponse {
    stub.requests.lock().unwrap().push(headers);
    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(tracker) = &stub.tracker {
        tracker.section(Duration::from_millis(20)).await;
    }

    let n = stub.created.fetch_add(1, Ordering::SeqCst);
    let location = match &stub.location {
        Some(location) => Some(location.clone()),
        None if stub.tracker.is_some() => Some(format!("http://host/files/upload{n}")),
        None => None,
    };

    let mut response = HeaderMap::new();
    if let Some(location) = location {
        response.insert("location", location.parse().unwrap());
    }
    (stub.status, response)
}

/// Content store that keeps everything it is given in memory.
#[derive(Default)]
pub struct RecordingStore {
    pub puts: Mutex<Vec<(MetaObject, Vec<u8>)>>,
    pub fail: bool,
    pub tracker: Option<Arc<Tracker>>,
}

impl RecordingStore {
    pub fn failing() -> Self {
        RecordingStore {
            fail: true,
            ..RecordingStore::default()
        }
    }

    pub fn puts(&self) -> Vec<(MetaObject, Vec<u8>)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContentStore for RecordingStore {
    async fn put(
        &self,
        meta: &MetaObject,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> io::Result<()> {
        if let Some(tracker) = &self.tracker {
            tracker.section(Duration::from_millis(20)).await;
        }
        if self.fail {
            return Err(io::Error::other("store unavailable"));
        }
        let mut buf = Vec::new();
        data.read_to_end(&mut buf).await?;
        self.puts.lock().unwrap().push((meta.clone(), buf));
        Ok(())
    }
}

/// Collects formatted log output of the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        let output = self.0.lock().unwrap();
        String::from_utf8_lossy(&output)
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writes a finished upload and its sidecar the way tusd leaves them.
pub fn write_upload(data_dir: &Path, name: &str, content: &[u8]) -> (PathBuf, PathBuf) {
    std::fs::create_dir_all(data_dir).unwrap();
    let data = data_dir.join(name);
    let info = data_dir.join(format!("{name}.info"));
    std::fs::write(&data, content).unwrap();
    std::fs::write(&info, br#"{"ID":"upload","Size":10}"#).unwrap();
    (data, info)
}

/// Shell script standing in for the tusd binary. Every launch appends its
/// arguments to `<dir>/launches`.
#[cfg(unix)]
pub fn fake_tusd(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-tusd");
    let launches = dir.join("launches");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\necho \"tusd listening\"\necho \"tusd warming up\" >&2\nexec sleep 60\n",
            launches.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// Stand-in for a tusd binary that exits right away with `code`.
#[cfg(unix)]
pub fn exiting_tusd(dir: &Path, code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("exiting-tusd");
    std::fs::write(&script, format!("#!/bin/sh\necho \"bad flag\" >&2\nexit {code}\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

pub fn launches(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("launches"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Waits until the fake tusd has recorded `count` launches and returns them.
pub async fn wait_for_launches(dir: &Path, count: usize) -> Vec<String> {
    for _ in 0..100 {
        let launched = launches(dir);
        if launched.len() >= count {
            return launched;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    launches(dir)
}
