use std::path::{Path, PathBuf};

use crate::storage::paths::PathManager;
use crate::storage::{ContentStore, MetaObject};
use crate::utils::validation::is_valid_oid;

use sha2::{Digest, Sha256};
use tokio::{
    fs::{File, create_dir_all, remove_file, rename, try_exists},
    io::{self, AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter},
};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Content-addressed store on a local filesystem, keyed by SHA-256 oid.
pub struct FilesystemContentStore {
    path_manager: PathManager,
}

impl FilesystemContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemContentStore {
            path_manager: PathManager::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.path_manager.root_path()
    }

    pub fn object_path(&self, oid: &str) -> io::Result<PathBuf> {
        if !is_valid_oid(oid) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid object id `{oid}`"),
            ));
        }
        Ok(self.path_manager.object_path(oid))
    }

    pub async fn exists(&self, oid: &str) -> io::Result<bool> {
        try_exists(self.object_path(oid)?).await
    }

    async fn crate_path(&self, path: PathBuf) -> io::Result<PathBuf> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        Ok(path)
    }

    /// Copies `data` to `staging`, returning the byte count and hex digest.
    async fn write_staged(
        &self,
        staging: &Path,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> io::Result<(u64, String)> {
        let mut writer = BufWriter::new(File::create(staging).await?);
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let n = data.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            writer.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        writer.flush().await?;
        writer.get_ref().sync_all().await?;

        Ok((written, hex::encode(hasher.finalize())))
    }
}

#[async_trait::async_trait]
impl ContentStore for FilesystemContentStore {
    async fn put(
        &self,
        meta: &MetaObject,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> io::Result<()> {
        let object_path = self.object_path(&meta.oid)?;
        let staging = self
            .crate_path(self.path_manager.staging_path(&meta.oid))
            .await?;

        let result = async {
            let (written, digest) = self.write_staged(&staging, data).await?;
            if written != meta.size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("size mismatch: expected {}, got {written}", meta.size),
                ));
            }
            if digest != meta.oid {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("content hash mismatch: expected {}, got {digest}", meta.oid),
                ));
            }

            let object_path = self.crate_path(object_path).await?;
            rename(&staging, &object_path).await
        }
        .await;

        if result.is_err() {
            if let Err(e) = remove_file(&staging).await {
                tracing::warn!("Failed to remove staging file {:?}: {e}", staging);
            }
        }
        result
    }
}
