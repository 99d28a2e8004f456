use serde::{Deserialize, Serialize};
use tokio::io::{self, AsyncRead};

pub mod driver;
pub mod paths;

/// Describes an object being handed to a [`ContentStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaObject {
    pub oid: String,
    pub size: u64,
    /// Whether the store already held the object before this write.
    pub existing: bool,
}

impl MetaObject {
    pub fn new(oid: impl Into<String>, size: u64) -> Self {
        Self {
            oid: oid.into(),
            size,
            existing: false,
        }
    }
}

/// Durable destination for finished uploads.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Streams `data` into the store under `meta.oid`.
    async fn put(
        &self,
        meta: &MetaObject,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> io::Result<()>;
}
