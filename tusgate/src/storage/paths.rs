// PathManager maps object ids onto the content store layout.
//
// The path layout under the store root is as follows:
//
//	<root>
//	├── <oid[0..2]>
//	│   └── <oid[2..4]>
//	│       └── <oid>
//	└── tmp
//	    └── <oid>-<uuid>
//
// Objects are written under `tmp` first and renamed into place once their
// size and digest have been checked, so a reader never sees a partial object.

use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct PathManager {
    root_path: PathBuf,
}

impl PathManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PathManager {
            root_path: root.into(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Returns the path of a stored object,
    /// (e.g. `<root>/ab/cd/abcd...`).
    pub fn object_path(&self, oid: &str) -> PathBuf {
        self.root_path.join(&oid[..2]).join(&oid[2..4]).join(oid)
    }

    /// Returns the root of in-flight writes, (e.g. `<root>/tmp`).
    pub fn tmp_path(&self) -> PathBuf {
        self.root_path.join("tmp")
    }

    /// Returns a unique staging path for a write of `oid`,
    /// (e.g. `<root>/tmp/<oid>-<uuid>`).
    pub fn staging_path(&self, oid: &str) -> PathBuf {
        self.tmp_path()
            .join(format!("{oid}-{}", uuid::Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393";

    #[test]
    fn test_object_path_is_split_by_prefix() {
        let paths = PathManager::new("/var/lib/tusgate");
        assert_eq!(
            paths.object_path(OID),
            PathBuf::from(format!("/var/lib/tusgate/4d/7a/{OID}"))
        );
    }

    #[test]
    fn test_staging_paths_are_unique() {
        let paths = PathManager::new("/var/lib/tusgate");
        let first = paths.staging_path(OID);
        let second = paths.staging_path(OID);
        assert_ne!(first, second);
        assert!(first.starts_with("/var/lib/tusgate/tmp"));
    }
}
