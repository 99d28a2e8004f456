use std::collections::HashMap;

/// Maps object ids to the session location the tus server issued for them.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    locations: HashMap<String, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `location` for `oid`, replacing (and returning) any earlier one.
    pub fn insert(&mut self, oid: &str, location: String) -> Option<String> {
        self.locations.insert(oid.to_string(), location)
    }

    pub fn get(&self, oid: &str) -> Option<&str> {
        self.locations.get(oid).map(String::as_str)
    }

    pub fn remove(&mut self, oid: &str) -> Option<String> {
        self.locations.remove(oid)
    }

    pub fn clear(&mut self) {
        self.locations.clear();
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Returns the upload file name encoded in a session location, i.e. its last
/// path segment. Segments that could leave the upload directory are rejected.
pub fn upload_file_name(location: &str) -> Option<&str> {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();

    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['\\', '\0']);
    if unsafe_name { None } else { Some(name) }
}

/// Name of the metadata sidecar tusd keeps next to each upload.
pub fn sidecar_file_name(name: &str) -> String {
    format!("{name}.info")
}
