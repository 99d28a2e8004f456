use regex::Regex;
use std::sync::LazyLock;

static OID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{64}$").expect("oid pattern is valid"));

/// An oid is the lowercase hex SHA-256 of the object's content.
pub fn is_valid_oid(oid: &str) -> bool {
    OID_RE.is_match(oid)
}
