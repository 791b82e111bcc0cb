//! Content fingerprinting for change detection.

use sha2::{Digest, Sha256};

/// Hex digest over a set of named fields.
///
/// Fields are sorted by name before serialization, so the order callers list
/// them in never affects the digest. Values are kept verbatim; callers pass
/// empty strings for missing optional fields.
pub fn fingerprint(fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = fields.to_vec();
    sorted.sort_by_key(|(name, _)| *name);

    let canonical = sorted
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("\u{1f}");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
