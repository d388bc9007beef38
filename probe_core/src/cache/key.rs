use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::io::Write;
use tracing::warn;

/// Field separator written between parts so that `("ab", "c")` and `("a", "bc")` differ.
const SEPARATOR: &[u8] = &[0x1f];

/// Derives a cache key from the `Display` form of each part.
///
/// Returns an empty string when a part cannot be rendered; callers treat an
/// empty key as "do not cache this call".
pub fn hash(parts: &[&dyn Display]) -> String {
    let mut hasher = Sha256::new();

    for part in parts {
        if let Err(e) = write!(hasher, "{}", part).and_then(|_| hasher.write_all(SEPARATOR)) {
            warn!("Failed to derive cache key, caching disabled for this call: {}", e);
            return String::new();
        }
    }

    format!("{:x}", hasher.finalize())
}

/// Renders positional query arguments so they can be fed to [`hash`].
pub fn render_args(args: &[serde_json::Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}
