//! Send fingerprints.

use sha2::{Digest, Sha256};

/// Compute the duplicate-detection key for one send: hex SHA-256 over
/// `recipient`, a `:` separator, and the exact rendered message.
///
/// The recipient is a normalized phone (`+` and digits only), so `:` can
/// never appear in it and characters cannot be reassigned across the
/// boundary. The key is intentionally blind to send time and image content:
/// the same text with a different attachment still counts as already sent.
pub fn fingerprint(recipient: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(recipient.as_bytes());
    hasher.update(b":");
    hasher.update(message.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
