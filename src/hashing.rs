use sha2::{Digest, Sha256};

/// Content-addressed cache key: lowercase hex SHA-256 of the raw bytes.
///
/// The same function is used for text (UTF-8 bytes) and audio buffers; the two
/// resulting key spaces are never mixed.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn text_hash(text: &str) -> String {
    content_hash(text.as_bytes())
}
