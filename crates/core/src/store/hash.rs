//! Content digests for cached responses.

use sha2::{Digest, Sha256};

/// Strong entity tag for a response body.
///
/// Quoted, as it goes straight into an `ETag` header. Byte-identical bodies
/// always produce the same tag.
pub fn compute_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", hex::encode(&digest[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_stability() {
        assert_eq!(compute_etag(b"icon"), compute_etag(b"icon"));
    }

    #[test]
    fn test_etag_differs_by_body() {
        assert_ne!(compute_etag(b"icon-a"), compute_etag(b"icon-b"));
    }

    #[test]
    fn test_etag_format() {
        let tag = compute_etag(b"");
        assert_eq!(tag.len(), 34);
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert!(tag[1..33].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
