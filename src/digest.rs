//! Digest: SHA-1/-256/-512 of strings and file contents, hex encoded.
//!
//! SHA-1 backs the short, stable identifiers derived from paths and
//! artifact keys (plugin ids, resolved-executable file names); SHA-256
//! backs the incremental cache's content digests; SHA-512 is exposed for
//! completeness though nothing in this crate currently consumes it.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha512};

/// Hex-encodes `bytes` using lowercase digits, matching the hex form used
/// throughout the artifact-naming and cache-file conventions.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// `sha1(hex)` of a UTF-8 string, as used for artifact-key and path
/// identifiers (`id = sha1(path.toString()).hex`).
pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    sha1::Digest::update(&mut hasher, input.as_bytes());
    to_hex(&sha1::Digest::finalize(hasher))
}

/// `sha256(hex)` of a UTF-8 string (used for directory identity digests,
/// per §4.8: "SHA-256 of canonical path string for directories").
pub fn sha256_hex_str(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    to_hex(&hasher.finalize())
}

/// `sha512(hex)` of a UTF-8 string.
pub fn sha512_hex_str(input: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(input.as_bytes());
    to_hex(&hasher.finalize())
}

/// `sha256(hex)` of a file's contents, streamed in fixed-size chunks so
/// digesting large generated descriptor sets doesn't require loading them
/// wholesale into memory.
pub fn sha256_hex_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Digests either a regular file's contents or, for a directory, the
/// canonical path string (a cheap stand-in identity), matching §4.8's
/// digest algorithm used by the incremental cache.
pub fn content_digest(path: &Path) -> io::Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.is_dir() {
        Ok(sha256_hex_str(&path.to_string_lossy()))
    } else {
        sha256_hex_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_matches_known_vector() {
        // sha1("") == da39a3ee5e6b4b0d3255bfef95601890afd80709
        assert_eq!(sha1_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn sha256_matches_known_vector() {
        // sha256("") == e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        assert_eq!(
            sha256_hex_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_digest_roundtrips_with_string_digest_of_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.proto");
        std::fs::write(&path, b"hello").unwrap();
        let file_digest = sha256_hex_file(&path).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(b"hello");
        assert_eq!(file_digest, to_hex(&hasher.finalize()));
    }

    #[test]
    fn directory_digest_uses_path_not_contents() {
        let dir = tempfile::tempdir().unwrap();
        let digest = content_digest(dir.path()).unwrap();
        assert_eq!(digest, sha256_hex_str(&dir.path().to_string_lossy()));
    }
}
