use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Read buffer used when streaming file content into the hasher
const CHUNK_SIZE: usize = 65536;

/// SHA-256 of raw bytes, hex-encoded
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of a file's content, streamed through a fixed buffer.
///
/// Never memory-mapped: a file truncated mid-read (`copytruncate` log
/// rotation) ends the read early instead of faulting.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    hash_reader(file)
}

/// Feed `reader` into SHA-256 until end of input
fn hash_reader(mut reader: impl Read) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Whether `value` looks like a hex SHA-256 digest
#[must_use]
pub fn is_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hash_bytes() {
        let data = b"Hello, World!";
        let hash1 = hash_bytes(data);
        let hash2 = hash_bytes(data);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), DIGEST_HEX_LEN);

        let different_data = b"Different data";
        let hash3 = hash_bytes(different_data);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");
        let content = "Test content for hashing";
        std::fs::write(&file_path, content)?;

        let hash = hash_file(&file_path)?;
        assert_eq!(hash, hash_bytes(content.as_bytes()));
        Ok(())
    }

    #[test]
    fn test_large_file_spans_chunks() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("large.bin");
        let content = vec![0xABu8; CHUNK_SIZE * 3 + 17];
        std::fs::write(&file_path, &content)?;

        assert_eq!(hash_file(&file_path)?, hash_bytes(&content));
        Ok(())
    }

    #[test]
    fn test_file_truncated_while_hashing() -> Result<()> {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let dir = tempdir()?;
        let file_path = dir.path().join("rotating.log");
        let content = vec![b'x'; 8 * 1024 * 1024];
        std::fs::write(&file_path, &content)?;

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let stop = Arc::clone(&stop);
            let file_path = file_path.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Ok(file) = std::fs::OpenOptions::new().write(true).open(&file_path) {
                        let _ = file.set_len(0);
                    }
                    let _ = std::fs::write(&file_path, &content);
                }
            })
        };

        // Every attempt returns, whatever the file looked like at the time
        for _ in 0..50 {
            if let Ok(digest) = hash_file(&file_path) {
                assert!(is_digest(&digest));
            }
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(hash_file(Path::new("/nonexistent/file")).is_err());
    }

    #[test]
    fn test_is_digest() {
        assert!(is_digest(&hash_bytes(b"x")));
        assert!(!is_digest("TOO_LARGE"));
        assert!(!is_digest(&"g".repeat(DIGEST_HEX_LEN)));
    }
}
