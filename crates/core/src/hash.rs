use sha2::{Digest, Sha256};

/// Incremental SHA-256 over an artifact that is read or written in chunks.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    digest: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Total number of bytes fed in so far.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes
    }

    /// Lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.digest.finalize())
    }
}

/// Lowercase hex SHA-256 of a buffer already in memory.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(content);
    hasher.finish()
}
