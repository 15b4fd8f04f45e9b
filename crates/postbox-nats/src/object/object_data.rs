//! Upload outcome.

/// Size and digest of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    size: u64,
    sha256_hex: String,
}

impl PutResult {
    pub(crate) fn new(size: u64, sha256_hex: String) -> Self {
        Self { size, sha256_hex }
    }

    /// Returns the stored size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the hex-encoded SHA-256 of the stored bytes.
    #[inline]
    pub fn sha256_hex(&self) -> &str {
        &self.sha256_hex
    }
}
