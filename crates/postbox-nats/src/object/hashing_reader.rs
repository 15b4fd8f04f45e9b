//! Reader adapter that digests and counts the bytes passing through it.

use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, ReadBuf};

pin_project! {
    /// Wraps an [`AsyncRead`] and feeds every byte read into a SHA-256 hasher.
    ///
    /// The object store pulls the payload through this reader, so the digest
    /// and length are available once the upload finishes.
    pub struct HashingReader<R> {
        #[pin]
        inner: R,
        hasher: Sha256,
        consumed: u64,
    }
}

impl<R> HashingReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            consumed: 0,
        }
    }

    /// Returns the number of bytes read so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Consumes the reader and returns the digest of everything read.
    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }

    /// Consumes the reader and returns the hex-encoded digest.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let start = buf.filled().len();

        let poll = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let chunk = &buf.filled()[start..];
            this.hasher.update(chunk);
            *this.consumed += chunk.len() as u64;
        }

        poll
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    #[test]
    fn untouched_reader_has_empty_digest() {
        let reader = HashingReader::new(&b""[..]);
        assert_eq!(reader.consumed(), 0);
        assert_eq!(reader.finalize_hex(), EMPTY_SHA256);
    }

    #[tokio::test]
    async fn digests_message_content() {
        let mut reader = HashingReader::new(&b"Hello, World!"[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, b"Hello, World!");
        assert_eq!(reader.consumed(), 13);
        assert_eq!(reader.finalize_hex(), HELLO_SHA256);
    }

    #[tokio::test]
    async fn partial_reads_produce_same_digest() {
        let mut reader = HashingReader::new(&b"Hello, World!"[..]);
        let mut chunk = [0u8; 4];
        while reader.read(&mut chunk).await.unwrap() > 0 {}

        assert_eq!(reader.consumed(), 13);
        assert_eq!(reader.finalize_hex(), HELLO_SHA256);
    }
}
