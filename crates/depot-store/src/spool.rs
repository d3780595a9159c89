//! # Upload Spool
//!
//! Bodies arriving from clients or upstream repositories are not seekable
//! and have no digest yet. A [`Spool`] writes them into an anonymous
//! temporary file while feeding the same bytes to a
//! [`ChecksumAccumulator`], so one pass yields a rewindable body, its
//! length, and both digests. The file is unlinked at creation and vanishes
//! when the handle is dropped.

use std::io::SeekFrom;

use depot_core::{ChecksumAccumulator, Checksums};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::StoreError;

const COPY_BUFFER: usize = 64 * 1024;

/// Temporary file being filled and hashed.
#[derive(Debug)]
pub struct Spool {
    file: File,
    len: u64,
    hasher: ChecksumAccumulator,
}

/// A fully spooled body, positioned at its start.
#[derive(Debug)]
pub struct SpooledBody {
    /// Rewound temporary file.
    pub file: File,
    /// Bytes written.
    pub len: u64,
    /// Digests of the written bytes.
    pub checksums: Checksums,
}

impl Spool {
    /// Create an anonymous temporary file.
    pub async fn new() -> Result<Self, StoreError> {
        let std_file = tokio::task::spawn_blocking(tempfile::tempfile)
            .await
            .map_err(std::io::Error::other)??;
        Ok(Self {
            file: File::from_std(std_file),
            len: 0,
            hasher: ChecksumAccumulator::new(),
        })
    }

    /// Append a chunk.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.hasher.update(chunk);
        self.file.write_all(chunk).await?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Append everything `reader` yields. Returns the bytes copied.
    pub async fn copy_from<R>(&mut self, reader: &mut R) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; COPY_BUFFER];
        let mut copied = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.write(&buf[..n]).await?;
            copied += n as u64;
        }
        Ok(copied)
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flush, rewind, and hand over the body with its digests.
    pub async fn finish(mut self) -> Result<SpooledBody, StoreError> {
        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(SpooledBody {
            file: self.file,
            len: self.len,
            checksums: self.hasher.finalize(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spool_hashes_and_rewinds() {
        let mut spool = Spool::new().await.unwrap();
        spool.write(b"hello ").await.unwrap();
        let mut rest: &[u8] = b"world";
        spool.copy_from(&mut rest).await.unwrap();
        assert_eq!(spool.len(), 11);

        let mut body = spool.finish().await.unwrap();
        assert_eq!(body.len, 11);
        assert_eq!(body.checksums, Checksums::of(b"hello world"));

        let mut read_back = String::new();
        body.file.read_to_string(&mut read_back).await.unwrap();
        assert_eq!(read_back, "hello world");
    }

    #[tokio::test]
    async fn empty_spool() {
        let spool = Spool::new().await.unwrap();
        assert!(spool.is_empty());
        let body = spool.finish().await.unwrap();
        assert_eq!(body.checksums.md5, "d41d8cd98f00b204e9800998ecf8427e");
    }
}
