//! # Checksum Scanner
//!
//! Repairs missing sidecars and removes compound checksums.
//!
//! A key needs work only when at least one of `<key>.sha1` and `<key>.md5`
//! is absent. In that case the object is read once and both digests are
//! computed from the same bytes; only the missing sidecars are written.
//! Existing sidecars are never rewritten.

use depot_core::{
    has_checksum_suffix, is_compound_checksum, ArtifactKey, ChecksumAccumulator, Checksums,
};
use depot_store::{KeyStore, StoreError};
use tokio::io::AsyncReadExt;

use crate::error::IntegrityError;

const READ_BUFFER: usize = 64 * 1024;

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Artifact keys inspected.
    pub examined: usize,
    /// Keys that received at least one new sidecar.
    pub repaired: usize,
    /// Keys whose repair failed; they are retried on the next scan.
    pub failed: usize,
    /// Compound checksum objects deleted.
    pub removed: usize,
}

/// Sidecar maintenance over one store prefix.
#[derive(Debug, Clone)]
pub struct ChecksumIntegrity {
    store: KeyStore,
    prefix: String,
}

impl ChecksumIntegrity {
    /// Scanner over `prefix` (empty for the whole store).
    pub fn new(store: KeyStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Write missing sidecars for every artifact under `prefix`.
    ///
    /// Keys are handled page by page as the listing returns them, so memory
    /// stays bounded by one page. Directory markers and checksum files
    /// themselves are skipped. A failure on one key is logged and counted;
    /// listing failures abort.
    pub async fn generate_checksums(&self, prefix: &str) -> Result<ScanReport, IntegrityError> {
        let mut report = ScanReport::default();
        let mut token: Option<String> = None;
        loop {
            let page = self.store.scan(prefix, token.as_deref()).await?;
            for raw in &page.keys {
                if raw.ends_with('/') || has_checksum_suffix(raw) {
                    continue;
                }
                let Ok(key) = ArtifactKey::parse(raw) else {
                    continue;
                };
                report.examined += 1;
                match self.ensure_checksums(&key).await {
                    Ok(true) => report.repaired += 1,
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "checksum repair failed");
                        report.failed += 1;
                    }
                }
            }
            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(report),
            }
        }
    }

    /// Write whichever sidecars are missing. Returns whether anything was
    /// written.
    async fn ensure_checksums(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        let sha1 = key.sha1_sidecar();
        let md5 = key.md5_sidecar();
        let needs_sha1 = !self.store.exists(sha1.as_str()).await?;
        let needs_md5 = !self.store.exists(md5.as_str()).await?;
        if !needs_sha1 && !needs_md5 {
            return Ok(false);
        }

        let sums = self.digest(key).await?;
        if needs_sha1 {
            self.store.write_sidecar(&sha1, &sums.sha1).await?;
        }
        if needs_md5 {
            self.store.write_sidecar(&md5, &sums.md5).await?;
        }
        tracing::debug!(key = %key, sha1 = needs_sha1, md5 = needs_md5, "wrote missing checksums");
        Ok(true)
    }

    async fn digest(&self, key: &ArtifactKey) -> Result<Checksums, StoreError> {
        let mut object = self.store.get(key.as_str()).await?;
        let mut acc = ChecksumAccumulator::new();
        let mut buf = vec![0u8; READ_BUFFER];
        loop {
            let n = object.body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            acc.update(&buf[..n]);
        }
        Ok(acc.finalize())
    }

    /// Delete every checksum-of-a-checksum under `prefix`, page by page.
    pub async fn cleanup_bad_checksums(&self, prefix: &str) -> Result<usize, IntegrityError> {
        let mut removed = 0;
        let mut token: Option<String> = None;
        loop {
            let page = self.store.scan(prefix, token.as_deref()).await?;
            for key in page.keys.iter().filter(|k| is_compound_checksum(k)) {
                self.store.delete(key).await?;
                tracing::info!(key = %key, "removed compound checksum");
                removed += 1;
            }
            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(removed),
            }
        }
    }

    /// One full maintenance pass over the configured prefix: cleanup, then
    /// generation.
    pub async fn run(&self) -> Result<ScanReport, IntegrityError> {
        let removed = self.cleanup_bad_checksums(&self.prefix).await?;
        let mut report = self.generate_checksums(&self.prefix).await?;
        report.removed = removed;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_store::MemoryBackend;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn scanner(backend: &Arc<MemoryBackend>, prefix: &str) -> ChecksumIntegrity {
        ChecksumIntegrity::new(KeyStore::new(backend.clone(), "root"), prefix)
    }

    #[tokio::test]
    async fn generates_missing_sidecars_only() {
        let backend = Arc::new(MemoryBackend::new().with_page_size(2));
        backend.insert("root/a/x.jar", "xxx", "application/java-archive");
        backend.insert("root/a/y.jar", "yyy", "application/java-archive");
        backend.insert("root/a/y.jar.sha1", "keep-me", "text/plain");
        backend.insert("root/a/dir/", "", "application/x-directory");

        let report = scanner(&backend, "").generate_checksums("").await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.failed, 0);

        let x = Checksums::of(b"xxx");
        assert_eq!(backend.object("root/a/x.jar.sha1").unwrap().as_ref(), x.sha1.as_bytes());
        assert_eq!(backend.object("root/a/x.jar.md5").unwrap().as_ref(), x.md5.as_bytes());
        assert_eq!(backend.object("root/a/y.jar.sha1").unwrap().as_ref(), b"keep-me");
        assert_eq!(
            backend.object("root/a/y.jar.md5").unwrap().as_ref(),
            Checksums::of(b"yyy").md5.as_bytes()
        );
        assert!(!backend.contains("root/a/dir/.sha1"));
    }

    #[tokio::test]
    async fn complete_keys_are_not_read() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("root/x.jar", "x", "t");
        backend.insert("root/x.jar.sha1", "s", "text/plain");
        backend.insert("root/x.jar.md5", "m", "text/plain");
        let report = scanner(&backend, "").generate_checksums("").await.unwrap();
        assert_eq!(report.repaired, 0);
        assert_eq!(backend.calls().get.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls().put.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cleanup_removes_compound_checksums() {
        let backend = Arc::new(MemoryBackend::new());
        for key in [
            "root/file.jar",
            "root/file.jar.sha1",
            "root/file.jar.md5",
            "root/file.jar.sha1.sha1",
            "root/file.jar.sha1.md5",
            "root/file.jar.md5.sha1",
            "root/file.jar.md5.md5",
            "root/file.jar.SHA1.sha1",
        ] {
            backend.insert(key, "x", "text/plain");
        }
        let removed = scanner(&backend, "").cleanup_bad_checksums("").await.unwrap();
        assert_eq!(removed, 5);
        assert_eq!(
            backend.keys(),
            vec!["root/file.jar", "root/file.jar.md5", "root/file.jar.sha1"]
        );
    }

    #[tokio::test]
    async fn work_proceeds_page_by_page() {
        let backend = Arc::new(MemoryBackend::new().with_page_size(2));
        for i in 0..5 {
            backend.insert(&format!("root/lib/{i}.jar"), format!("v{i}"), "t");
            backend.insert(&format!("root/lib/{i}.jar.sha1.sha1"), "x", "text/plain");
        }
        let scan = scanner(&backend, "");

        let removed = scan.cleanup_bad_checksums("").await.unwrap();
        assert_eq!(removed, 5);
        let report = scan.generate_checksums("").await.unwrap();
        assert_eq!(report.examined, 5);
        assert_eq!(report.repaired, 5);

        for i in 0..5 {
            assert!(!backend.contains(&format!("root/lib/{i}.jar.sha1.sha1")));
            assert_eq!(
                backend.object(&format!("root/lib/{i}.jar.md5")).unwrap().as_ref(),
                Checksums::of(format!("v{i}").as_bytes()).md5.as_bytes()
            );
        }
        // Several small pages were requested rather than one full listing.
        assert!(backend.calls().list.load(Ordering::SeqCst) >= 6);
    }

    #[tokio::test]
    async fn run_is_scoped_to_prefix() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("root/in/a.jar", "a", "t");
        backend.insert("root/in/a.jar.md5.md5", "x", "t");
        backend.insert("root/out/b.jar", "b", "t");
        let report = scanner(&backend, "in").run().await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.repaired, 1);
        assert!(backend.contains("root/in/a.jar.sha1"));
        assert!(!backend.contains("root/out/b.jar.sha1"));
    }
}
