//! Resource driver abstraction - where task outputs and exports are stored.
//!
//! The executor writes to sink paths relative to the run's output location.
//! The driver maps them to physical storage. Today: a local directory.

use async_trait::async_trait;
use docweave_core::Result;
use std::path::{Path, PathBuf};

/// Pluggable output store. Code writes here; backend decides where it goes.
#[async_trait]
pub trait ResourceDriver: Send + Sync {
    /// Make the location exist and remove files left by a previous run.
    /// Returns the number of files removed.
    async fn prepare(&self) -> Result<usize>;

    /// Write (or overwrite) one sink. Returns the physical path written.
    async fn write(&self, sink: &Path, content: &[u8]) -> Result<PathBuf>;

    /// Read a sink back.
    async fn read(&self, sink: &Path) -> Result<Vec<u8>>;

    /// Physical path/URI for the whole run (for human inspection).
    fn location(&self) -> String;
}

/// Local filesystem driver - writes into one flat output directory.
pub struct LocalFsDriver {
    base_dir: PathBuf,
}

impl LocalFsDriver {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, sink: &Path) -> PathBuf {
        self.base_dir.join(sink)
    }
}

#[async_trait]
impl ResourceDriver for LocalFsDriver {
    async fn prepare(&self) -> Result<usize> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        // Only regular files at the top level; directories someone put here are left alone.
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(dir = %self.base_dir.display(), removed, "cleared stale outputs");
        }
        Ok(removed)
    }

    async fn write(&self, sink: &Path, content: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(sink);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        tracing::debug!("wrote {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }

    async fn read(&self, sink: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_of(sink)).await?)
    }

    fn location(&self) -> String {
        self.base_dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_fs_write_read() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = LocalFsDriver::new(tmp.path());

        let path = driver
            .write(Path::new("01_requirements.txt"), b"hello world")
            .await
            .unwrap();
        assert_eq!(path, tmp.path().join("01_requirements.txt"));
        let read_back = driver.read(Path::new("01_requirements.txt")).await.unwrap();
        assert_eq!(read_back, b"hello world");
    }

    #[tokio::test]
    async fn prepare_creates_and_clears() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("outputs");
        let driver = LocalFsDriver::new(&out);

        assert_eq!(driver.prepare().await.unwrap(), 0);
        assert!(out.is_dir());

        std::fs::write(out.join("stale.txt"), "old").unwrap();
        std::fs::create_dir(out.join("keep")).unwrap();
        assert_eq!(driver.prepare().await.unwrap(), 1);
        assert!(!out.join("stale.txt").exists());
        assert!(out.join("keep").is_dir());
    }

    #[tokio::test]
    async fn read_missing_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = LocalFsDriver::new(tmp.path());
        let err = driver.read(Path::new("nope.txt")).await.unwrap_err();
        assert!(matches!(err, docweave_core::Error::Io(_)));
    }
}
