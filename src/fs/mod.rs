/// File system seam for commands that lay out a working directory.
///
/// `init` writes configuration and creates the data directories through
/// [`FileSystemOperations`], so its conflict handling can be tested with
/// `MockFileSystemOperations` instead of touching disk.
use anyhow::Result;
use std::path::Path;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait FileSystemOperations: Send + Sync {
    /// Create a directory and all missing parents
    async fn create_dir_all(&self, path: &str) -> Result<()>;

    /// Write `contents` to `path`, replacing any existing file
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()>;

    fn exists(&self, path: &str) -> bool;
}

/// Production implementation backed by `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFileSystem;

#[async_trait::async_trait]
impl FileSystemOperations for StandardFileSystem {
    async fn create_dir_all(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}
