/// Init command: lays out a working directory for MantenTask.
///
/// `mantentask.toml` is only written when missing, unless `--force` is given.
/// The report and outbox directories are always created, and the database is
/// opened once so migrations run before the first real command.
use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::MantenTaskConfig;
use crate::fs::{FileSystemOperations, StandardFileSystem};

pub const CONFIG_FILE: &str = "mantentask.toml";

pub struct InitCommand {
    pub force: bool,
    pub dry_run: bool,
    fs_ops: Arc<dyn FileSystemOperations>,
}

impl InitCommand {
    pub fn new(force: bool, dry_run: bool) -> Self {
        Self::with_fs(force, dry_run, Arc::new(StandardFileSystem))
    }

    pub fn with_fs(force: bool, dry_run: bool, fs_ops: Arc<dyn FileSystemOperations>) -> Self {
        Self {
            force,
            dry_run,
            fs_ops,
        }
    }

    /// Directories the configuration expects to exist
    fn directories(config: &MantenTaskConfig) -> Vec<String> {
        let mut dirs = vec![
            config.documents.output_dir.clone(),
            config.notifications.outbox_dir.clone(),
        ];
        if let Some(db) = &config.database {
            if let Some(parent) = sqlite_parent_dir(&db.url) {
                dirs.push(parent);
            }
        }
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Write configuration and directories. Returns the paths touched.
    pub async fn prepare(&self, config: &MantenTaskConfig) -> Result<Vec<String>> {
        if self.fs_ops.exists(CONFIG_FILE) && !self.force {
            return Err(anyhow!(
                "Configuration file {} already exists. Use --force to overwrite.",
                CONFIG_FILE
            ));
        }

        let mut touched = vec![CONFIG_FILE.to_string()];
        touched.extend(Self::directories(config));

        if self.dry_run {
            for path in &touched {
                println!("Would create: {path}");
            }
            return Ok(touched);
        }

        for dir in &touched[1..] {
            self.fs_ops
                .create_dir_all(dir)
                .await
                .map_err(|e| anyhow!("Failed to create directory {}: {}", dir, e))?;
        }

        let toml_content = toml::to_string_pretty(config)?;
        self.fs_ops
            .write(CONFIG_FILE, toml_content.as_bytes())
            .await?;
        Ok(touched)
    }

    pub async fn execute(&self, config: &MantenTaskConfig) -> Result<()> {
        let touched = self.prepare(config).await?;
        if self.dry_run {
            return Ok(());
        }
        for path in &touched {
            println!("Created {path}");
        }

        #[cfg(feature = "database")]
        if let Some(db_config) = &config.database {
            let manager = crate::database::DatabaseManager::new(db_config).await?;
            println!("Database ready at {}", db_config.url);
            manager.shutdown().await;
        }

        println!();
        println!("Next: 'mantentask seed' loads sample data.");
        Ok(())
    }
}

/// Directory holding a file-backed SQLite database, if any
fn sqlite_parent_dir(url: &str) -> Option<String> {
    if url.contains(":memory:") {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    let parent = Path::new(path).parent()?;
    if parent.as_os_str().is_empty() {
        None
    } else {
        Some(parent.to_string_lossy().to_string())
    }
}
