use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Sibling copy of a configuration file at `<path>.<suffix>.bak`.
#[derive(Debug, Clone)]
pub struct Backup {
    target: PathBuf,
    path: PathBuf,
}

impl Backup {
    pub fn new(target: &Path, suffix: &str) -> Self {
        let mut path = target.as_os_str().to_owned();
        path.push(format!(".{suffix}.bak"));
        Self {
            target: target.to_path_buf(),
            path: PathBuf::from(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&self) -> Result<()> {
        fs::copy(&self.target, &self.path).with_context(|| {
            format!("failed to back up {} to {}", self.target.display(), self.path.display())
        })?;
        debug!("Backed up {} to {}", self.target.display(), self.path.display());
        Ok(())
    }

    /// Copy the backup over the target, unconditionally.
    pub fn restore(&self) -> Result<()> {
        fs::copy(&self.path, &self.target).with_context(|| {
            format!("failed to restore {} from {}", self.target.display(), self.path.display())
        })?;
        info!("Restored {} from backup", self.target.display());
        Ok(())
    }
}

/// Restore every backup, logging the ones that fail.
pub fn restore_all(backups: &[&Backup]) {
    for backup in backups {
        if let Err(e) = backup.restore() {
            error!("{e:#}");
        }
    }
}
