//! Executable-relative path resolution and directory materialization.

use anyhow::{anyhow, Context, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::ServiceConfig;

/// Directory containing the running executable.
pub fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot determine executable path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable path '{}' has no parent directory", exe.display()))
}

/// Resolves `path` against `base` when relative, then normalizes away
/// `.` and `..` components.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Configured paths resolved against the executable directory.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub log_dir: PathBuf,
    pub database_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ResolvedPaths {
    pub fn from_config(base: &Path, config: &ServiceConfig) -> Self {
        Self {
            log_dir: resolve(base, &config.log_path),
            database_path: resolve(base, &config.database_path),
            data_dir: resolve(base, &config.custom_data_path),
        }
    }

    /// Creates the log, database, and data directories.
    pub fn materialize(&self) -> Result<()> {
        let database_dir = self
            .database_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.database_path.clone());

        for dir in [&self.log_dir, &database_dir, &self.data_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
            debug!("directory ready: {}", dir.display());
        }
        Ok(())
    }
}
