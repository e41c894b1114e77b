use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use restage_core::{SourceConfig, SourceKind};

use crate::fs_ops::copy_dir_recursive;
use crate::git_ops::run_git_clone;

/// Produce a complete working copy of the canonical source at `scratch`.
/// A stale scratch directory from an earlier failed attempt is removed
/// first; on any failure the scratch directory is removed again before the
/// error returns, so the caller never sees a half-fetched tree.
pub fn fetch_source(source: &SourceConfig, scratch: &Path, timeout: Duration) -> Result<()> {
    if scratch.exists() {
        fs::remove_dir_all(scratch).with_context(|| {
            format!("failed clearing stale scratch directory {}", scratch.display())
        })?;
    }
    if let Some(parent) = scratch.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating scratch base {}", parent.display()))?;
    }

    let fetch_result = match source.kind {
        SourceKind::Git => run_git_clone(&source.location, &source.branch, scratch, timeout),
        SourceKind::Filesystem => copy_from_filesystem(&source.location, scratch),
    };

    if let Err(err) = fetch_result {
        let _ = fs::remove_dir_all(scratch);
        return Err(err);
    }

    log::info!("fetched {} into {}", source.location, scratch.display());
    Ok(())
}

fn copy_from_filesystem(location: &str, scratch: &Path) -> Result<()> {
    let source_path = Path::new(location);
    if !source_path.exists() {
        anyhow::bail!("source path does not exist: {}", source_path.display());
    }
    copy_dir_recursive(source_path, scratch, &[])
        .with_context(|| format!("failed copying source from {}", source_path.display()))
}
