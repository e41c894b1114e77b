use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use restage_core::{collect_relative_file_paths, InstallLayout};

use crate::fs_ops::{copy_dir_recursive, current_unix_timestamp};

/// Subtrees never worth snapshotting: version-control metadata, bytecode
/// caches, the virtual environment. Applied at every depth.
pub const BACKUP_EXCLUDED_DIRS: &[&str] = &[".git", "__pycache__", "venv"];

#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub path: PathBuf,
    pub stamp: String,
    pub file_count: u64,
}

#[derive(Debug, Serialize)]
struct BackupManifestFile {
    version: u32,
    source_root: String,
    backup_path: String,
    file_count: u64,
    created_at_unix: u64,
}

/// Full timestamped copy of the Installation Root into the sibling backups
/// directory. A failed copy leaves whatever partial snapshot exists in place
/// for operator inspection; snapshots are never auto-deleted.
pub fn stage_backup(layout: &InstallLayout) -> Result<BackupSnapshot> {
    if !layout.root().is_dir() {
        anyhow::bail!(
            "installation root does not exist: {}",
            layout.root().display()
        );
    }

    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = layout.backup_path(&stamp);
    if backup_path.exists() {
        anyhow::bail!(
            "backup destination already exists: {}",
            backup_path.display()
        );
    }
    fs::create_dir_all(layout.backups_dir()).with_context(|| {
        format!(
            "failed creating backups directory {}",
            layout.backups_dir().display()
        )
    })?;

    copy_dir_recursive(layout.root(), &backup_path, BACKUP_EXCLUDED_DIRS).with_context(|| {
        format!(
            "failed backing up {} to {}",
            layout.root().display(),
            backup_path.display()
        )
    })?;

    let file_count = collect_relative_file_paths(&backup_path)?.len() as u64;
    write_backup_manifest(layout, &stamp, &backup_path, file_count)?;

    log::info!(
        "backed up {} files from {} to {}",
        file_count,
        layout.root().display(),
        backup_path.display()
    );
    Ok(BackupSnapshot {
        path: backup_path,
        stamp,
        file_count,
    })
}

fn write_backup_manifest(
    layout: &InstallLayout,
    stamp: &str,
    backup_path: &std::path::Path,
    file_count: u64,
) -> Result<()> {
    let manifest_path = layout.backup_manifest_path(stamp);
    let manifest = BackupManifestFile {
        version: 1,
        source_root: layout.root().display().to_string(),
        backup_path: backup_path.display().to_string(),
        file_count,
        created_at_unix: current_unix_timestamp(),
    };
    let content = serde_json::to_string_pretty(&manifest).with_context(|| {
        format!(
            "failed serializing backup manifest {}",
            manifest_path.display()
        )
    })?;
    fs::write(&manifest_path, content).with_context(|| {
        format!("failed writing backup manifest {}", manifest_path.display())
    })
}
