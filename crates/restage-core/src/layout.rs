use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The live Installation Root plus every sibling path the redeploy sequence
/// derives from it. The root's parent directory holds the backups, the
/// scratch fetch area, and the ephemeral handoff files, so all of them
/// survive the root itself being cleared and repopulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn install_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "install".to_string())
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone())
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.base_dir().join("backups")
    }

    pub fn backup_path(&self, stamp: &str) -> PathBuf {
        self.backups_dir()
            .join(format!("{}_{}", self.install_name(), stamp))
    }

    pub fn backup_manifest_path(&self, stamp: &str) -> PathBuf {
        self.backups_dir()
            .join(format!("{}_{}.json", self.install_name(), stamp))
    }

    pub fn scratch_base(&self) -> PathBuf {
        self.base_dir().join("downloading")
    }

    pub fn scratch_path(&self, suffix: u128) -> PathBuf {
        self.scratch_base()
            .join(format!("{}-{}", self.install_name(), suffix))
    }

    pub fn handoff_script_path(&self, suffix: u128) -> PathBuf {
        let extension = if cfg!(windows) { "ps1" } else { "sh" };
        self.base_dir().join(format!(
            "{}-handoff-{}.{}",
            self.install_name(),
            suffix,
            extension
        ))
    }

    pub fn sentinel_path(&self, suffix: u128) -> PathBuf {
        self.base_dir()
            .join(format!(".{}-exit-{}", self.install_name(), suffix))
    }

    pub fn marker_path(&self, entry_point: &str) -> PathBuf {
        self.root.join(entry_point)
    }

    /// Virtual-environment discovery: inside the root first, then the
    /// sibling convention, else none.
    pub fn discover_venv(&self, venv_dir: &str) -> Option<PathBuf> {
        let inside = self.root.join(venv_dir);
        if inside.is_dir() {
            return Some(inside);
        }
        let sibling = self.base_dir().join(venv_dir);
        if sibling.is_dir() {
            return Some(sibling);
        }
        None
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.backups_dir(), self.scratch_base()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
