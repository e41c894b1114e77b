use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

/// Recursive copy, skipping any entry whose name appears in `excluded` at
/// any depth. A pre-existing destination is cleared first.
pub(crate) fn copy_dir_recursive(
    source_root: &Path,
    destination_root: &Path,
    excluded: &[&str],
) -> Result<()> {
    if !source_root.is_dir() {
        anyhow::bail!(
            "source location is not a directory: {}",
            source_root.display()
        );
    }

    if destination_root.exists() {
        fs::remove_dir_all(destination_root).with_context(|| {
            format!(
                "failed clearing destination directory {}",
                destination_root.display()
            )
        })?;
    }
    fs::create_dir_all(destination_root).with_context(|| {
        format!(
            "failed creating destination directory {}",
            destination_root.display()
        )
    })?;

    let mut queue: VecDeque<(PathBuf, PathBuf)> = VecDeque::new();
    queue.push_back((source_root.to_path_buf(), destination_root.to_path_buf()));

    while let Some((from_dir, to_dir)) = queue.pop_front() {
        for entry in fs::read_dir(&from_dir)
            .with_context(|| format!("failed reading source directory {}", from_dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            if excluded
                .iter()
                .any(|excluded_name| name.to_string_lossy() == *excluded_name)
            {
                continue;
            }

            let from_path = entry.path();
            let to_path = to_dir.join(&name);
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                fs::create_dir_all(&to_path)
                    .with_context(|| format!("failed creating directory {}", to_path.display()))?;
                queue.push_back((from_path, to_path));
            } else if file_type.is_file() {
                fs::copy(&from_path, &to_path).with_context(|| {
                    format!(
                        "failed copying file from {} to {}",
                        from_path.display(),
                        to_path.display()
                    )
                })?;
            }
        }
    }

    Ok(())
}

pub(crate) fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub(crate) fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
