use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Content identity of a directory tree: sorted relative paths hashed
/// together with each file's digest. Two trees compare equal exactly when
/// their file sets and file contents are byte-for-byte identical.
pub fn tree_digest(root: &Path) -> Result<String> {
    let mut file_paths = collect_relative_file_paths(root)?;
    file_paths.sort();

    let mut digest_input = Vec::new();
    for relative_path in file_paths {
        let normalized_path = normalize_path_for_digest(&relative_path);
        let file_bytes = fs::read(root.join(&relative_path)).with_context(|| {
            format!(
                "failed reading file for tree digest {}",
                root.join(&relative_path).display()
            )
        })?;
        let file_digest = sha256_hex(&file_bytes);

        digest_input.extend_from_slice(normalized_path.as_bytes());
        digest_input.push(0);
        digest_input.extend_from_slice(file_digest.as_bytes());
        digest_input.push(0);
    }

    Ok(format!("fs:{}", sha256_hex(&digest_input)))
}

pub fn collect_relative_file_paths(root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed reading directory {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() {
                let relative_path = path.strip_prefix(root).with_context(|| {
                    format!(
                        "failed deriving relative path {} from {}",
                        path.display(),
                        root.display()
                    )
                })?;
                paths.push(relative_path.to_path_buf());
            }
        }
    }

    Ok(paths)
}

fn normalize_path_for_digest(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
