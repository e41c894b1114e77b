use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use restage_core::{CarryoverConfig, CONFIG_FILE_NAME};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarryoverReport {
    pub copied: Vec<String>,
    pub missing: Vec<String>,
}

/// Copy the carryover allow-list from the live root into the scratch tree:
/// the credentials file, the structured configuration file, any configured
/// extra files, and every top-level database file discovered at invocation
/// time. Reads only from the live root, never deletes from it. Missing
/// files are reported and logged, not fatal.
pub fn carry_state(
    live_root: &Path,
    scratch: &Path,
    config: &CarryoverConfig,
) -> Result<CarryoverReport> {
    let mut names: Vec<String> = vec![
        config.credentials_file.clone(),
        CONFIG_FILE_NAME.to_string(),
    ];
    names.extend(config.extra_files.iter().cloned());
    names.extend(discover_database_files(live_root, &config.database_extension)?);
    names.sort();
    names.dedup();

    let mut report = CarryoverReport::default();
    for name in names {
        let source_path = live_root.join(&name);
        if !source_path.is_file() {
            log::warn!("carryover file not found: {}", source_path.display());
            report.missing.push(name);
            continue;
        }

        let destination_path = scratch.join(&name);
        fs::copy(&source_path, &destination_path).with_context(|| {
            format!(
                "failed copying {} to {}",
                source_path.display(),
                destination_path.display()
            )
        })?;
        log::info!("carried over {name}");
        report.copied.push(name);
    }

    Ok(report)
}

fn discover_database_files(live_root: &Path, extension: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(live_root)
        .with_context(|| format!("failed reading installation root {}", live_root.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|value| value.to_str()) == Some(extension) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}
