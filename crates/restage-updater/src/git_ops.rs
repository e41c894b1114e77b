use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

pub(crate) fn base_git_command() -> Command {
    let mut command = Command::new("git");
    command
        .arg("-c")
        .arg("core.autocrlf=false")
        .arg("-c")
        .arg("core.eol=lf");
    if cfg!(windows) {
        command.arg("-c").arg("core.longpaths=true");
    }
    command
}

/// Branch clone bounded by a wall-clock timeout. stderr goes to a sibling
/// log file so a hung clone can be killed without a pipe to drain.
pub(crate) fn run_git_clone(
    location: &str,
    branch: &str,
    destination: &Path,
    timeout: Duration,
) -> Result<()> {
    let log_path = destination.with_extension("clone-log");
    let log_file = fs::File::create(&log_path)
        .with_context(|| format!("failed creating clone log {}", log_path.display()))?;

    let mut child = base_git_command()
        .arg("clone")
        .arg("--branch")
        .arg(branch)
        .arg("--")
        .arg(location)
        .arg(destination)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log_file))
        .spawn()
        .context("failed launching git clone")?;

    let status = wait_with_timeout(&mut child, timeout)?;
    let stderr_tail = fs::read_to_string(&log_path).unwrap_or_default();
    let _ = fs::remove_file(&log_path);

    match status {
        Some(status) if status.success() => Ok(()),
        Some(status) => anyhow::bail!(
            "git clone of '{}' (branch '{}') failed with {}: {}",
            location,
            branch,
            status,
            stderr_tail.trim()
        ),
        None => anyhow::bail!(
            "git clone of '{}' (branch '{}') timed out after {}s",
            location,
            branch,
            timeout.as_secs()
        ),
    }
}

/// Polls the child until it exits or the deadline passes; a timed-out child
/// is killed and reaped, and `None` is returned.
pub(crate) fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().context("failed polling subprocess")? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

pub(crate) fn git_head_snapshot_id(repo_root: &Path) -> Result<String> {
    let output = base_git_command()
        .arg("rev-parse")
        .arg("HEAD")
        .current_dir(repo_root)
        .output()
        .context("failed launching git rev-parse")?;
    if !output.status.success() {
        anyhow::bail!(
            "git rev-parse failed in {}: {}",
            repo_root.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let full_sha = String::from_utf8(output.stdout)
        .context("git rev-parse produced non-UTF-8 output")?
        .trim()
        .to_string();
    derive_snapshot_id_from_full_git_sha(&full_sha)
        .with_context(|| format!("git rev-parse returned invalid HEAD sha in {}", repo_root.display()))
}

pub(crate) fn derive_snapshot_id_from_full_git_sha(full_sha: &str) -> Result<String> {
    let normalized = full_sha.trim();
    if normalized.len() < 16 {
        anyhow::bail!("git HEAD sha too short for snapshot id: '{normalized}'");
    }
    if !normalized.chars().all(|ch| ch.is_ascii_hexdigit()) {
        anyhow::bail!("git HEAD sha contains non-hex characters: '{normalized}'");
    }

    Ok(format!(
        "git:{}",
        normalized.chars().take(16).collect::<String>()
    ))
}
