use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use restage_core::{InstallConfig, InstallLayout, UpdateConfig};

/// Marker verification of a fetched tree. Fails closed before any
/// destructive step: no marker, no handoff script.
pub fn verify_scratch_tree(scratch: &Path, entry_point: &str) -> Result<()> {
    let marker = scratch.join(entry_point);
    if !marker.is_file() {
        anyhow::bail!(
            "entry point '{}' missing from fetched tree {}",
            entry_point,
            scratch.display()
        );
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchCommand {
    pub program: PathBuf,
    pub entry_point: String,
}

impl RelaunchCommand {
    pub fn display_line(&self) -> String {
        format!("{} {}", self.program.display(), self.entry_point)
    }
}

/// Runtime resolution order: explicit config override, then the virtual
/// environment's interpreter, then the system-wide runtime.
pub fn resolve_relaunch(layout: &InstallLayout, install: &InstallConfig) -> RelaunchCommand {
    let entry_point = install.entry_point.clone();
    if let Some(runtime) = &install.runtime {
        return RelaunchCommand {
            program: PathBuf::from(runtime),
            entry_point,
        };
    }

    if let Some(venv) = layout.discover_venv(&install.venv_dir) {
        let candidate = if cfg!(windows) {
            venv.join("Scripts").join("python.exe")
        } else {
            venv.join("bin").join("python")
        };
        if candidate.is_file() {
            return RelaunchCommand {
                program: candidate,
                entry_point,
            };
        }
    }

    RelaunchCommand {
        program: PathBuf::from(if cfg!(windows) { "python" } else { "python3" }),
        entry_point,
    }
}

/// The dependency-installer client, if one is available: the virtual
/// environment's pip (pip, then pip3). None disables the install step.
pub fn resolve_installer(layout: &InstallLayout, install: &InstallConfig) -> Option<PathBuf> {
    install.requirements_file.as_ref()?;
    let venv = layout.discover_venv(&install.venv_dir)?;
    for name in ["pip", "pip3"] {
        let candidate = if cfg!(windows) {
            venv.join("Scripts").join(format!("{name}.exe"))
        } else {
            venv.join("bin").join(name)
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// The generated, self-deleting script that performs the final directory
/// swap and relaunch outside the invoking process's lifetime. Everything it
/// needs is baked in as quoted literals; it shares nothing with the parent
/// once spawned.
#[derive(Debug, Clone)]
pub struct HandoffScript {
    install_name: String,
    live_root: PathBuf,
    scratch: PathBuf,
    backup: PathBuf,
    sentinel: PathBuf,
    script_path: PathBuf,
    relaunch: RelaunchCommand,
    installer: Option<PathBuf>,
    requirements_file: Option<String>,
    grace_period_secs: u64,
    sentinel_timeout_secs: u64,
}

impl HandoffScript {
    pub fn new(
        layout: &InstallLayout,
        config: &UpdateConfig,
        scratch: &Path,
        backup: &Path,
        script_path: &Path,
        sentinel: &Path,
    ) -> Self {
        Self {
            install_name: layout.install_name(),
            live_root: layout.root().to_path_buf(),
            scratch: scratch.to_path_buf(),
            backup: backup.to_path_buf(),
            sentinel: sentinel.to_path_buf(),
            script_path: script_path.to_path_buf(),
            relaunch: resolve_relaunch(layout, &config.install),
            installer: resolve_installer(layout, &config.install),
            requirements_file: config.install.requirements_file.clone(),
            grace_period_secs: config.handoff.grace_period_secs,
            sentinel_timeout_secs: config.handoff.sentinel_timeout_secs,
        }
    }

    pub fn render(&self) -> String {
        if cfg!(windows) {
            self.render_ps1()
        } else {
            self.render_sh()
        }
    }

    pub fn render_sh(&self) -> String {
        let mut script = String::new();
        script.push_str("#!/bin/sh\n");
        script.push_str(&format!(
            "# Detached handoff for '{}': swaps the live tree after the old process\n\
             # exits. The sentinel wait plus grace sleep is a best-effort window, not\n\
             # a synchronization primitive.\n\
             # Recovery copy (manual restore only): {}\n\n",
            self.install_name,
            self.backup.display()
        ));
        script.push_str(&format!(
            "SENTINEL={}\n",
            sh_quote(&self.sentinel.display().to_string())
        ));
        script.push_str(&format!(
            "LIVE={}\n",
            sh_quote(&self.live_root.display().to_string())
        ));
        script.push_str(&format!(
            "SCRATCH={}\n\n",
            sh_quote(&self.scratch.display().to_string())
        ));
        script.push_str(&format!(
            "waited=0\n\
             while [ ! -f \"$SENTINEL\" ] && [ \"$waited\" -lt {} ]; do\n\
             \tsleep 1\n\
             \twaited=$((waited + 1))\n\
             done\n\
             sleep {}\n\
             rm -f \"$SENTINEL\"\n\n",
            self.sentinel_timeout_secs, self.grace_period_secs
        ));
        script.push_str(
            "find \"$LIVE\" -mindepth 1 -maxdepth 1 ! -name '.git' -exec rm -rf {} +\n\
             find \"$SCRATCH\" -mindepth 1 -maxdepth 1 ! -name '.git' -exec mv -f {} \"$LIVE\" \\;\n\
             rm -rf \"$SCRATCH\"\n\n",
        );
        if let (Some(installer), Some(requirements)) = (&self.installer, &self.requirements_file) {
            script.push_str(&format!(
                "if [ -f \"$LIVE\"/{req} ]; then\n\
                 \t{pip} install -r \"$LIVE\"/{req} >/dev/null 2>&1\n\
                 fi\n\n",
                req = sh_quote(requirements),
                pip = sh_quote(&installer.display().to_string())
            ));
        }
        script.push_str(&format!(
            "cd \"$LIVE\"\n{} {} >/dev/null 2>&1 &\n\n",
            sh_quote(&self.relaunch.program.display().to_string()),
            sh_quote(&self.relaunch.entry_point)
        ));
        script.push_str(&format!(
            "rm -f -- {}\n",
            sh_quote(&self.script_path.display().to_string())
        ));
        script
    }

    pub fn render_ps1(&self) -> String {
        let mut script = String::new();
        script.push_str(&format!(
            "# Detached handoff for '{}': swaps the live tree after the old process\n\
             # exits. The sentinel wait plus grace sleep is a best-effort window, not\n\
             # a synchronization primitive.\n\
             # Recovery copy (manual restore only): {}\n\n",
            self.install_name,
            self.backup.display()
        ));
        script.push_str(&format!(
            "$sentinel = {}\n$live = {}\n$scratch = {}\n\n",
            ps_quote(&self.sentinel.display().to_string()),
            ps_quote(&self.live_root.display().to_string()),
            ps_quote(&self.scratch.display().to_string())
        ));
        script.push_str(&format!(
            "$waited = 0\n\
             while (-not (Test-Path -LiteralPath $sentinel) -and $waited -lt {}) {{\n\
             \tStart-Sleep -Seconds 1\n\
             \t$waited += 1\n\
             }}\n\
             Start-Sleep -Seconds {}\n\
             Remove-Item -Force -ErrorAction SilentlyContinue -LiteralPath $sentinel\n\n",
            self.sentinel_timeout_secs, self.grace_period_secs
        ));
        script.push_str(
            "Get-ChildItem -Force -LiteralPath $live | Where-Object { $_.Name -ne '.git' } | Remove-Item -Recurse -Force\n\
             Get-ChildItem -Force -LiteralPath $scratch | Where-Object { $_.Name -ne '.git' } | Move-Item -Destination $live -Force\n\
             Remove-Item -Recurse -Force -LiteralPath $scratch\n\n",
        );
        if let (Some(installer), Some(requirements)) = (&self.installer, &self.requirements_file) {
            script.push_str(&format!(
                "if (Test-Path -LiteralPath (Join-Path $live {req})) {{\n\
                 \t& {pip} install -r (Join-Path $live {req}) | Out-Null\n\
                 }}\n\n",
                req = ps_quote(requirements),
                pip = ps_quote(&installer.display().to_string())
            ));
        }
        script.push_str(&format!(
            "Set-Location -LiteralPath $live\n\
             Start-Process -FilePath {} -ArgumentList {} -WorkingDirectory $live\n\n",
            ps_quote(&self.relaunch.program.display().to_string()),
            ps_quote(&self.relaunch.entry_point)
        ));
        script.push_str("Remove-Item -Force -LiteralPath $MyInvocation.MyCommand.Path\n");
        script
    }
}

pub fn write_handoff_script(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .with_context(|| format!("failed writing handoff script {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).with_context(|| {
            format!("failed marking handoff script executable {}", path.display())
        })?;
    }
    Ok(())
}

/// Launch the handoff script fully detached: its own process group, no
/// inherited stdio, so it survives the invoking process's exit.
pub fn spawn_detached(script_path: &Path) -> Result<u32> {
    let mut command = if cfg!(windows) {
        let mut command = Command::new("powershell");
        command
            .arg("-NoProfile")
            .arg("-ExecutionPolicy")
            .arg("Bypass")
            .arg("-File")
            .arg(script_path);
        command
    } else {
        Command::new(script_path)
    };
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = command
        .spawn()
        .with_context(|| format!("failed launching handoff script {}", script_path.display()))?;
    Ok(child.id())
}

/// What the invoking process holds after HANDOFF_WRITTEN: launch the script,
/// write the exit sentinel, exit. Nothing here can be cancelled once
/// `launch` returns.
#[derive(Debug, Clone)]
pub struct HandoffHandle {
    pub script_path: PathBuf,
    pub sentinel_path: PathBuf,
    pub backup_path: PathBuf,
    pub snapshot_id: String,
}

impl HandoffHandle {
    pub fn launch(&self) -> Result<u32> {
        let pid = spawn_detached(&self.script_path)?;
        log::info!(
            "handoff script {} launched as pid {}",
            self.script_path.display(),
            pid
        );
        Ok(pid)
    }

    /// Write the exit sentinel. Call immediately before exiting; the
    /// detached script polls for this file before it starts deleting.
    pub fn finalize(&self) -> Result<()> {
        fs::write(&self.sentinel_path, b"exiting\n").with_context(|| {
            format!("failed writing exit sentinel {}", self.sentinel_path.display())
        })?;
        log::info!("exit sentinel written: {}", self.sentinel_path.display());
        Ok(())
    }
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
