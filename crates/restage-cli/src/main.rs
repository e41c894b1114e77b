mod flows;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use crate::flows::{
    load_config, resolve_install_root, run_backup_command, run_doctor_command,
    run_restart_command, run_update_command,
};
use restage_core::InstallLayout;

#[derive(Parser, Debug)]
#[command(name = "restage")]
#[command(about = "Self-redeploy tooling for a resident bot process", long_about = None)]
struct Cli {
    #[arg(long)]
    root: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Update {
        #[arg(long)]
        dry_run: bool,
    },
    Backup,
    Restart,
    Doctor,
    Version,
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let root = resolve_install_root(cli.root)?;
    let layout = InstallLayout::new(root);

    match cli.command {
        Commands::Update { dry_run } => {
            let config = load_config(&layout, cli.config.as_deref())?;
            run_update_command(&layout, &config, dry_run)?;
        }
        Commands::Backup => {
            run_backup_command(&layout, cli.config.as_deref())?;
        }
        Commands::Restart => {
            run_restart_command(&layout, cli.config.as_deref())?;
        }
        Commands::Doctor => {
            run_doctor_command(&layout, cli.config.as_deref())?;
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "restage", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.parse_filters(&log_level);
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests;
