//! flex CLI
//!
//! Command-line front end for the extension manager: inspect, install,
//! uninstall and trial-load `.flex` packages under a data root.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("{}: tracing subscriber already set", "warning".yellow().bold());
        }
        tracing::debug!("Verbose mode enabled");
    }

    let Some(command) = cli.command.clone() else {
        println!("{} extension package manager", "flex".green().bold());
        println!();
        println!("Run {} for available commands.", "flex --help".cyan());
        return Ok(());
    };

    match command {
        Commands::Inspect { archive, json } => commands::run_inspect(&archive, json),
        Commands::List { json } => commands::run_list(cli.manager_config()?, json),
        Commands::Install { archive } => commands::run_install(cli.manager_config()?, &archive),
        Commands::Uninstall { id } => commands::run_uninstall(cli.manager_config()?, &id),
        Commands::Load { id } => commands::run_load(cli.manager_config()?, &id),
        Commands::Sweep => commands::run_sweep(cli.manager_config()?),
    }
}
