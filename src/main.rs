mod classifier;
mod cli;
mod db;
mod dictionary;
mod error;
mod exclusions;
mod fingerprint;
mod fmt;
mod ingest;
mod models;
mod reconcile;
mod reports;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, ReportCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Sync { force } => cli::sync::run(force),
        Commands::Classify { overwrite } => cli::classify::run(overwrite),
        Commands::Report { command } => match command {
            ReportCommands::Summary { monthly } => cli::report::summary(monthly),
            ReportCommands::Subcategory { name } => cli::report::subcategory(&name),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
