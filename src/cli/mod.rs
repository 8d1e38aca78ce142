pub mod classify;
pub mod init;
pub mod report;
pub mod status;
pub mod sync;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kassa", about = "Bank-statement sync and categorization CLI.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up kassa: choose a data directory and initialize the database.
    Init {
        /// Path for kassa data (default: ~/Documents/kassa)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Ingest changed CSV exports, synchronize dictionaries, and classify.
    Sync {
        /// Re-read every tracked file and re-derive every assignment.
        #[arg(long)]
        force: bool,
    },
    /// Re-run classification on unassigned transactions.
    Classify {
        /// Re-derive assignments for already classified rows too.
        #[arg(long)]
        overwrite: bool,
    },
    /// Summary views of the classified data.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Year × category totals.
    Summary {
        /// Break rows down by month instead of year.
        #[arg(long)]
        monthly: bool,
    },
    /// All transactions of one sub-category.
    Subcategory {
        /// Sub-category name as assigned by classification
        name: String,
    },
}
