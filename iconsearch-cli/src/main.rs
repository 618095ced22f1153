//! Icon Search CLI - Command-line interface
//!
//! Searches a Firebase Storage bucket of density-sorted icons by filename
//! and prints the matches as a grid.

mod commands;
mod error;
mod presenter;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use error::CliError;
use runner::GlobalOptions;

#[derive(Parser)]
#[command(name = "iconsearch")]
#[command(version = iconsearch::VERSION)]
#[command(about = "Find icons in a remote bucket by filename", long_about = None)]
struct Cli {
    /// Display DPI used to pick the density folder (overrides display.dpi)
    #[arg(long, global = true)]
    dpi: Option<u32>,

    /// Bucket to search (overrides storage.bucket)
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Mirror log output to stderr at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search once and print the matching icons
    Search {
        /// Filename fragment (case-sensitive, at least two characters)
        query: String,

        /// Also print every resolved address
        #[arg(long)]
        addresses: bool,
    },

    /// Interactive search prompt
    Shell {
        /// Also print every resolved address
        #[arg(long)]
        addresses: bool,
    },

    /// List every icon in the density folder
    List,

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = GlobalOptions {
        dpi: cli.dpi,
        bucket: cli.bucket,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Search { query, addresses } => commands::search::run(
            &options,
            commands::search::SearchArgs {
                query,
                show_addresses: addresses,
            },
        ),
        Commands::Shell { addresses } => commands::shell::run(
            &options,
            commands::shell::ShellArgs {
                show_addresses: addresses,
            },
        ),
        Commands::List => commands::list::run(&options),
        Commands::Config { command } => commands::config::run(command),
    }
}
