mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Build CDR contact-label datasets from antibody-antigen structures
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity of the program:
    /// -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the training dataset from a catalog, reusing the cache when possible
    Build(cli::build::Args),
    /// Print the CDR sequences and contact labels of a single structure
    Cdrs(cli::cdrs::Args),
}

fn setup_logging(verbosity: u8) {
    let level_filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> ExitCode {
    let args = Cli::parse();
    setup_logging(args.verbose);

    let result = match &args.command {
        Commands::Build(args) => cli::build::run(args),
        Commands::Cdrs(args) => cli::cdrs::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
