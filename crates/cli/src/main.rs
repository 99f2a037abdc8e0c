//! Offline driver for the bid adapters.
//!
//! This tool provides commands for:
//! - Building partner requests from host bid request JSON
//! - Interpreting partner responses into normalized bids
//! - Replaying auction events through GU analytics
//! - Showing and validating configuration

use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use bid_adapters_common::logging::init_logger;

mod commands;
mod config;
mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "bacli")]
#[command(about = "Build and interpret header-bidding partner requests offline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML settings file (defaults to the embedded configuration)
    #[arg(long, short, global = true, env = "BID_ADAPTERS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build partner requests for a batch of host bid requests
    Build {
        /// Bidder code, e.g. `rtbhouse` or `adquery`
        #[arg(long, short)]
        bidder: String,

        /// JSON file with one bid request or an array of them
        #[arg(long)]
        bids: PathBuf,

        /// JSON file with the bidder request context
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Interpret a partner response body
    Interpret {
        /// Bidder code, e.g. `rtbhouse` or `adquery`
        #[arg(long, short)]
        bidder: String,

        /// JSON file with the decoded response body
        #[arg(long)]
        response: PathBuf,

        /// JSON file with the request that produced the response
        #[arg(long)]
        request: PathBuf,
    },

    /// Replay auction events through GU analytics; beacons are logged
    Track {
        /// JSON file with `{eventType, args}` events
        #[arg(long)]
        events: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration after environment overrides
    Show,

    /// Validate a configuration file
    Validate {
        /// Path to the TOML configuration file
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logger(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Build {
            bidder,
            bids,
            context,
        } => {
            let settings = config::load_settings(cli.config.as_deref())?;
            let output = commands::build(&settings, &bidder, &bids, context.as_deref())?;
            println!("{output}");
            Ok(())
        }
        Commands::Interpret {
            bidder,
            response,
            request,
        } => {
            let settings = config::load_settings(cli.config.as_deref())?;
            let output = commands::interpret(&settings, &bidder, &response, &request)?;
            println!("{output}");
            Ok(())
        }
        Commands::Track { events } => {
            let settings = config::load_settings(cli.config.as_deref())?;
            let count = commands::track_to_log(&settings, &events)?;
            println!("Tracked {count} event(s)");
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => config::show(cli.config),
            ConfigAction::Validate { file } => config::validate(file),
        },
    }
}
