use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use quotefinder::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for quotefinder::AppCommand {
    fn from(cmd: Commands) -> quotefinder::AppCommand {
        match cmd {
            Commands::Quote {
                source,
                identifier,
                currency,
                json,
            } => quotefinder::AppCommand::Quote {
                source,
                identifier,
                currency,
                json,
            },
            Commands::Isin {
                isin,
                hint,
                strict_funds,
                json,
            } => quotefinder::AppCommand::Isin {
                isin,
                hint,
                strict_funds,
                json,
            },
            Commands::Batch {
                requests,
                currency,
                json,
            } => quotefinder::AppCommand::Batch {
                requests,
                currency,
                json,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch a quote from a single source (YAHOO, COINGECKO, INVESTING, GOOGLEFINANCE, QUEFONDOS, MORNINGSTAR)
    Quote {
        source: String,
        /// Ticker, coin id, ISIN, slug or page URL
        identifier: String,
        /// Quote currency, used by sources that take one
        #[arg(long)]
        currency: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Resolve an ISIN through the source fallback chain
    Isin {
        isin: String,
        /// Instrument name or Investing page URL to disambiguate search results
        #[arg(long)]
        hint: Option<String>,
        /// Only accept fund sources after Investing
        #[arg(long)]
        strict_funds: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Fetch several quotes concurrently, each given as SOURCE:IDENTIFIER
    Batch {
        #[arg(required = true)]
        requests: Vec<String>,
        #[arg(long)]
        currency: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => quotefinder::cli::setup::setup(),
        Some(cmd) => quotefinder::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
