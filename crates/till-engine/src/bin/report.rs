//! till-report
//!
//! Operator tool: prints back-office reports as JSON.
//!
//! ```text
//! till-report dashboard --account acct-1
//! till-report --config /etc/till/till.toml low-stock
//! till-report movements item-42
//! till-report transaction TXN-20240309174512-4821
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use till_engine::{BackOffice, BackOfficeConfig, EngineError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "till-report")]
#[command(about = "Back-office reports for the till")]
#[command(version)]
struct Cli {
    /// Config file (default: platform config dir / till.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured database file
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's figures, inventory valuation, lifetime summary, top items
    Dashboard {
        /// Acting account id
        #[arg(long)]
        account: String,
    },

    /// Items at or below their minimum stock
    LowStock,

    /// Chronological sales and adjustments for one item
    Movements {
        item_id: String,
    },

    /// One receipt by transaction number
    Transaction {
        number: String,
    },
}

/// Initializes the tracing subscriber.
///
/// ## Environment Variable
/// - `RUST_LOG=debug` - Show debug logs
/// - `RUST_LOG=till=trace` - Show trace for till crates only
/// - Default: info, with till at debug and sqlx at warn
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match BackOfficeConfig::load(cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    if let Err(e) = run(&config, cli.command).await {
        error!(code = ?e.code(), "{}", e);
        if let Ok(body) = serde_json::to_string_pretty(&e.to_response()) {
            eprintln!("{body}");
        }
        process::exit(1);
    }
}

async fn run(config: &BackOfficeConfig, command: Commands) -> Result<(), EngineError> {
    let office = BackOffice::open(config).await?;

    match command {
        Commands::Dashboard { account } => print(&office.dashboard(&account).await?),
        Commands::LowStock => print(&office.low_stock().await?),
        Commands::Movements { item_id } => print(&office.stock_movements(&item_id).await?),
        Commands::Transaction { number } => print(&office.transaction_by_number(&number).await?),
    }

    office.database().close().await;
    info!("Report complete");
    Ok(())
}

fn print<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(body) => println!("{body}"),
        Err(e) => error!("Failed to serialize report: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_account_belongs_to_dashboard() {
        let cli = Cli::try_parse_from(["till-report", "dashboard", "--account", "acct-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Dashboard { account } if account == "acct-1"));

        assert!(Cli::try_parse_from(["till-report", "--account", "acct-1", "dashboard"]).is_err());
    }

    #[test]
    fn test_global_options_precede_subcommand() {
        let cli = Cli::try_parse_from(["till-report", "--config", "/etc/till/till.toml", "low-stock"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/till/till.toml")));
        assert!(matches!(cli.command, Commands::LowStock));

        let cli = Cli::try_parse_from(["till-report", "movements", "item-42"]).unwrap();
        assert!(matches!(cli.command, Commands::Movements { item_id } if item_id == "item-42"));
    }
}
