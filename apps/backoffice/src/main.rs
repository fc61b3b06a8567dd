//! # Tradeflow Back Office CLI
//!
//! Maintenance commands over the back office database.
//!
//! ## Usage
//! ```bash
//! backoffice check                 # database health and migration status
//! backoffice recalc-totals         # fix drifted sales order totals
//! backoffice low-stock --page 2    # products at or below minimum stock
//! ```
//!
//! Configuration comes from `tradeflow.toml` and `TRADEFLOW_*` variables;
//! `RUST_LOG` overrides the configured log filter.

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tradeflow_backoffice::{AppConfig, AppState, Services};

const USAGE: &str = "\
Tradeflow Back Office

Usage: backoffice <COMMAND> [OPTIONS]

Commands:
  check                 Check database health and migration status
  recalc-totals         Recompute stored sales order totals
  low-stock [--page N]  List products at or below their minimum stock

Options:
  -h, --help            Show this help message";

/// A parsed command line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Check,
    RecalcTotals,
    LowStock { page: u32 },
    Help,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log_filter);

    let state = Arc::new(
        AppState::connect(config)
            .await
            .context("opening the database")?,
    );
    let services = Services::new(state.clone());

    let outcome = run(&services, command).await;
    state.db.close().await;
    outcome
}

async fn run(services: &Services, command: Command) -> Result<()> {
    match command {
        Command::Check => {
            let report = services.maintenance.check().await?;
            println!("Database:   {}", if report.database_ok { "ok" } else { "unreachable" });
            println!(
                "Migrations: {}/{} applied",
                report.migrations_applied, report.migrations_total
            );
            if !report.is_healthy() {
                bail!("back office database is not healthy");
            }
        }
        Command::RecalcTotals => {
            let report = services.maintenance.recalculate_order_totals().await?;
            println!(
                "Checked {} order(s): {} fixed, {} skipped",
                report.checked, report.fixed, report.skipped
            );
            if report.skipped > 0 {
                warn!(skipped = report.skipped, "Some orders could not be repriced, see log");
            }
        }
        Command::LowStock { page } => {
            let page = services
                .maintenance
                .low_stock(services.state.config.page(Some(page), None))
                .await?;
            if page.items.is_empty() {
                println!("No products at or below minimum stock");
            }
            for product in &page.items {
                println!(
                    "{:<20} {:<40} {:>8} / min {}",
                    product.sku,
                    product.name,
                    product.stock_quantity,
                    product.min_stock_level.unwrap_or_default()
                );
            }
            info!(shown = page.items.len(), total = page.total, page = page.page, "Low stock listed");
        }
        Command::Help => println!("{USAGE}"),
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };

    match first.as_str() {
        "check" => Ok(Command::Check),
        "recalc-totals" => Ok(Command::RecalcTotals),
        "low-stock" => {
            let mut page = 1;
            let mut rest = args[1..].iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--page" | "-p" => {
                        let value = rest.next().context("--page needs a value")?;
                        page = value
                            .parse()
                            .with_context(|| format!("invalid page number: {value}"))?;
                    }
                    other => warn!(arg = %other, "Ignoring unknown argument"),
                }
            }
            Ok(Command::LowStock { page })
        }
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => bail!("unknown command `{other}`\n\n{USAGE}"),
    }
}

/// Initializes structured logging. `RUST_LOG` wins over the configured filter.
fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_args(&args(&[])).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["check"])).unwrap(), Command::Check);
        assert_eq!(parse_args(&args(&["recalc-totals"])).unwrap(), Command::RecalcTotals);
        assert_eq!(
            parse_args(&args(&["low-stock", "--page", "3"])).unwrap(),
            Command::LowStock { page: 3 }
        );
        assert_eq!(parse_args(&args(&["low-stock"])).unwrap(), Command::LowStock { page: 1 });
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args(&["vacuum"])).is_err());
        assert!(parse_args(&args(&["low-stock", "--page"])).is_err());
        assert!(parse_args(&args(&["low-stock", "--page", "two"])).is_err());
    }
}
