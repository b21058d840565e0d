use anyhow::Result;
use clap::{Arg, Command};
use tracing_subscriber::EnvFilter;

use value_screener::database::DatabaseManager;
use value_screener::estimator::FairValueEngine;
use value_screener::models::Config;
use value_screener::screener::{Screener, ScreeningCriteria};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("value_screener=info")),
        )
        .init();

    let matches = Command::new("value-screener")
        .version("1.0")
        .about("Graham-style stock screening and ratio-reversion valuation")
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("FILE")
                .help("Path to SQLite database (overrides DATABASE_PATH)"),
        )
        .subcommand(Command::new("screen").about("Run the value screen over all active companies"))
        .subcommand(
            Command::new("estimate")
                .about("Estimate fair value for a ticker")
                .arg(Arg::new("ticker").required(true).help("Ticker symbol")),
        )
        .subcommand(Command::new("stats").about("Show database statistics"))
        .subcommand_required(true)
        .get_matches();

    let database_path = match matches.get_one::<String>("database") {
        Some(path) => path.clone(),
        None => {
            // Only the ingest binaries need API credentials; fall back to the
            // plain default when no .env is present
            Config::from_env()
                .map(|c| c.database_path)
                .unwrap_or_else(|_| "stocks.db".to_string())
        }
    };

    let database = DatabaseManager::new(&database_path).await?;

    match matches.subcommand() {
        Some(("screen", _)) => run_screen(database).await?,
        Some(("estimate", sub)) => {
            let ticker = sub
                .get_one::<String>("ticker")
                .expect("ticker is required")
                .to_uppercase();
            run_estimate(database, &ticker).await?;
        }
        Some(("stats", _)) => run_stats(database).await?,
        _ => unreachable!("subcommand required"),
    }

    Ok(())
}

async fn run_screen(database: DatabaseManager) -> Result<()> {
    let screener = Screener::new(database, ScreeningCriteria::default());
    let (passing, stats) = screener.run().await?;

    println!("\nGRAHAM VALUE SCREEN");
    println!("{}", "=".repeat(72));
    println!(
        "Screened {} companies ({} without data); {} passed",
        stats.companies_screened, stats.companies_without_data, stats.companies_passed
    );

    if passing.is_empty() {
        println!("No companies passed all checks.");
        return Ok(());
    }

    println!(
        "\n{:<8} {:>14} {:>8} {:>8} {:>8}",
        "TICKER", "MARKET CAP", "P/E", "P/B", "CURRENT"
    );
    for outcome in &passing {
        println!(
            "{:<8} {:>14} {:>8} {:>8} {:>8}",
            outcome.ticker,
            format_amount(outcome.market_cap),
            format_ratio(outcome.pe_ratio),
            format_ratio(outcome.pb_ratio),
            format_ratio(outcome.current_ratio),
        );
    }

    Ok(())
}

async fn run_estimate(database: DatabaseManager, ticker: &str) -> Result<()> {
    let engine = FairValueEngine::new(database);
    let report = engine.estimate_for_ticker(ticker).await?;

    println!("\nFAIR VALUE ESTIMATE: {}", report.ticker);
    println!("{}", "=".repeat(48));
    println!("Current price: ${:.2}", report.current_price);
    println!();

    for estimate in &report.estimates {
        match estimate.fair_price {
            Some(price) => println!("{:<28} ${:.2}", estimate.label, price),
            None => println!("{:<28} (insufficient data)", estimate.label),
        }
    }

    println!();
    match report.composite {
        Some(composite) => {
            let upside = report.composite_upside().unwrap_or(0.0) * 100.0;
            println!("Composite fair value: ${:.2} ({:+.1}% vs current)", composite, upside);
        }
        None => println!("No model produced an estimate."),
    }

    Ok(())
}

async fn run_stats(database: DatabaseManager) -> Result<()> {
    let stats = database.get_stats().await?;

    println!("\nDATABASE STATISTICS");
    println!("{}", "=".repeat(32));
    for key in [
        "companies",
        "statements",
        "line_items",
        "price_records",
        "screening_results",
    ] {
        println!("{:<20} {:>10}", key, stats.get(key).unwrap_or(&0));
    }

    if let Some(date) = database.latest_screening_date().await? {
        println!("{:<20} {:>10}", "last screening", date.to_string());
    }
    if let Some(date) = database.get_metadata("last_ingest_date").await? {
        println!("{:<20} {:>10}", "last ingest", date);
    }

    Ok(())
}

fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 1e9 => format!("{:.1}B", v / 1e9),
        Some(v) if v >= 1e6 => format!("{:.1}M", v / 1e6),
        Some(v) => format!("{:.0}", v),
        None => "-".to_string(),
    }
}
