use anyhow::Result;
use chrono::{Datelike, Utc};
use clap::{Arg, Command};
use tracing_subscriber::EnvFilter;

use value_screener::api::FmpClient;
use value_screener::collector::DataCollector;
use value_screener::database::DatabaseManager;
use value_screener::models::Config;

fn cli() -> Command {
    let current_year = Utc::now().year();
    let default_from = (current_year - 10).to_string();
    let default_to = current_year.to_string();

    Command::new("ingest_fundamentals")
        .version("1.0")
        .about("Fetch statements and prices for the loaded universe")
        .arg(
            Arg::new("from_year")
                .long("from-year")
                .value_name("YEAR")
                .default_value(default_from)
                .help("First fiscal year to fetch"),
        )
        .arg(
            Arg::new("to_year")
                .long("to-year")
                .value_name("YEAR")
                .default_value(default_to)
                .help("Last fiscal year to fetch"),
        )
        .arg(
            Arg::new("max_companies")
                .long("max-companies")
                .value_name("N")
                .help("Limit the run to the first N companies (for testing)"),
        )
        .arg(
            Arg::new("reseed")
                .long("reseed")
                .value_name("TICKER")
                .help("Delete and re-ingest a single ticker instead of running the universe"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("value_screener=info")),
        )
        .init();

    let matches = cli().get_matches();

    let from_year: i32 = matches
        .get_one::<String>("from_year")
        .expect("has default")
        .parse()?;
    let to_year: i32 = matches
        .get_one::<String>("to_year")
        .expect("has default")
        .parse()?;
    let max_companies = matches
        .get_one::<String>("max_companies")
        .map(|s| s.parse::<usize>())
        .transpose()?;

    let config = Config::from_env()?;
    let database = DatabaseManager::new(&config.database_path).await?;
    let client = FmpClient::new(&config)?;
    let collector = DataCollector::new(client, database, config);

    if let Some(ticker) = matches.get_one::<String>("reseed") {
        let ticker = ticker.to_uppercase();
        let (statements, prices) = collector.reseed_company(&ticker, from_year, to_year).await?;
        println!("Reseeded {}: {} statements, {} prices", ticker, statements, prices);
        return Ok(());
    }

    let stats = collector
        .ingest_universe(from_year, to_year, max_companies)
        .await?;

    println!("\nINGESTION COMPLETE");
    println!("{}", "=".repeat(40));
    println!("Companies processed: {}", stats.companies_processed);
    println!("Companies failed:    {}", stats.companies_failed);
    println!("Statements:          {}", stats.statements_ingested);
    println!("Price records:       {}", stats.prices_ingested);

    Ok(())
}
