use anyhow::Result;
use clap::{Arg, Command};
use tracing_subscriber::EnvFilter;

use value_screener::collector::load_universe_from_csv;
use value_screener::database::DatabaseManager;
use value_screener::models::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("value_screener=info")),
        )
        .init();

    let matches = Command::new("load_universe")
        .version("1.0")
        .about("Load a ticker universe from a CSV file (ticker,name,sector)")
        .arg(
            Arg::new("csv")
                .required(true)
                .value_name("FILE")
                .help("Path to the universe CSV"),
        )
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("FILE")
                .help("Path to SQLite database (overrides DATABASE_PATH)"),
        )
        .get_matches();

    let csv_path = matches.get_one::<String>("csv").expect("csv is required");
    let database_path = match matches.get_one::<String>("database") {
        Some(path) => path.clone(),
        None => Config::from_env()
            .map(|c| c.database_path)
            .unwrap_or_else(|_| "stocks.db".to_string()),
    };

    let database = DatabaseManager::new(&database_path).await?;
    let loaded = load_universe_from_csv(&database, csv_path).await?;

    println!("Loaded {} companies into {}", loaded, database_path);

    let stats = database.get_stats().await?;
    println!("Database now tracks {} active companies", stats.get("companies").unwrap_or(&0));

    Ok(())
}
