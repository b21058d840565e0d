//! Batch ingestion: pull statements and prices for a ticker universe and
//! upsert them into the database.
//!
//! Per-ticker fetches are independent, so a bounded worker pool runs them
//! concurrently; a failed ticker is logged and skipped, never fatal.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::api::{FmpClient, FundamentalsProvider};
use crate::database::DatabaseManager;
use crate::models::{Company, CompanyStatus, Config, DailyClose, StatementType};

/// Result tally for an ingestion run
#[derive(Debug, Default)]
pub struct IngestStats {
    pub companies_processed: usize,
    pub companies_failed: usize,
    pub statements_ingested: usize,
    pub prices_ingested: usize,
}

/// Outcome for one company within a run
#[derive(Debug)]
struct CompanyIngest {
    statements: usize,
    prices: usize,
}

/// Data ingestion over the configured provider
pub struct DataCollector {
    client: Arc<FmpClient>,
    database: Arc<DatabaseManager>,
    config: Config,
    semaphore: Arc<Semaphore>,
}

impl DataCollector {
    pub fn new(client: FmpClient, database: DatabaseManager, config: Config) -> Self {
        let workers = config.worker_count.max(1);
        Self {
            client: Arc::new(client),
            database: Arc::new(database),
            config,
            semaphore: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Ingest statements and prices for every active company.
    ///
    /// `max_companies` limits the run for testing.
    pub async fn ingest_universe(
        &self,
        from_year: i32,
        to_year: i32,
        max_companies: Option<usize>,
    ) -> Result<IngestStats> {
        let mut companies = self.database.get_active_companies().await?;
        if let Some(max) = max_companies {
            companies.truncate(max);
        }
        let total = companies.len();
        info!(
            "Ingesting {} companies, fiscal years {} to {}, {} workers",
            total, from_year, to_year, self.config.worker_count
        );

        let mut stats = IngestStats::default();
        let mut processed = 0;

        let mut results = stream::iter(companies)
            .map(|company| {
                let client = Arc::clone(&self.client);
                let database = Arc::clone(&self.database);
                let semaphore = Arc::clone(&self.semaphore);
                let ticker = company.ticker.clone();

                async move {
                    // Semaphore holds even if buffer_unordered is widened
                    let _permit = semaphore.acquire().await;
                    let result =
                        ingest_company_with_retry(&client, &database, &company, from_year, to_year)
                            .await;
                    (ticker, result)
                }
            })
            .buffer_unordered(self.config.worker_count.max(1));

        while let Some((ticker, result)) = results.next().await {
            processed += 1;
            match result {
                Ok(ingested) => {
                    stats.companies_processed += 1;
                    stats.statements_ingested += ingested.statements;
                    stats.prices_ingested += ingested.prices;
                    info!(
                        "{}/{}: {} - {} statements, {} prices",
                        processed, total, ticker, ingested.statements, ingested.prices
                    );
                }
                Err(e) => {
                    stats.companies_failed += 1;
                    error!("{}/{}: {} failed - {}", processed, total, ticker, e);
                }
            }
        }

        self.database
            .set_metadata("last_ingest_date", &Utc::now().date_naive().to_string())
            .await?;

        info!(
            "Ingestion complete: {} processed, {} failed, {} statements, {} prices",
            stats.companies_processed,
            stats.companies_failed,
            stats.statements_ingested,
            stats.prices_ingested
        );
        Ok(stats)
    }

    /// Reseed one company: wipe its rows and ingest fresh
    pub async fn reseed_company(
        &self,
        ticker: &str,
        from_year: i32,
        to_year: i32,
    ) -> Result<(usize, usize)> {
        let company = self
            .database
            .get_company_by_ticker(ticker)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Unknown ticker: {}", ticker))?;
        let company_id = company
            .id
            .ok_or_else(|| anyhow::anyhow!("Company has no id: {}", ticker))?;

        warn!("Reseeding {}: deleting existing rows", ticker);
        self.database.delete_company_data(company_id).await?;

        let ingested =
            ingest_company(&self.client, &self.database, &company, from_year, to_year).await?;
        Ok((ingested.statements, ingested.prices))
    }

    /// Fill in missing sector/name from the provider profile
    pub async fn refresh_profiles(&self) -> Result<usize> {
        let companies = self.database.get_active_companies().await?;
        let mut updated = 0;

        for company in companies {
            if company.sector.is_some() {
                continue;
            }
            match self.client.fetch_profile(&company.ticker).await {
                Ok(profile) => {
                    let refreshed = Company {
                        sector: profile.sector,
                        name: profile.name,
                        last_updated: Some(Utc::now()),
                        ..company
                    };
                    self.database.upsert_company(&refreshed).await?;
                    updated += 1;
                }
                Err(e) => {
                    warn!("Profile fetch failed for {}: {}", company.ticker, e);
                }
            }
        }

        info!("Refreshed {} company profiles", updated);
        Ok(updated)
    }
}

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_PAUSE_SECS: u64 = 2;

async fn ingest_company_with_retry(
    client: &FmpClient,
    database: &DatabaseManager,
    company: &Company,
    from_year: i32,
    to_year: i32,
) -> Result<CompanyIngest> {
    let mut last_error = None;

    for attempt in 1..=RETRY_ATTEMPTS {
        match ingest_company(client, database, company, from_year, to_year).await {
            Ok(ingested) => return Ok(ingested),
            Err(e) => {
                if attempt < RETRY_ATTEMPTS {
                    warn!(
                        "Attempt {} failed for {}: {}. Retrying...",
                        attempt, company.ticker, e
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(RETRY_PAUSE_SECS)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
}

async fn ingest_company(
    client: &FmpClient,
    database: &DatabaseManager,
    company: &Company,
    from_year: i32,
    to_year: i32,
) -> Result<CompanyIngest> {
    let company_id = company
        .id
        .ok_or_else(|| anyhow::anyhow!("Company has no id: {}", company.ticker))?;

    let mut statements = 0;
    for statement_type in StatementType::ALL {
        let fetched = client
            .fetch_statements(&company.ticker, statement_type, from_year, to_year)
            .await?;

        for statement in fetched {
            let statement_id = database
                .upsert_statement(company_id, statement_type, statement.fiscal_year)
                .await?;
            database
                .upsert_line_items(statement_id, &statement.lines)
                .await?;
            statements += 1;
        }
    }

    let from_date = NaiveDate::from_ymd_opt(from_year, 1, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid from_year {}", from_year))?;
    let to_date = Utc::now().date_naive();
    let closes = client
        .fetch_daily_closes(&company.ticker, from_date, to_date)
        .await?;

    let mut prices = 0;
    for (date, close_price) in closes {
        database
            .insert_daily_close(&DailyClose {
                id: None,
                company_id,
                date,
                close_price,
            })
            .await?;
        prices += 1;
    }

    debug!(
        "Ingested {}: {} statements, {} prices",
        company.ticker, statements, prices
    );
    Ok(CompanyIngest { statements, prices })
}

/// Load a ticker universe from a CSV file with `ticker,name,sector` columns
/// (header row expected) and upsert each company
pub async fn load_universe_from_csv(
    database: &DatabaseManager,
    path: impl AsRef<Path>,
) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut loaded = 0;

    for result in reader.records() {
        let record = result?;
        if record.len() < 2 {
            warn!("Skipping short CSV row: {:?}", record);
            continue;
        }
        let ticker = record[0].trim().to_string();
        let name = record[1].trim().to_string();
        let sector = record
            .get(2)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        if ticker.is_empty() {
            continue;
        }

        database
            .upsert_company(&Company {
                id: None,
                ticker,
                name,
                sector,
                status: CompanyStatus::Active,
                last_updated: Some(Utc::now()),
            })
            .await?;
        loaded += 1;
    }

    info!("Loaded {} companies from {}", loaded, path.as_ref().display());
    Ok(loaded)
}
