use anyhow::Result;
use chrono::NaiveDate;
use std::time::Duration;

use crate::models::{CompanyProfile, StatementRecords, StatementType};

pub mod fmp_client;
pub use fmp_client::FmpClient;

/// Errors surfaced by the data provider client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Simple rate limiter for API requests
pub struct ApiRateLimiter {
    delay_ms: u64,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let delay_ms = if requests_per_minute > 0 {
            60_000 / requests_per_minute as u64
        } else {
            1000 // Default 1 second delay
        };

        Self { delay_ms }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
    }
}

/// Common trait for fundamentals/price providers
#[async_trait::async_trait]
pub trait FundamentalsProvider {
    /// Fetch annual statements of one type for a ticker, oldest year first
    async fn fetch_statements(
        &self,
        ticker: &str,
        statement_type: StatementType,
        from_year: i32,
        to_year: i32,
    ) -> Result<Vec<StatementRecords>>;

    /// Fetch daily closing prices for a ticker over a date range
    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>>;

    /// Fetch the company profile (name, sector)
    async fn fetch_profile(&self, ticker: &str) -> Result<CompanyProfile>;
}
