use anyhow::Result;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::metrics::fields;
use crate::models::{CompanyProfile, Config, LineItem, StatementRecords, StatementType};
use super::{ApiError, ApiRateLimiter, FundamentalsProvider};

/// Client for a Financial Modeling Prep style fundamentals API.
///
/// Statement endpoints return an array of yearly objects whose numeric fields
/// arrive stringly-typed, with the literal string "None" standing in for
/// missing values. All of that is normalized here; nothing downstream ever
/// sees the sentinel.
pub struct FmpClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: ApiRateLimiter,
}

impl FmpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("value-screener/1.0")
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    /// Make a request to the API, appending the key and the fixed
    /// inter-request pause
    async fn make_request(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/{}", self.base_url, path);
        debug!("Making request to: {}", url);

        let mut request = self.client.get(&url).query(&[("apikey", self.api_key.as_str())]);
        for (key, value) in query {
            request = request.query(&[(*key, value.as_str())]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let json: Value = response.json().await?;
        Ok(json)
    }

    fn statement_path(statement_type: StatementType) -> &'static str {
        match statement_type {
            StatementType::IncomeStatement => "income-statement",
            StatementType::BalanceSheet => "balance-sheet-statement",
            StatementType::CashFlow => "cash-flow-statement",
        }
    }

    /// Provider field name -> canonical record_type, per statement type
    fn statement_fields(statement_type: StatementType) -> &'static [(&'static str, &'static str)] {
        match statement_type {
            StatementType::IncomeStatement => &[
                ("revenue", fields::REVENUE),
                ("netIncome", fields::NET_INCOME),
                ("operatingIncome", fields::OPERATING_INCOME),
                ("interestExpense", fields::INTEREST_EXPENSE),
                ("weightedAverageShsOut", fields::SHARES_OUTSTANDING),
            ],
            StatementType::BalanceSheet => &[
                ("totalAssets", fields::TOTAL_ASSETS),
                ("totalStockholdersEquity", fields::TOTAL_EQUITY),
                ("totalLiabilities", fields::TOTAL_LIABILITIES),
                ("longTermDebt", fields::LONG_TERM_DEBT),
                ("totalCurrentAssets", fields::CURRENT_ASSETS),
                ("totalCurrentLiabilities", fields::CURRENT_LIABILITIES),
                ("cashAndCashEquivalents", fields::CASH_AND_EQUIVALENTS),
            ],
            StatementType::CashFlow => &[
                ("operatingCashFlow", fields::OPERATING_CASH_FLOW),
                ("capitalExpenditure", fields::CAPITAL_EXPENDITURES),
                ("dividendsPaid", fields::DIVIDENDS_PAID),
            ],
        }
    }
}

/// Parse a stringly-typed API number. Accepts real JSON numbers, numeric
/// strings, and the literal "None" sentinel (which maps to `None`, as do
/// empty and unparseable strings).
pub fn parse_api_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "None" {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Extract the fiscal year from a yearly statement object. The provider
/// sends "calendarYear" as a string; fall back to the leading year of "date".
fn parse_fiscal_year(entry: &Value) -> Option<i32> {
    if let Some(year) = entry.get("calendarYear").and_then(|v| v.as_str()) {
        if let Ok(year) = year.trim().parse::<i32>() {
            return Some(year);
        }
    }
    entry
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|date| date.get(..4))
        .and_then(|year| year.parse::<i32>().ok())
}

#[async_trait::async_trait]
impl FundamentalsProvider for FmpClient {
    async fn fetch_statements(
        &self,
        ticker: &str,
        statement_type: StatementType,
        from_year: i32,
        to_year: i32,
    ) -> Result<Vec<StatementRecords>> {
        let limit = (to_year - from_year + 1).max(1);
        let path = format!("{}/{}", Self::statement_path(statement_type), ticker);
        let data = self
            .make_request(&path, &[("period", "annual".to_string()), ("limit", limit.to_string())])
            .await?;

        let entries = data
            .as_array()
            .ok_or_else(|| ApiError::Shape(format!("expected array for {}", path)))?;

        let field_map = Self::statement_fields(statement_type);
        let mut statements = Vec::new();

        for entry in entries {
            let Some(fiscal_year) = parse_fiscal_year(entry) else {
                debug!("Skipping {} entry without fiscal year", ticker);
                continue;
            };
            if fiscal_year < from_year || fiscal_year > to_year {
                continue;
            }

            let lines = field_map
                .iter()
                .map(|(api_field, record_type)| {
                    let raw = entry.get(*api_field);
                    let mut value = parse_api_number(raw);
                    // Cash outflows arrive negative; store magnitudes
                    if matches!(*record_type, fields::CAPITAL_EXPENDITURES | fields::DIVIDENDS_PAID) {
                        value = value.map(f64::abs);
                    }
                    LineItem {
                        record_type: record_type.to_string(),
                        value,
                    }
                })
                .collect();

            statements.push(StatementRecords { fiscal_year, lines });
        }

        // Providers return newest-first; callers expect oldest-first
        statements.sort_by_key(|s| s.fiscal_year);

        debug!(
            "Retrieved {} {} statements for {}",
            statements.len(),
            statement_type.as_str(),
            ticker
        );
        Ok(statements)
    }

    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let path = format!("historical-price-full/{}", ticker);
        let data = self
            .make_request(
                &path,
                &[
                    ("from", from_date.format("%Y-%m-%d").to_string()),
                    ("to", to_date.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        let mut closes = Vec::new();
        if let Some(entries) = data.get("historical").and_then(|v| v.as_array()) {
            for entry in entries {
                let date = entry
                    .get("date")
                    .and_then(|v| v.as_str())
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                let close = parse_api_number(entry.get("close"));

                if let (Some(date), Some(close)) = (date, close) {
                    closes.push((date, close));
                }
            }
        }

        closes.sort_by_key(|(date, _)| *date);

        debug!(
            "Retrieved {} closes for {} from {} to {}",
            closes.len(),
            ticker,
            from_date,
            to_date
        );
        Ok(closes)
    }

    async fn fetch_profile(&self, ticker: &str) -> Result<CompanyProfile> {
        let path = format!("profile/{}", ticker);
        let data = self.make_request(&path, &[]).await?;

        let entry = data
            .as_array()
            .and_then(|entries| entries.first())
            .ok_or_else(|| ApiError::Shape(format!("empty profile response for {}", ticker)))?;

        let name = entry
            .get("companyName")
            .and_then(|v| v.as_str())
            .unwrap_or(ticker)
            .to_string();
        let sector = entry
            .get("sector")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string());

        Ok(CompanyProfile {
            ticker: ticker.to_string(),
            name,
            sector,
        })
    }
}
