use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Core company information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Option<i64>,
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub status: CompanyStatus,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Company status enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CompanyStatus {
    Active,
    Delisted,
}

impl Default for CompanyStatus {
    fn default() -> Self {
        CompanyStatus::Active
    }
}

/// Financial statement kinds stored per (company, fiscal year)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StatementType {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
}

impl StatementType {
    pub const ALL: [StatementType; 3] = [
        StatementType::IncomeStatement,
        StatementType::BalanceSheet,
        StatementType::CashFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::IncomeStatement => "income_statement",
            StatementType::BalanceSheet => "balance_sheet",
            StatementType::CashFlow => "cash_flow",
        }
    }

    pub fn parse(value: &str) -> Option<StatementType> {
        match value {
            "income_statement" => Some(StatementType::IncomeStatement),
            "balance_sheet" => Some(StatementType::BalanceSheet),
            "cash_flow" => Some(StatementType::CashFlow),
            _ => None,
        }
    }
}

/// Statement header row; line items live in `financial_data`
#[derive(Debug, Clone)]
pub struct FinancialStatement {
    pub id: Option<i64>,
    pub company_id: i64,
    pub statement_type: StatementType,
    pub fiscal_year: i32,
}

/// One statement line item as fetched from the API.
///
/// `value` is `None` when the upstream record carried the literal string
/// "None" or an unparseable number; the string sentinel never survives
/// past the API boundary.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub record_type: String,
    pub value: Option<f64>,
}

/// A fetched statement for one fiscal year
#[derive(Debug, Clone)]
pub struct StatementRecords {
    pub fiscal_year: i32,
    pub lines: Vec<LineItem>,
}

/// Daily closing price row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyClose {
    pub id: Option<i64>,
    pub company_id: i64,
    pub date: NaiveDate,
    pub close_price: f64,
}

/// Company profile as returned by the data provider
#[derive(Debug, Clone)]
pub struct CompanyProfile {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base_url: String,
    pub database_path: String,
    pub rate_limit_per_minute: u32,
    pub worker_count: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            api_key: std::env::var("FUNDAMENTALS_API_KEY")
                .map_err(|_| anyhow::anyhow!("FUNDAMENTALS_API_KEY environment variable required"))?,
            api_base_url: std::env::var("FUNDAMENTALS_API_BASE_URL")
                .unwrap_or_else(|_| "https://financialmodelingprep.com/api/v3".to_string()),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "stocks.db".to_string()),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            worker_count: std::env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),
        })
    }
}
