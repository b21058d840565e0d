use anyhow::Result;
use chrono::{Datelike, NaiveDate, DateTime, Utc};
use sqlx::{sqlite::{SqlitePoolOptions, SqliteConnectOptions}, SqlitePool, Row};
use std::collections::HashMap;
use tracing::debug;

use crate::metrics::Fundamentals;
use crate::models::{Company, CompanyStatus, DailyClose, LineItem, StatementType};

pub mod screening;

/// SQLX-based access layer for the screening database.
///
/// An explicit handle owned by the caller; clones share the pool.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if missing) the database and ensure the schema exists
    pub async fn new(database_path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true),
            )
            .await?;

        // WAL for concurrent readers during ingestion
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

        let db = Self { pool };
        db.create_schema().await?;
        debug!("Database initialized at {}", database_path);
        Ok(db)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                sector TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                last_updated DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS financial_statements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                statement_type TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (company_id) REFERENCES companies(id),
                UNIQUE(company_id, statement_type, fiscal_year)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS financial_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                financial_statement_id INTEGER NOT NULL,
                record_type TEXT NOT NULL,
                record_value REAL,
                FOREIGN KEY (financial_statement_id) REFERENCES financial_statements(id),
                UNIQUE(financial_statement_id, record_type)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                date DATE NOT NULL,
                close_price REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (company_id) REFERENCES companies(id),
                UNIQUE(company_id, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS screening_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                ticker TEXT NOT NULL,
                screening_date DATE NOT NULL,
                sector TEXT,
                market_cap REAL,
                current_ratio REAL,
                debt_to_equity REAL,
                pe_ratio REAL,
                pb_ratio REAL,
                market_cap_check TEXT NOT NULL,
                current_ratio_check TEXT NOT NULL,
                leverage_check TEXT NOT NULL,
                earnings_stability_check TEXT NOT NULL,
                earnings_growth_check TEXT NOT NULL,
                valuation_check TEXT NOT NULL,
                dividend_record_check TEXT NOT NULL,
                passes BOOLEAN NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (company_id) REFERENCES companies(id),
                UNIQUE(company_id, screening_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_daily_prices_company_date ON daily_prices(company_id, date)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_financial_data_statement ON financial_data(financial_statement_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert a company, keyed by ticker
    pub async fn upsert_company(&self, company: &Company) -> Result<i64> {
        let status_str = match company.status {
            CompanyStatus::Active => "active",
            CompanyStatus::Delisted => "delisted",
        };
        let last_updated = company
            .last_updated
            .map(|dt| dt.naive_utc())
            .unwrap_or_else(|| Utc::now().naive_utc());

        let result = sqlx::query(
            r#"
            INSERT INTO companies (ticker, name, sector, status, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(ticker) DO UPDATE SET
                name = excluded.name,
                sector = COALESCE(excluded.sector, companies.sector),
                status = excluded.status,
                last_updated = excluded.last_updated
            RETURNING id
            "#,
        )
        .bind(&company.ticker)
        .bind(&company.name)
        .bind(&company.sector)
        .bind(status_str)
        .bind(last_updated)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.get::<i64, _>("id"))
    }

    /// Get a company by ticker
    pub async fn get_company_by_ticker(&self, ticker: &str) -> Result<Option<Company>> {
        let row = sqlx::query(
            r#"
            SELECT id, ticker, name, sector, status, last_updated
            FROM companies
            WHERE ticker = ?
            "#,
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_company))
    }

    /// Get all active companies ordered by ticker
    pub async fn get_active_companies(&self) -> Result<Vec<Company>> {
        let rows = sqlx::query(
            r#"
            SELECT id, ticker, name, sector, status, last_updated
            FROM companies
            WHERE status = 'active'
            ORDER BY ticker
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_company).collect())
    }

    /// Upsert a statement header, returning its id
    pub async fn upsert_statement(
        &self,
        company_id: i64,
        statement_type: StatementType,
        fiscal_year: i32,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO financial_statements (company_id, statement_type, fiscal_year)
            VALUES (?, ?, ?)
            ON CONFLICT(company_id, statement_type, fiscal_year) DO UPDATE SET
                fiscal_year = excluded.fiscal_year
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(statement_type.as_str())
        .bind(fiscal_year)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.get::<i64, _>("id"))
    }

    /// Upsert line items for a statement
    pub async fn upsert_line_items(&self, statement_id: i64, lines: &[LineItem]) -> Result<usize> {
        let mut written = 0;
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO financial_data (financial_statement_id, record_type, record_value)
                VALUES (?, ?, ?)
                ON CONFLICT(financial_statement_id, record_type) DO UPDATE SET
                    record_value = excluded.record_value
                "#,
            )
            .bind(statement_id)
            .bind(&line.record_type)
            .bind(line.value)
            .execute(&self.pool)
            .await?;
            written += 1;
        }
        Ok(written)
    }

    /// All line items for a company and fiscal year, across statement types
    pub async fn get_statement_records(
        &self,
        company_id: i64,
        fiscal_year: i32,
    ) -> Result<HashMap<String, Option<f64>>> {
        let rows = sqlx::query(
            r#"
            SELECT fd.record_type, fd.record_value
            FROM financial_data fd
            JOIN financial_statements fs ON fs.id = fd.financial_statement_id
            WHERE fs.company_id = ? AND fs.fiscal_year = ?
            "#,
        )
        .bind(company_id)
        .bind(fiscal_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get::<String, _>("record_type"),
                    r.get::<Option<f64>, _>("record_value"),
                )
            })
            .collect())
    }

    /// Fiscal year range covered by stored statements for a company
    pub async fn get_fiscal_year_range(&self, company_id: i64) -> Result<Option<(i32, i32)>> {
        let row = sqlx::query(
            r#"
            SELECT MIN(fiscal_year) as min_year, MAX(fiscal_year) as max_year
            FROM financial_statements
            WHERE company_id = ?
            "#,
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;

        let min_year = row.get::<Option<i32>, _>("min_year");
        let max_year = row.get::<Option<i32>, _>("max_year");
        Ok(min_year.zip(max_year))
    }

    /// Insert or update one daily close
    pub async fn insert_daily_close(&self, close: &DailyClose) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_prices (company_id, date, close_price)
            VALUES (?, ?, ?)
            ON CONFLICT(company_id, date) DO UPDATE SET
                close_price = excluded.close_price
            RETURNING id
            "#,
        )
        .bind(close.company_id)
        .bind(close.date)
        .bind(close.close_price)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.get::<i64, _>("id"))
    }

    /// Latest close for a company
    pub async fn get_latest_close(&self, company_id: i64) -> Result<Option<DailyClose>> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, date, close_price
            FROM daily_prices
            WHERE company_id = ?
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_close))
    }

    /// Close on the given date, or the nearest earlier one
    pub async fn get_close_on_or_before(
        &self,
        company_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyClose>> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, date, close_price
            FROM daily_prices
            WHERE company_id = ? AND date <= ?
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_close))
    }

    /// Assemble per-year fundamentals for a company, oldest year first.
    ///
    /// Each snapshot pairs the year's line items with the close on (or
    /// nearest before) December 31 of that fiscal year.
    pub async fn load_fundamentals_history(
        &self,
        company: &Company,
        lookback_years: usize,
    ) -> Result<Vec<Fundamentals>> {
        let company_id = company
            .id
            .ok_or_else(|| anyhow::anyhow!("Company has no id: {}", company.ticker))?;

        let Some((min_year, max_year)) = self.get_fiscal_year_range(company_id).await? else {
            return Ok(Vec::new());
        };
        let from_year = max_year - lookback_years.saturating_sub(1) as i32;
        let from_year = from_year.max(min_year);

        let mut history = Vec::new();
        for year in from_year..=max_year {
            let records = self.get_statement_records(company_id, year).await?;
            if records.is_empty() {
                continue;
            }
            let year_end = NaiveDate::from_ymd_opt(year, 12, 31)
                .ok_or_else(|| anyhow::anyhow!("invalid fiscal year {}", year))?;
            let close = self
                .get_close_on_or_before(company_id, year_end)
                .await?
                // Don't let a close from a prior year masquerade as this year's
                .filter(|c| c.date.year() == year)
                .map(|c| c.close_price);

            history.push(Fundamentals::from_records(
                company_id,
                &company.ticker,
                company.sector.clone(),
                year,
                &records,
                close,
            ));
        }

        Ok(history)
    }

    /// Delete all statements, line items, prices, and screening rows for a
    /// company; used before reseeding
    pub async fn delete_company_data(&self, company_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM financial_data
            WHERE financial_statement_id IN (
                SELECT id FROM financial_statements WHERE company_id = ?
            )
            "#,
        )
        .bind(company_id)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM financial_statements WHERE company_id = ?")
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM daily_prices WHERE company_id = ?")
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM screening_results WHERE company_id = ?")
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Row counts for the dashboard-style stats command
    pub async fn get_stats(&self) -> Result<HashMap<String, i64>> {
        let mut stats = HashMap::new();

        for (label, query) in [
            ("companies", "SELECT COUNT(*) as count FROM companies WHERE status = 'active'"),
            ("statements", "SELECT COUNT(*) as count FROM financial_statements"),
            ("line_items", "SELECT COUNT(*) as count FROM financial_data"),
            ("price_records", "SELECT COUNT(*) as count FROM daily_prices"),
            ("screening_results", "SELECT COUNT(*) as count FROM screening_results"),
        ] {
            let row = sqlx::query(query).fetch_one(&self.pool).await?;
            stats.insert(label.to_string(), row.get::<i64, _>("count"));
        }

        Ok(stats)
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn row_to_company(r: sqlx::sqlite::SqliteRow) -> Company {
    let status = match r.get::<Option<String>, _>("status").as_deref() {
        Some("delisted") => CompanyStatus::Delisted,
        _ => CompanyStatus::Active,
    };

    Company {
        id: Some(r.get::<i64, _>("id")),
        ticker: r.get::<String, _>("ticker"),
        name: r.get::<String, _>("name"),
        sector: r.get::<Option<String>, _>("sector"),
        status,
        last_updated: r.get::<Option<DateTime<Utc>>, _>("last_updated"),
    }
}

fn row_to_close(r: sqlx::sqlite::SqliteRow) -> DailyClose {
    DailyClose {
        id: Some(r.get::<i64, _>("id")),
        company_id: r.get::<i64, _>("company_id"),
        date: r.get::<NaiveDate, _>("date"),
        close_price: r.get::<f64, _>("close_price"),
    }
}
