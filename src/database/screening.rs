//! Persistence for screening runs: one row per company per screening date,
//! replaced wholesale when a run is repeated on the same day.

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::Row;
use tracing::info;

use super::DatabaseManager;
use crate::screener::{CheckOutcome, CheckSet, ScreeningOutcome};

impl DatabaseManager {
    /// Save the results of a screening run, replacing any earlier run from
    /// the same date
    pub async fn save_screening_run(
        &self,
        screening_date: NaiveDate,
        results: &[ScreeningOutcome],
    ) -> Result<()> {
        sqlx::query("DELETE FROM screening_results WHERE screening_date = ?")
            .bind(screening_date)
            .execute(&self.pool)
            .await?;

        for result in results {
            sqlx::query(
                r#"
                INSERT INTO screening_results (
                    company_id, ticker, screening_date, sector,
                    market_cap, current_ratio, debt_to_equity, pe_ratio, pb_ratio,
                    market_cap_check, current_ratio_check, leverage_check,
                    earnings_stability_check, earnings_growth_check,
                    valuation_check, dividend_record_check, passes
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(result.company_id)
            .bind(&result.ticker)
            .bind(screening_date)
            .bind(&result.sector)
            .bind(result.market_cap)
            .bind(result.current_ratio)
            .bind(result.debt_to_equity)
            .bind(result.pe_ratio)
            .bind(result.pb_ratio)
            .bind(result.checks.market_cap.as_str())
            .bind(result.checks.current_ratio.as_str())
            .bind(result.checks.leverage.as_str())
            .bind(result.checks.earnings_stability.as_str())
            .bind(result.checks.earnings_growth.as_str())
            .bind(result.checks.valuation.as_str())
            .bind(result.checks.dividend_record.as_str())
            .bind(result.passes)
            .execute(&self.pool)
            .await?;
        }

        info!(
            "Saved {} screening results for {}",
            results.len(),
            screening_date
        );
        Ok(())
    }

    /// Load the screening results saved for a date, tickers ascending
    pub async fn load_screening_results(
        &self,
        screening_date: NaiveDate,
    ) -> Result<Vec<ScreeningOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT company_id, ticker, screening_date, sector,
                   market_cap, current_ratio, debt_to_equity, pe_ratio, pb_ratio,
                   market_cap_check, current_ratio_check, leverage_check,
                   earnings_stability_check, earnings_growth_check,
                   valuation_check, dividend_record_check, passes
            FROM screening_results
            WHERE screening_date = ?
            ORDER BY ticker
            "#,
        )
        .bind(screening_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let check = |column: &str| CheckOutcome::parse(&r.get::<String, _>(column));
                ScreeningOutcome {
                    company_id: r.get::<i64, _>("company_id"),
                    ticker: r.get::<String, _>("ticker"),
                    sector: r.get::<Option<String>, _>("sector"),
                    screening_date: r.get::<NaiveDate, _>("screening_date"),
                    market_cap: r.get::<Option<f64>, _>("market_cap"),
                    current_ratio: r.get::<Option<f64>, _>("current_ratio"),
                    debt_to_equity: r.get::<Option<f64>, _>("debt_to_equity"),
                    pe_ratio: r.get::<Option<f64>, _>("pe_ratio"),
                    pb_ratio: r.get::<Option<f64>, _>("pb_ratio"),
                    checks: CheckSet {
                        market_cap: check("market_cap_check"),
                        current_ratio: check("current_ratio_check"),
                        leverage: check("leverage_check"),
                        earnings_stability: check("earnings_stability_check"),
                        earnings_growth: check("earnings_growth_check"),
                        valuation: check("valuation_check"),
                        dividend_record: check("dividend_record_check"),
                    },
                    passes: r.get::<bool, _>("passes"),
                }
            })
            .collect())
    }

    /// The most recent date with saved screening results
    pub async fn latest_screening_date(&self) -> Result<Option<NaiveDate>> {
        let row = sqlx::query("SELECT MAX(screening_date) as latest FROM screening_results")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<NaiveDate>, _>("latest")))
    }
}
