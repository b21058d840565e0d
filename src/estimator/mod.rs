//! Ratio-reversion fair-value estimation.
//!
//! One parameterized calculator covers every metric: take the historical
//! average of price over a per-share fundamental, compare it to the current
//! multiple, and rescale the current price by historical/current. Years with
//! missing inputs are dropped from the average; below a minimum year count
//! the model abstains instead of guessing.

use anyhow::Result;
use tracing::info;

use crate::database::DatabaseManager;
use crate::metrics::Fundamentals;

/// Per-share fundamental a reversion model reverts against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversionMetric {
    Earnings,
    BookValue,
    Sales,
    FreeCashFlow,
    Dividends,
}

impl ReversionMetric {
    pub const ALL: [ReversionMetric; 5] = [
        ReversionMetric::Earnings,
        ReversionMetric::BookValue,
        ReversionMetric::Sales,
        ReversionMetric::FreeCashFlow,
        ReversionMetric::Dividends,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReversionMetric::Earnings => "P/E reversion",
            ReversionMetric::BookValue => "P/B reversion",
            ReversionMetric::Sales => "P/S reversion",
            ReversionMetric::FreeCashFlow => "P/FCF reversion",
            ReversionMetric::Dividends => "dividend yield reversion",
        }
    }

    fn per_share(&self, f: &Fundamentals) -> Option<f64> {
        match self {
            ReversionMetric::Earnings => f.eps(),
            ReversionMetric::BookValue => f.book_value_per_share(),
            ReversionMetric::Sales => f.revenue_per_share(),
            ReversionMetric::FreeCashFlow => f.fcf_per_share(),
            ReversionMetric::Dividends => f.dividend_per_share(),
        }
    }
}

/// A single parameterized reversion model
#[derive(Debug, Clone)]
pub struct ReversionModel {
    pub metric: ReversionMetric,
    /// Years of history considered for the average multiple
    pub lookback_years: usize,
    /// Minimum usable years before the model produces an estimate
    pub min_years: usize,
    /// Non-positive per-share fundamentals are clamped to this before
    /// forming a multiple
    pub denominator_floor: f64,
}

impl ReversionModel {
    pub fn new(metric: ReversionMetric) -> Self {
        Self {
            metric,
            lookback_years: 10,
            min_years: 3,
            denominator_floor: 0.01,
        }
    }

    fn clamped_per_share(&self, f: &Fundamentals) -> Option<f64> {
        let value = self.metric.per_share(f)?;
        if value <= 0.0 {
            Some(self.denominator_floor)
        } else {
            Some(value)
        }
    }

    /// Fair price for the latest snapshot given a current market price.
    ///
    /// `history` is ordered oldest-first and includes the latest year; each
    /// year contributes price/per-share when both are present.
    pub fn estimate(&self, history: &[Fundamentals], current_price: f64) -> Option<f64> {
        if current_price <= 0.0 {
            return None;
        }
        let latest = history.last()?;

        let start = history.len().saturating_sub(self.lookback_years);
        let multiples: Vec<f64> = history[start..]
            .iter()
            .filter_map(|f| {
                let price = f.close_price?;
                let per_share = self.clamped_per_share(f)?;
                Some(price / per_share)
            })
            .collect();

        if multiples.len() < self.min_years {
            return None;
        }
        let historical_multiple = multiples.iter().sum::<f64>() / multiples.len() as f64;

        let current_per_share = self.clamped_per_share(latest)?;
        let current_multiple = current_price / current_per_share;
        if current_multiple == 0.0 {
            return None;
        }

        Some(current_price * historical_multiple / current_multiple)
    }
}

/// One model's verdict within a fair-value report
#[derive(Debug, Clone)]
pub struct ModelEstimate {
    pub label: &'static str,
    pub fair_price: Option<f64>,
}

/// Fair-value report for one company
#[derive(Debug, Clone)]
pub struct FairValueEstimate {
    pub ticker: String,
    pub current_price: f64,
    pub estimates: Vec<ModelEstimate>,
    /// Mean of the models that produced a value
    pub composite: Option<f64>,
}

impl FairValueEstimate {
    /// Upside of the composite versus the current price, as a fraction
    pub fn composite_upside(&self) -> Option<f64> {
        let composite = self.composite?;
        if self.current_price > 0.0 {
            Some(composite / self.current_price - 1.0)
        } else {
            None
        }
    }
}

/// Run the full model set against a history and current price
pub fn estimate_fair_value(
    ticker: &str,
    history: &[Fundamentals],
    current_price: f64,
) -> FairValueEstimate {
    let estimates: Vec<ModelEstimate> = ReversionMetric::ALL
        .iter()
        .map(|metric| {
            let model = ReversionModel::new(*metric);
            ModelEstimate {
                label: metric.label(),
                fair_price: model.estimate(history, current_price),
            }
        })
        .collect();

    let produced: Vec<f64> = estimates.iter().filter_map(|e| e.fair_price).collect();
    let composite = if produced.is_empty() {
        None
    } else {
        Some(produced.iter().sum::<f64>() / produced.len() as f64)
    };

    FairValueEstimate {
        ticker: ticker.to_string(),
        current_price,
        estimates,
        composite,
    }
}

/// Database-backed fair-value estimation
pub struct FairValueEngine {
    database: DatabaseManager,
    lookback_years: usize,
}

impl FairValueEngine {
    pub fn new(database: DatabaseManager) -> Self {
        Self {
            database,
            lookback_years: 10,
        }
    }

    /// Estimate fair value for one ticker using stored fundamentals and the
    /// latest stored close
    pub async fn estimate_for_ticker(&self, ticker: &str) -> Result<FairValueEstimate> {
        let company = self
            .database
            .get_company_by_ticker(ticker)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Unknown ticker: {}", ticker))?;
        let company_id = company
            .id
            .ok_or_else(|| anyhow::anyhow!("Company has no id: {}", ticker))?;

        let history = self
            .database
            .load_fundamentals_history(&company, self.lookback_years)
            .await?;
        let current_price = self
            .database
            .get_latest_close(company_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No price data for {}", ticker))?
            .close_price;

        info!(
            "Estimating fair value for {} over {} years of fundamentals",
            ticker,
            history.len()
        );
        Ok(estimate_fair_value(ticker, &history, current_price))
    }
}
