//! Fundamental metrics: the safe-divide primitive and the per-year
//! `Fundamentals` snapshot that every ratio is computed from.

pub mod ratios;

use std::collections::HashMap;

pub use ratios::*;

/// Canonical record_type keys for statement line items.
///
/// The API client maps provider field names onto these; everything below the
/// ingestion layer only ever sees this vocabulary.
pub mod fields {
    // Income statement
    pub const REVENUE: &str = "revenue";
    pub const NET_INCOME: &str = "net_income";
    pub const OPERATING_INCOME: &str = "operating_income";
    pub const INTEREST_EXPENSE: &str = "interest_expense";
    pub const SHARES_OUTSTANDING: &str = "shares_outstanding";

    // Balance sheet
    pub const TOTAL_ASSETS: &str = "total_assets";
    pub const TOTAL_EQUITY: &str = "total_equity";
    pub const TOTAL_LIABILITIES: &str = "total_liabilities";
    pub const LONG_TERM_DEBT: &str = "long_term_debt";
    pub const CURRENT_ASSETS: &str = "total_current_assets";
    pub const CURRENT_LIABILITIES: &str = "total_current_liabilities";
    pub const CASH_AND_EQUIVALENTS: &str = "cash_and_equivalents";

    // Cash flow statement
    pub const OPERATING_CASH_FLOW: &str = "operating_cash_flow";
    pub const CAPITAL_EXPENDITURES: &str = "capital_expenditures";
    pub const DIVIDENDS_PAID: &str = "dividends_paid";
}

/// Division with the sentinel semantics used across every ratio: a missing
/// numerator, a missing denominator, or a zero denominator all yield 0.0
/// instead of an error or a non-finite value.
pub fn safe_div(numerator: Option<f64>, denominator: Option<f64>) -> f64 {
    checked_div(numerator, denominator).unwrap_or(0.0)
}

/// Division that keeps missing-ness observable: `None` when either operand
/// is missing or the denominator is zero. The screener's skip-if-missing
/// policy is built on this; `safe_div` is the sentinel-collapsing form.
pub fn checked_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Financial snapshot for one company and fiscal year, assembled from stored
/// statement line items plus the fiscal-year-end closing price.
#[derive(Debug, Clone, Default)]
pub struct Fundamentals {
    pub company_id: i64,
    pub ticker: String,
    pub sector: Option<String>,
    pub fiscal_year: i32,

    /// Close on (or nearest before) the fiscal year end
    pub close_price: Option<f64>,
    pub shares_outstanding: Option<f64>,

    // Income statement
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_income: Option<f64>,
    pub interest_expense: Option<f64>,

    // Balance sheet
    pub total_assets: Option<f64>,
    pub total_equity: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub cash_and_equivalents: Option<f64>,

    // Cash flow statement
    pub operating_cash_flow: Option<f64>,
    pub capital_expenditures: Option<f64>,
    pub dividends_paid: Option<f64>,
}

impl Fundamentals {
    /// Build a snapshot from a flat record_type -> value map
    pub fn from_records(
        company_id: i64,
        ticker: &str,
        sector: Option<String>,
        fiscal_year: i32,
        records: &HashMap<String, Option<f64>>,
        close_price: Option<f64>,
    ) -> Self {
        let get = |key: &str| records.get(key).copied().flatten();

        Fundamentals {
            company_id,
            ticker: ticker.to_string(),
            sector,
            fiscal_year,
            close_price,
            shares_outstanding: get(fields::SHARES_OUTSTANDING),
            revenue: get(fields::REVENUE),
            net_income: get(fields::NET_INCOME),
            operating_income: get(fields::OPERATING_INCOME),
            interest_expense: get(fields::INTEREST_EXPENSE),
            total_assets: get(fields::TOTAL_ASSETS),
            total_equity: get(fields::TOTAL_EQUITY),
            total_liabilities: get(fields::TOTAL_LIABILITIES),
            long_term_debt: get(fields::LONG_TERM_DEBT),
            current_assets: get(fields::CURRENT_ASSETS),
            current_liabilities: get(fields::CURRENT_LIABILITIES),
            cash_and_equivalents: get(fields::CASH_AND_EQUIVALENTS),
            operating_cash_flow: get(fields::OPERATING_CASH_FLOW),
            capital_expenditures: get(fields::CAPITAL_EXPENDITURES),
            dividends_paid: get(fields::DIVIDENDS_PAID),
        }
    }

    /// Earnings per share
    pub fn eps(&self) -> Option<f64> {
        checked_div(self.net_income, self.shares_outstanding)
    }

    /// Book value per share
    pub fn book_value_per_share(&self) -> Option<f64> {
        checked_div(self.total_equity, self.shares_outstanding)
    }

    /// Revenue per share
    pub fn revenue_per_share(&self) -> Option<f64> {
        checked_div(self.revenue, self.shares_outstanding)
    }

    /// Free cash flow = operating cash flow - capital expenditures.
    /// Capex is stored as a positive magnitude.
    pub fn free_cash_flow(&self) -> Option<f64> {
        match (self.operating_cash_flow, self.capital_expenditures) {
            (Some(ocf), Some(capex)) => Some(ocf - capex),
            _ => None,
        }
    }

    /// Free cash flow per share
    pub fn fcf_per_share(&self) -> Option<f64> {
        checked_div(self.free_cash_flow(), self.shares_outstanding)
    }

    /// Dividend per share. Dividends paid is stored as a positive magnitude.
    pub fn dividend_per_share(&self) -> Option<f64> {
        checked_div(self.dividends_paid, self.shares_outstanding)
    }

    /// Working capital = current assets - current liabilities
    pub fn working_capital(&self) -> Option<f64> {
        match (self.current_assets, self.current_liabilities) {
            (Some(ca), Some(cl)) => Some(ca - cl),
            _ => None,
        }
    }

    /// Capital employed = total assets - current liabilities
    pub fn capital_employed(&self) -> Option<f64> {
        match (self.total_assets, self.current_liabilities) {
            (Some(ta), Some(cl)) => Some(ta - cl),
            _ => None,
        }
    }

    /// Market capitalization at the snapshot's close price
    pub fn market_cap(&self) -> Option<f64> {
        match (self.close_price, self.shares_outstanding) {
            (Some(price), Some(shares)) => Some(price * shares),
            _ => None,
        }
    }
}
