//! Ratio calculations over a `Fundamentals` snapshot.
//!
//! Every ratio returns `Option<f64>`: `None` means an input was missing or
//! the denominator was degenerate. Callers that want the 0.0 sentinel
//! collapse with `unwrap_or(0.0)` (the `safe_div` semantics).

use super::{checked_div, Fundamentals};

/// Price / earnings. Negative earnings yield a negative ratio; the screener
/// rejects those through its own positive-earnings check.
pub fn pe_ratio(f: &Fundamentals) -> Option<f64> {
    checked_div(f.close_price, f.eps())
}

/// Price / book value
pub fn pb_ratio(f: &Fundamentals) -> Option<f64> {
    checked_div(f.close_price, f.book_value_per_share())
}

/// Price / sales
pub fn ps_ratio(f: &Fundamentals) -> Option<f64> {
    checked_div(f.close_price, f.revenue_per_share())
}

/// Return on equity, as a fraction (0.15 = 15%)
pub fn roe(f: &Fundamentals) -> Option<f64> {
    checked_div(f.net_income, f.total_equity)
}

/// Return on capital employed: operating income over
/// (total assets - current liabilities), as a fraction
pub fn roce(f: &Fundamentals) -> Option<f64> {
    checked_div(f.operating_income, f.capital_employed())
}

/// Current assets / current liabilities
pub fn current_ratio(f: &Fundamentals) -> Option<f64> {
    checked_div(f.current_assets, f.current_liabilities)
}

/// Total liabilities / total equity
pub fn debt_to_equity(f: &Fundamentals) -> Option<f64> {
    checked_div(f.total_liabilities, f.total_equity)
}

/// Long-term debt / working capital (the Graham leverage test input)
pub fn long_term_debt_to_working_capital(f: &Fundamentals) -> Option<f64> {
    checked_div(f.long_term_debt, f.working_capital())
}

/// EPS / dividend per share; how many times earnings cover the dividend
pub fn dividend_coverage(f: &Fundamentals) -> Option<f64> {
    checked_div(f.eps(), f.dividend_per_share())
}

/// Dividend per share / price, as a fraction
pub fn dividend_yield(f: &Fundamentals) -> Option<f64> {
    checked_div(f.dividend_per_share(), f.close_price)
}

/// Dividends paid / net income, as a fraction
pub fn payout_ratio(f: &Fundamentals) -> Option<f64> {
    checked_div(f.dividends_paid, f.net_income)
}

/// Compound annual dividend growth rate over a window, as a fraction.
///
/// `per_share_by_year` must be ordered oldest-first. The window compares the
/// latest value against the one `years` back; both endpoints must be present
/// and positive.
pub fn dividend_growth_rate(per_share_by_year: &[Option<f64>], years: usize) -> Option<f64> {
    if years == 0 || per_share_by_year.len() <= years {
        return None;
    }
    let latest = (*per_share_by_year.last()?)?;
    let base = per_share_by_year[per_share_by_year.len() - 1 - years]?;
    if base <= 0.0 || latest <= 0.0 {
        return None;
    }
    Some((latest / base).powf(1.0 / years as f64) - 1.0)
}

/// Cumulative EPS growth between the average of the first and last
/// `endpoint_span` years of the window, as a fraction. Graham smoothed the
/// endpoints over three years to avoid single-year distortions.
pub fn eps_growth(eps_by_year: &[Option<f64>], endpoint_span: usize) -> Option<f64> {
    if endpoint_span == 0 || eps_by_year.len() < endpoint_span * 2 {
        return None;
    }
    let head = average_present(&eps_by_year[..endpoint_span])?;
    let tail = average_present(&eps_by_year[eps_by_year.len() - endpoint_span..])?;
    if head <= 0.0 {
        return None;
    }
    Some(tail / head - 1.0)
}

fn average_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().copied().flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}
