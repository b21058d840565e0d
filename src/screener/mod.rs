//! Graham-style value screening.
//!
//! A fixed rule set evaluated per company over its fundamentals history.
//! Each check yields pass/fail/skipped; a check whose inputs are missing is
//! skipped rather than failed, and a company passes the screen when no check
//! failed. Sector exceptions: Utilities skip the current-ratio test.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::database::DatabaseManager;
use crate::metrics::{ratios, Fundamentals};

/// Outcome of a single screening check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// Inputs unavailable; the check does not count against the company
    Skipped,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Passed => "passed",
            CheckOutcome::Failed => "failed",
            CheckOutcome::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> CheckOutcome {
        match value {
            "passed" => CheckOutcome::Passed,
            "failed" => CheckOutcome::Failed,
            _ => CheckOutcome::Skipped,
        }
    }

    fn from_test(input: Option<bool>) -> CheckOutcome {
        match input {
            Some(true) => CheckOutcome::Passed,
            Some(false) => CheckOutcome::Failed,
            None => CheckOutcome::Skipped,
        }
    }
}

/// Thresholds for the fixed rule set
#[derive(Debug, Clone)]
pub struct ScreeningCriteria {
    pub min_market_cap: f64,
    pub min_current_ratio: f64,
    pub max_debt_to_equity: f64,
    /// Years of positive earnings required for stability
    pub earnings_lookback_years: usize,
    /// Cumulative EPS growth over the lookback, as a fraction
    pub min_eps_growth: f64,
    pub max_pe_ratio: f64,
    pub max_pb_ratio: f64,
    /// The flexible alternative: P/E x P/B below this also passes valuation
    pub max_pe_pb_product: f64,
    /// Years of uninterrupted dividends required
    pub dividend_lookback_years: usize,
}

impl Default for ScreeningCriteria {
    fn default() -> Self {
        Self {
            min_market_cap: 2_000_000_000.0,
            min_current_ratio: 2.0,
            max_debt_to_equity: 2.0,
            earnings_lookback_years: 10,
            min_eps_growth: 0.33,
            max_pe_ratio: 15.0,
            max_pb_ratio: 1.5,
            max_pe_pb_product: 22.5,
            dividend_lookback_years: 10,
        }
    }
}

/// Per-check outcomes for one company
#[derive(Debug, Clone, Copy)]
pub struct CheckSet {
    pub market_cap: CheckOutcome,
    pub current_ratio: CheckOutcome,
    pub leverage: CheckOutcome,
    pub earnings_stability: CheckOutcome,
    pub earnings_growth: CheckOutcome,
    pub valuation: CheckOutcome,
    pub dividend_record: CheckOutcome,
}

impl CheckSet {
    pub fn all(&self) -> [(&'static str, CheckOutcome); 7] {
        [
            ("market_cap", self.market_cap),
            ("current_ratio", self.current_ratio),
            ("leverage", self.leverage),
            ("earnings_stability", self.earnings_stability),
            ("earnings_growth", self.earnings_growth),
            ("valuation", self.valuation),
            ("dividend_record", self.dividend_record),
        ]
    }

    fn any_failed(&self) -> bool {
        self.all()
            .iter()
            .any(|(_, outcome)| *outcome == CheckOutcome::Failed)
    }
}

/// Screening result for one company
#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub company_id: i64,
    pub ticker: String,
    pub sector: Option<String>,
    pub screening_date: NaiveDate,

    // Snapshot of the ratios behind the verdict
    pub market_cap: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,

    pub checks: CheckSet,
    pub passes: bool,
}

/// Evaluate the rule set against a company's fundamentals history.
///
/// `history` is ordered oldest-first; the last element is the latest fiscal
/// year and supplies the valuation inputs.
pub fn evaluate(
    criteria: &ScreeningCriteria,
    history: &[Fundamentals],
    screening_date: NaiveDate,
) -> Option<ScreeningOutcome> {
    let latest = history.last()?;

    let market_cap = latest.market_cap();
    let current_ratio = ratios::current_ratio(latest);
    let debt_to_equity = ratios::debt_to_equity(latest);
    let pe = ratios::pe_ratio(latest);
    let pb = ratios::pb_ratio(latest);

    let is_utility = latest
        .sector
        .as_deref()
        .map_or(false, |s| s.eq_ignore_ascii_case("Utilities"));

    let market_cap_check =
        CheckOutcome::from_test(market_cap.map(|cap| cap >= criteria.min_market_cap));

    // Utilities finance working capital through regulated debt; Graham
    // exempted them from the liquidity test
    let current_ratio_check = if is_utility {
        CheckOutcome::Skipped
    } else {
        CheckOutcome::from_test(current_ratio.map(|cr| cr >= criteria.min_current_ratio))
    };

    let leverage_check = CheckOutcome::from_test(leverage_test(criteria, latest, debt_to_equity));

    let eps_by_year: Vec<Option<f64>> = history.iter().map(|f| f.eps()).collect();
    let earnings_window = window(&eps_by_year, criteria.earnings_lookback_years);

    let earnings_stability_check = CheckOutcome::from_test(stability_test(
        earnings_window,
        criteria.earnings_lookback_years,
    ));
    let earnings_growth_check = CheckOutcome::from_test(
        ratios::eps_growth(earnings_window, 3).map(|growth| growth >= criteria.min_eps_growth),
    );

    let valuation_check = CheckOutcome::from_test(valuation_test(criteria, pe, pb));

    let dps_by_year: Vec<Option<f64>> = history.iter().map(|f| f.dividend_per_share()).collect();
    let dividend_record_check = CheckOutcome::from_test(dividend_record_test(
        window(&dps_by_year, criteria.dividend_lookback_years),
        criteria.dividend_lookback_years,
    ));

    let checks = CheckSet {
        market_cap: market_cap_check,
        current_ratio: current_ratio_check,
        leverage: leverage_check,
        earnings_stability: earnings_stability_check,
        earnings_growth: earnings_growth_check,
        valuation: valuation_check,
        dividend_record: dividend_record_check,
    };

    Some(ScreeningOutcome {
        company_id: latest.company_id,
        ticker: latest.ticker.clone(),
        sector: latest.sector.clone(),
        screening_date,
        market_cap,
        current_ratio,
        debt_to_equity,
        pe_ratio: pe,
        pb_ratio: pb,
        passes: !checks.any_failed(),
        checks,
    })
}

/// Long-term debt must not exceed working capital; debt/equity is capped as
/// a secondary guard. Either sub-test failing fails the check; both missing
/// skips it.
fn leverage_test(
    criteria: &ScreeningCriteria,
    latest: &Fundamentals,
    debt_to_equity: Option<f64>,
) -> Option<bool> {
    let ltd_vs_wc = match (latest.long_term_debt, latest.working_capital()) {
        (Some(ltd), Some(wc)) => Some(ltd <= wc),
        _ => None,
    };
    let de_ok = debt_to_equity.map(|de| de <= criteria.max_debt_to_equity);

    match (ltd_vs_wc, de_ok) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(true) && b.unwrap_or(true)),
    }
}

/// Positive earnings in every year of the window. Requires the full window
/// of data; any non-positive year fails, a short history or a gap skips.
fn stability_test(eps_window: &[Option<f64>], required_years: usize) -> Option<bool> {
    if eps_window.iter().flatten().any(|eps| *eps <= 0.0) {
        return Some(false);
    }
    if eps_window.len() < required_years {
        return None;
    }
    let present = eps_window.iter().flatten().count();
    if present == eps_window.len() {
        Some(true)
    } else {
        None
    }
}

/// Moderate P/E and P/B, or the combined product alternative
fn valuation_test(criteria: &ScreeningCriteria, pe: Option<f64>, pb: Option<f64>) -> Option<bool> {
    let (pe, pb) = (pe?, pb?);
    if pe <= 0.0 || pb <= 0.0 {
        return Some(false);
    }
    Some(
        (pe <= criteria.max_pe_ratio && pb <= criteria.max_pb_ratio)
            || pe * pb <= criteria.max_pe_pb_product,
    )
}

/// A dividend paid in every year of the window. Requires the full window of
/// data; a recorded zero fails, a gap skips.
fn dividend_record_test(dps_window: &[Option<f64>], required_years: usize) -> Option<bool> {
    if dps_window.iter().flatten().any(|dps| *dps <= 0.0) {
        return Some(false);
    }
    if dps_window.len() < required_years {
        return None;
    }
    let present = dps_window.iter().flatten().count();
    if present == dps_window.len() {
        Some(true)
    } else {
        None
    }
}

fn window<T>(series: &[T], years: usize) -> &[T] {
    let start = series.len().saturating_sub(years);
    &series[start..]
}

/// Runs the screen over all active companies and persists the results
pub struct Screener {
    database: DatabaseManager,
    criteria: ScreeningCriteria,
}

/// Tally of a full screening run
#[derive(Debug, Default)]
pub struct ScreeningStats {
    pub companies_screened: usize,
    pub companies_passed: usize,
    pub companies_without_data: usize,
}

impl Screener {
    pub fn new(database: DatabaseManager, criteria: ScreeningCriteria) -> Self {
        Self { database, criteria }
    }

    /// Screen every active company against the rule set, save the results,
    /// and return the passing outcomes
    pub async fn run(&self) -> Result<(Vec<ScreeningOutcome>, ScreeningStats)> {
        let screening_date = Local::now().date_naive();
        let companies = self.database.get_active_companies().await?;
        info!("Screening {} companies", companies.len());

        let lookback = self
            .criteria
            .earnings_lookback_years
            .max(self.criteria.dividend_lookback_years);

        let mut outcomes = Vec::new();
        let mut stats = ScreeningStats::default();

        for company in &companies {
            let history = self
                .database
                .load_fundamentals_history(company, lookback)
                .await?;

            match evaluate(&self.criteria, &history, screening_date) {
                Some(outcome) => {
                    stats.companies_screened += 1;
                    if outcome.passes {
                        stats.companies_passed += 1;
                    }
                    outcomes.push(outcome);
                }
                None => {
                    stats.companies_without_data += 1;
                }
            }
        }

        self.database
            .save_screening_run(screening_date, &outcomes)
            .await?;

        info!(
            "Screening complete: {} screened, {} passed, {} without data",
            stats.companies_screened, stats.companies_passed, stats.companies_without_data
        );

        let passing = outcomes.into_iter().filter(|o| o.passes).collect();
        Ok((passing, stats))
    }
}
