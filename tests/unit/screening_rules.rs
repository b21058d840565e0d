//! Screen rule behavior exercised through the public `evaluate` entry point

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use crate::common::test_data::make_fundamentals;
use value_screener::metrics::Fundamentals;
use value_screener::screener::{evaluate, CheckOutcome, ScreeningCriteria};

fn history(years: usize) -> Vec<Fundamentals> {
    (0..years)
        .map(|i| make_fundamentals(1, "TEST", 2014 + i as i32))
        .collect()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[test]
fn ratio_snapshot_reflects_latest_year() {
    let outcome = evaluate(&ScreeningCriteria::default(), &history(10), date()).unwrap();

    // price 50, EPS 5, BVPS 20, 100 shares
    assert_eq!(outcome.pe_ratio, Some(10.0));
    assert_eq!(outcome.pb_ratio, Some(2.5));
    assert_eq!(outcome.current_ratio, Some(2.0));
    assert_eq!(outcome.debt_to_equity, Some(2.0));
    assert_eq!(outcome.market_cap, Some(5_000.0));
    assert_eq!(outcome.screening_date, date());
}

#[test]
fn small_company_fails_size_check() {
    // market cap of 5,000 is far below the two-billion floor
    let outcome = evaluate(&ScreeningCriteria::default(), &history(10), date()).unwrap();
    assert_eq!(outcome.checks.market_cap, CheckOutcome::Failed);
    assert!(!outcome.passes);
}

#[test]
fn short_history_skips_lookback_checks() {
    // Four years cannot support smoothed endpoints or a ten-year record of
    // dividends or stable earnings
    let outcome = evaluate(&ScreeningCriteria::default(), &history(4), date()).unwrap();
    assert_eq!(outcome.checks.earnings_growth, CheckOutcome::Skipped);
    assert_eq!(outcome.checks.dividend_record, CheckOutcome::Skipped);
    assert_eq!(outcome.checks.earnings_stability, CheckOutcome::Skipped);
}

#[test]
fn utilities_sector_match_is_case_insensitive() {
    let mut history = history(10);
    for f in &mut history {
        f.sector = Some("UTILITIES".to_string());
    }
    let outcome = evaluate(&ScreeningCriteria::default(), &history, date()).unwrap();
    assert_eq!(outcome.checks.current_ratio, CheckOutcome::Skipped);
}

#[test]
fn missing_shares_makes_valuation_unobservable() {
    let mut history = history(10);
    if let Some(latest) = history.last_mut() {
        latest.shares_outstanding = None;
    }
    let outcome = evaluate(&ScreeningCriteria::default(), &history, date()).unwrap();
    assert_eq!(outcome.pe_ratio, None);
    assert_eq!(outcome.checks.valuation, CheckOutcome::Skipped);
    assert_eq!(outcome.checks.market_cap, CheckOutcome::Skipped);
}

#[test]
fn check_outcome_persistable_round_trip() {
    for outcome in [CheckOutcome::Passed, CheckOutcome::Failed, CheckOutcome::Skipped] {
        assert_eq!(CheckOutcome::parse(outcome.as_str()), outcome);
    }
    // unknown strings degrade to skipped rather than panicking
    assert_eq!(CheckOutcome::parse("maybe"), CheckOutcome::Skipped);
}
