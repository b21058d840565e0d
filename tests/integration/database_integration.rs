//! SQLite round-trip tests against a temporary database

use anyhow::Result;
use chrono::NaiveDate;

use crate::common::{init_fresh_test_database, test_data};
use value_screener::estimator::FairValueEngine;
use value_screener::models::{LineItem, StatementType};
use value_screener::screener::{evaluate, ScreeningCriteria, Screener};

async fn seed_company(db: &value_screener::database::DatabaseManager, ticker: &str) -> Result<i64> {
    db.upsert_company(&test_data::make_company(ticker, "Seed Co")).await
}

/// Insert the standard line-item set for one fiscal year plus its year-end close
async fn seed_year(
    db: &value_screener::database::DatabaseManager,
    company_id: i64,
    year: i32,
) -> Result<()> {
    for (statement_type, lines) in test_data::make_line_items() {
        let statement_id = db.upsert_statement(company_id, statement_type, year).await?;
        db.upsert_line_items(statement_id, &lines).await?;
    }
    let year_end = NaiveDate::from_ymd_opt(year, 12, 29).unwrap();
    db.insert_daily_close(&test_data::make_close(company_id, year_end, 50.0))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_company_upsert_is_idempotent() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;

    let first = db.upsert_company(&test_data::make_company("AAPL", "Apple Inc.")).await?;
    let second = db.upsert_company(&test_data::make_company("AAPL", "Apple")).await?;
    assert_eq!(first, second);

    let company = db.get_company_by_ticker("AAPL").await?.unwrap();
    assert_eq!(company.name, "Apple");
    assert_eq!(company.id, Some(first));

    // a later upsert without a sector keeps the stored one
    let mut blank_sector = test_data::make_company("AAPL", "Apple");
    blank_sector.sector = None;
    db.upsert_company(&blank_sector).await?;
    let company = db.get_company_by_ticker("AAPL").await?.unwrap();
    assert_eq!(company.sector.as_deref(), Some("Industrials"));

    Ok(())
}

#[tokio::test]
async fn test_active_companies_ordered_by_ticker() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;

    for ticker in ["MSFT", "AAPL", "KO"] {
        seed_company(db, ticker).await?;
    }

    let companies = db.get_active_companies().await?;
    let tickers: Vec<&str> = companies.iter().map(|c| c.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL", "KO", "MSFT"]);
    Ok(())
}

#[tokio::test]
async fn test_statement_upsert_replaces_values() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;

    let first = db
        .upsert_statement(company_id, StatementType::IncomeStatement, 2023)
        .await?;
    let second = db
        .upsert_statement(company_id, StatementType::IncomeStatement, 2023)
        .await?;
    assert_eq!(first, second);

    let line = |value: Option<f64>| {
        vec![LineItem {
            record_type: "revenue".to_string(),
            value,
        }]
    };
    db.upsert_line_items(first, &line(Some(100.0))).await?;
    db.upsert_line_items(first, &line(Some(250.0))).await?;

    let records = db.get_statement_records(company_id, 2023).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records.get("revenue"), Some(&Some(250.0)));

    // a NULL value stays observable as a missing entry
    db.upsert_line_items(first, &line(None)).await?;
    let records = db.get_statement_records(company_id, 2023).await?;
    assert_eq!(records.get("revenue"), Some(&None));

    Ok(())
}

#[tokio::test]
async fn test_fiscal_year_range() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;

    assert_eq!(db.get_fiscal_year_range(company_id).await?, None);

    for year in [2019, 2021, 2023] {
        db.upsert_statement(company_id, StatementType::BalanceSheet, year)
            .await?;
    }
    assert_eq!(db.get_fiscal_year_range(company_id).await?, Some((2019, 2023)));
    Ok(())
}

#[tokio::test]
async fn test_daily_close_upsert_and_lookup() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;

    let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
    db.insert_daily_close(&test_data::make_close(company_id, date, 100.0))
        .await?;
    // same day again replaces rather than duplicates
    db.insert_daily_close(&test_data::make_close(company_id, date, 101.0))
        .await?;
    db.insert_daily_close(&test_data::make_close(
        company_id,
        NaiveDate::from_ymd_opt(2023, 6, 20).unwrap(),
        104.0,
    ))
    .await?;

    let latest = db.get_latest_close(company_id).await?.unwrap();
    assert_eq!(latest.close_price, 104.0);

    // weekend lookup falls back to the prior trading day
    let weekend = NaiveDate::from_ymd_opt(2023, 6, 18).unwrap();
    let close = db.get_close_on_or_before(company_id, weekend).await?.unwrap();
    assert_eq!(close.close_price, 101.0);
    assert_eq!(close.date, date);

    let before_any = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    assert!(db.get_close_on_or_before(company_id, before_any).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_load_fundamentals_history_assembles_snapshots() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;
    let company = db.get_company_by_ticker("TEST").await?.unwrap();

    for year in 2020..=2023 {
        seed_year(db, company_id, year).await?;
    }

    let history = db.load_fundamentals_history(&company, 10).await?;
    assert_eq!(history.len(), 4);
    assert_eq!(history.first().unwrap().fiscal_year, 2020);
    assert_eq!(history.last().unwrap().fiscal_year, 2023);

    let latest = history.last().unwrap();
    assert_eq!(latest.eps(), Some(5.0));
    assert_eq!(latest.close_price, Some(50.0));
    assert_eq!(latest.sector.as_deref(), Some("Industrials"));

    // a narrower lookback trims the oldest years
    let recent = db.load_fundamentals_history(&company, 2).await?;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent.first().unwrap().fiscal_year, 2022);

    Ok(())
}

#[tokio::test]
async fn test_history_ignores_prior_year_closes() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;
    let company = db.get_company_by_ticker("TEST").await?.unwrap();

    // statements for 2022 and 2023 but a close only in 2022
    for (statement_type, lines) in test_data::make_line_items() {
        for year in [2022, 2023] {
            let statement_id = db.upsert_statement(company_id, statement_type, year).await?;
            db.upsert_line_items(statement_id, &lines).await?;
        }
    }
    db.insert_daily_close(&test_data::make_close(
        company_id,
        NaiveDate::from_ymd_opt(2022, 12, 30).unwrap(),
        42.0,
    ))
    .await?;

    let history = db.load_fundamentals_history(&company, 10).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].close_price, Some(42.0));
    // the 2022 close must not stand in for 2023
    assert_eq!(history[1].close_price, None);

    Ok(())
}

#[tokio::test]
async fn test_delete_company_data_clears_children() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;
    seed_year(db, company_id, 2023).await?;

    let stats = db.get_stats().await?;
    assert!(stats["statements"] > 0);
    assert!(stats["line_items"] > 0);
    assert!(stats["price_records"] > 0);

    db.delete_company_data(company_id).await?;

    let stats = db.get_stats().await?;
    assert_eq!(stats["statements"], 0);
    assert_eq!(stats["line_items"], 0);
    assert_eq!(stats["price_records"], 0);
    // the company row itself survives
    assert!(db.get_company_by_ticker("TEST").await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_screening_results_round_trip() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;
    let company_id = seed_company(db, "TEST").await?;

    let history: Vec<_> = (0..10)
        .map(|i| test_data::make_fundamentals(company_id, "TEST", 2014 + i))
        .collect();
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let outcome = evaluate(&ScreeningCriteria::default(), &history, date).unwrap();

    db.save_screening_run(date, std::slice::from_ref(&outcome)).await?;
    let loaded = db.load_screening_results(date).await?;
    assert_eq!(loaded.len(), 1);

    let restored = &loaded[0];
    assert_eq!(restored.ticker, outcome.ticker);
    assert_eq!(restored.passes, outcome.passes);
    assert_eq!(restored.pe_ratio, outcome.pe_ratio);
    for ((name_a, a), (_, b)) in restored.checks.all().iter().zip(outcome.checks.all()) {
        assert_eq!(*a, b, "check {} did not survive the round trip", name_a);
    }

    // re-running the same date replaces, not appends
    db.save_screening_run(date, std::slice::from_ref(&outcome)).await?;
    assert_eq!(db.load_screening_results(date).await?.len(), 1);

    assert_eq!(db.latest_screening_date().await?, Some(date));
    Ok(())
}

#[tokio::test]
async fn test_metadata_set_and_overwrite() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;

    assert_eq!(db.get_metadata("last_ingest_date").await?, None);
    db.set_metadata("last_ingest_date", "2024-06-01").await?;
    db.set_metadata("last_ingest_date", "2024-06-02").await?;
    assert_eq!(
        db.get_metadata("last_ingest_date").await?.as_deref(),
        Some("2024-06-02")
    );
    Ok(())
}

#[tokio::test]
async fn test_screener_run_over_seeded_database() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = fixture.db.clone();

    let company_id = seed_company(&db, "SEED").await?;
    for year in 2014..=2023 {
        seed_year(&db, company_id, year).await?;
    }
    // a second company with no data at all
    seed_company(&db, "EMPTY").await?;

    let screener = Screener::new(db.clone(), ScreeningCriteria::default());
    let (passing, stats) = screener.run().await?;

    assert_eq!(stats.companies_screened, 1);
    assert_eq!(stats.companies_without_data, 1);
    // the seeded company is tiny, so the size check fails it
    assert!(passing.is_empty());

    let saved = db
        .load_screening_results(db.latest_screening_date().await?.unwrap())
        .await?;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].ticker, "SEED");

    Ok(())
}

#[tokio::test]
async fn test_load_universe_from_csv() -> Result<()> {
    use std::io::Write;

    let fixture = init_fresh_test_database().await?;
    let db = &fixture.db;

    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("universe.csv");
    let mut file = std::fs::File::create(&csv_path)?;
    writeln!(file, "ticker,name,sector")?;
    writeln!(file, "AAPL,Apple Inc.,Technology")?;
    writeln!(file, "KO,Coca-Cola,")?;
    writeln!(file, ",Nameless,Nowhere")?;

    let loaded = value_screener::collector::load_universe_from_csv(db, &csv_path).await?;
    assert_eq!(loaded, 2);

    let apple = db.get_company_by_ticker("AAPL").await?.unwrap();
    assert_eq!(apple.sector.as_deref(), Some("Technology"));
    let ko = db.get_company_by_ticker("KO").await?.unwrap();
    assert_eq!(ko.sector, None);

    Ok(())
}

#[tokio::test]
async fn test_fair_value_engine_over_seeded_database() -> Result<()> {
    let fixture = init_fresh_test_database().await?;
    let db = fixture.db.clone();

    let company_id = seed_company(&db, "SEED").await?;
    for year in 2019..=2023 {
        seed_year(&db, company_id, year).await?;
    }

    let engine = FairValueEngine::new(db);
    let report = engine.estimate_for_ticker("SEED").await?;

    assert_eq!(report.current_price, 50.0);
    // steady fundamentals at a steady price: every model lands on the price
    let composite = report.composite.unwrap();
    assert!((composite - 50.0).abs() < 1e-9);

    let engine = FairValueEngine::new(fixture.db.clone());
    assert!(engine.estimate_for_ticker("NOPE").await.is_err());

    Ok(())
}
