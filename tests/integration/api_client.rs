//! FmpClient against a mocked HTTP endpoint

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use value_screener::api::{FmpClient, FundamentalsProvider};
use value_screener::metrics::fields;
use value_screener::models::{Config, StatementType};

fn test_config(base_url: String) -> Config {
    Config {
        api_key: "test-key".to_string(),
        api_base_url: base_url,
        database_path: ":memory:".to_string(),
        // keep the fixed inter-request pause negligible in tests
        rate_limit_per_minute: 60_000,
        worker_count: 2,
    }
}

fn line_value(lines: &[value_screener::models::LineItem], record_type: &str) -> Option<f64> {
    lines
        .iter()
        .find(|l| l.record_type == record_type)
        .and_then(|l| l.value)
}

#[tokio::test]
async fn test_fetch_statements_normalizes_sentinels() -> Result<()> {
    let server = MockServer::start().await;

    // newest-first, stringly typed, with the "None" sentinel
    let body = json!([
        {
            "date": "2023-12-30",
            "calendarYear": "2023",
            "revenue": "383285000000",
            "netIncome": 96995000000.0,
            "operatingIncome": "114301000000",
            "interestExpense": "None",
            "weightedAverageShsOut": "15744231000"
        },
        {
            "date": "2022-12-31",
            "calendarYear": "2022",
            "revenue": "394328000000",
            "netIncome": "99803000000",
            "operatingIncome": "",
            "interestExpense": "2931000000",
            "weightedAverageShsOut": "16215963000"
        },
        {
            "date": "2010-12-31",
            "calendarYear": "2010",
            "revenue": "65225000000"
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/income-statement/AAPL"))
        .and(query_param("apikey", "test-key"))
        .and(query_param("period", "annual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = FmpClient::new(&test_config(server.uri()))?;
    let statements = client
        .fetch_statements("AAPL", StatementType::IncomeStatement, 2020, 2023)
        .await?;

    // the 2010 entry is outside the requested range
    assert_eq!(statements.len(), 2);
    // oldest first
    assert_eq!(statements[0].fiscal_year, 2022);
    assert_eq!(statements[1].fiscal_year, 2023);

    let latest = &statements[1].lines;
    assert_eq!(line_value(latest, fields::REVENUE), Some(383_285_000_000.0));
    assert_eq!(line_value(latest, fields::NET_INCOME), Some(96_995_000_000.0));
    // "None" crossed the boundary as a missing value, not a string or zero
    assert_eq!(line_value(latest, fields::INTEREST_EXPENSE), None);

    // empty strings also normalize to missing
    assert_eq!(line_value(&statements[0].lines, fields::OPERATING_INCOME), None);

    Ok(())
}

#[tokio::test]
async fn test_fetch_statements_stores_outflow_magnitudes() -> Result<()> {
    let server = MockServer::start().await;

    let body = json!([
        {
            "calendarYear": "2023",
            "operatingCashFlow": "110543000000",
            "capitalExpenditure": -10959000000.0,
            "dividendsPaid": "-15025000000"
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/cash-flow-statement/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = FmpClient::new(&test_config(server.uri()))?;
    let statements = client
        .fetch_statements("AAPL", StatementType::CashFlow, 2023, 2023)
        .await?;

    let lines = &statements[0].lines;
    assert_eq!(
        line_value(lines, fields::CAPITAL_EXPENDITURES),
        Some(10_959_000_000.0)
    );
    assert_eq!(
        line_value(lines, fields::DIVIDENDS_PAID),
        Some(15_025_000_000.0)
    );

    Ok(())
}

#[tokio::test]
async fn test_fetch_daily_closes_sorted_ascending() -> Result<()> {
    let server = MockServer::start().await;

    let body = json!({
        "symbol": "AAPL",
        "historical": [
            {"date": "2023-01-05", "close": "125.02"},
            {"date": "2023-01-03", "close": 125.07},
            {"date": "2023-01-04", "close": "None"},
            {"date": "not-a-date", "close": 1.0}
        ]
    });

    Mock::given(method("GET"))
        .and(path("/historical-price-full/AAPL"))
        .and(query_param("from", "2023-01-01"))
        .and(query_param("to", "2023-01-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = FmpClient::new(&test_config(server.uri()))?;
    let closes = client
        .fetch_daily_closes(
            "AAPL",
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        )
        .await?;

    // unparseable rows dropped, the rest sorted oldest first
    assert_eq!(closes.len(), 2);
    assert_eq!(closes[0], (NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(), 125.07));
    assert_eq!(closes[1], (NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(), 125.02));

    Ok(())
}

#[tokio::test]
async fn test_fetch_profile() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"companyName": "Apple Inc.", "sector": "Technology"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/profile/BLANK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"companyName": "Blank Corp", "sector": "  "}
        ])))
        .mount(&server)
        .await;

    let client = FmpClient::new(&test_config(server.uri()))?;

    let profile = client.fetch_profile("AAPL").await?;
    assert_eq!(profile.name, "Apple Inc.");
    assert_eq!(profile.sector.as_deref(), Some("Technology"));

    // whitespace-only sectors are treated as absent
    let profile = client.fetch_profile("BLANK").await?;
    assert_eq!(profile.sector, None);

    Ok(())
}

#[tokio::test]
async fn test_http_error_surfaces() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/income-statement/FAIL"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = FmpClient::new(&test_config(server.uri()))?;
    let result = client
        .fetch_statements("FAIL", StatementType::IncomeStatement, 2023, 2023)
        .await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_unexpected_shape_is_an_error() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/income-statement/ODD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "no data"})))
        .mount(&server)
        .await;

    let client = FmpClient::new(&test_config(server.uri()))?;
    let result = client
        .fetch_statements("ODD", StatementType::IncomeStatement, 2023, 2023)
        .await;

    assert!(result.is_err());
    Ok(())
}
