pub mod api;
pub mod collector;
pub mod database;
pub mod estimator;
pub mod metrics;
pub mod models;
pub mod screener;
