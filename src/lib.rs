pub mod config;
pub mod geo;
pub mod ingest;
pub mod metrics;
