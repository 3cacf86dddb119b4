use async_trait::async_trait;
use thiserror::Error;

use crate::metrics::point::MeasurementRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("store rejected statement: {0}")]
    Statement(String),
    #[error("{0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Write side of a time-series store
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Create the target database if it does not exist yet
    async fn create_database(&self) -> StoreResult<()>;

    /// Write one or more records
    async fn write_points(&self, records: &[MeasurementRecord]) -> StoreResult<()>;
}
