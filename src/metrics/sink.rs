//! Best-effort dispatch of measurement records
//!
//! `dispatch` never waits on the store: the write runs on its own task and
//! a failure is only logged. Database creation, on the other hand, is
//! retried until it succeeds.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::metrics::point::MeasurementRecord;
use crate::metrics::retry::RetryPolicy;
use crate::metrics::store::{MetricStore, StoreResult};

#[derive(Clone)]
pub struct MetricSink {
    store: Arc<dyn MetricStore>,
}

impl MetricSink {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    /// Fire-and-forget write of a single record
    pub fn dispatch(&self, record: MeasurementRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.write_points(std::slice::from_ref(&record)).await {
                Ok(()) => debug!("Wrote point {}", record.to_line_protocol()),
                Err(e) => error!(
                    "Failed to write point for {}: {}",
                    record.tags.get("ip").map(String::as_str).unwrap_or("unknown source"),
                    e
                ),
            }
        })
    }

    /// Create the target database, retrying according to `policy`
    pub async fn ensure_database(&self, policy: &RetryPolicy) -> StoreResult<()> {
        policy
            .run("Creating InfluxDB database", || self.store.create_database())
            .await?;
        info!("InfluxDB database is ready");
        Ok(())
    }

    /// Spawn [`Self::ensure_database`] in the background
    pub fn spawn_ensure_database(&self, policy: RetryPolicy) -> JoinHandle<StoreResult<()>> {
        let sink = self.clone();
        tokio::spawn(async move { sink.ensure_database(&policy).await })
    }
}
