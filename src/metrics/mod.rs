//! Metric construction and delivery to the time-series store

pub mod influx;
pub mod point;
pub mod retry;
pub mod sink;
pub mod store;

pub use influx::InfluxStore;
pub use point::{build, BuildError, MeasurementRecord};
pub use retry::RetryPolicy;
pub use sink::MetricSink;
pub use store::{MetricStore, StoreError, StoreResult};
