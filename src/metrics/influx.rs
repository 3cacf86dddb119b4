//! InfluxDB 1.x HTTP API client
//!
//! `/query` answers 200 even when a statement fails; the failure is only
//! reported in the JSON body.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::config::InfluxConfig;
use crate::metrics::point::MeasurementRecord;
use crate::metrics::store::{MetricStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct InfluxStore {
    base_url: String,
    database: String,
    username: String,
    password: String,
    client: Client,
}

impl InfluxStore {
    pub fn new(config: &InfluxConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("geossh/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: config.base_url(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    error: Option<String>,
}

impl QueryResponse {
    fn into_result(self) -> StoreResult<()> {
        let error = self
            .error
            .into_iter()
            .chain(self.results.into_iter().filter_map(|r| r.error))
            .next();
        match error {
            Some(message) => Err(StoreError::Statement(message)),
            None => Ok(()),
        }
    }
}

async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl MetricStore for InfluxStore {
    async fn create_database(&self) -> StoreResult<()> {
        let statement = format!(
            "CREATE DATABASE \"{}\"",
            self.database.replace('\\', "\\\\").replace('"', "\\\"")
        );
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("q", statement.as_str())])
            .send()
            .await?;

        let body: QueryResponse = check(response).await?.json().await?;
        body.into_result()
    }

    async fn write_points(&self, records: &[MeasurementRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let body = records
            .iter()
            .map(MeasurementRecord::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let response = self
            .client
            .post(format!("{}/write", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("db", self.database.as_str())])
            .body(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
