//! Test doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use geossh::geo::{GeoLocator, LocationRecord, LookupError};
use geossh::metrics::{MeasurementRecord, MetricStore, StoreError, StoreResult};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the fake provider answers for one address
#[derive(Clone)]
pub enum Answer {
    Found(LocationRecord),
    Absent,
    Fail,
    Panic,
}

/// Provider returning canned answers; unknown addresses are absent
pub struct FakeLocator {
    answers: HashMap<IpAddr, Answer>,
    calls: AtomicUsize,
}

impl FakeLocator {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answer(mut self, ip: &str, answer: Answer) -> Self {
        self.answers.insert(ip.parse().unwrap(), answer);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoLocator for FakeLocator {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<LocationRecord>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(&ip).cloned().unwrap_or(Answer::Absent) {
            Answer::Found(location) => Ok(Some(location)),
            Answer::Absent => Ok(None),
            Answer::Fail => Err(LookupError::Status(503)),
            Answer::Panic => panic!("provider blew up for {ip}"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Accept,
    Fail,
    Hang,
}

/// Store that forwards every attempted write to a channel
pub struct RecordingStore {
    mode: WriteMode,
    written: mpsc::UnboundedSender<MeasurementRecord>,
    create_failures: AtomicUsize,
    create_calls: Mutex<Vec<Instant>>,
}

impl RecordingStore {
    pub fn new(mode: WriteMode) -> (Self, mpsc::UnboundedReceiver<MeasurementRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                mode,
                written: tx,
                create_failures: AtomicUsize::new(0),
                create_calls: Mutex::new(Vec::new()),
            },
            rx,
        )
    }

    /// Fail the next `n` database creation calls
    pub fn failing_creates(self, n: usize) -> Self {
        self.create_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn create_calls(&self) -> Vec<Instant> {
        self.create_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricStore for RecordingStore {
    async fn create_database(&self) -> StoreResult<()> {
        self.create_calls.lock().unwrap().push(Instant::now());
        let remaining = self.create_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Other("connection refused".to_string()));
        }
        Ok(())
    }

    async fn write_points(&self, records: &[MeasurementRecord]) -> StoreResult<()> {
        for record in records {
            let _ = self.written.send(record.clone());
        }
        match self.mode {
            WriteMode::Accept => Ok(()),
            WriteMode::Fail => Err(StoreError::Status {
                status: 500,
                body: "write failed".to_string(),
            }),
            WriteMode::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

pub fn london() -> LocationRecord {
    LocationRecord::new(51.5, -0.12, "England", "London")
}
