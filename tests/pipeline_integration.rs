//! Pipeline integration tests
//!
//! Drive `Pipeline::process` with fake providers and stores to verify what
//! reaches the store for each kind of payload.

mod common;

use common::{london, Answer, FakeLocator, RecordingStore, WriteMode};
use geossh::geo::geohash;
use geossh::ingest::{Outcome, PayloadGrammar, Pipeline};
use geossh::metrics::{MeasurementRecord, MetricSink};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

fn pipeline(
    locator: Arc<FakeLocator>,
    mode: WriteMode,
) -> (Pipeline, mpsc::UnboundedReceiver<MeasurementRecord>) {
    let (store, written) = RecordingStore::new(mode);
    let sink = MetricSink::new(Arc::new(store));
    let pipeline = Pipeline::new(PayloadGrammar::default(), locator, sink, 9);
    (pipeline, written)
}

async fn next_write(written: &mut mpsc::UnboundedReceiver<MeasurementRecord>) -> MeasurementRecord {
    timeout(Duration::from_secs(2), written.recv())
        .await
        .expect("no write within 2s")
        .expect("store dropped")
}

#[tokio::test]
async fn test_enriched_event_is_written() {
    let locator = Arc::new(FakeLocator::new().answer("203.0.113.5", Answer::Found(london())));
    let (pipeline, mut written) = pipeline(Arc::clone(&locator), WriteMode::Accept);

    let outcome = pipeline.process(b"alice 203.0.113.5 22").await;
    assert_eq!(outcome, Outcome::Dispatched);

    let record = next_write(&mut written).await;
    let expected_tags: BTreeMap<String, String> = [
        ("geohash", geohash::encode(51.5, -0.12, 9).unwrap().as_str()),
        ("username", "alice"),
        ("port", "22"),
        ("ip", "203.0.113.5"),
        ("location", "England, London"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    assert_eq!(record.measurement, "geossh");
    assert_eq!(record.tags, expected_tags);
    assert_eq!(record.fields, BTreeMap::from([("value".to_string(), 1.0)]));
    assert_eq!(locator.calls(), 1);
}

#[tokio::test]
async fn test_malformed_payload_has_no_side_effects() {
    let locator = Arc::new(FakeLocator::new());
    let (pipeline, mut written) = pipeline(Arc::clone(&locator), WriteMode::Accept);

    assert_eq!(pipeline.process(b"garbage").await, Outcome::ParseFailed);
    assert_eq!(pipeline.process(b"").await, Outcome::ParseFailed);
    assert_eq!(
        pipeline.process(b"alice 203.0.113.5 ssh").await,
        Outcome::ParseFailed
    );

    assert_eq!(locator.calls(), 0);
    assert!(timeout(Duration::from_millis(200), written.recv()).await.is_err());
}

#[tokio::test]
async fn test_absent_location_writes_nothing() {
    let locator = Arc::new(FakeLocator::new().answer("198.51.100.9", Answer::Absent));
    let (pipeline, mut written) = pipeline(Arc::clone(&locator), WriteMode::Accept);

    assert_eq!(
        pipeline.process(b"bob 198.51.100.9 2222").await,
        Outcome::NoLocation
    );
    assert_eq!(locator.calls(), 1);
    assert!(timeout(Duration::from_millis(200), written.recv()).await.is_err());
}

#[tokio::test]
async fn test_lookup_failure_drops_event() {
    let locator = Arc::new(FakeLocator::new().answer("198.51.100.9", Answer::Fail));
    let (pipeline, mut written) = pipeline(locator, WriteMode::Accept);

    assert_eq!(
        pipeline.process(b"bob 198.51.100.9 2222").await,
        Outcome::LookupFailed
    );
    assert!(timeout(Duration::from_millis(200), written.recv()).await.is_err());
}

#[tokio::test]
async fn test_failed_write_does_not_reach_caller() {
    let locator = Arc::new(FakeLocator::new().answer("203.0.113.5", Answer::Found(london())));
    let (pipeline, mut written) = pipeline(locator, WriteMode::Fail);

    assert_eq!(pipeline.process(b"alice 203.0.113.5 22").await, Outcome::Dispatched);
    next_write(&mut written).await;

    // Still fully usable afterwards
    assert_eq!(pipeline.process(b"carol 203.0.113.5 22").await, Outcome::Dispatched);
    let record = next_write(&mut written).await;
    assert_eq!(record.tags.get("username").unwrap(), "carol");
}

#[tokio::test]
async fn test_hanging_write_does_not_delay_caller() {
    let locator = Arc::new(FakeLocator::new().answer("203.0.113.5", Answer::Found(london())));
    let (pipeline, mut written) = pipeline(locator, WriteMode::Hang);

    for _ in 0..3 {
        let outcome = timeout(
            Duration::from_millis(500),
            pipeline.process(b"alice 203.0.113.5 22"),
        )
        .await
        .expect("process waited on the store");
        assert_eq!(outcome, Outcome::Dispatched);
    }

    for _ in 0..3 {
        next_write(&mut written).await;
    }
}

#[tokio::test]
async fn test_provider_attributes_become_tags() {
    let location = london()
        .with_attribute("country", "United Kingdom")
        .with_attribute("isp", "Example Transit");
    let locator = Arc::new(FakeLocator::new().answer("203.0.113.5", Answer::Found(location)));
    let (pipeline, mut written) = pipeline(locator, WriteMode::Accept);

    pipeline.process(b"alice 203.0.113.5 22").await;
    let record = next_write(&mut written).await;

    assert_eq!(record.tags.get("country").unwrap(), "United Kingdom");
    assert_eq!(record.tags.get("isp").unwrap(), "Example Transit");
    assert!(!record.tags.contains_key("lat"));
    assert!(!record.tags.contains_key("lon"));
}

#[tokio::test]
async fn test_reserved_attribute_drops_event() {
    let location = london().with_attribute("username", "provider-user");
    let locator = Arc::new(FakeLocator::new().answer("203.0.113.5", Answer::Found(location)));
    let (pipeline, mut written) = pipeline(locator, WriteMode::Accept);

    assert_eq!(pipeline.process(b"alice 203.0.113.5 22").await, Outcome::Rejected);
    assert!(timeout(Duration::from_millis(200), written.recv()).await.is_err());
}

#[tokio::test]
async fn test_out_of_range_coordinates_are_rejected() {
    let location = geossh::geo::LocationRecord::new(123.0, 0.0, "Nowhere", "Nowhere");
    let locator = Arc::new(FakeLocator::new().answer("203.0.113.5", Answer::Found(location)));
    let (pipeline, mut written) = pipeline(locator, WriteMode::Accept);

    assert_eq!(pipeline.process(b"alice 203.0.113.5 22").await, Outcome::Rejected);
    assert!(timeout(Duration::from_millis(200), written.recv()).await.is_err());
}

#[tokio::test]
async fn test_delimited_grammar() {
    let locator = Arc::new(FakeLocator::new().answer("2001:db8::1", Answer::Found(london())));
    let (store, mut written) = RecordingStore::new(WriteMode::Accept);
    let pipeline = Pipeline::new(
        PayloadGrammar::delimited(','),
        locator,
        MetricSink::new(Arc::new(store)),
        6,
    );

    assert_eq!(
        pipeline.process(b"svc deploy,2001:db8::1,22\n").await,
        Outcome::Dispatched
    );
    let record = next_write(&mut written).await;
    assert_eq!(record.tags.get("username").unwrap(), "svc deploy");
    assert_eq!(record.tags.get("ip").unwrap(), "2001:db8::1");
    assert_eq!(record.tags.get("geohash").unwrap().len(), 6);
}
