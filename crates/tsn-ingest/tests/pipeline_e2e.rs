//! End-to-end pipeline tests against mocked HTTP sources and gateway
//!
//! These tests drive the full fetch -> validate -> normalize -> write
//! flow with a Google Sheet export mock on one server and a TSN
//! gateway mock on another, validating:
//! - run summaries for clean and partially bad inputs
//! - idempotent reruns against already-written records
//! - transparent retry of transient gateway failures

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tsn_common::StreamId;
use tsn_ingest::gsheet::{sheet_spec, GsheetFetcher};
use tsn_ingest::sources::parse_primitive_sources;
use tsn_pipeline::{HttpTsnClient, PipelineRunner, RetryPolicy, RunOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET_ID: &str = "1WE3Sw_test";

fn test_stream() -> StreamId {
    StreamId::generate("e2e-test-stream")
}

/// Sheet rows for source id 1.1.01: four good months plus one row for
/// another source id
const SHEET_CSV: &str = "\
Year,Month,ID,Value
2024,January,1.1.01,100.5
2024,February,1.1.01,101.0
2024,March,1.1.01,102.25
2024,April,1.1.01,99.75
2024,January,9.9.99,55.0
";

async fn mount_sheet(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/d/{}/export", SHEET_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Gateway with an existing stream holding `existing` dates, accepting
/// every insert
async fn mount_gateway(server: &MockServer, stream_id: &StreamId, existing: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/streams/{}", stream_id)))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    let records: Vec<_> = existing
        .iter()
        .map(|date| json!({"date": date, "value": 1.0}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/v1/streams/{}/records", stream_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"records": records}
        })))
        .mount(server)
        .await;
}

fn accepted_receipts(dates: &[&str]) -> serde_json::Value {
    let results: Vec<_> = dates
        .iter()
        .map(|date| json!({"date": date, "status": "accepted", "tx_hash": "0xfeed"}))
        .collect();
    json!({"success": true, "data": {"results": results}})
}

fn runner(gateway: &MockServer) -> PipelineRunner {
    let client = Arc::new(HttpTsnClient::new(gateway.uri(), "test-key").unwrap());
    PipelineRunner::new(client).with_retry_policy(RetryPolicy::new(
        4,
        Duration::from_millis(10),
        Duration::from_millis(50),
    ))
}

fn fetcher(sheet_server: &MockServer) -> GsheetFetcher {
    GsheetFetcher::with_base_url(SHEET_ID, sheet_server.uri()).unwrap()
}

#[tokio::test]
async fn test_clean_run_writes_all_matching_rows() {
    let sheet = MockServer::start().await;
    let gateway = MockServer::start().await;
    let stream_id = test_stream();

    mount_sheet(&sheet, SHEET_CSV).await;
    mount_gateway(&gateway, &stream_id, &[]).await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/streams/{}/records", stream_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(accepted_receipts(&[
            "2024-01-01",
            "2024-02-01",
            "2024-03-01",
            "2024-04-01",
        ])))
        .expect(1)
        .mount(&gateway)
        .await;

    let spec = sheet_spec("e2e-sheet", stream_id, "1.1.01");
    let summary = runner(&gateway).run(&spec, &fetcher(&sheet)).await;

    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.fetched, 5);
    assert_eq!(summary.normalized, 4);
    assert_eq!(summary.filtered, 1);
    assert_eq!(summary.written, 4);
    assert_eq!(summary.duplicate, 0);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let sheet = MockServer::start().await;
    let gateway = MockServer::start().await;
    let stream_id = test_stream();

    mount_sheet(&sheet, SHEET_CSV).await;
    // Everything the sheet yields is already on the stream; the run
    // must finish without a single insert call
    mount_gateway(
        &gateway,
        &stream_id,
        &["2024-01-01", "2024-02-01", "2024-03-01", "2024-04-01"],
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/streams/{}/records", stream_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(accepted_receipts(&[])))
        .expect(0)
        .mount(&gateway)
        .await;

    let spec = sheet_spec("e2e-sheet", stream_id, "1.1.01");
    let summary = runner(&gateway).run(&spec, &fetcher(&sheet)).await;

    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.written, 0);
    assert_eq!(summary.duplicate, 4);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_transient_gateway_errors_are_retried() {
    let sheet = MockServer::start().await;
    let gateway = MockServer::start().await;
    let stream_id = test_stream();

    mount_sheet(&sheet, SHEET_CSV).await;
    mount_gateway(&gateway, &stream_id, &[]).await;

    // Three 503s, then success; the run must absorb them transparently
    Mock::given(method("POST"))
        .and(path(format!("/v1/streams/{}/records", stream_id)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/streams/{}/records", stream_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(accepted_receipts(&[
            "2024-01-01",
            "2024-02-01",
            "2024-03-01",
            "2024-04-01",
        ])))
        .mount(&gateway)
        .await;

    let spec = sheet_spec("e2e-sheet", stream_id, "1.1.01");
    let summary = runner(&gateway).run(&spec, &fetcher(&sheet)).await;

    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.written, 4);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_bad_rows_leave_a_partial_run() {
    let sheet = MockServer::start().await;
    let gateway = MockServer::start().await;
    let stream_id = test_stream();

    // Two bad rows for our source id: junk month and junk value
    let csv = "\
Year,Month,ID,Value
2024,January,1.1.01,100.5
2024,Brumaire,1.1.01,101.0
2024,March,1.1.01,banana
2024,April,1.1.01,99.75
";
    mount_sheet(&sheet, csv).await;
    mount_gateway(&gateway, &stream_id, &[]).await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/streams/{}/records", stream_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(accepted_receipts(&["2024-01-01", "2024-04-01"])),
        )
        .mount(&gateway)
        .await;

    let spec = sheet_spec("e2e-sheet", stream_id, "1.1.01");
    let summary = runner(&gateway).run(&spec, &fetcher(&sheet)).await;

    assert_eq!(summary.outcome, RunOutcome::Partial);
    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.rejected + summary.dropped, 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_unreachable_source_fails_the_run() {
    let sheet = MockServer::start().await;
    let gateway = MockServer::start().await;
    let stream_id = test_stream();

    Mock::given(method("GET"))
        .and(path(format!("/d/{}/export", SHEET_ID)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&sheet)
        .await;

    let spec = sheet_spec("e2e-sheet", stream_id, "1.1.01");
    let summary = runner(&gateway).run(&spec, &fetcher(&sheet)).await;

    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert!(summary.fatal_error.is_some());
    assert_eq!(summary.written, 0);
}

#[test]
fn test_primitive_sources_round_trip_with_generated_ids() {
    let stream_id = StreamId::generate("e2e-sources-stream");
    let body = format!(
        "source_type,stream_id,source_id\ngsheets:{},{},1.1.01\n",
        SHEET_ID, stream_id
    );

    let sources = parse_primitive_sources(&body).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].stream_id, stream_id);
}
