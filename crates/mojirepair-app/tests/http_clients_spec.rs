use std::time::Duration;

use backon::ExponentialBuilder;
use serde_json::json;
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path, query_param},
};

use mojirepair_app::services::{GeminiOracle, OracleError, RepairOracle};
use mojirepair_app::store::{
    PostgrestStore, RecordId, RecordPatch, RecordStore, StoreError,
};

const TABLE_PATH: &str = "/rest/v1/places";
const GEMINI_PATH: &str = "/v1beta/models/gemini-test:generateContent";

fn fast_backoff(retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_max_times(retries)
}

fn store(server: &MockServer) -> PostgrestStore {
    PostgrestStore::new(&server.uri(), "anon-key", "places")
        .expect("store client")
        .with_backoff(fast_backoff(2))
}

#[tokio::test]
async fn fetch_page_decodes_rows_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 11, "title": "Vrsar", "description": "Coast"},
            {"id": "uuid-12", "title": null, "description": null}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = store(&server).fetch_page(10, 5).await.expect("page");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, RecordId::Int(11));
    assert_eq!(rows[0].title.as_deref(), Some("Vrsar"));
    assert_eq!(rows[1].id, RecordId::Text("uuid-12".into()));
    assert!(rows[1].title.is_none());
}

#[tokio::test]
async fn transient_fetch_failures_are_retried_then_surface() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = store(&server).fetch_page(0, 10).await.expect_err("fetch fails");

    assert!(matches!(
        err,
        StoreError::HttpStatus {
            status: 503,
            stage: "fetch_page"
        }
    ));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server).fetch_page(0, 10).await.expect_err("fetch fails");

    assert!(matches!(err, StoreError::HttpStatus { status: 401, .. }));
}

#[tokio::test]
async fn recovers_when_a_retry_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = store(&server).fetch_page(0, 10).await.expect("page");

    assert!(rows.is_empty());
}

#[tokio::test]
async fn malformed_page_is_a_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"message\": \"nope\"}"))
        .mount(&server)
        .await;

    let err = store(&server).fetch_page(0, 10).await.expect_err("decode fails");

    assert!(matches!(err, StoreError::Json { .. }));
}

#[tokio::test]
async fn update_accepts_only_ok_and_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(TABLE_PATH))
        .and(query_param("id", "eq.1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(TABLE_PATH))
        .and(query_param("id", "eq.2"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let store = store(&server);
    let patch = RecordPatch::title("Poreč");

    store
        .update(&RecordId::Int(1), &patch)
        .await
        .expect("200 is success");
    let err = store
        .update(&RecordId::Int(2), &patch)
        .await
        .expect_err("201 is not an accepted status");
    assert!(matches!(err, StoreError::HttpStatus { status: 201, .. }));
}

#[tokio::test]
async fn oracle_sends_prompt_with_input_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(query_param("key", "secret"))
        .and(|req: &Request| {
            let body: serde_json::Value = match serde_json::from_slice(&req.body) {
                Ok(body) => body,
                Err(_) => return false,
            };
            body["contents"][0]["parts"][0]["text"]
                .as_str()
                .is_some_and(|prompt| prompt.contains("Input: \"Entr?e\""))
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": " \"Entrée\" "}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = GeminiOracle::with_endpoint(&server.uri(), "gemini-test", "secret")
        .expect("oracle client");

    assert_eq!(oracle.repair("Entr?e").await.expect("repair"), "Entrée");
}

#[tokio::test]
async fn oracle_failures_are_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = GeminiOracle::with_endpoint(&server.uri(), "gemini-test", "secret")
        .expect("oracle client");
    let err = oracle.repair("Pi?a").await.expect_err("throttled");

    assert!(matches!(err, OracleError::HttpStatus { status: 429 }));
    assert!(!err.to_string().contains("secret"));
}

#[tokio::test]
async fn oracle_length_tolerance_is_configurable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Piña colada"}]}}]
        })))
        .mount(&server)
        .await;

    let strict = GeminiOracle::with_endpoint(&server.uri(), "gemini-test", "secret")
        .expect("oracle client")
        .with_length_tolerance(0);
    let err = strict.repair("Pi?a").await.expect_err("too long");
    assert!(matches!(
        err,
        OracleError::LengthMismatch {
            expected: 4,
            actual: 11
        }
    ));

    let lenient = strict.with_length_tolerance(10);
    assert_eq!(lenient.repair("Pi?a").await.expect("accepted"), "Piña colada");
}
