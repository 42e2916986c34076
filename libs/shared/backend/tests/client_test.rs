use assert_matches::assert_matches;
use reqwest::Method;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{header, method, path, query_param}};

use shared_backend::BackendClient;
use shared_config::AppConfig;
use shared_models::{ApiError, Session};

fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::new(&AppConfig::for_base_url(server.uri())).expect("client should build")
}

#[tokio::test]
async fn test_request_forwards_session_cookie() {
    let server = MockServer::start().await;
    let session = Session::new(Uuid::new_v4(), "jwtToken=abc");

    Mock::given(method("GET"))
        .and(path("/pets/mine"))
        .and(header("cookie", "jwtToken=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": Uuid::new_v4(), "name": "Rex"}])))
        .expect(1)
        .mount(&server)
        .await;

    let pets: Vec<Value> = client_for(&server)
        .request(Method::GET, "/pets/mine", &session, None)
        .await
        .expect("request should succeed");

    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0]["name"], "Rex");
}

#[tokio::test]
async fn test_request_with_query_sends_parameters() {
    let server = MockServer::start().await;
    let session = Session::new(Uuid::new_v4(), "jwtToken=abc");

    Mock::given(method("GET"))
        .and(path("/appointments/vet/v1"))
        .and(query_param("from", "2025-06-20T00:00:00+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let rows: Vec<Value> = client_for(&server)
        .request_with_query(
            Method::GET,
            "/appointments/vet/v1",
            &session,
            &[("from", "2025-06-20T00:00:00+00:00".to_string())],
            None,
        )
        .await
        .expect("request should succeed");

    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_error_status_maps_to_typed_error() {
    let server = MockServer::start().await;
    let session = Session::new(Uuid::new_v4(), "jwtToken=abc");

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "errorCode": "DATA_INTEGRITY_VIOLATION",
            "message": "Data integrity constraint violation",
            "statusCode": 409
        })))
        .mount(&server)
        .await;

    let result: Result<Value, ApiError> = client_for(&server)
        .request(Method::POST, "/appointments", &session, Some(json!({})))
        .await;

    let error = result.expect_err("conflict should fail");
    assert!(error.is_conflict());
    assert_matches!(error, ApiError::Conflict { ref code, ref message }
        if code.as_deref() == Some("DATA_INTEGRITY_VIOLATION") && message == "Data integrity constraint violation");
}

#[tokio::test]
async fn test_request_empty_accepts_no_content() {
    let server = MockServer::start().await;
    let session = Session::new(Uuid::new_v4(), "jwtToken=abc");

    Mock::given(method("DELETE"))
        .and(path("/appointment-locks/l1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .request_empty(Method::DELETE, "/appointment-locks/l1", &session, None)
        .await
        .expect("delete should succeed");
}

#[tokio::test]
async fn test_base_url_drops_trailing_slash() {
    let client = BackendClient::new(&AppConfig::for_base_url("http://clinic.local/api/")).unwrap();
    assert_eq!(client.get_base_url(), "http://clinic.local/api");
}
