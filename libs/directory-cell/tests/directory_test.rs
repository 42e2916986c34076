use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use directory_cell::DirectoryService;
use shared_models::ApiError;
use shared_utils::test_utils::{MockBackendResponses, TestConfig, TestSession, TEST_COOKIE};

fn service_for(server: &MockServer) -> DirectoryService {
    DirectoryService::new(&TestConfig::for_mock(server.uri()).to_app_config()).unwrap()
}

#[tokio::test]
async fn test_my_pets_forwards_cookie() {
    let server = MockServer::start().await;
    let session = TestSession::default().to_session();
    let pet_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/pets/mine"))
        .and(header("cookie", TEST_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::pet_response(pet_id, "Rex"),
            MockBackendResponses::pet_response(Uuid::new_v4(), "Mia"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let pets = service_for(&server).my_pets(&session).await.unwrap();

    assert_eq!(pets.len(), 2);
    assert_eq!(pets[0].id, pet_id);
    assert_eq!(pets[0].label(), "Rex (Beagle)");
}

#[tokio::test]
async fn test_vets_by_clinic_skips_inactive() {
    let server = MockServer::start().await;
    let session = TestSession::default().to_session();
    let clinic_id = Uuid::new_v4();

    let mut inactive = MockBackendResponses::vet_response(Uuid::new_v4(), clinic_id, "Dr. Retired");
    inactive["isActive"] = json!(false);

    Mock::given(method("GET"))
        .and(path(format!("/vets/by-clinic/{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::vet_response(Uuid::new_v4(), clinic_id, "Dr. Ana Pop"),
            inactive,
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let vets = service_for(&server).vets_by_clinic(&session, clinic_id).await.unwrap();

    assert_eq!(vets.len(), 1);
    assert_eq!(vets[0].full_name, "Dr. Ana Pop");
}

#[tokio::test]
async fn test_pets_failure_surfaces_backend_error() {
    let server = MockServer::start().await;
    let session = TestSession::default().to_session();

    Mock::given(method("GET"))
        .and(path("/pets/mine"))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            MockBackendResponses::error_response(401, "UNAUTHORIZED", "Not authenticated"),
        ))
        .mount(&server)
        .await;

    let error = service_for(&server).my_pets(&session).await.unwrap_err();

    assert_matches!(error.downcast_ref::<ApiError>(), Some(ApiError::Auth(_)));
}

#[tokio::test]
async fn test_clinic_details() {
    let server = MockServer::start().await;
    let session = TestSession::default().to_session();
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/clinics/{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockBackendResponses::clinic_response(clinic_id, "Happy Paws"),
        ))
        .mount(&server)
        .await;

    let clinic = service_for(&server).clinic(&session, clinic_id).await;

    assert_eq!(clinic.name, "Happy Paws");
    assert!(!clinic.is_placeholder());
}

#[tokio::test]
async fn test_clinic_falls_back_to_placeholder() {
    let server = MockServer::start().await;
    let session = TestSession::default().to_session();
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/clinics/{}", clinic_id)))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let clinic = service_for(&server).clinic(&session, clinic_id).await;

    assert_eq!(clinic.id, clinic_id);
    assert!(clinic.is_placeholder());
}
