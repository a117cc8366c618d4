use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::create_patient_router;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

struct TestApp {
    router: Router,
    config: TestConfig,
}

impl TestApp {
    fn new(mock_server: &MockServer) -> Self {
        let config = TestConfig::with_store(&mock_server.uri());
        Self {
            router: Router::new().nest("/patients", create_patient_router(config.to_arc())),
            config,
        }
    }

    fn staff_token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn call(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json");
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn test_receptionist_registers_patient() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let patient_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "first_name": "Jane", "email": "jane.doe@example.com" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::patient_response(patient_id, "+353871234567")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = app.staff_token(&TestUser::receptionist("desk@clinic.test"));
    let (status, body) = app
        .call(
            "POST",
            "/patients",
            &token,
            Some(json!({
                "first_name": "Jane",
                "last_name": "Doe",
                "email": "Jane.Doe@example.com",
                "phone_number": "+353871234567",
                "date_of_birth": "1990-04-12"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["id"], patient_id.to_string());
    assert!(body["patient"].get("portal_code_hash").is_none());
}

#[tokio::test]
async fn test_invalid_phone_is_rejected_before_storage() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let token = app.staff_token(&TestUser::doctor("doc@clinic.test"));
    let (status, body) = app
        .call(
            "POST",
            "/patients",
            &token,
            Some(json!({
                "first_name": "Jane",
                "last_name": "Doe",
                "phone_number": "not a phone",
                "date_of_birth": "1990-04-12"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid phone number");
}

#[tokio::test]
async fn test_patient_session_reads_only_own_record() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::patient_response(patient_id, "+353871234567")
        ])))
        .mount(&mock_server)
        .await;

    let session = JwtTestUtils::create_patient_session(patient_id, &app.config.patient_session_secret);

    let (status, body) = app.call("GET", &format!("/patients/{}", patient_id), &session, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["first_name"], "Jane");

    let (status, _) = app
        .call("GET", &format!("/patients/{}", Uuid::new_v4()), &session, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("GET", "/patients?name=jane", &session, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_patient_is_not_found() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let token = app.staff_token(&TestUser::doctor("doc@clinic.test"));
    let (status, body) = app
        .call("GET", &format!("/patients/{}", Uuid::new_v4()), &token, None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Patient not found");
}

#[tokio::test]
async fn test_search_passes_pagination() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::patient_response(Uuid::new_v4(), "+353871234567"),
            MockStoreResponses::patient_response(Uuid::new_v4(), "+353861234567")
        ])))
        .mount(&mock_server)
        .await;

    let token = app.staff_token(&TestUser::receptionist("desk@clinic.test"));
    let (status, body) = app
        .call("GET", "/patients?name=doe&limit=10&offset=20", &token, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_only_admin_deletes_patients() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::patient_response(patient_id, "+353871234567")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let doctor = app.staff_token(&TestUser::doctor("doc@clinic.test"));
    let (status, _) = app
        .call("DELETE", &format!("/patients/{}", patient_id), &doctor, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.staff_token(&TestUser::admin("admin@clinic.test"));
    let (status, body) = app
        .call("DELETE", &format!("/patients/{}", patient_id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
