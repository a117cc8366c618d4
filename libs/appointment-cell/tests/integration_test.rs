use std::sync::Arc;

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

use appointment_cell::{appointment_routes, referral_routes, AppointmentState};
use notification_cell::{InMemoryQueue, NotificationDispatcher};
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

const DAY: &str = "2024-05-06";

struct TestApp {
    router: Router,
    config: TestConfig,
    queue: Arc<InMemoryQueue>,
}

impl TestApp {
    fn new(mock_server: &MockServer) -> Self {
        let config = TestConfig::with_store(&mock_server.uri());
        let app_config = config.to_arc();
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(NotificationDispatcher::new(queue.clone(), &app_config));
        let state = AppointmentState::new(app_config, notifier);

        Self {
            router: Router::new()
                .nest("/appointments", appointment_routes(state.clone()))
                .nest("/referrals", referral_routes(state)),
            config,
            queue,
        }
    }

    fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn send(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn call(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

async fn mount_patient(mock_server: &MockServer, patient_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockStoreResponses::patient_response(patient_id, "+353871234567")])),
        )
        .mount(mock_server)
        .await;
}

async fn mount_doctor(mock_server: &MockServer, doctor: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::user_response(
            doctor.id,
            &doctor.email,
            &doctor.name,
            "doctor"
        )])))
        .mount(mock_server)
        .await;
}

async fn mount_appointment(mock_server: &MockServer, appointment: &Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment["id"].as_str().unwrap())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(mock_server)
        .await;
}

fn referral_row(referral_id: Uuid, appointment_id: Uuid, from: Uuid, to: Uuid, status: &str) -> Value {
    json!({
        "id": referral_id,
        "appointment_id": appointment_id,
        "from_doctor_id": from,
        "to_doctor_id": to,
        "status": status,
        "notes": "Needs endodontic assessment",
        "previous_assignment": {
            "doctor_id": from,
            "is_referred": false,
            "original_doctor_id": null,
            "current_referral_id": null
        },
        "created_at": "2024-05-01T09:00:00Z",
        "updated_at": "2024-05-01T09:00:00Z"
    })
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_overlapping_booking_rejected_adjacent_accepted() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor = TestUser::doctor("molar@clinic.test");
    let receptionist = TestUser::receptionist("desk@clinic.test");
    let patient_id = Uuid::new_v4();

    mount_patient(&mock_server, patient_id).await;
    mount_doctor(&mock_server, &doctor).await;

    let existing =
        MockStoreResponses::appointment_response(Uuid::new_v4(), Uuid::new_v4(), doctor.id, DAY, "10:00", 30);
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("date", format!("eq.{}", DAY)))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    let new_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "time": "10:30", "status": "confirmed", "doctor_id": doctor.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::appointment_response(new_id, patient_id, doctor.id, DAY, "10:30", 30)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = app.token_for(&receptionist);
    let booking = |time: &str| {
        json!({
            "patient_id": patient_id,
            "doctor_id": doctor.id,
            "date": DAY,
            "time": time,
            "duration_minutes": 30,
            "treatment_type": "checkup"
        })
    };

    let (status, body) = app.call("POST", "/appointments", &token, Some(booking("10:15"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Doctor already has an appointment at 10:00 (30 minutes)");
    assert_eq!(app.queue.pending_len().await, 0);

    let (status, body) = app.call("POST", "/appointments", &token, Some(booking("10:30"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["id"], json!(new_id));
    assert_eq!(body["appointment"]["time"], "10:30");

    // confirmation email and WhatsApp message
    assert_eq!(app.queue.pending_len().await, 2);
}

#[tokio::test]
async fn test_conflict_check_endpoint() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor = TestUser::doctor("molar@clinic.test");

    let existing =
        MockStoreResponses::appointment_response(Uuid::new_v4(), Uuid::new_v4(), doctor.id, DAY, "10:00", 30);
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    let token = app.token_for(&doctor);
    let uri = |time: &str| {
        format!(
            "/appointments/conflicts/check?doctor_id={}&date={}&time={}&duration_minutes=30",
            doctor.id, DAY, time
        )
    };

    let (status, body) = app.call("GET", &uri("10:15"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_available"], false);
    assert_eq!(body["reason"], "Doctor already has an appointment at 10:00 (30 minutes)");

    let (_, body) = app.call("GET", &uri("10:30"), &token, None).await;
    assert_eq!(body["is_available"], true);
    assert!(body["reason"].is_null());
}

#[tokio::test]
async fn test_conflict_check_hides_other_booking_from_patients() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor = TestUser::doctor("molar@clinic.test");
    let existing_id = Uuid::new_v4();

    let existing = MockStoreResponses::appointment_response(existing_id, Uuid::new_v4(), doctor.id, DAY, "10:00", 30);
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    let uri = format!(
        "/appointments/conflicts/check?doctor_id={}&date={}&time=10:15&duration_minutes=30",
        doctor.id, DAY
    );

    let (status, body) = app.call("GET", &uri, &app.token_for(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conflicting_appointment_id"], json!(existing_id));

    let session = JwtTestUtils::create_patient_session(Uuid::new_v4(), &app.config.patient_session_secret);
    let (status, body) = app.call("GET", &uri, &session, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_available"], false);
    assert!(body.get("conflicting_appointment_id").is_none());
}

#[tokio::test]
async fn test_booking_validation_happens_before_store_access() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let token = app.token_for(&TestUser::admin("admin@clinic.test"));

    let (status, body) = app
        .call(
            "POST",
            "/appointments",
            &token,
            Some(json!({
                "patient_id": Uuid::new_v4(),
                "doctor_id": Uuid::new_v4(),
                "date": DAY,
                "time": "10:00",
                "duration_minutes": 600
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Duration must be between 5 and 480 minutes");

    let (status, _) = app
        .call(
            "POST",
            "/appointments",
            &token,
            Some(json!({
                "patient_id": Uuid::new_v4(),
                "doctor_id": Uuid::new_v4(),
                "date": DAY,
                "time": "ten o'clock"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "POST",
            "/appointments",
            &token,
            Some(json!({
                "patient_id": Uuid::new_v4(),
                "doctor_id": Uuid::new_v4(),
                "date": DAY,
                "time": "23:00",
                "duration_minutes": 480
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Appointment at 23:00 would run past midnight");
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_patient_session_books_only_for_itself() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let own = Uuid::new_v4();
    let session = JwtTestUtils::create_patient_session(own, &app.config.patient_session_secret);

    let (status, _) = app
        .call(
            "POST",
            "/appointments",
            &session,
            Some(json!({
                "patient_id": Uuid::new_v4(),
                "doctor_id": Uuid::new_v4(),
                "date": DAY,
                "time": "10:00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inactive_doctor_is_not_bookable() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_patient(&mock_server, patient_id).await;
    let mut user = MockStoreResponses::user_response(doctor_id, "gone@clinic.test", "Dr. Gone", "doctor");
    user["is_active"] = json!(false);
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user])))
        .mount(&mock_server)
        .await;

    let token = app.token_for(&TestUser::receptionist("desk@clinic.test"));
    let (status, body) = app
        .call(
            "POST",
            "/appointments",
            &token,
            Some(json!({ "patient_id": patient_id, "doctor_id": doctor_id, "date": DAY, "time": "09:00" })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Doctor not found");
}

// ==============================================================================
// STATUS AND RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn test_status_update_accepts_only_cancel_or_complete() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let token = app.token_for(&TestUser::admin("admin@clinic.test"));

    let (status, _) = app
        .call(
            "PUT",
            &format!("/appointments/{}/status", Uuid::new_v4()),
            &token,
            Some(json!({ "status": "confirmed" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "PUT",
            &format!("/appointments/{}/status", Uuid::new_v4()),
            &token,
            Some(json!({ "status": "no_show" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no_show"));
}

#[tokio::test]
async fn test_malformed_requests_get_error_body() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let token = app.token_for(&TestUser::receptionist("desk@clinic.test"));

    let (status, body) = app
        .call(
            "POST",
            "/appointments",
            &token,
            Some(json!({ "patient_id": Uuid::new_v4(), "date": DAY, "time": "10:00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("doctor_id"));

    let (status, body) = app.call("GET", "/appointments/not-a-uuid", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .call("GET", "/appointments?limit=plenty", &token, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_only_assigned_doctor_cancels() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let assigned = TestUser::doctor("assigned@clinic.test");
    let other = TestUser::doctor("other@clinic.test");
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment =
        MockStoreResponses::appointment_response(appointment_id, patient_id, assigned.id, DAY, "11:00", 45);
    mount_appointment(&mock_server, &appointment).await;
    mount_patient(&mock_server, patient_id).await;
    mount_doctor(&mock_server, &assigned).await;

    let mut cancelled = appointment.clone();
    cancelled["status"] = json!("cancelled");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = format!("/appointments/{}/status", appointment_id);
    let (status, _) = app
        .call("PUT", &uri, &app.token_for(&other), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("PUT", &uri, &app.token_for(&assigned), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
    assert_eq!(app.queue.pending_len().await, 2);
}

#[tokio::test]
async fn test_reschedule_ignores_own_slot() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor = TestUser::doctor("molar@clinic.test");
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment =
        MockStoreResponses::appointment_response(appointment_id, patient_id, doctor.id, DAY, "10:00", 30);
    mount_appointment(&mock_server, &appointment).await;
    mount_patient(&mock_server, patient_id).await;
    mount_doctor(&mock_server, &doctor).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "time": "10:15", "duration_minutes": 30 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_response(appointment_id, patient_id, doctor.id, DAY, "10:15", 30)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/appointments/{}/reschedule", appointment_id),
            &app.token_for(&doctor),
            Some(json!({ "date": DAY, "time": "10:15" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["time"], "10:15");
}

// ==============================================================================
// REFERRALS
// ==============================================================================

#[tokio::test]
async fn test_only_recipient_can_reject_and_rejection_restores_doctor() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor_a = TestUser::doctor("a@clinic.test");
    let doctor_b = TestUser::doctor("b@clinic.test");
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let referral_id = Uuid::new_v4();

    let mut referred =
        MockStoreResponses::appointment_response(appointment_id, patient_id, doctor_a.id, DAY, "10:00", 30);
    referred["is_referred"] = json!(true);
    referred["original_doctor_id"] = json!(doctor_a.id);
    referred["current_referral_id"] = json!(referral_id);
    mount_appointment(&mock_server, &referred).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_referrals"))
        .and(query_param("id", format!("eq.{}", referral_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([referral_row(
            referral_id,
            appointment_id,
            doctor_a.id,
            doctor_b.id,
            "pending"
        )])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointment_referrals"))
        .and(body_partial_json(json!({ "status": "rejected" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([referral_row(
            referral_id,
            appointment_id,
            doctor_a.id,
            doctor_b.id,
            "rejected"
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let restored =
        MockStoreResponses::appointment_response(appointment_id, patient_id, doctor_a.id, DAY, "10:00", 30);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "doctor_id": doctor_a.id,
            "is_referred": false,
            "original_doctor_id": null,
            "current_referral_id": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([restored])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = format!("/referrals/{}/reject", referral_id);

    let (status, body) = app.call("POST", &uri, &app.token_for(&doctor_a), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only the receiving doctor can act on this referral");

    let (status, body) = app.call("POST", &uri, &app.token_for(&doctor_b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["referral"]["status"], "rejected");
    assert_eq!(body["appointment"]["doctor_id"], json!(doctor_a.id));
    assert_eq!(body["appointment"]["is_referred"], false);
}

#[tokio::test]
async fn test_referral_guards() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor_a = TestUser::doctor("a@clinic.test");
    let doctor_b = TestUser::doctor("b@clinic.test");
    let appointment_id = Uuid::new_v4();
    let accepted_id = Uuid::new_v4();

    let appointment =
        MockStoreResponses::appointment_response(appointment_id, Uuid::new_v4(), doctor_b.id, DAY, "10:00", 30);
    mount_appointment(&mock_server, &appointment).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_referrals"))
        .and(query_param("id", format!("eq.{}", accepted_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([referral_row(
            accepted_id,
            appointment_id,
            doctor_a.id,
            doctor_b.id,
            "accepted"
        )])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_referrals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let token = app.token_for(&doctor_b);

    let (status, _) = app
        .call("POST", &format!("/referrals/{}/approve", accepted_id), &token, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("POST", &format!("/referrals/{}/reject", accepted_id), &token, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot reject a referral that is accepted");

    let (status, _) = app
        .call("POST", &format!("/referrals/{}/accept", Uuid::new_v4()), &token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_referral_action_checks_action_then_role() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let admin = app.token_for(&TestUser::admin("admin@clinic.test"));
    let referral_id = Uuid::new_v4();

    let (status, _) = app
        .call("POST", &format!("/referrals/{}/approve", referral_id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("POST", &format!("/referrals/{}/accept", referral_id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_referral_marks_appointment() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor_a = TestUser::doctor("a@clinic.test");
    let doctor_b = TestUser::doctor("b@clinic.test");
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let referral_id = Uuid::new_v4();

    let appointment =
        MockStoreResponses::appointment_response(appointment_id, patient_id, doctor_a.id, DAY, "10:00", 30);
    mount_appointment(&mock_server, &appointment).await;
    mount_doctor(&mock_server, &doctor_b).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_referrals"))
        .and(body_partial_json(json!({
            "from_doctor_id": doctor_a.id,
            "to_doctor_id": doctor_b.id,
            "status": "pending",
            "previous_assignment": { "doctor_id": doctor_a.id, "is_referred": false }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([referral_row(
            referral_id,
            appointment_id,
            doctor_a.id,
            doctor_b.id,
            "pending"
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut marked = appointment.clone();
    marked["is_referred"] = json!(true);
    marked["original_doctor_id"] = json!(doctor_a.id);
    marked["current_referral_id"] = json!(referral_id);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "is_referred": true,
            "original_doctor_id": doctor_a.id,
            "current_referral_id": referral_id
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([marked])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, _) = app
        .call(
            "POST",
            "/referrals",
            &app.token_for(&doctor_b),
            Some(json!({ "appointment_id": appointment_id, "to_doctor_id": doctor_a.id })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            "POST",
            "/referrals",
            &app.token_for(&doctor_a),
            Some(json!({ "appointment_id": appointment_id, "to_doctor_id": doctor_b.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["referral"]["status"], "pending");
    assert_eq!(body["appointment"]["current_referral_id"], json!(referral_id));
}

#[tokio::test]
async fn test_open_referral_blocks_another() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor_a = TestUser::doctor("a@clinic.test");
    let doctor_b = TestUser::doctor("b@clinic.test");
    let doctor_c = TestUser::doctor("c@clinic.test");
    let appointment_id = Uuid::new_v4();
    let open_id = Uuid::new_v4();

    let mut appointment =
        MockStoreResponses::appointment_response(appointment_id, Uuid::new_v4(), doctor_a.id, DAY, "10:00", 30);
    appointment["is_referred"] = json!(true);
    appointment["current_referral_id"] = json!(open_id);
    mount_appointment(&mock_server, &appointment).await;
    mount_doctor(&mock_server, &doctor_c).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_referrals"))
        .and(query_param("id", format!("eq.{}", open_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([referral_row(
            open_id,
            appointment_id,
            doctor_a.id,
            doctor_b.id,
            "pending"
        )])))
        .mount(&mock_server)
        .await;

    let (status, body) = app
        .call(
            "POST",
            "/referrals",
            &app.token_for(&doctor_a),
            Some(json!({ "appointment_id": appointment_id, "to_doctor_id": doctor_c.id })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Appointment already has an open referral");
}

// ==============================================================================
// REPORTS
// ==============================================================================

fn report_row(appointment_id: Uuid, patient_id: Uuid, doctor_id: Uuid) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "appointment_id": appointment_id,
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "diagnosis": "Occlusal caries on 36",
        "treatment_performed": "Composite filling",
        "recommendations": "Reduce sugary snacks",
        "prescriptions": null,
        "next_visit": "2024-11-06",
        "created_at": "2024-05-06T11:00:00Z",
        "updated_at": "2024-05-06T11:00:00Z"
    })
}

#[tokio::test]
async fn test_report_is_created_once_and_sent() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor = TestUser::doctor("molar@clinic.test");
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment =
        MockStoreResponses::appointment_response(appointment_id, patient_id, doctor.id, DAY, "10:00", 30);
    mount_appointment(&mock_server, &appointment).await;
    mount_patient(&mock_server, patient_id).await;
    mount_doctor(&mock_server, &doctor).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_reports"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([report_row(appointment_id, patient_id, doctor.id)])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_reports"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([report_row(appointment_id, patient_id, doctor.id)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = app.token_for(&doctor);
    let uri = format!("/appointments/{}/report", appointment_id);
    let request = json!({
        "diagnosis": "Occlusal caries on 36",
        "treatment_performed": "Composite filling",
        "recommendations": "Reduce sugary snacks",
        "next_visit": "2024-11-06"
    });

    let (status, body) = app.call("POST", &uri, &token, Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["diagnosis"], "Occlusal caries on 36");
    // email with PDF attachment and WhatsApp document
    assert_eq!(app.queue.pending_len().await, 2);

    let (status, _) = app.call("POST", &uri, &token, Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patient_downloads_own_report_pdf() {
    let mock_server = MockServer::start().await;
    let app = TestApp::new(&mock_server);
    let doctor = TestUser::doctor("molar@clinic.test");
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment =
        MockStoreResponses::appointment_response(appointment_id, patient_id, doctor.id, DAY, "10:00", 30);
    mount_appointment(&mock_server, &appointment).await;
    mount_patient(&mock_server, patient_id).await;
    mount_doctor(&mock_server, &doctor).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_reports"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([report_row(appointment_id, patient_id, doctor.id)])),
        )
        .mount(&mock_server)
        .await;

    let uri = format!("/appointments/{}/report/pdf", appointment_id);

    let session = JwtTestUtils::create_patient_session(patient_id, &app.config.patient_session_secret);
    let response = app.send("GET", &uri, &session, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"report-2024-05-06.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let stranger = JwtTestUtils::create_patient_session(Uuid::new_v4(), &app.config.patient_session_secret);
    let response = app.send("GET", &uri, &stranger, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
