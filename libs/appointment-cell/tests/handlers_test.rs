mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::router::{appointment_routes, AppointmentState};
use common::{InMemoryAppointmentStore, StaticIdentity};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct Harness {
    app: Router,
    store: Arc<InMemoryAppointmentStore>,
    patient: TestUser,
    doctor: TestUser,
    secret: String,
}

fn harness() -> Harness {
    let config = TestConfig::default();
    let store = InMemoryAppointmentStore::new();
    let identity = StaticIdentity::new();
    let patient = TestUser::patient("asha@example.com");
    let doctor = TestUser::doctor("rao@clinic.example");
    identity.add_patient(patient.uuid());
    identity.add_doctor(doctor.uuid());
    store.name_doctor(doctor.uuid(), "Dr. Rao");

    let app_config = config.to_arc();
    let service = AppointmentState::service(&app_config, store.clone(), identity);
    let state = AppointmentState::with_service(app_config, Arc::new(service));

    Harness {
        app: Router::new().nest("/appointments", appointment_routes(state)),
        store,
        patient,
        doctor,
        secret: config.jwt_secret,
    }
}

impl Harness {
    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, Some(1))
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    async fn book(&self, start: &str) -> Uuid {
        let token = self.token(&self.patient);
        let (status, body) = self
            .send("POST", "/appointments", Some(&token), Some(booking_body(self.patient.uuid(), self.doctor.uuid(), start)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        Uuid::parse_str(body["appointment_id"].as_str().unwrap()).unwrap()
    }
}

fn booking_body(patient_id: Uuid, doctor_id: Uuid, start: &str) -> Value {
    let start_time = start.parse::<chrono::DateTime<Utc>>().unwrap();
    let end_time = start_time + chrono::Duration::minutes(45);
    json!({
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "event": {
            "summary": "Therapy session",
            "description": "Weekly check-in",
            "start": { "dateTime": start_time, "timeZone": "Asia/Kolkata" },
            "end": { "dateTime": end_time, "timeZone": "Asia/Kolkata" },
            "attendees": [{ "email": "asha@example.com" }],
            "hangoutLink": "https://meet.example/abc-defg-hij",
            "eventId": "evt_123",
            "therapyType": "behavioural"
        }
    })
}

#[tokio::test]
async fn booking_requires_the_patient_themself() {
    let h = harness();
    let body = booking_body(h.patient.uuid(), h.doctor.uuid(), "2099-01-05T04:30:00Z");

    let (status, _) = h.send("POST", "/appointments", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = TestUser::patient("someone@example.com");
    let (status, _) = h.send("POST", "/appointments", Some(&h.token(&stranger)), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = h.send("POST", "/appointments", Some(&h.token(&h.patient)), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["appointment_id"].is_string());

    let (status, error) = h.send("POST", "/appointments", Some(&h.token(&h.patient)), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(error["error"].as_str().unwrap().contains("10:00AM"));
}

#[tokio::test]
async fn patient_listing_route() {
    let h = harness();
    let id = h.book("2099-01-05T04:30:00Z").await;

    let uri = format!("/appointments/patients/{}", h.patient.uuid());
    let (status, body) = h.send("GET", &uri, Some(&h.token(&h.patient)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["id"], id.to_string());
    assert_eq!(body["appointments"][0]["start_label"], "10:00AM");
    assert_eq!(body["appointments"][0]["date"], "2099-01-05");
    assert_eq!(body["appointments"][0]["doctor_name"], "Dr. Rao");

    let (status, _) = h.send("GET", &uri, Some(&h.token(&h.doctor)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn doctor_may_cancel_their_appointment() {
    let h = harness();
    let id = h.book("2099-01-05T04:30:00Z").await;
    let uri = format!("/appointments/{}/cancel", id);

    let other_doctor = TestUser::doctor("sen@clinic.example");
    let (status, _) = h.send("POST", &uri, Some(&h.token(&other_doctor)), Some(json!({ "reason": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.send("POST", &uri, Some(&h.token(&h.doctor)), Some(json!({ "reason": "Doctor unwell" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["reason"], "Doctor unwell");

    let (status, _) = h.send("POST", &uri, Some(&h.token(&h.patient)), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let queue = format!("/appointments/doctors/{}?status=cancelled", h.doctor.uuid());
    let (status, body) = h.send("GET", &queue, Some(&h.token(&h.doctor)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["cancellation"]["reason"], "Doctor unwell");
}

#[tokio::test]
async fn attendance_routes() {
    let h = harness();
    let id = h.book("2099-01-05T04:30:00Z").await;
    let token = h.token(&h.patient);

    let (status, body) = h
        .send("POST", &format!("/appointments/{}/feedback", id), Some(&token), Some(json!({ "rating": 9 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Rating"));

    let (status, body) = h
        .send(
            "POST",
            &format!("/appointments/{}/feedback", id),
            Some(&token),
            Some(json!({ "rating": 4, "doctor_feedback": "Kind and clear", "meet_feedback": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attended"], true);
    assert_eq!(body["doctor_rating"], 4);

    let (status, body) = h
        .send("POST", &format!("/appointments/{}/absence", id), Some(&token), Some(json!({ "reason": "Travelling" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["absent_reason"], "Travelling");
    assert_eq!(body["status"], "upcoming");

    let (status, body) = h.send("POST", &format!("/appointments/{}/attended-modal", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attended_modal_dismissed"], true);

    let (status, _) = h
        .send("POST", &format!("/appointments/{}/attended-modal", id), Some(&h.token(&h.doctor)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .send("POST", &format!("/appointments/{}/attended-modal", Uuid::new_v4()), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(h.store.appointment(id).unwrap().attended);
}

#[tokio::test]
async fn doctor_queue_rejects_other_doctors() {
    let h = harness();
    h.book("2099-01-05T04:30:00Z").await;

    let other = TestUser::doctor("sen@clinic.example");
    let uri = format!("/appointments/doctors/{}", h.doctor.uuid());
    let (status, _) = h.send("GET", &uri, Some(&h.token(&other)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.send("GET", &uri, Some(&h.token(&h.doctor)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["end_label"], "10:45AM");
}
