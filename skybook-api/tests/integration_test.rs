use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use skybook_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, RateRules},
};
use skybook_booking::intake::OrderIntake;
use skybook_booking::issue::TicketIssuer;
use skybook_booking::mock::{InMemoryBookingStore, MockProvider, RecordingNotifier};
use skybook_booking::rate_limit::RateLimiter;
use skybook_booking::reconcile::ReconciliationSync;
use skybook_booking::repository::BookingStore;
use skybook_booking::reference::ReferenceGenerator;
use skybook_booking::tokenize::TokenizationGate;
use skybook_booking::vault::CardVault;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const JWT_SECRET: &str = "test-secret";

struct TestHarness {
    app: Router,
    provider: Arc<MockProvider>,
    store: Arc<InMemoryBookingStore>,
}

fn harness() -> TestHarness {
    let provider = Arc::new(MockProvider::new());
    let store = Arc::new(InMemoryBookingStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let vault = CardVault::new(TEST_KEY).unwrap();

    let state = AppState {
        store: store.clone(),
        intake: Arc::new(OrderIntake::new(
            provider.clone(),
            store.clone(),
            notifier,
            vault.clone(),
            ReferenceGenerator::new("SKY"),
        )),
        gate: Arc::new(TokenizationGate::new(
            provider.clone(),
            store.clone(),
            vault.clone(),
            Duration::from_secs(5),
        )),
        issuer: Arc::new(TicketIssuer::new(provider.clone(), store.clone(), vault)),
        reconciler: Arc::new(ReconciliationSync::new(provider.clone(), store.clone(), 4)),
        limiter: Arc::new(RateLimiter::with_default_window()),
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
            expiration: 3600,
        },
        rules: RateRules {
            booking_per_minute: 20,
            payment_per_minute: 5,
        },
        metrics: Arc::new(Metrics::new()),
    };

    TestHarness {
        app: app(state),
        provider,
        store,
    }
}

fn booking_body() -> Value {
    json!({
        "offer_id": "off_1",
        "contact": { "email": "lead@example.com", "phone": "+1 415 555-0101" },
        "passengers": [
            {
                "type": "adult",
                "given_name": "Ada",
                "family_name": "Yilmaz",
                "gender": "f",
                "date_of_birth": "1990-03-14"
            }
        ],
        "payment": {
            "card_name": "Ada Yilmaz",
            "card_number": "4242424242424242",
            "expiry_date": "11/29",
            "cvv": "123",
            "billing_address": "1 Test Street"
        },
        "flight_details": {
            "airline": "Turkish Airlines",
            "flight_number": "TK1979",
            "route": "IST-JFK",
            "departure_date": "2026-09-01T10:00:00Z",
            "arrival_date": "2026-09-01T20:35:00Z",
            "duration": "10h 35m",
            "flight_type": "one_way"
        },
        "pricing": { "currency": "USD", "total_amount": "500.00" }
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_held_booking(h: &TestHarness) -> uuid::Uuid {
    h.provider.seed_offer("off_1", "430.00", "USD");
    let response = h
        .app
        .clone()
        .oneshot(post_json("/v1/bookings", &booking_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["booking_id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn create_booking_holds_order() {
    let h = harness();
    h.provider.seed_offer("off_1", "430.00", "USD");

    let response = h
        .app
        .clone()
        .oneshot(post_json("/v1/bookings", &booking_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["booking_reference"].as_str().unwrap().starts_with("SKY-"));
    assert!(body["pnr"].is_string());

    let id = body["booking_id"].as_str().unwrap().parse().unwrap();
    let booking = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(booking.pricing.markup, Some(7000));
}

#[tokio::test]
async fn invalid_passenger_mix_is_rejected_with_stable_shape() {
    let h = harness();
    h.provider.seed_offer("off_1", "430.00", "USD");

    let mut body = booking_body();
    body["passengers"] = json!([
        {
            "type": "infant",
            "given_name": "Baby",
            "family_name": "Yilmaz",
            "gender": "m",
            "date_of_birth": "2025-12-01"
        }
    ]);

    let response = h
        .app
        .clone()
        .oneshot(post_json("/v1/bookings", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    assert!(body["message"].is_string());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn detail_read_reconciles_remote_cancellation() {
    let h = harness();
    let id = create_held_booking(&h).await;

    let booking = h.store.get(id).await.unwrap().unwrap();
    let order_id = booking.duffel_order_id.unwrap();
    h.provider
        .orders
        .lock()
        .unwrap()
        .get_mut(&order_id)
        .unwrap()
        .cancelled_at = Some(Utc::now());

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/bookings/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], json!("CANCELLED"));
    // The response never carries card data.
    assert!(body.get("payment_info").is_none());
}

#[tokio::test]
async fn issuing_twice_charges_once() {
    let h = harness();
    let id = create_held_booking(&h).await;
    let issue_body = json!({ "payment_method": "balance" });

    let first = h
        .app
        .clone()
        .oneshot(post_json(&format!("/v1/bookings/{}/issue", id), &issue_body))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = response_json(first).await;
    assert_eq!(first_body["status"], json!("ISSUED"));
    assert!(!first_body["documents"].as_array().unwrap().is_empty());

    let second = h
        .app
        .clone()
        .oneshot(post_json(&format!("/v1/bookings/{}/issue", id), &issue_body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = response_json(second).await;
    assert_eq!(second_body["documents"], first_body["documents"]);

    assert_eq!(h.provider.payment_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn payment_endpoints_are_rate_limited() {
    let h = harness();
    let id = create_held_booking(&h).await;
    let issue_body = json!({ "payment_method": "balance" });

    for _ in 0..5 {
        let response = h
            .app
            .clone()
            .oneshot(post_json(&format!("/v1/bookings/{}/issue", id), &issue_body))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let sixth = h
        .app
        .clone()
        .oneshot(post_json(&format!("/v1/bookings/{}/issue", id), &issue_body))
        .await
        .unwrap();
    assert_eq!(sixth.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = response_json(sixth).await;
    assert_eq!(body["code"], json!("TOO_MANY_REQUESTS"));
}

#[tokio::test]
async fn tokenize_endpoint_returns_proceed_action() {
    let h = harness();
    let id = create_held_booking(&h).await;

    let response = h
        .app
        .clone()
        .oneshot(post_json(
            &format!("/v1/bookings/{}/card-token", id),
            &json!({ "cvv": "123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["action"], json!("PROCEED_TO_PAY"));
    assert!(body["card_token"].as_str().unwrap().starts_with("tok_"));
}

#[tokio::test]
async fn admin_override_requires_token_and_note() {
    let h = harness();
    let id = create_held_booking(&h).await;

    // No token -> 401.
    let unauthorized = h
        .app
        .clone()
        .oneshot(post_json(
            &format!("/v1/admin/bookings/{}/status", id),
            &json!({ "status": "CANCELLED", "note": "customer request" }),
        ))
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    // Valid ADMIN token -> forced transition with audit note.
    let claims = json!({
        "sub": "ops@example.com",
        "role": "ADMIN",
        "exp": (Utc::now().timestamp() + 3600) as usize,
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/admin/bookings/{}/status", id))
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(
                    json!({ "status": "CANCELLED", "note": "customer request" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let booking = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(
        booking.status,
        skybook_booking::models::BookingStatus::Cancelled
    );
    assert!(booking
        .admin_notes
        .iter()
        .any(|n| n.note.contains("customer request")));
}

#[tokio::test]
async fn metrics_endpoint_renders_counters() {
    let h = harness();
    let id = create_held_booking(&h).await;
    let _ = id;

    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("skybook_bookings_created_total"));
}
