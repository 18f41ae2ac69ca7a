//! Integration tests for `HttpEventBus` against a `wiremock` mock server:
//! CloudEvents envelope shape on the wire, and non-success-status mapping.

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feerecon_core::ports::{BusEvent, EventBus};
use feerecon_core::ReconcileError;
use feerecon_bus::{HttpEventBus, HttpEventBusConfig};

fn bus(server: &MockServer) -> HttpEventBus {
    HttpEventBus::new(HttpEventBusConfig { base_url: server.uri(), timeout_secs: 5 })
        .expect("bus build")
}

#[tokio::test]
async fn publish_sends_cloudevents_envelope_to_topic_path() {
    let server = MockServer::start().await;
    let time = chrono::DateTime::parse_from_rfc3339("2026-01-15T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let event = BusEvent::new(
        "accountLock",
        "feerecon",
        "evt-1",
        time,
        serde_json::json!({"accountId": 42}),
    );

    Mock::given(method("POST"))
        .and(path("/account-mailer"))
        .and(header("content-type", "application/cloudevents+json"))
        .and(body_json(serde_json::json!({
            "specversion": "1.0",
            "type": "accountLock",
            "source": "feerecon",
            "id": "evt-1",
            "time": "2026-01-15T00:00:00Z",
            "data": {"accountId": 42},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    bus(&server).publish("/account-mailer", event).await.expect("published");
}

#[tokio::test]
async fn publish_non_success_status_maps_to_bus_error() {
    let server = MockServer::start().await;
    let event = BusEvent::new(
        "accountLock",
        "feerecon",
        "evt-2",
        chrono::Utc::now(),
        serde_json::json!({}),
    );

    Mock::given(method("POST"))
        .and(path("/account-mailer"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = bus(&server).publish("/account-mailer", event).await.expect_err("should error");

    assert!(matches!(err, ReconcileError::Bus(_)), "got {err:?}");
}
