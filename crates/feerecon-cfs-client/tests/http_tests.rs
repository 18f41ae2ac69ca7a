//! Integration tests for `HttpCfsClient` against a `wiremock` mock server:
//! bearer-token fetch/caching, and 4xx-vs-5xx classification.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feerecon_cfs_client::{CfsHttpConfig, HttpCfsClient};
use feerecon_core::ids::CfsAccountId;
use feerecon_core::ports::{CfsClient, CreateInvoiceRequest};
use feerecon_core::ReconcileError;

fn client(server: &MockServer) -> HttpCfsClient {
    HttpCfsClient::new(CfsHttpConfig {
        base_url: server.uri(),
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
        timeout_secs: 5,
    })
    .expect("client build")
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-abc123",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_account_invoice_sends_bearer_token_and_decodes_response() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/cfs/parties/1/accs/invoices"))
        .and(header("Authorization", "Bearer tok-abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "invoice_number": "REGT00000001",
            "reference_number": "REF-1",
            "total": "125.00",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let resp = client
        .create_account_invoice(CreateInvoiceRequest {
            cfs_account_id: CfsAccountId(1),
            invoice_number: "REGT00000001".into(),
            total: rust_decimal::Decimal::new(12500, 2),
            line_items: vec![],
        })
        .await
        .expect("invoice created");

    assert_eq!(resp.invoice_number, "REGT00000001");
    assert_eq!(resp.reference_number, "REF-1");
}

#[tokio::test]
async fn create_account_invoice_4xx_maps_to_validation_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/cfs/parties/1/accs/invoices"))
        .respond_with(ResponseTemplate::new(422).set_body_string("duplicate invoice_number"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .create_account_invoice(CreateInvoiceRequest {
            cfs_account_id: CfsAccountId(1),
            invoice_number: "REGT00000001".into(),
            total: rust_decimal::Decimal::new(12500, 2),
            line_items: vec![],
        })
        .await
        .expect_err("should reject");

    assert!(matches!(err, ReconcileError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn create_account_invoice_5xx_maps_to_cfs_client_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/cfs/parties/1/accs/invoices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .create_account_invoice(CreateInvoiceRequest {
            cfs_account_id: CfsAccountId(1),
            invoice_number: "REGT00000001".into(),
            total: rust_decimal::Decimal::new(12500, 2),
            line_items: vec![],
        })
        .await
        .expect_err("should error");

    assert!(matches!(err, ReconcileError::CfsClient(_)), "got {err:?}");
}

#[tokio::test]
async fn get_invoice_uses_bearer_token_via_retry_path() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/cfs/parties/1/accs/invoices/REGT00000001"))
        .and(header("Authorization", "Bearer tok-abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "invoice_number": "REGT00000001",
            "reference_number": "REF-1",
            "total": "125.00",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let resp = client
        .get_invoice(CfsAccountId(1), "REGT00000001")
        .await
        .expect("fetched");

    assert_eq!(resp.reference_number, "REF-1");
}

#[tokio::test]
async fn token_is_fetched_once_and_reused_across_calls() {
    let server = MockServer::start().await;

    // `.expect(1)` fails the test if the token endpoint is hit more than
    // once across the two client calls below.
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-cached",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cfs/parties/1/accs/invoices/REGT1/reverse"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cfs/parties/1/accs/stop-pad"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(&server);
    client.reverse_invoice(CfsAccountId(1), "REGT1").await.expect("reversed");
    client.stop_pad(CfsAccountId(1)).await.expect("stopped");
}
