//! HTTP-level tests for the Turnstile API.
//!
//! Runs the full router over the in-memory store with a static credential
//! table, covering the end-to-end walkthrough (issue → preview → redeem →
//! re-scan), authentication rejection, payload decode failures, and the
//! image-composition boundary.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum_test::TestServer;
use http::header::{self, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;
use turnstile_core::MemoryTicketStore;
use turnstile_web::{
    AppState, ComposeError, ComposedImage, ImageCaption, ImageComposer, StaticTokenVerifier,
    build_router,
};

const BASE_URL: &str = "https://door.example.com";

/// Composer stub: echoes the payload back as the "image" bytes.
struct EchoComposer;

impl ImageComposer for EchoComposer {
    fn compose(
        &self,
        payload: &str,
        _caption: &ImageCaption,
    ) -> Result<ComposedImage, ComposeError> {
        Ok(ComposedImage {
            bytes: payload.as_bytes().to_vec(),
            content_type: "image/png".to_string(),
        })
    }
}

fn test_server(composer: Option<Arc<dyn ImageComposer>>) -> TestServer {
    let verifier = StaticTokenVerifier::new([
        ("secret-1".to_string(), "scanner-1".to_string()),
        ("secret-2".to_string(), "scanner-2".to_string()),
    ]);
    let state = AppState::new(
        Arc::new(MemoryTicketStore::new()),
        Arc::new(verifier),
        composer,
        Some(BASE_URL.to_string()),
    );
    TestServer::new(build_router(state)).expect("router builds")
}

async fn issue(server: &TestServer, holder: &str, phone: &str) -> Value {
    let response = server
        .post("/api/tickets")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-1"))
        .json(&json!({
            "event_ref": "E1",
            "holder_name": holder,
            "holder_phone": phone,
        }))
        .await;
    response.assert_status(http::StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn issue_preview_redeem_rescan_walkthrough() {
    let server = test_server(None);

    let issued = issue(&server, "Ana", "555-0100").await;
    let token = issued["ticket"]["token"].as_str().expect("token").to_string();
    assert_eq!(issued["ticket"]["state"], "valid");
    assert_eq!(
        issued["scan_payload"],
        format!("{BASE_URL}/verify?id={token}")
    );

    // Preview both ways: by token and by scan URL.
    let preview = server.get(&format!("/api/tickets/{token}")).await;
    preview.assert_status_ok();
    assert_eq!(preview.json::<Value>()["status"], "valid");

    let scanned = server.get(&format!("/verify?id={token}")).await;
    scanned.assert_status_ok();
    assert_eq!(scanned.json::<Value>()["status"], "valid");

    // First scanner wins.
    let first = server
        .post(&format!("/api/tickets/{token}/redeem"))
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-1"))
        .await;
    first.assert_status_ok();
    let first = first.json::<Value>();
    assert_eq!(first["outcome"], "accepted");
    assert_eq!(first["ticket"]["redeemed_by"], "scanner-1");

    // Second scanner gets already_used with the winner's stamps intact.
    let second = server
        .post(&format!("/api/tickets/{token}/redeem"))
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-2"))
        .await;
    second.assert_status_ok();
    let second = second.json::<Value>();
    assert_eq!(second["outcome"], "already_used");
    assert_eq!(second["ticket"]["redeemed_by"], "scanner-1");

    // Unknown tokens are a normal outcome, not a 404.
    let bogus = server.get("/api/tickets/bogus").await;
    bogus.assert_status_ok();
    assert_eq!(bogus.json::<Value>()["status"], "unknown");
}

#[tokio::test]
async fn mutating_endpoints_require_credentials() {
    let server = test_server(None);

    let no_auth = server
        .post("/api/tickets")
        .json(&json!({
            "event_ref": "E1",
            "holder_name": "Ana",
            "holder_phone": "555-0100",
        }))
        .await;
    no_auth.assert_status(http::StatusCode::UNAUTHORIZED);

    let bad_auth = server
        .post("/api/tickets/some-token/redeem")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong-secret"))
        .await;
    bad_auth.assert_status(http::StatusCode::UNAUTHORIZED);

    let not_bearer = server
        .post("/api/tickets/some-token/redeem")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Basic secret-1"))
        .await;
    not_bearer.assert_status(http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scan_redemption_decodes_url_and_bare_payloads() {
    let server = test_server(None);

    let issued = issue(&server, "Ana", "555-0100").await;
    let payload = issued["scan_payload"].as_str().expect("payload");

    // URL form.
    let redeemed = server
        .post("/verify")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-1"))
        .json(&json!({ "payload": payload }))
        .await;
    redeemed.assert_status_ok();
    assert_eq!(redeemed.json::<Value>()["outcome"], "accepted");

    // Bare-token form (offline scanners).
    let issued = issue(&server, "Bo", "555-0101").await;
    let token = issued["ticket"]["token"].as_str().expect("token");
    let redeemed = server
        .post("/verify")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-2"))
        .json(&json!({ "payload": token }))
        .await;
    redeemed.assert_status_ok();
    let body = redeemed.json::<Value>();
    assert_eq!(body["outcome"], "accepted");
    assert_eq!(body["ticket"]["redeemed_by"], "scanner-2");
}

#[tokio::test]
async fn malformed_payloads_are_rejected_not_retried() {
    let server = test_server(None);

    for payload in ["", "ftp://door.example.com/verify?id=abc", "https://door.example.com/verify"] {
        let response = server
            .post("/verify")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-1"))
            .json(&json!({ "payload": payload }))
            .await;
        response.assert_status(http::StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn listing_sorts_newest_first() {
    let server = test_server(None);

    let first = issue(&server, "Ana", "555-0100").await;
    let second = issue(&server, "Bo", "555-0101").await;

    let listed = server.get("/api/tickets").add_query_param("event_ref", "E1").await;
    listed.assert_status_ok();
    let listed = listed.json::<Vec<Value>>();
    assert_eq!(listed.len(), 2);
    // Newest first: the second issuance leads.
    assert_eq!(listed[0]["token"], second["ticket"]["token"]);
    assert_eq!(listed[1]["token"], first["ticket"]["token"]);
}

#[tokio::test]
async fn revocation_is_idempotent() {
    let server = test_server(None);

    let issued = issue(&server, "Ana", "555-0100").await;
    let token = issued["ticket"]["token"].as_str().expect("token");

    for _ in 0..2 {
        let response = server
            .delete(&format!("/api/tickets/{token}"))
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-1"))
            .await;
        response.assert_status(http::StatusCode::NO_CONTENT);
    }

    let inspected = server.get(&format!("/api/tickets/{token}")).await;
    assert_eq!(inspected.json::<Value>()["status"], "unknown");
}

#[tokio::test]
async fn image_endpoint_delegates_to_composer() {
    // Without a composer the endpoint reports unavailable.
    let server = test_server(None);
    let issued = issue(&server, "Ana", "555-0100").await;
    let token = issued["ticket"]["token"].as_str().expect("token").to_string();
    let response = server.get(&format!("/api/tickets/{token}/image")).await;
    response.assert_status(http::StatusCode::SERVICE_UNAVAILABLE);

    // With one, the image is served with the composer's content type and
    // carries only the payload (never holder data).
    let server = test_server(Some(Arc::new(EchoComposer)));
    let issued = issue(&server, "Ana", "555-0100").await;
    let token = issued["ticket"]["token"].as_str().expect("token").to_string();

    let response = server.get(&format!("/api/tickets/{token}/image")).await;
    response.assert_status_ok();
    assert_eq!(
        response.header(header::CONTENT_TYPE),
        "image/png"
    );
    assert_eq!(
        response.as_bytes().as_ref(),
        format!("{BASE_URL}/verify?id={token}").as_bytes()
    );

    let missing = server.get("/api/tickets/bogus/image").await;
    missing.assert_status(http::StatusCode::NOT_FOUND);
}
