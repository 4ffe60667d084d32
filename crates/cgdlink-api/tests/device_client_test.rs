#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cgdlink_api::{DeviceClient, DeviceCommand, DoorAction, Error, StatusField};

// ── Helpers ─────────────────────────────────────────────────────────

const KEY: &str = "pre-shared-key";

async fn setup() -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DeviceClient::with_client(
        reqwest::Client::new(),
        base_url,
        SecretString::from(KEY.to_string()),
    );
    (server, client)
}

fn status_body() -> serde_json::Value {
    json!({
        "lamp": "off",
        "door": "Opened 10:32am",
        "vacation": "off",
        "cycles": 4021,
        "rssi": -58,
        "error": 0,
        "camera": "cam-7f",
        "status": "Ready"
    })
}

// ── Status tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_sends_key_and_parses_document() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("key", KEY))
        .and(query_param("status", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .expect(1)
        .mount(&server)
        .await;

    let doc = client.status().await.unwrap();

    assert_eq!(doc.field(StatusField::Door), Some("Opened 10:32am"));
    assert_eq!(doc.field(StatusField::Lamp), Some("off"));
    assert_eq!(doc.field(StatusField::Vacation), Some("off"));
    assert_eq!(doc.cycles, Some(json!(4021)));
    assert_eq!(doc.camera, Some(json!("cam-7f")));
}

#[tokio::test]
async fn test_status_with_missing_fields() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "lamp": "on" })))
        .mount(&server)
        .await;

    let doc = client.status().await.unwrap();

    assert_eq!(doc.lamp.as_deref(), Some("on"));
    assert!(doc.door.is_none());
    assert!(doc.vacation.is_none());
}

// ── Command tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_commands_use_expected_query_pairs() {
    let (server, client) = setup().await;

    for (cmd, value) in [("door", "close"), ("lamp", "on"), ("vacation", "off")] {
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("key", KEY))
            .and(query_param(cmd, value))
            .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
            .expect(1)
            .mount(&server)
            .await;
    }

    client
        .send(DeviceCommand::Door(DoorAction::Close))
        .await
        .unwrap();
    client.send(DeviceCommand::Lamp(true)).await.unwrap();
    client.send(DeviceCommand::Vacation(false)).await.unwrap();
}

#[tokio::test]
async fn test_raw_fetch() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("door", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "door": "Opening" })))
        .expect(1)
        .mount(&server)
        .await;

    let doc = client.fetch("door", "open").await.unwrap();
    assert_eq!(doc.door.as_deref(), Some("Opening"));
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_success_status_is_protocol_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let result = client.status().await;

    match result {
        Err(Error::Protocol { status, ref body }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "invalid key");
        }
        other => panic!("expected Protocol error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let result = client.status().await;

    match result {
        Err(Error::Deserialization { ref body, .. }) => {
            assert_eq!(body, "<html>busy</html>");
        }
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let client = DeviceClient::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:1").unwrap(),
        SecretString::from(KEY.to_string()),
    );

    let result = client.status().await;

    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
}
