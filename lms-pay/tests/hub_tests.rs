//! Payment hub client against a mocked hub
//!
//! The mock answers the receive stream with a finite SSE body, which the
//! client reads to the end like a live stream.

use lms_common::{EventBus, LmsEvent, PaymentStatus, SessionContext};
use lms_pay::hub::{HubClient, StatusSubscriber};
use lms_pay::Error;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HANDSHAKE: &str = "{\"protocol\":\"json\",\"version\":1}\u{1e}";

async fn mount_hub(server: &MockServer, stream_body: &str) {
    Mock::given(method("POST"))
        .and(path("/payment-hub/negotiate"))
        .and(query_param("negotiateVersion", "1"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connectionId": "conn-1",
            "connectionToken": "tok-1",
            "negotiateVersion": 1,
            "availableTransports": [
                { "transport": "ServerSentEvents", "transferFormats": ["Text"] }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/payment-hub"))
        .and(query_param("id", "tok-1"))
        .and(query_param("access_token", "jwt-abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(stream_body.to_string()),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment-hub"))
        .and(query_param("id", "tok-1"))
        .and(body_string(HANDSHAKE))
        .respond_with(ResponseTemplate::new(200))
        .expect(1..)
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/payment-hub"))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> HubClient {
    HubClient::from_parts(&server.uri(), "payment-hub", "PaymentStatusChanged").unwrap()
}

#[tokio::test]
async fn test_statuses_decoded_from_framed_records() {
    let server = MockServer::start().await;
    // Handshake ack and a ping share one payload with the first invocation
    let body = concat!(
        "data: {}\u{1e}{\"type\":6}\u{1e}",
        "{\"type\":1,\"target\":\"PaymentStatusChanged\",\"arguments\":[{\"status\":\"PENDING\"}]}\u{1e}\n\n",
        ": keep-alive\n\n",
        "data: {\"type\":1,\"target\":\"SomethingElse\",\"arguments\":[\"PAID\"]}\u{1e}\n\n",
        "data: {\"type\":1,\"target\":\"PaymentStatusChanged\",\"arguments\":[{\"status\":\"PAID\"}]}\u{1e}\n\n",
    );
    mount_hub(&server, body).await;

    let (status_tx, mut status_rx) = mpsc::channel(8);
    let connection = client(&server).connect("jwt-abc", status_tx).await.unwrap();
    assert_eq!(connection.stream_id(), "tok-1");

    let first = timeout(Duration::from_secs(5), status_rx.recv()).await.unwrap();
    assert_eq!(first, Some(PaymentStatus::Pending));
    let second = timeout(Duration::from_secs(5), status_rx.recv()).await.unwrap();
    assert_eq!(second, Some(PaymentStatus::Paid));

    // Body finished: the connection reports itself ended
    timeout(Duration::from_secs(5), connection.ended()).await.unwrap();
    connection.disconnect().await;
}

#[tokio::test]
async fn test_close_record_stops_reading() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {}\u{1e}\n\n",
        "data: {\"type\":7,\"error\":\"Server is shutting down\"}\u{1e}\n\n",
        "data: {\"type\":1,\"target\":\"PaymentStatusChanged\",\"arguments\":[\"PAID\"]}\u{1e}\n\n",
    );
    mount_hub(&server, body).await;

    let (status_tx, mut status_rx) = mpsc::channel(8);
    let connection = client(&server).connect("jwt-abc", status_tx).await.unwrap();

    timeout(Duration::from_secs(5), connection.ended()).await.unwrap();
    drop(connection);
    assert_eq!(status_rx.recv().await, None);
}

#[tokio::test]
async fn test_negotiate_401_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment-hub/negotiate"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (status_tx, _status_rx) = mpsc::channel(8);
    let result = client(&server).connect("stale", status_tx).await;
    assert!(matches!(
        result,
        Err(Error::Common(lms_common::Error::Unauthenticated(_)))
    ));
}

#[tokio::test]
async fn test_subscriber_follows_session_token() {
    let server = MockServer::start().await;
    mount_hub(
        &server,
        "data: {}\u{1e}{\"type\":1,\"target\":\"PaymentStatusChanged\",\"arguments\":[\"CANCELLED\"]}\u{1e}\n\n",
    )
    .await;

    let session = SessionContext::new();
    let event_bus = EventBus::new(32);
    let mut events = event_bus.subscribe();
    let (status_tx, mut status_rx) = mpsc::channel(8);

    let subscriber = StatusSubscriber::spawn(
        client(&server),
        session.watch_token(),
        status_tx,
        event_bus,
    );

    // Signed out: nothing connects
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.received_requests().await.unwrap().is_empty());

    session.login("jwt-abc".to_string(), None).await;
    let status = timeout(Duration::from_secs(5), status_rx.recv()).await.unwrap();
    assert_eq!(status, Some(PaymentStatus::Cancelled));

    let connected = timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(LmsEvent::HubConnectionChanged { connected: true, .. }) = events.recv().await {
                return true;
            }
        }
    })
    .await
    .unwrap();
    assert!(connected);

    subscriber.shutdown().await;
}

#[tokio::test]
async fn test_subscriber_stops_when_countdown_drops_receiver() {
    let server = MockServer::start().await;
    let session = SessionContext::new();
    let (status_tx, status_rx) = mpsc::channel(8);

    let subscriber = StatusSubscriber::spawn(
        client(&server),
        session.watch_token(),
        status_tx,
        EventBus::new(8),
    );
    drop(status_rx);

    timeout(Duration::from_secs(5), subscriber.shutdown())
        .await
        .unwrap();
}
