//! WebSocket transport tests against a loopback Socket.IO server

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use rl_client::{ConnectionManager, DeliverySearchCoordinator, SearchStatus, WebSocketTransport};
use rl_core::credentials::StaticCredentials;
use rl_core::traits::{ChannelEvent, Transport};
use rl_core::{AuthCredentials, ConnectionError};
use rl_protocol::{ClientEvent, Delivery, DeliveryId, Location, ServerEvent};

type ServerSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type ServerSource = SplitStream<WebSocketStream<TcpStream>>;

const OPEN: &str = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Accept one client; returns the halves and the Authorization header
async fn accept(listener: &TcpListener) -> (ServerSink, ServerSource, Option<String>) {
    let (tcp, _) = listener.accept().await.expect("Failed to accept");
    let mut authorization = None;
    let ws = accept_hdr_async(tcp, |request: &Request, response: Response| {
        authorization = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(response)
    })
    .await
    .expect("WebSocket handshake failed");
    let (sink, source) = ws.split();
    (sink, source, authorization)
}

async fn send(sink: &mut ServerSink, frame: &str) {
    sink.send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send frame");
}

async fn next_text(source: &mut ServerSource) -> String {
    loop {
        let message = timeout(Duration::from_secs(5), source.next())
            .await
            .expect("Timed out waiting for client frame");
        match message {
            Some(Ok(Message::Text(text))) => {
                let text: &str = &text;
                return text.to_string();
            }
            Some(Ok(Message::Close(_))) => return String::new(),
            Some(Ok(_)) => continue,
            // Closed or reset by the client
            Some(Err(_)) | None => return String::new(),
        }
    }
}

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let url = format!("http://{}", listener.local_addr().expect("No local addr"));
    (listener, url)
}

#[tokio::test]
async fn test_handshake_heartbeat_and_events() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let (mut sink, mut source, authorization) = accept(&listener).await;
        send(&mut sink, OPEN).await;
        let connect = next_text(&mut source).await;
        send(&mut sink, r#"40{"sid":"ns-sid"}"#).await;
        send(&mut sink, "2").await;
        send(&mut sink, r#"42["delivery:searching",{"nearbyCount":2}]"#).await;
        send(&mut sink, r#"42["delivery:unknown_event",{}]"#).await;
        send(&mut sink, r#"42["delivery:no_persons_available"]"#).await;
        let pong = next_text(&mut source).await;
        let emitted = next_text(&mut source).await;
        let leave = next_text(&mut source).await;
        (authorization, connect, pong, emitted, leave)
    });

    let transport = WebSocketTransport::new(url);
    let (events_tx, mut events_rx) = mpsc::channel(16);
    let channel = transport
        .open(&AuthCredentials::new("tok-123", "user-7"), events_tx)
        .await
        .expect("Handshake should succeed");

    let first = timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .expect("Timed out waiting for event");
    assert_eq!(
        first,
        Some(ChannelEvent::Message(ServerEvent::Searching { nearby_count: 2 }))
    );
    let second = timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .expect("Timed out waiting for event");
    assert_eq!(
        second,
        Some(ChannelEvent::Message(ServerEvent::NoPersonsAvailable))
    );

    channel
        .emit(&ClientEvent::Track {
            delivery_id: DeliveryId::new("D9"),
        })
        .await
        .expect("Emit should succeed");
    channel.close().await.expect("Close should succeed");

    let (authorization, connect, pong, emitted, leave) =
        server.await.expect("Server task panicked");
    assert_eq!(authorization.as_deref(), Some("Bearer tok-123"));
    assert_eq!(connect, r#"40{"token":"tok-123","userId":"user-7"}"#);
    assert_eq!(pong, "3");
    assert_eq!(emitted, r#"42["delivery:track",{"deliveryId":"D9"}]"#);
    assert_eq!(leave, "41");
}

#[tokio::test]
async fn test_connect_error_is_auth_rejection() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let (mut sink, mut source, _) = accept(&listener).await;
        send(&mut sink, OPEN).await;
        next_text(&mut source).await;
        send(&mut sink, r#"44{"message":"invalid token"}"#).await;
    });

    let transport = WebSocketTransport::new(url);
    let (events_tx, _events_rx) = mpsc::channel(16);
    let result = transport
        .open(&AuthCredentials::new("bad", "user-7"), events_tx)
        .await;

    assert!(matches!(
        result,
        Err(ConnectionError::AuthRejected(ref message)) if message == "invalid token"
    ));
    server.await.expect("Server task panicked");
}

#[tokio::test]
async fn test_unreachable_server_fails_handshake() {
    let (listener, url) = listen().await;
    drop(listener);

    let transport = WebSocketTransport::new(url);
    let (events_tx, _events_rx) = mpsc::channel(16);
    let result = transport
        .open(&AuthCredentials::new("tok", "user-7"), events_tx)
        .await;

    assert!(matches!(result, Err(ConnectionError::HandshakeFailed(_))));
}

#[tokio::test]
async fn test_server_disconnect_is_reported() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let (mut sink, mut source, _) = accept(&listener).await;
        send(&mut sink, OPEN).await;
        next_text(&mut source).await;
        send(&mut sink, "40").await;
        send(&mut sink, "41").await;
        // Hold the socket open until the client goes away
        next_text(&mut source).await;
    });

    let transport = WebSocketTransport::new(url);
    let (events_tx, mut events_rx) = mpsc::channel(16);
    let channel = transport
        .open(&AuthCredentials::new("tok", "user-7"), events_tx)
        .await
        .expect("Handshake should succeed");

    let event = timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .expect("Timed out waiting for close");
    assert!(matches!(event, Some(ChannelEvent::Closed(_))));

    drop(channel);
    server.await.expect("Server task panicked");
}

#[tokio::test]
async fn test_full_search_over_websocket() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let (mut sink, mut source, _) = accept(&listener).await;
        send(&mut sink, OPEN).await;
        next_text(&mut source).await;
        send(&mut sink, "40").await;

        let request = next_text(&mut source).await;
        send(&mut sink, r#"42["delivery:searching",{"nearbyCount":4}]"#).await;
        send(
            &mut sink,
            r#"42["delivery:assigned",{"delivery":{"_id":"D1","status":"assigned"}}]"#,
        )
        .await;
        next_text(&mut source).await;
        request
    });

    let manager = Arc::new(ConnectionManager::new(
        Arc::new(WebSocketTransport::new(url)),
        Arc::new(StaticCredentials::new(AuthCredentials::new("tok", "user-1"))),
    ));
    let coordinator = DeliverySearchCoordinator::new(manager);
    assert!(coordinator.connect().await);

    coordinator
        .create_delivery_and_search(Delivery::new("D1"), Location::new(1.5, 2.5))
        .await
        .expect("Search should start");

    let mut session = coordinator.subscribe();
    let outcome = timeout(
        Duration::from_secs(5),
        session.wait_for(|s| s.status().is_terminal()),
    )
    .await
    .expect("Timed out waiting for outcome")
    .expect("Session channel closed")
    .clone();

    assert_eq!(outcome.status(), SearchStatus::Assigned);
    assert_eq!(outcome.nearby_count(), 4);
    let assigned = outcome.assigned_delivery().expect("Assigned delivery");
    assert_eq!(assigned.detail("status"), Some(&serde_json::json!("assigned")));

    coordinator.disconnect().await;
    let request = server.await.expect("Server task panicked");
    assert_eq!(
        request,
        r#"42["delivery:create_and_search",{"delivery":{"_id":"D1"},"pickupLocation":{"latitude":1.5,"longitude":2.5}}]"#
    );
}
