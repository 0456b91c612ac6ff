//! Socket.IO over WebSocket transport
//!
//! Performs the Engine.IO v4 open handshake, joins the default namespace
//! with the bearer credentials, then runs a single I/O task that answers
//! heartbeats, forwards decoded events and writes outbound frames.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rl_core::config::ClientConfig;
use rl_core::traits::{Channel, ChannelEvent, Transport};
use rl_core::{AuthCredentials, ConnectionError};
use rl_protocol::{ClientEvent, EnginePacket, SocketPacket};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Outbound queue depth per channel
const OUTBOUND_CAPACITY: usize = 64;

/// How long `close()` waits for the I/O task to flush
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport that speaks Socket.IO v5 over a raw WebSocket
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    server_url: String,
}

impl WebSocketTransport {
    /// Transport for the given server base URL (`http(s)://` or `ws(s)://`)
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    /// Transport for the configured server
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.server_url.clone())
    }

    /// Base URL this transport connects to
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

/// Build the Engine.IO WebSocket endpoint for a server base URL
pub fn socket_url(base: &str) -> Result<String, ConnectionError> {
    let trimmed = base.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| ConnectionError::HandshakeFailed(format!("invalid server url: {}", base)))?;

    let scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ConnectionError::HandshakeFailed(format!(
                "unsupported url scheme: {}",
                other
            )))
        }
    };

    if rest.is_empty() {
        return Err(ConnectionError::HandshakeFailed(format!(
            "invalid server url: {}",
            base
        )));
    }

    Ok(format!(
        "{}://{}/socket.io/?EIO=4&transport=websocket",
        scheme, rest
    ))
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(
        &self,
        credentials: &AuthCredentials,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Result<Box<dyn Channel>, ConnectionError> {
        let url = socket_url(&self.server_url)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::HandshakeFailed(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.token)).map_err(
            |_| ConnectionError::AuthRejected("token is not a valid header value".to_string()),
        )?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        tracing::debug!(url = %url, "Opening WebSocket");
        let (ws, _response) = connect_async(request).await.map_err(|e| match e {
            WsError::Http(response)
                if response.status().as_u16() == 401 || response.status().as_u16() == 403 =>
            {
                ConnectionError::AuthRejected(format!("HTTP {}", response.status()))
            }
            other => ConnectionError::HandshakeFailed(other.to_string()),
        })?;

        let (mut sink, mut source) = ws.split();

        let handshake = match next_packet(&mut source).await? {
            EnginePacket::Open(info) => info,
            other => {
                return Err(ConnectionError::HandshakeFailed(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
        };
        tracing::debug!(
            sid = %handshake.sid,
            ping_interval = handshake.ping_interval,
            ping_timeout = handshake.ping_timeout,
            "Engine session opened"
        );

        let auth = json!({
            "token": credentials.token,
            "userId": credentials.user_id,
        });
        send_packet(&mut sink, &EnginePacket::Message(SocketPacket::connect(Some(auth)))).await?;

        loop {
            match next_packet(&mut source).await? {
                EnginePacket::Ping => send_packet(&mut sink, &EnginePacket::Pong).await?,
                EnginePacket::Message(SocketPacket::Connect { .. }) => break,
                EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                    return Err(ConnectionError::AuthRejected(connect_error_message(data)));
                }
                EnginePacket::Close => {
                    return Err(ConnectionError::HandshakeFailed(
                        "server closed the session during handshake".to_string(),
                    ));
                }
                other => tracing::trace!(?other, "Ignoring packet during handshake"),
            }
        }

        tracing::debug!(sid = %handshake.sid, "Namespace joined");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let task = tokio::spawn(io_loop(sink, source, outbound_rx, events));

        Ok(Box::new(WebSocketChannel {
            outbound: outbound_tx,
            task: Mutex::new(Some(task)),
        }))
    }
}

enum Outbound {
    Frame(String),
    Close,
}

/// An open Socket.IO session
pub struct WebSocketChannel {
    outbound: mpsc::Sender<Outbound>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn emit(&self, event: &ClientEvent) -> Result<(), ConnectionError> {
        let frame = SocketPacket::from_client_event(event)
            .and_then(|packet| EnginePacket::Message(packet).encode())
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        self.outbound
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| ConnectionError::Transport("channel is closed".to_string()))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        // The loop may already be gone; that is a closed channel either way
        let _ = self.outbound.send(Outbound::Close).await;

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut task) = task {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                tracing::debug!("I/O task did not stop in time, aborting");
                task.abort();
            }
        }
        Ok(())
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

/// Read until the next Engine.IO packet
async fn next_packet(source: &mut WsSource) -> Result<EnginePacket, ConnectionError> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame: &str = &text;
                return EnginePacket::decode(frame)
                    .map_err(|e| ConnectionError::HandshakeFailed(e.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ConnectionError::HandshakeFailed(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ConnectionError::HandshakeFailed(e.to_string())),
        }
    }
}

async fn send_packet(sink: &mut WsSink, packet: &EnginePacket) -> Result<(), ConnectionError> {
    let frame = packet
        .encode()
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;
    sink.send(Message::Text(frame.into()))
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))
}

fn connect_error_message(data: Option<Value>) -> String {
    match data {
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection refused")
            .to_string(),
        Some(Value::String(message)) => message,
        _ => "connection refused".to_string(),
    }
}

async fn io_loop(
    mut sink: WsSink,
    mut source: WsSource,
    mut outbound: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<ChannelEvent>,
) {
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        let _ = events.send(ChannelEvent::Error(format!("send failed: {}", e))).await;
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = send_packet(&mut sink, &EnginePacket::Message(SocketPacket::disconnect())).await;
                    let _ = sink.close().await;
                    break;
                }
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let frame: &str = &text;
                    if !handle_frame(frame, &mut sink, &events).await {
                        let _ = sink.close().await;
                        break;
                    }
                }
                Some(Ok(Message::Close(close))) => {
                    let reason = match close {
                        Some(close) => {
                            let reason: &str = &close.reason;
                            format!("closed by server ({}): {}", close.code, reason)
                        }
                        None => "closed by server".to_string(),
                    };
                    let _ = events.send(ChannelEvent::Closed(reason)).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(ChannelEvent::Error(e.to_string())).await;
                    break;
                }
                None => {
                    let _ = events.send(ChannelEvent::Closed("connection closed".to_string())).await;
                    break;
                }
            }
        }
    }
    tracing::debug!("WebSocket I/O loop stopped");
}

/// Handle one inbound frame. Returns false once the session is over.
async fn handle_frame(
    frame: &str,
    sink: &mut WsSink,
    events: &mpsc::Sender<ChannelEvent>,
) -> bool {
    let packet = match EnginePacket::decode(frame) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!("Dropping malformed frame: {}", e);
            return true;
        }
    };

    match packet {
        EnginePacket::Ping => match send_packet(sink, &EnginePacket::Pong).await {
            Ok(()) => true,
            Err(e) => {
                let _ = events.send(ChannelEvent::Error(e.to_string())).await;
                false
            }
        },
        EnginePacket::Message(packet) => match packet {
            SocketPacket::Event { .. } => match packet.server_event() {
                Some(Ok(event)) => events.send(ChannelEvent::Message(event)).await.is_ok(),
                Some(Err(e)) => {
                    tracing::debug!("Skipping event: {}", e);
                    true
                }
                None => true,
            },
            SocketPacket::Disconnect { .. } => {
                let _ = events
                    .send(ChannelEvent::Closed("disconnected by server".to_string()))
                    .await;
                false
            }
            SocketPacket::ConnectError { data, .. } => {
                let _ = events
                    .send(ChannelEvent::Error(connect_error_message(data)))
                    .await;
                false
            }
            _ => true,
        },
        EnginePacket::Close => {
            let _ = events
                .send(ChannelEvent::Closed("session closed by server".to_string()))
                .await;
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("http://localhost:3000").unwrap(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("https://api.example.com/").unwrap(),
            "wss://api.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("ws://10.0.0.2:8080/rt").unwrap(),
            "ws://10.0.0.2:8080/rt/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_socket_url_rejects_garbage() {
        assert!(socket_url("localhost:3000").is_err());
        assert!(socket_url("ftp://example.com").is_err());
        assert!(socket_url("http://").is_err());
    }

    #[test]
    fn test_connect_error_message() {
        assert_eq!(
            connect_error_message(Some(json!({ "message": "invalid token" }))),
            "invalid token"
        );
        assert_eq!(
            connect_error_message(Some(json!("expired"))),
            "expired"
        );
        assert_eq!(connect_error_message(None), "connection refused");
    }
}
