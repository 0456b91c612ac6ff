//! Socket.IO packet framing
//!
//! The backend speaks Socket.IO (protocol v5) on top of Engine.IO (v4) over a
//! WebSocket. Every WebSocket text frame carries one Engine.IO packet:
//!
//! - `0{...}`: open, with the handshake JSON
//! - `1`: close
//! - `2` / `3`: ping / pong
//! - `4<socket packet>`: message
//! - `6`: noop
//!
//! and a Socket.IO packet is laid out as
//! `<type>[<namespace>,][<ack id>][<json>]`, for example
//! `42["delivery:searching",{"nearbyCount":3}]`.
//!
//! Binary attachments are not used by the delivery protocol and are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::event::{ClientEvent, ServerEvent};

/// Namespace used when a packet carries no explicit one
pub const DEFAULT_NAMESPACE: &str = "/";

/// Handshake data sent by the server in the Engine.IO open packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeInfo {
    /// Engine.IO session id
    pub sid: String,
    /// Transports the server offers to upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval in milliseconds
    pub ping_interval: u64,
    /// How long the server waits for a pong, in milliseconds
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport-level packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(HandshakeInfo),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Encode into a WebSocket text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let frame = match self {
            EnginePacket::Open(info) => format!("0{}", serde_json::to_string(info)?),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()?),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        };
        Ok(frame)
    }

    /// Decode a WebSocket text frame
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ProtocolError::InvalidPacket("empty frame".to_string()))?;
        let body = chars.as_str();

        let packet = match kind {
            '0' => EnginePacket::Open(serde_json::from_str(body)?),
            '1' => EnginePacket::Close,
            // Ping/pong may carry a probe payload, which is irrelevant here
            '2' => EnginePacket::Ping,
            '3' => EnginePacket::Pong,
            '4' => EnginePacket::Message(SocketPacket::decode(body)?),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        };
        Ok(packet)
    }
}

/// Socket.IO packet, carried inside an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect request (client) or acknowledgement (server)
    Connect {
        namespace: String,
        data: Option<Value>,
    },

    /// Namespace disconnect
    Disconnect { namespace: String },

    /// Named event with arguments
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },

    /// Acknowledgement of an event that carried an id
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },

    /// Namespace connect refused (e.g. bad token)
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Connect to the default namespace with an auth payload
    pub fn connect(auth: Option<Value>) -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: auth,
        }
    }

    /// Leave the default namespace
    pub fn disconnect() -> Self {
        SocketPacket::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Event on the default namespace with a single payload argument
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.into(),
            args: vec![payload],
        }
    }

    /// Frame a client event
    pub fn from_client_event(event: &ClientEvent) -> Result<Self, ProtocolError> {
        Ok(Self::event(event.name(), event.payload()?))
    }

    /// Decode the protocol event carried by this packet.
    ///
    /// Returns `None` for packets that are not events.
    pub fn server_event(&self) -> Option<Result<ServerEvent, ProtocolError>> {
        match self {
            SocketPacket::Event { name, args, .. } => {
                Some(ServerEvent::decode(name, args.first().cloned()))
            }
            _ => None,
        }
    }

    fn type_char(&self) -> char {
        match self {
            SocketPacket::Connect { .. } => '0',
            SocketPacket::Disconnect { .. } => '1',
            SocketPacket::Event { .. } => '2',
            SocketPacket::Ack { .. } => '3',
            SocketPacket::ConnectError { .. } => '4',
        }
    }

    fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Encode into the Socket.IO string form (without the Engine.IO prefix)
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut out = String::new();
        out.push(self.type_char());

        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            SocketPacket::Connect { data, .. } | SocketPacket::ConnectError { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&serde_json::to_string(data)?);
                }
            }
            SocketPacket::Disconnect { .. } => {}
            SocketPacket::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&serde_json::to_string(&array)?);
            }
            SocketPacket::Ack { id, args, .. } => {
                out.push_str(&id.to_string());
                out.push_str(&serde_json::to_string(args)?);
            }
        }

        Ok(out)
    }

    /// Decode from the Socket.IO string form
    pub fn decode(input: &str) -> Result<Self, ProtocolError> {
        let mut chars = input.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ProtocolError::InvalidPacket("empty socket packet".to_string()))?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::Unsupported("binary packets"));
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = rest[..end].to_string();
            rest = rest[end..].strip_prefix(',').unwrap_or(&rest[end..]);
            namespace
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| ProtocolError::InvalidPacket(format!("bad ack id: {}", e)))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data: Option<Value> = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        let packet = match kind {
            '0' => SocketPacket::Connect { namespace, data },
            '1' => SocketPacket::Disconnect { namespace },
            '2' => {
                let mut array = match data {
                    Some(Value::Array(array)) => array,
                    _ => {
                        return Err(ProtocolError::InvalidPacket(
                            "event payload must be an array".to_string(),
                        ))
                    }
                };
                if array.is_empty() {
                    return Err(ProtocolError::InvalidPacket(
                        "event without a name".to_string(),
                    ));
                }
                let name = match array.remove(0) {
                    Value::String(name) => name,
                    _ => {
                        return Err(ProtocolError::InvalidPacket(
                            "event name must be a string".to_string(),
                        ))
                    }
                };
                SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args: array,
                }
            }
            '3' => {
                let id = id.ok_or_else(|| {
                    ProtocolError::InvalidPacket("ack without an id".to_string())
                })?;
                let args = match data {
                    Some(Value::Array(args)) => args,
                    None => Vec::new(),
                    Some(other) => vec![other],
                };
                SocketPacket::Ack {
                    namespace,
                    id,
                    args,
                }
            }
            '4' => SocketPacket::ConnectError { namespace, data },
            other => return Err(ProtocolError::UnknownPacketType(other)),
        };

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryId;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let frame = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let packet = EnginePacket::decode(frame).unwrap();

        match packet {
            EnginePacket::Open(info) => {
                assert_eq!(info.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(info.ping_interval, 25000);
                assert_eq!(info.ping_timeout, 20000);
                assert_eq!(info.max_payload, Some(1_000_000));
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_decode_heartbeat() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping);
        assert_eq!(EnginePacket::decode("2probe").unwrap(), EnginePacket::Ping);
        assert_eq!(EnginePacket::Pong.encode().unwrap(), "3");
    }

    #[test]
    fn test_connect_with_auth() {
        let packet = EnginePacket::Message(SocketPacket::connect(Some(json!({ "token": "abc" }))));
        assert_eq!(packet.encode().unwrap(), r#"40{"token":"abc"}"#);
    }

    #[test]
    fn test_decode_connect_ack() {
        let packet = EnginePacket::decode(r#"40{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Connect {
                namespace: "/".to_string(),
                data: Some(json!({ "sid": "wZX3oN0bSVIhsaknAAAI" })),
            })
        );
    }

    #[test]
    fn test_decode_connect_error() {
        let packet = EnginePacket::decode(r#"44{"message":"Authentication error"}"#).unwrap();
        assert!(matches!(
            packet,
            EnginePacket::Message(SocketPacket::ConnectError { data: Some(_), .. })
        ));
    }

    #[test]
    fn test_encode_client_event() {
        let event = ClientEvent::CancelSearch {
            delivery_id: DeliveryId::new("D2"),
        };
        let packet = EnginePacket::Message(SocketPacket::from_client_event(&event).unwrap());
        assert_eq!(
            packet.encode().unwrap(),
            r#"42["delivery:cancel_search",{"deliveryId":"D2"}]"#
        );
    }

    #[test]
    fn test_decode_server_event() {
        let packet = EnginePacket::decode(r#"42["delivery:searching",{"nearbyCount":3}]"#).unwrap();
        let EnginePacket::Message(socket) = packet else {
            panic!("expected a message packet");
        };
        let event = socket.server_event().unwrap().unwrap();
        assert_eq!(event, ServerEvent::Searching { nearby_count: 3 });
    }

    #[test]
    fn test_decode_event_without_payload() {
        let packet = SocketPacket::decode(r#"2["delivery:auto_cancelled"]"#).unwrap();
        let event = packet.server_event().unwrap().unwrap();
        assert_eq!(event, ServerEvent::AutoCancelled);
    }

    #[test]
    fn test_decode_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/admin,12["ping",{}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/admin".to_string(),
                id: Some(12),
                name: "ping".to_string(),
                args: vec![json!({})],
            }
        );
        assert_eq!(packet.encode().unwrap(), r#"2/admin,12["ping",{}]"#);
    }

    #[test]
    fn test_decode_disconnect() {
        assert_eq!(
            EnginePacket::decode("41").unwrap(),
            EnginePacket::Message(SocketPacket::disconnect())
        );
    }

    #[test]
    fn test_rejects_binary_and_garbage() {
        assert!(matches!(
            SocketPacket::decode(r#"51-["upload",{"_placeholder":true,"num":0}]"#),
            Err(ProtocolError::Unsupported(_))
        ));
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(ProtocolError::UnknownPacketType('9'))
        ));
        assert!(EnginePacket::decode("").is_err());
        assert!(SocketPacket::decode(r#"2{"not":"an array"}"#).is_err());
    }
}
