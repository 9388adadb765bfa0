// Socket.IO v4 over Engine.IO v4, textual mode. One WebSocket text message
// is one frame: first char is the Engine.IO frame type digit, and for
// MESSAGE frames the second char is the Socket.IO message type digit.

use serde_json::Value;

/// Engine.IO frame sent in reply to a server ping.
pub const PONG: &str = "3";
/// Socket.IO frame that opens the default namespace after OPEN.
pub const NAMESPACE_CONNECT: &str = "40";

/// A decoded inbound frame. Decoding is pure; acting on a frame (pong
/// replies, interval adoption, dispatch) is the socket task's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO OPEN. `ping_interval_ms` is absent when the payload was
    /// empty or carried no interval.
    Open { ping_interval_ms: Option<u64> },
    /// Engine.IO CLOSE.
    Close,
    Ping,
    Pong,
    Upgrade,
    Noop,
    /// A two-character code-only frame (`40`, `41`, …); skipped without
    /// dispatch — the namespace CONNECT this client cares about arrives
    /// with a payload.
    CodeOnly,
    /// Socket.IO CONNECT with payload (`40{"sid":…}`).
    Connect { sid: Option<String> },
    /// Socket.IO DISCONNECT with payload.
    Disconnect,
    /// Socket.IO EVENT: `42["name",data]`. `data` is `Null` when the array
    /// has a single element.
    Event { name: String, data: Value },
    /// Socket.IO ERROR payload.
    SocketError(Value),
    /// MESSAGE frame whose second character is not a digit: the remainder is
    /// a bare payload.
    Message(Value),
    /// Socket.IO message types this client does not speak (ack, binary).
    Unsupported { message_type: u8 },
}

#[derive(Debug)]
pub enum FrameError {
    Empty,
    /// First character is not an Engine.IO frame type digit.
    BadPrefix(char),
    /// Frame type digit outside the Engine.IO range.
    UnknownType(u8),
    BadPayload(serde_json::Error),
    /// EVENT payload was not a `[name, data?]` array with a string name.
    MalformedEvent,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Empty => write!(f, "empty frame"),
            FrameError::BadPrefix(c) => write!(f, "frame prefix {c:?} is not a digit"),
            FrameError::UnknownType(t) => write!(f, "unknown frame type {t}"),
            FrameError::BadPayload(e) => write!(f, "unparseable frame payload: {e}"),
            FrameError::MalformedEvent => write!(f, "event payload is not [name, data]"),
        }
    }
}

/// Decodes one inbound text frame.
pub fn decode(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let first = chars.next().ok_or(FrameError::Empty)?;
    let frame_type = first.to_digit(10).ok_or(FrameError::BadPrefix(first))? as u8;

    if text.len() == 1 {
        return Ok(match frame_type {
            // Open with no payload: the caller assumes the default interval.
            0 => Frame::Open {
                ping_interval_ms: None,
            },
            1 => Frame::Close,
            2 => Frame::Ping,
            3 => Frame::Pong,
            5 => Frame::Upgrade,
            6 => Frame::Noop,
            _ => Frame::CodeOnly,
        });
    }

    let second = chars.next();
    let message_type = second.and_then(|c| c.to_digit(10)).map(|d| d as u8);

    if text.len() == 2 && message_type.is_some() {
        return Ok(Frame::CodeOnly);
    }

    let payload = match message_type {
        Some(_) => &text[2..],
        None => &text[1..],
    };

    match frame_type {
        0 => {
            let value: Value = serde_json::from_str(payload).map_err(FrameError::BadPayload)?;
            Ok(Frame::Open {
                ping_interval_ms: value.get("pingInterval").and_then(Value::as_u64),
            })
        }
        1 => Ok(Frame::Close),
        2 => Ok(Frame::Ping),
        3 => Ok(Frame::Pong),
        4 => decode_message(message_type, payload),
        5 => Ok(Frame::Upgrade),
        6 => Ok(Frame::Noop),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_message(message_type: Option<u8>, payload: &str) -> Result<Frame, FrameError> {
    let value: Value = serde_json::from_str(payload).map_err(FrameError::BadPayload)?;
    match message_type {
        None => Ok(Frame::Message(value)),
        Some(0) => Ok(Frame::Connect {
            sid: value
                .get("sid")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        Some(1) => Ok(Frame::Disconnect),
        Some(2) => {
            let Value::Array(items) = value else {
                return Err(FrameError::MalformedEvent);
            };
            let mut items = items.into_iter();
            let Some(Value::String(name)) = items.next() else {
                return Err(FrameError::MalformedEvent);
            };
            Ok(Frame::Event {
                name,
                data: items.next().unwrap_or(Value::Null),
            })
        }
        Some(4) => Ok(Frame::SocketError(value)),
        Some(other) => Ok(Frame::Unsupported {
            message_type: other,
        }),
    }
}

/// Encodes an outbound event as `42["name",data]`.
pub fn encode_event(name: &str, data: &Value) -> String {
    let body = Value::Array(vec![Value::String(name.to_string()), data.clone()]);
    format!("42{body}")
}
