// The socket task: owns the WebSocket, keeps the connection alive, and turns
// inbound frames into dispatched events.

use crate::frameworks::config;
use crate::interface_adapters::dispatch::EventRouter;
use crate::interface_adapters::framing::{self, Frame};
use crate::use_cases::bot::Bot;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = futures::stream::SplitSink<Socket, Message>;

#[derive(Debug)]
enum NetError {
    // Categorizes socket failures so the exit path can log a useful reason.
    Ws(tokio_tungstenite::tungstenite::Error),
}

enum LoopControl {
    Continue,
    Disconnect(String),
}

/// Tracks the server-declared heartbeat window. The server pings us with
/// `"2"` frames which we always answer; on top of that we keep the
/// transport-level ping cadence at the same interval, opportunistically,
/// whenever inbound traffic shows the window has lapsed.
struct Keepalive {
    interval_ms: u64,
    last_ping: Instant,
}

impl Keepalive {
    fn new() -> Self {
        Self {
            interval_ms: config::DEFAULT_PING_INTERVAL_MS,
            last_ping: Instant::now(),
        }
    }

    fn adopt(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
        self.last_ping = Instant::now();
    }

    fn due(&mut self) -> bool {
        if self.last_ping.elapsed().as_millis() as u64 > self.interval_ms {
            self.last_ping = Instant::now();
            return true;
        }
        false
    }
}

/// Builds the connection URL: bare hosts get `wss://` prepended; explicit
/// `ws://` and `wss://` URLs are used as-is.
pub(crate) fn socket_url(server_url: &str) -> String {
    let base = if server_url.starts_with("ws://") || server_url.starts_with("wss://") {
        server_url.trim_end_matches('/').to_string()
    } else {
        format!("wss://{}", server_url.trim_end_matches('/'))
    };
    format!("{base}/socket.io/?EIO=4&transport=websocket")
}

/// Runs the network context until the socket closes or the bot stops.
pub(crate) async fn socket_task(
    bot: Bot,
    router: Arc<EventRouter>,
    mut outbound_rx: mpsc::Receiver<String>,
) {
    let url = socket_url(&bot.session().server_url);
    let socket = match connect_async(url.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            error!(%url, error = %e, "failed to open socket");
            bot.events().on_disconnect(&bot, "connect failed");
            return;
        }
    };
    info!(%url, "socket connected");

    let (mut sink, mut source) = socket.split();
    let mut keepalive = Keepalive::new();
    let mut reason = String::from("connection closed");

    while bot.is_running() {
        let control = tokio::select! {
            _ = bot.shutdown_signal() => {
                let _ = sink.send(Message::Close(None)).await;
                LoopControl::Disconnect("stopped".to_string())
            }

            outbound = outbound_rx.recv() => match outbound {
                Some(frame) => match sink.send(Message::Text(frame.into())).await {
                    Ok(()) => LoopControl::Continue,
                    Err(e) => {
                        warn!(error = %e, "failed to send frame");
                        LoopControl::Disconnect("send failed".to_string())
                    }
                },
                // The facade dropped the sender; treat as a stop.
                None => LoopControl::Disconnect("stopped".to_string()),
            },

            incoming = source.next() => match incoming {
                Some(Ok(message)) => {
                    match handle_message(&bot, &router, &mut sink, &mut keepalive, message).await {
                        Ok(control) => control,
                        Err(NetError::Ws(e)) => {
                            warn!(error = %e, "socket write error");
                            LoopControl::Disconnect("write failed".to_string())
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "socket read error");
                    LoopControl::Disconnect("read failed".to_string())
                }
                None => {
                    info!("socket closed by server");
                    LoopControl::Disconnect("connection closed".to_string())
                }
            },
        };

        if let LoopControl::Disconnect(why) = control {
            reason = why;
            break;
        }
    }

    debug!(reason = %reason, "network task exiting");
    bot.events().on_disconnect(&bot, &reason);
}

async fn handle_message(
    bot: &Bot,
    router: &EventRouter,
    sink: &mut SocketSink,
    keepalive: &mut Keepalive,
    message: Message,
) -> Result<LoopControl, NetError> {
    match message {
        Message::Text(text) => {
            // Opportunistic transport ping when the heartbeat window lapsed.
            if keepalive.due() {
                sink.send(Message::Ping(Default::default()))
                    .await
                    .map_err(NetError::Ws)?;
            }
            handle_text(bot, router, sink, keepalive, text.as_str()).await
        }
        Message::Binary(payload) => {
            warn!(bytes = payload.len(), "binary frame unsupported; dropping");
            Ok(LoopControl::Continue)
        }
        Message::Ping(payload) => {
            sink.send(Message::Pong(payload)).await.map_err(NetError::Ws)?;
            Ok(LoopControl::Continue)
        }
        Message::Pong(_) => Ok(LoopControl::Continue),
        Message::Close(frame) => {
            let reason = frame
                .map(|f| f.reason.to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "connection closed".to_string());
            info!(reason = %reason, "close frame received");
            Ok(LoopControl::Disconnect(reason))
        }
        Message::Frame(_) => Ok(LoopControl::Continue),
    }
}

async fn handle_text(
    bot: &Bot,
    router: &EventRouter,
    sink: &mut SocketSink,
    keepalive: &mut Keepalive,
    text: &str,
) -> Result<LoopControl, NetError> {
    // Raw handlers see every MESSAGE frame before event dispatch.
    if text.starts_with('4') {
        router.dispatch_raw(text);
    }

    let frame = match framing::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            // Decode failures drop the frame; the connection continues.
            warn!(error = %e, frame = text, "failed to decode frame");
            return Ok(LoopControl::Continue);
        }
    };

    match frame {
        Frame::Open { ping_interval_ms } => {
            let interval = match ping_interval_ms {
                Some(interval) => interval,
                None => {
                    warn!(
                        "open frame without ping interval; assuming {} ms",
                        config::DEFAULT_PING_INTERVAL_MS
                    );
                    config::DEFAULT_PING_INTERVAL_MS
                }
            };
            keepalive.adopt(interval);
            info!(interval_ms = interval, "connection open; adopting ping interval");
            sink.send(Message::Text(framing::NAMESPACE_CONNECT.into()))
                .await
                .map_err(NetError::Ws)?;
            Ok(LoopControl::Continue)
        }
        Frame::Ping => {
            sink.send(Message::Text(framing::PONG.into()))
                .await
                .map_err(NetError::Ws)?;
            Ok(LoopControl::Continue)
        }
        Frame::Pong => Ok(LoopControl::Continue),
        Frame::Close => {
            info!("close frame from engine");
            Ok(LoopControl::Disconnect("engine close".to_string()))
        }
        Frame::CodeOnly => {
            debug!(frame = text, "skipping code-only frame");
            Ok(LoopControl::Continue)
        }
        Frame::Connect { sid } => {
            info!(sid = sid.as_deref().unwrap_or("unknown"), "namespace connected");
            Ok(LoopControl::Continue)
        }
        Frame::Disconnect => {
            info!("namespace disconnected");
            bot.events().on_disconnect(bot, "namespace disconnect");
            Ok(LoopControl::Continue)
        }
        Frame::Event { name, data } => {
            router.dispatch(&name, &data);
            Ok(LoopControl::Continue)
        }
        Frame::Message(data) => {
            router.dispatch("message", &data);
            Ok(LoopControl::Continue)
        }
        Frame::SocketError(payload) => {
            error!(payload = %payload, "error frame from server");
            Ok(LoopControl::Continue)
        }
        Frame::Unsupported { message_type } => {
            warn!(message_type, frame = text, "unsupported message type; dropping");
            Ok(LoopControl::Continue)
        }
        Frame::Upgrade | Frame::Noop => {
            debug!(frame = text, "engine control frame");
            Ok(LoopControl::Continue)
        }
    }
}
