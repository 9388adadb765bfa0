// Scripted game-server endpoint for end-to-end socket tests: accepts one
// WebSocket client on an ephemeral port and bridges frames over channels so
// tests can play both sides of the protocol.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub struct ScriptServer {
    // `ws://` URL the bot should connect to.
    pub url: String,
    // Frames the test wants delivered to the client.
    pub to_client: mpsc::Sender<String>,
    // Every text frame the client sent, in order.
    pub from_client: mpsc::Receiver<String>,
}

// Boots the endpoint and waits for exactly one client.
pub async fn start() -> ScriptServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");

    let (to_client, mut to_client_rx) = mpsc::channel::<String>(64);
    let (from_client_tx, from_client) = mpsc::channel::<String>(256);

    tokio::spawn(async move {
        let (stream, _peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(_) => return,
        };
        let mut socket = match tokio_tungstenite::accept_async(stream).await {
            Ok(socket) => socket,
            Err(_) => return,
        };

        loop {
            tokio::select! {
                outbound = to_client_rx.recv() => match outbound {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                inbound = socket.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let _ = from_client_tx.send(text.to_string()).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    ScriptServer {
        url: format!("ws://{addr}"),
        to_client,
        from_client,
    }
}

// Receives frames until one satisfies `want`, panicking on timeout so a
// missed handshake step fails fast with a useful message.
pub async fn expect_frame(
    from_client: &mut mpsc::Receiver<String>,
    want: impl Fn(&str) -> bool,
    what: &str,
) -> String {
    let deadline = Duration::from_secs(5);
    loop {
        let frame = tokio::time::timeout(deadline, from_client.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .unwrap_or_else(|| panic!("socket closed while waiting for {what}"));
        if want(&frame) {
            return frame;
        }
    }
}

// Polls a condition at 10 ms until it holds or the timeout lapses.
pub async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
