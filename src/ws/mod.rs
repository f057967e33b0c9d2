use crate::config::{debug_enabled, get_config};
use crate::core::decode::handle_frame;
use crate::core::events::{install_event_channel, run_engine};
use crate::core::session::{clients, next_client_id, ClientHandle, ClientSession};
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub fn ws_router() -> Router {
    Router::new().route("/ws", get(ws_handler)).route("/health", get(health_handler))
}

/// Serve websocket upgrades on the given address until the process exits.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let app = ws_router();
    let listener = TcpListener::bind(addr).await?;
    eprintln!("[ws] listening on {}", addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Bind the fan-out server: install the upstream event channel, spawn the
/// engine loop, then serve. Collaborators must be installed first.
pub async fn run() -> Result<()> {
    let events = install_event_channel()?;
    tokio::spawn(run_engine(events));
    serve(get_config().ws_host).await
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// Display address: first forwarded-for hop when behind a proxy, socket peer
// otherwise.
fn remote_address(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let remote = remote_address(&headers, peer);
    ws.on_upgrade(move |socket| handle_socket(socket, remote))
}

async fn handle_socket(mut socket: WebSocket, remote: String) {
    let id = next_client_id();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let handle = Arc::new(ClientHandle::new(id, ClientSession::new(remote.clone()), outbound_tx));
    let online = clients().register(handle.clone()).await;
    eprintln!("[ws] client {id} connected from {remote} ({online} online)");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                let keep_open = match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&handle, text.as_str(), &mut socket).await
                    }
                    Some(Ok(Message::Close(_))) | None => false,
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        if debug_enabled() {
                            eprintln!("[ws] client {id} socket error: {e:?}");
                        }
                        false
                    }
                };
                if !keep_open {
                    break;
                }
            }
            Some(message) = outbound_rx.recv() => {
                if socket.send(Message::Text(message.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let online = clients().unregister(id).await;
    eprintln!("[ws] client {id} disconnected ({online} online)");
}

async fn handle_text(handle: &ClientHandle, text: &str, socket: &mut WebSocket) -> bool {
    let result = {
        let mut session = handle.session.lock().await;
        handle_frame(&mut session, text).await
    };
    match result {
        Ok(sends) => {
            for message in sends {
                if socket.send(Message::Text(message.into())).await.is_err() {
                    return false;
                }
            }
            true
        }
        Err(e) => {
            // Malformed frames close the connection.
            if debug_enabled() {
                eprintln!("[ws] client {} frame rejected: {e:?}", handle.id);
            }
            false
        }
    }
}
