//! Connection handling logic for game clients and dashboards.
//!
//! Each accepted socket gets one handler task. The handler performs the
//! WebSocket handshake, splits the stream, and runs an incoming task that
//! turns frames into relay events alongside an outgoing task that drains
//! the connection's outbound channel into the socket.

use crate::{
    error::RelayError,
    relay::{events::DashboardRequest, RelayHandle, SessionId},
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_async, accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, trace, warn};

/// First address in an `X-Forwarded-For` header, if any.
pub(crate) fn forwarded_for(request: &Request) -> Option<String> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Handles a single game-client connection from handshake to close.
///
/// # Connection Flow
///
/// 1. Perform the WebSocket handshake, capturing `X-Forwarded-For`
/// 2. Register with the relay and receive the allocated client id
/// 3. Forward every text frame to the relay until the socket ends
/// 4. Report a transport error, if any, then the close
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `relay` - Handle to the relay task
pub async fn handle_game_connection(
    stream: TcpStream,
    addr: SocketAddr,
    relay: RelayHandle,
) -> Result<(), RelayError> {
    let mut forwarded = None;
    let ws_stream = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            forwarded = forwarded_for(request);
            Ok(response)
        },
    )
    .await
    .map_err(|e| RelayError::Network(format!("WebSocket handshake failed: {e}")))?;

    let address = forwarded.unwrap_or_else(|| addr.ip().to_string());
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound, mut outbound_receiver) = mpsc::unbounded_channel::<Message>();

    let client_id = relay
        .game_connected(address, addr.port(), outbound.clone())
        .await?;
    debug!("🎮 Game connection {} accepted from {}", client_id, addr);

    let incoming_task = {
        let relay = relay.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        relay.game_message(client_id, text.as_str().to_string());
                    }
                    Ok(Message::Binary(data)) => {
                        relay.game_message(client_id, String::from_utf8_lossy(&data).into_owned());
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = outbound.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Game client {} requested close", client_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error for game client {}: {}", client_id, e);
                        relay.game_error(client_id, e.to_string());
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    let outgoing_task = async move {
        while let Some(message) = outbound_receiver.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = ws_sender.send(message).await {
                trace!("Failed to send to game client {}: {}", client_id, e);
                break;
            }
            if closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    relay.game_closed(client_id);
    Ok(())
}

/// Handles a single dashboard session from handshake to close.
///
/// Text frames are decoded as [`DashboardRequest`]s; anything that does not
/// decode is logged and skipped.
pub async fn handle_dashboard_connection(
    stream: TcpStream,
    addr: SocketAddr,
    relay: RelayHandle,
) -> Result<(), RelayError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| RelayError::Network(format!("WebSocket handshake failed: {e}")))?;

    let session_id = SessionId::new();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound, mut outbound_receiver) = mpsc::unbounded_channel::<Message>();
    relay.dashboard_connected(session_id, outbound.clone());
    debug!("🖥️ Dashboard session {} opened from {}", session_id, addr);

    let incoming_task = {
        let relay = relay.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match DashboardRequest::parse(text.as_str()) {
                        Ok(request) => relay.dashboard_request(session_id, request),
                        Err(e) => warn!("Ignoring dashboard frame from {}: {}", session_id, e),
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = outbound.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        debug!("Dashboard session {} errored: {}", session_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    let outgoing_task = async move {
        while let Some(message) = outbound_receiver.recv().await {
            let closing = matches!(message, Message::Close(_));
            if ws_sender.send(message).await.is_err() || closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    relay.dashboard_closed(session_id);
    Ok(())
}
