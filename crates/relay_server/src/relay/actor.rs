//! Single-task driver for the relay core.
//!
//! Socket handlers never touch relay state directly. They post
//! [`RelayEvent`]s through a cloneable [`RelayHandle`]; one task owns the
//! [`RelayCore`] and applies the events in arrival order, one at a time.
//! Eviction timers are plain sleeping tasks that post an
//! [`RelayEvent::Evict`] back into the same queue when they fire.

use super::core::RelayCore;
use super::events::{DashboardRequest, SessionId};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::registry::ClientId;
use crate::transport::{DashboardSessions, GameConnections, Outbound};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Inputs to the relay task.
#[derive(Debug)]
pub enum RelayEvent {
    GameConnected {
        address: String,
        port: u16,
        outbound: Outbound,
        reply: oneshot::Sender<ClientId>,
    },
    GameMessage {
        client_id: ClientId,
        text: String,
    },
    GameError {
        client_id: ClientId,
        error: String,
    },
    GameClosed {
        client_id: ClientId,
    },
    Evict(ClientId),
    DashboardConnected {
        session_id: SessionId,
        outbound: Outbound,
    },
    DashboardRequest {
        session_id: SessionId,
        request: DashboardRequest,
    },
    DashboardClosed {
        session_id: SessionId,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable entry point used by the socket handlers.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    sender: mpsc::UnboundedSender<RelayEvent>,
}

impl RelayHandle {
    fn post(&self, event: RelayEvent) {
        if self.sender.send(event).is_err() {
            debug!("Relay task has stopped; dropping event");
        }
    }

    /// Registers a game connection and waits for its allocated id.
    pub async fn game_connected(
        &self,
        address: String,
        port: u16,
        outbound: Outbound,
    ) -> Result<ClientId, RelayError> {
        let (reply, allocated) = oneshot::channel();
        self.sender
            .send(RelayEvent::GameConnected {
                address,
                port,
                outbound,
                reply,
            })
            .map_err(|_| RelayError::Internal("relay task has stopped".to_string()))?;
        allocated
            .await
            .map_err(|_| RelayError::Internal("relay task dropped the connection".to_string()))
    }

    pub fn game_message(&self, client_id: ClientId, text: String) {
        self.post(RelayEvent::GameMessage { client_id, text });
    }

    pub fn game_error(&self, client_id: ClientId, error: String) {
        self.post(RelayEvent::GameError { client_id, error });
    }

    pub fn game_closed(&self, client_id: ClientId) {
        self.post(RelayEvent::GameClosed { client_id });
    }

    pub fn dashboard_connected(&self, session_id: SessionId, outbound: Outbound) {
        self.post(RelayEvent::DashboardConnected {
            session_id,
            outbound,
        });
    }

    pub fn dashboard_request(&self, session_id: SessionId, request: DashboardRequest) {
        self.post(RelayEvent::DashboardRequest {
            session_id,
            request,
        });
    }

    pub fn dashboard_closed(&self, session_id: SessionId) {
        self.post(RelayEvent::DashboardClosed { session_id });
    }

    /// Closes every session and stops the relay task.
    ///
    /// Resolves once all close frames have been queued.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        let (done, finished) = oneshot::channel();
        self.sender
            .send(RelayEvent::Shutdown { done })
            .map_err(|_| RelayError::Internal("relay task has already stopped".to_string()))?;
        finished
            .await
            .map_err(|_| RelayError::Internal("relay task stopped before shutdown".to_string()))
    }
}

/// The relay task before it is spawned.
pub struct RelayActor {
    core: RelayCore<GameConnections, DashboardSessions>,
    receiver: mpsc::UnboundedReceiver<RelayEvent>,
    timers: mpsc::WeakUnboundedSender<RelayEvent>,
    eviction_grace: Duration,
}

/// Creates a relay task and the handle that feeds it.
pub fn channel(config: RelayConfig) -> (RelayHandle, RelayActor) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let actor = RelayActor {
        eviction_grace: config.eviction_grace,
        core: RelayCore::new(config, GameConnections::new(), DashboardSessions::new()),
        receiver,
        timers: sender.downgrade(),
    };
    (RelayHandle { sender }, actor)
}

impl RelayActor {
    /// Applies events until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("🔁 Relay task started");
        while let Some(event) = self.receiver.recv().await {
            if let RelayEvent::Shutdown { done } = event {
                self.core.shutdown();
                if done.send(()).is_err() {
                    debug!("Shutdown requester went away before the relay stopped");
                }
                break;
            }
            self.apply(event);
            self.schedule_evictions();
        }
        info!("🔁 Relay task stopped");
    }

    fn apply(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::GameConnected {
                address,
                port,
                outbound,
                reply,
            } => {
                let client_id = self.core.on_game_connect(address, port, outbound);
                if reply.send(client_id).is_err() {
                    // handler vanished during the handshake
                    self.core.on_game_close(client_id);
                }
            }
            RelayEvent::GameMessage { client_id, text } => self.core.on_game_message(client_id, &text),
            RelayEvent::GameError { client_id, error } => self.core.on_game_error(client_id, &error),
            RelayEvent::GameClosed { client_id } => self.core.on_game_close(client_id),
            RelayEvent::Evict(client_id) => self.core.evict(client_id),
            RelayEvent::DashboardConnected {
                session_id,
                outbound,
            } => self.core.on_dashboard_connect(session_id, outbound),
            RelayEvent::DashboardRequest {
                session_id,
                request,
            } => self.core.on_dashboard_request(session_id, request),
            RelayEvent::DashboardClosed { session_id } => self.core.on_dashboard_disconnect(session_id),
            RelayEvent::Shutdown { .. } => {}
        }
    }

    fn schedule_evictions(&mut self) {
        for client_id in self.core.take_pending_evictions() {
            let timers = self.timers.clone();
            let grace = self.eviction_grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if let Some(sender) = timers.upgrade() {
                    if sender.send(RelayEvent::Evict(client_id)).is_err() {
                        debug!("Relay stopped before evicting client {}", client_id);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio_tungstenite::tungstenite::Message;

    fn text_frames(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(serde_json::from_str(text.as_str()).expect("frame should be JSON"));
            }
        }
        frames
    }

    fn quick_config() -> RelayConfig {
        RelayConfig {
            eviction_grace: Duration::from_millis(100),
            ..RelayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_game_connect_returns_id_and_handshake() {
        let (handle, actor) = channel(quick_config());
        let task = tokio::spawn(actor.run());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = handle
            .game_connected("127.0.0.1".to_string(), 5000, tx)
            .await
            .expect("relay should allocate an id");

        let frames = text_frames(&mut rx);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["header"]["messagePurpose"], "subscribe");
        assert!(!id.to_string().is_empty());

        handle.shutdown().await.expect("relay should shut down");
        task.await.expect("relay task should finish");
    }

    #[tokio::test]
    async fn test_disconnected_client_is_evicted_after_grace() {
        let (handle, actor) = channel(quick_config());
        let task = tokio::spawn(actor.run());

        let (game_tx, _game_rx) = mpsc::unbounded_channel();
        let id = handle
            .game_connected("127.0.0.1".to_string(), 5000, game_tx)
            .await
            .expect("relay should allocate an id");
        handle.game_closed(id);

        // a dashboard that joins inside the grace period still sees the record
        let (early_tx, mut early_rx) = mpsc::unbounded_channel();
        handle.dashboard_connected(SessionId::new(), early_tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let early = text_frames(&mut early_rx);
        assert_eq!(early[0]["event"], "clients_update");
        assert_eq!(early[0]["data"]["clients"][0]["status"], "disconnected");
        assert_eq!(early[0]["data"]["totalConnected"], 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let (late_tx, mut late_rx) = mpsc::unbounded_channel();
        handle.dashboard_connected(SessionId::new(), late_tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let late = text_frames(&mut late_rx);
        assert_eq!(late[0]["event"], "clients_update");
        assert_eq!(late[0]["data"]["clients"].as_array().map(Vec::len), Some(0));

        handle.shutdown().await.expect("relay should shut down");
        task.await.expect("relay task should finish");
    }

    #[tokio::test]
    async fn test_shutdown_sends_close_frames() {
        let (handle, actor) = channel(quick_config());
        let task = tokio::spawn(actor.run());

        let (dash_tx, mut dash_rx) = mpsc::unbounded_channel();
        handle.dashboard_connected(SessionId::new(), dash_tx);
        handle.shutdown().await.expect("relay should shut down");
        task.await.expect("relay task should finish");

        let mut saw_close = false;
        while let Ok(message) = dash_rx.try_recv() {
            saw_close |= matches!(message, Message::Close(_));
        }
        assert!(saw_close);
        assert!(handle.shutdown().await.is_err());
    }
}
