//! Narrow send/publish contract between the relay core and its transports.
//!
//! The relay core never touches sockets. It talks to game clients through a
//! [`GameTransport`] and to dashboards through a [`DashboardChannel`]; both
//! are best-effort and report delivery as a [`DispatchResult`] instead of
//! blocking on the network.
//!
//! The channel-backed implementations here hold one unbounded mpsc sender
//! per connection. The socket writer task on the other end owns the sink,
//! so a send only fails once that writer has gone away.

use crate::error::{Delivered, DispatchError, DispatchResult};
use crate::registry::ClientId;
use crate::relay::events::{DashboardEvent, SessionId};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Sender half feeding a connection's socket writer task.
pub type Outbound = mpsc::UnboundedSender<Message>;

/// Outbound side of the game-client connections.
pub trait GameTransport {
    /// Whatever the transport needs to reach a freshly accepted connection.
    type Connection;

    /// Binds a connection to the id the registry allocated for it.
    fn attach(&mut self, client: ClientId, connection: Self::Connection);

    /// Forgets a connection after the transport closed it.
    fn detach(&mut self, client: ClientId);

    /// Queues `text` for the client; fails if it is not open.
    fn send(&mut self, client: ClientId, text: String) -> DispatchResult;

    /// Closes every connection.
    fn close_all(&mut self);
}

/// Publish/subscribe side of the dashboard sessions.
pub trait DashboardChannel {
    type Connection;

    fn subscribe(&mut self, session: SessionId, connection: Self::Connection);

    fn unsubscribe(&mut self, session: SessionId);

    /// Delivers `event` to every subscribed session.
    fn publish(&mut self, event: &DashboardEvent);

    /// Delivers `event` to one session only.
    fn send_to(&mut self, session: SessionId, event: &DashboardEvent) -> DispatchResult;

    fn close_all(&mut self);
}

fn closing_frame(reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Away,
        reason: reason.to_string().into(),
    }))
}

/// Game-client writers keyed by client id.
#[derive(Debug, Default)]
pub struct GameConnections {
    senders: HashMap<ClientId, Outbound>,
}

impl GameConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl GameTransport for GameConnections {
    type Connection = Outbound;

    fn attach(&mut self, client: ClientId, connection: Outbound) {
        self.senders.insert(client, connection);
    }

    fn detach(&mut self, client: ClientId) {
        self.senders.remove(&client);
    }

    fn send(&mut self, client: ClientId, text: String) -> DispatchResult {
        let sender = self
            .senders
            .get(&client)
            .ok_or_else(|| DispatchError::NotConnected(format!("client {client}")))?;

        if sender.send(Message::Text(text.into())).is_err() {
            self.senders.remove(&client);
            return Err(DispatchError::NotConnected(format!("client {client}")));
        }
        Ok(Delivered)
    }

    fn close_all(&mut self) {
        for (client, sender) in self.senders.drain() {
            if sender.send(closing_frame("Relay shutting down")).is_err() {
                debug!("Game client {} writer already closed", client);
            }
        }
    }
}

/// Dashboard session writers keyed by session id.
#[derive(Debug, Default)]
pub struct DashboardSessions {
    sessions: HashMap<SessionId, Outbound>,
}

impl DashboardSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl DashboardChannel for DashboardSessions {
    type Connection = Outbound;

    fn subscribe(&mut self, session: SessionId, connection: Outbound) {
        self.sessions.insert(session, connection);
    }

    fn unsubscribe(&mut self, session: SessionId) {
        self.sessions.remove(&session);
    }

    fn publish(&mut self, event: &DashboardEvent) {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode {} for dashboards: {}", event.name(), e);
                return;
            }
        };

        // a session whose writer is gone is dropped; its close callback may still follow
        self.sessions
            .retain(|_, sender| sender.send(Message::Text(frame.clone().into())).is_ok());
        debug!("📡 Published {} to {} dashboard session(s)", event.name(), self.sessions.len());
    }

    fn send_to(&mut self, session: SessionId, event: &DashboardEvent) -> DispatchResult {
        let sender = self
            .sessions
            .get(&session)
            .ok_or_else(|| DispatchError::NotConnected(format!("session {session}")))?;
        let frame = event
            .to_frame()
            .map_err(|_| DispatchError::NotConnected(format!("session {session}")))?;

        sender
            .send(Message::Text(frame.into()))
            .map(|_| Delivered)
            .map_err(|_| DispatchError::NotConnected(format!("session {session}")))
    }

    fn close_all(&mut self) {
        for (session, sender) in self.sessions.drain() {
            if sender.send(closing_frame("Relay shutting down")).is_err() {
                debug!("Dashboard session {} writer already closed", session);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClientList;

    #[test]
    fn test_game_send_fails_after_writer_drops() {
        let mut games = GameConnections::new();
        let client = ClientId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        games.attach(client, tx);

        assert_eq!(games.send(client, "hello".to_string()), Ok(Delivered));
        assert!(matches!(rx.try_recv(), Ok(Message::Text(t)) if t.as_str() == "hello"));

        drop(rx);
        assert!(games.send(client, "again".to_string()).is_err());
        assert!(games.is_empty());
    }

    #[test]
    fn test_game_send_to_unknown_client() {
        let mut games = GameConnections::new();
        assert!(matches!(
            games.send(ClientId::new(), "x".to_string()),
            Err(DispatchError::NotConnected(_))
        ));
    }

    #[test]
    fn test_publish_reaches_every_session_and_prunes_dead_ones() {
        let mut dashboards = DashboardSessions::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        dashboards.subscribe(SessionId::new(), tx_a);
        dashboards.subscribe(SessionId::new(), tx_b);
        drop(rx_b);

        dashboards.publish(&DashboardEvent::ClientsUpdate(ClientList::new(Vec::new())));

        assert_eq!(dashboards.len(), 1);
        let frame = match rx_a.try_recv() {
            Ok(Message::Text(text)) => text.to_string(),
            other => panic!("unexpected frame: {other:?}"),
        };
        let value: serde_json::Value = serde_json::from_str(&frame).expect("frame should be JSON");
        assert_eq!(value["event"], "clients_update");
        assert_eq!(value["data"]["totalConnected"], 0);
    }

    #[test]
    fn test_close_all_sends_close_frames() {
        let mut games = GameConnections::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        games.attach(ClientId::new(), tx);

        games.close_all();
        assert!(games.is_empty());
        assert!(matches!(rx.try_recv(), Ok(Message::Close(Some(_)))));
    }
    #[test]
    fn test_dashboard_close_all_skips_dead_writers() {
        let mut dashboards = DashboardSessions::new();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        dashboards.subscribe(SessionId::new(), tx_live);
        dashboards.subscribe(SessionId::new(), tx_dead);
        drop(rx_dead);

        dashboards.close_all();

        assert!(dashboards.is_empty());
        match rx_live.try_recv() {
            Ok(Message::Close(Some(frame))) => {
                assert_eq!(frame.code, CloseCode::Away);
                assert_eq!(frame.reason.as_str(), "Relay shutting down");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
