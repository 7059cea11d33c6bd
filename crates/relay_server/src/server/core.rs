//! Core relay server implementation.
//!
//! This module contains the `RelayServer` struct, which binds the game and
//! dashboard listeners, spawns the relay task and runs the accept loops
//! until shutdown is requested.

use crate::{
    config::RelayConfig,
    error::RelayError,
    relay::{self, RelayActor, RelayHandle},
    server::handlers::{handle_dashboard_connection, handle_game_connection},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// The two bound listeners, ready to serve.
#[derive(Debug)]
pub struct BoundListeners {
    game: TcpListener,
    dashboard: TcpListener,
}

impl BoundListeners {
    /// Actual game-side address, useful when the configured port was 0.
    pub fn game_addr(&self) -> Result<SocketAddr, RelayError> {
        self.game
            .local_addr()
            .map_err(|e| RelayError::Network(format!("Game listener has no address: {e}")))
    }

    pub fn dashboard_addr(&self) -> Result<SocketAddr, RelayError> {
        self.dashboard
            .local_addr()
            .map_err(|e| RelayError::Network(format!("Dashboard listener has no address: {e}")))
    }
}

/// Which handler an accept loop feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Game,
    Dashboard,
}

/// The relay server.
///
/// `RelayServer` owns the not-yet-spawned relay task and the shutdown
/// channel for its accept loops. Socket handlers reach the relay only
/// through a [`RelayHandle`].
///
/// # Lifecycle
///
/// 1. [`RelayServer::new`] builds the relay task and its handle
/// 2. [`RelayServer::bind`] opens both listeners
/// 3. [`RelayServer::serve`] spawns the relay task and accepts until shutdown
/// 4. [`RelayServer::shutdown`] (or a sender from
///    [`RelayServer::shutdown_sender`]) stops the accept loops
/// 5. [`RelayHandle::shutdown`] closes every session and stops the relay task
pub struct RelayServer {
    /// Server configuration settings
    config: RelayConfig,

    /// Handle cloned into every connection handler
    relay: RelayHandle,

    /// Relay task, spawned when serving starts
    actor: RelayActor,

    /// Channel for stopping the accept loops
    shutdown_sender: broadcast::Sender<()>,
}

impl RelayServer {
    /// Creates a new relay server with the specified configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Listening addresses and store bounds
    ///
    /// # Returns
    ///
    /// A new `RelayServer` ready to be bound and started.
    pub fn new(config: RelayConfig) -> Self {
        let (relay, actor) = relay::channel(config.clone());
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            config,
            relay,
            actor,
            shutdown_sender,
        }
    }

    /// Binds both listeners and serves until shutdown.
    ///
    /// # Returns
    ///
    /// `Ok(())` once both accept loops have stopped, or a `RelayError` if a
    /// listener could not be bound.
    pub async fn start(self) -> Result<(), RelayError> {
        let listeners = self.bind().await?;
        self.serve(listeners).await
    }

    /// Binds the game listener, then the dashboard listener.
    pub async fn bind(&self) -> Result<BoundListeners, RelayError> {
        let game = TcpListener::bind(self.config.game_bind_address)
            .await
            .map_err(|e| {
                RelayError::Network(format!(
                    "Failed to bind game listener on {}: {e}",
                    self.config.game_bind_address
                ))
            })?;
        let dashboard = TcpListener::bind(self.config.dashboard_bind_address)
            .await
            .map_err(|e| {
                RelayError::Network(format!(
                    "Failed to bind dashboard listener on {}: {e}",
                    self.config.dashboard_bind_address
                ))
            })?;
        Ok(BoundListeners { game, dashboard })
    }

    /// Spawns the relay task and runs both accept loops.
    ///
    /// The listeners are dropped, and so closed, when the loops return.
    pub async fn serve(self, listeners: BoundListeners) -> Result<(), RelayError> {
        info!("🎮 Game clients: ws://{}", listeners.game_addr()?);
        info!("🖥️ Dashboards: ws://{}", listeners.dashboard_addr()?);

        tokio::spawn(self.actor.run());

        let game_loop = accept_loop(
            listeners.game,
            Side::Game,
            self.relay.clone(),
            self.shutdown_sender.subscribe(),
        );
        let dashboard_loop = accept_loop(
            listeners.dashboard,
            Side::Dashboard,
            self.relay.clone(),
            self.shutdown_sender.subscribe(),
        );
        tokio::join!(game_loop, dashboard_loop);

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Configuration the server was built with.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handle for feeding and stopping the relay task.
    pub fn relay_handle(&self) -> RelayHandle {
        self.relay.clone()
    }

    /// Sender that stops the accept loops once `serve` has taken `self`.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_sender.clone()
    }

    /// Stops the accept loops.
    pub fn shutdown(&self) {
        info!("🛑 Shutting down relay listeners...");
        let _ = self.shutdown_sender.send(());
    }
}

async fn accept_loop(
    listener: TcpListener,
    side: Side,
    relay: RelayHandle,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("🛑 {:?} accept loop stopping - shutdown initiated", side);
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let relay = relay.clone();
                        tokio::spawn(async move {
                            let result = match side {
                                Side::Game => handle_game_connection(stream, addr, relay).await,
                                Side::Dashboard => {
                                    handle_dashboard_connection(stream, addr, relay).await
                                }
                            };
                            if let Err(e) = result {
                                error!("Connection error: {:?}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept {:?} connection: {}", side, e);
                    }
                }
            }
        }
    }
}
