//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that orchestrates relay
//! startup and the bounded shutdown sequence.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use relay_server::{create_server_with_config, RelayServer};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Main application struct.
///
/// The `Application` owns the merged configuration and the relay server
/// until [`Application::run`] hands the server to its own task.
///
/// # Architecture
///
/// * **Configuration Management**: File, then environment, then CLI
/// * **Server Orchestration**: Starts the relay and both accept loops
/// * **Graceful Shutdown**: Listeners first, then sessions, under one timeout
pub struct Application {
    /// Merged application configuration
    config: AppConfig,
    /// Where the configuration was read from
    config_path: PathBuf,
    /// Relay server instance
    server: RelayServer,
}

/// Applies command-line overrides on top of the loaded configuration.
pub fn apply_cli_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.http_port {
        config.server.http_port = port;
    }
    if let Some(port) = args.ws_port {
        config.server.minecraft_ws_port = port;
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` instance ready to run, or an error if
    /// the configuration could not be loaded or is invalid.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply `PORT` / `MINECRAFT_WS_PORT` from the environment
    /// 3. Apply command-line argument overrides
    /// 4. Validate merged configuration
    /// 5. Display startup banner and create the relay server
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        config.apply_env_overrides();
        apply_cli_overrides(&mut config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let relay_config = config.to_relay_config()?;
        let server = create_server_with_config(relay_config);

        Ok(Self {
            config,
            config_path: args.config_path,
            server,
        })
    }

    /// Runs the relay until a termination signal, then shuts it down.
    ///
    /// # Shutdown Sequence
    ///
    /// 1. Stop both accept loops; their listeners close
    /// 2. Close every dashboard session, then every game connection
    ///
    /// The whole sequence is bounded by the relay's `shutdown_timeout`; past that
    /// the process exits with status 1. A second signal during shutdown
    /// also exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Mivubi relay");
        self.log_configuration_summary();

        let config = self.config.clone();
        let shutdown_timeout = self.shutdown_timeout();
        let relay = self.server.relay_handle();
        let stop_listeners = self.server.shutdown_sender();

        let server_handle = {
            let server = self.server;
            tokio::spawn(async move {
                match server.start().await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        info!("✅ Mivubi relay is now running!");
        info!(
            "🎮 In game, run /connect {}:{}",
            config.server.host, config.server.minecraft_ws_port
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers().await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        let shutdown = async move {
            info!("📡 Phase 1: Closing listeners...");
            let _ = stop_listeners.send(());
            if let Err(e) = server_handle.await {
                warn!("Server task ended abnormally: {e}");
            }

            info!("🔌 Phase 2: Closing dashboard sessions and game connections...");
            if let Err(e) = relay.shutdown().await {
                warn!("Relay shutdown incomplete: {e}");
            }
        };

        if tokio::time::timeout(shutdown_timeout, shutdown).await.is_err() {
            error!(
                "⏰ Shutdown did not finish within {}s, forcing exit",
                shutdown_timeout.as_secs()
            );
            std::process::exit(1);
        }

        // let queued close frames reach the sockets
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("✅ Mivubi relay shutdown complete");
        Ok(())
    }

    /// Upper bound on the shutdown sequence.
    pub fn shutdown_timeout(&self) -> Duration {
        self.server.config().shutdown_timeout
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary ({}):", self.config_path.display());
        info!(
            "  🖥️ Dashboards: {}:{}",
            self.config.server.host, self.config.server.http_port
        );
        info!(
            "  🎮 Game clients: {}:{}",
            self.config.server.host, self.config.server.minecraft_ws_port
        );
        info!(
            "  📜 Activity: {} retained, {} replayed",
            self.config.server.activity_capacity, self.config.server.history_limit
        );
        info!(
            "  ⏱️ Eviction grace: {}s | Shutdown timeout: {}s",
            self.config.server.eviction_grace_secs,
            self.shutdown_timeout().as_secs()
        );
    }
}
