//! Tracing setup for the relay process.
//!
//! Relay events (client connects, pairing attempts, dispatch failures) are
//! logged through `tracing`. Operators pick a level in `[logging]` and either
//! terminal output or one JSON object per line for log shippers.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output style of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored single-line output for a terminal
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// JSON when either the config file or `--json-logs` asks for it.
    pub fn select(config: &LoggingSettings, json_flag: bool) -> Self {
        if json_flag || config.json_format {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Installs the global subscriber for the relay.
///
/// `RUST_LOG` wins over `config.level`, so a single module such as
/// `relay_server::pairing=debug` can be turned up without editing the file.
/// Fails if a subscriber is already installed.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let format = LogFormat::select(config, json_format);
    match format {
        // targets stay in JSON so relay_server::relay and ::server lines can be told apart
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_names(true),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_ansi(true).with_target(false))
            .try_init()?,
    }

    info!("🔧 Logging initialized ({:?}) with level: {}", format, log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            ⛏️  MIVUBI RELAY ⛏️             ║");
    info!("║                  v{}                  ║", version);
    info!("║                                          ║");
    info!("║  Minecraft WebSocket -> Dashboards       ║");
    info!("║                                          ║");
    info!("║  🎮 Game client registry                 ║");
    info!("║  📜 Live activity feed                   ║");
    info!("║  🔐 One-time PIN pairing                 ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(json_format: bool) -> LoggingSettings {
        LoggingSettings {
            level: "info".to_string(),
            json_format,
        }
    }

    #[test]
    fn test_format_follows_file_or_flag() {
        assert_eq!(LogFormat::select(&settings(false), false), LogFormat::Pretty);
        assert_eq!(LogFormat::select(&settings(true), false), LogFormat::Json);
        assert_eq!(LogFormat::select(&settings(false), true), LogFormat::Json);
    }
}
