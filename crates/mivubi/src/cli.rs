//! Command-line interface handling for the Mivubi relay.
//!
//! This module provides command-line argument parsing using the `clap`
//! builder API.

use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// Every option except `--config` overrides the matching configuration
/// file setting when given.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the bind host
    pub host: Option<String>,
    /// Optional override for the dashboard port
    pub http_port: Option<u16>,
    /// Optional override for the game-client port
    pub ws_port: Option<u16>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// # Returns
    ///
    /// A `CliArgs` instance containing all parsed command-line options.
    /// Invalid input makes clap print usage and exit.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list, as tests do.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            host: matches.get_one::<String>("host").cloned(),
            http_port: matches.get_one::<u16>("http-port").copied(),
            ws_port: matches.get_one::<u16>("ws-port").copied(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

fn command() -> Command {
    Command::new("Mivubi Relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Relays Minecraft game-client WebSocket traffic to browser dashboards")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("ADDRESS")
                .help("Interface both listeners bind to (e.g., 127.0.0.1)"),
        )
        .arg(
            Arg::new("http-port")
                .short('p')
                .long("http-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Dashboard port"),
        )
        .arg(
            Arg::new("ws-port")
                .short('w')
                .long("ws-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Game-client WebSocket port"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
}
