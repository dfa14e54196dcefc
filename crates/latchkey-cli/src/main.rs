//! Latchkey door controller
//!
//! Reads credentials from the fingerprint sensor, card reader and QR
//! scanner, asks the access authority over MQTT, and opens the door on
//! `allow`.

mod backends;
mod sensor;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use latchkey_controller::{CoordinatorConfig, RequestCoordinator};
use latchkey_core::ControllerConfig;
use latchkey_hardware::{PinLevel, RelayActuator};
use latchkey_network::MqttChannel;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backends::LineFeed;
use sensor::SensorCommand;

/// Latchkey - access-control door controller
#[derive(Parser, Debug)]
#[command(name = "latchkey")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "latchkey.toml", env = "LATCHKEY_CONFIG")]
    config: PathBuf,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the door controller (default)
    Run,
    /// Fingerprint sensor maintenance
    #[command(subcommand)]
    Sensor(SensorCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("Latchkey v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&args.config, |key| std::env::var(key).ok())?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_controller(config).await,
        Command::Sensor(command) => {
            let driver = backends::fingerprint_driver(&config)?;
            sensor::run(driver, command).await
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(true)
        .init();
}

/// Load `path` if it exists, apply overrides from `env` and validate.
fn load_config(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<ControllerConfig> {
    let mut config = if path.exists() {
        let config = ControllerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        config
    } else {
        info!("No configuration at {}, using defaults", path.display());
        ControllerConfig::default()
    };

    config.apply_env(env)?;
    config.validate()?;
    Ok(config)
}

async fn run_controller(config: ControllerConfig) -> Result<()> {
    let feed = LineFeed::new();
    if config.sources.rfid || config.sources.qr {
        feed.spawn_reader(std::io::BufReader::new(std::io::stdin()));
        info!("Reading rfid:<uid> and qr:<text> lines from stdin");
    }

    let sources = backends::credential_sources(&config, &feed)?;
    let relay = RelayActuator::new(backends::output_pin(config.gpio.relay_pin, PinLevel::Low)?)?;
    let channel = MqttChannel::connect(&config.mqtt)?;
    info!(
        "Door {} publishing to {}",
        config.mqtt.door_id,
        config.mqtt.request_topic()
    );

    let mut coordinator = RequestCoordinator::new(
        sources,
        channel,
        relay,
        CoordinatorConfig::from(&config.timing),
    );
    let result = coordinator.run(shutdown_signal()).await;

    let (_sources, channel, mut relay) = coordinator.into_parts();
    relay.lock()?;
    channel.shutdown().await;
    result?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let args = Args::try_parse_from(["latchkey"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.config, PathBuf::from("latchkey.toml"));
    }

    #[test]
    fn test_sensor_subcommands_parse() {
        let args =
            Args::try_parse_from(["latchkey", "sensor", "enroll", "--id", "7", "--privilege", "2"])
                .unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Sensor(SensorCommand::Enroll { id: 7, privilege: 2 }))
        ));

        let args = Args::try_parse_from(["latchkey", "sensor", "delete-all"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Sensor(SensorCommand::DeleteAll))
        ));

        let args = Args::try_parse_from(["latchkey", "sensor", "capture-image"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Sensor(SensorCommand::CaptureImage { .. }))
        ));
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml"), no_env).unwrap();
        assert_eq!(config.mqtt.request_topic(), "access/door/main/request");
    }

    #[test]
    fn test_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latchkey.toml");
        std::fs::write(&path, "[mqtt]\ndoor_id = \"lobby\"\n").unwrap();

        let config = load_config(&path, no_env).unwrap();
        assert_eq!(config.mqtt.decision_topic(), "access/door/lobby/decision");
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latchkey.toml");
        std::fs::write(&path, "[mqtt]\ndoor_id = \"lobby\"\nport = 1883\n").unwrap();

        let config = load_config(&path, |key| match key {
            "DOOR_ID" => Some("garage".to_string()),
            "MQTT_PORT" => Some("8883".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.mqtt.door_id, "garage");
        assert_eq!(config.mqtt.port, 8883);
    }

    #[test]
    fn test_invalid_environment_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("absent.toml"), |key| {
            (key == "MQTT_QOS").then(|| "3".to_string())
        });
        assert!(result.is_err());
    }
}
