//! CLI argument definitions for the topogen daemon.
//!
//! Uses `clap` v4 derive macros. Configs come either from a TOML file
//! (`--config`) or, for the single-artifact case, straight from flags.

use std::path::PathBuf;

use clap::Parser;

use topogen_core::config::{Config, ConfigFile};
use topogen_core::error::ConfigError;
use topogen_engine::TlsSettings;

/// Container-topology-aware file generator.
///
/// Observes a Docker daemon (including swarm services) and re-renders
/// destination artifacts whenever the observed topology changes, then runs
/// the configured notifiers.
#[derive(Parser, Debug)]
#[command(name = "topogen")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Docker daemon endpoint (unix:///path or tcp://host:port).
    ///
    /// Falls back to DOCKER_HOST, then to the default local socket.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Verify TLS on tcp endpoints using the --tls-* certificate material.
    #[arg(long)]
    pub tls_verify: bool,

    /// CA certificate path for --tls-verify.
    #[arg(long)]
    pub tls_ca_cert: Option<PathBuf>,

    /// Client certificate path for --tls-verify.
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Client key path for --tls-verify.
    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// Include stopped containers in listings.
    #[arg(long)]
    pub all: bool,

    /// TOML config file with one [[config]] table per artifact.
    ///
    /// When given, the single-config flags below are ignored.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Destination path in single-config mode; empty renders to stdout.
    #[arg(long, default_value = "")]
    pub dest: String,

    /// React to container events from the daemon.
    #[arg(long)]
    pub watch: bool,

    /// Periodic regeneration interval in seconds; 0 disables it.
    #[arg(long, default_value_t = 0)]
    pub interval: u64,

    /// Debounce window for --watch, e.g. "500ms:2s".
    #[arg(long)]
    pub wait: Option<String>,

    /// Shell command to run after a render.
    #[arg(long = "notify", default_value = "")]
    pub notify_cmd: String,

    /// Log the notify command's combined output line by line.
    #[arg(long)]
    pub notify_output: bool,

    /// Signal a container after rendering, as <container>=<signal>.
    #[arg(long = "notify-container", value_parser = parse_signal_spec)]
    pub notify_containers: Vec<(String, String)>,

    /// Signal the containers backing a swarm service, as <service>=<signal>.
    #[arg(long = "notify-service", value_parser = parse_signal_spec)]
    pub notify_services: Vec<(String, String)>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (json, pretty).
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Validate the configuration and exit without starting.
    #[arg(long)]
    pub validate: bool,
}

fn parse_signal_spec(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((target, signal)) if !target.is_empty() && !signal.is_empty() => {
            Ok((target.to_owned(), signal.to_owned()))
        }
        _ => Err(format!("expected <target>=<signal>, got '{raw}'")),
    }
}

impl DaemonCli {
    /// Resolves the configs: the TOML file when given, otherwise one config
    /// built from the single-config flags.
    pub async fn config_file(&self) -> Result<ConfigFile, ConfigError> {
        if let Some(path) = &self.config {
            return ConfigFile::load(path).await;
        }

        let wait = match &self.wait {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        let config = Config {
            dest: self.dest.clone(),
            watch: self.watch,
            interval: self.interval,
            wait,
            notify_cmd: self.notify_cmd.clone(),
            notify_output: self.notify_output,
            notify_containers: self.notify_containers.iter().cloned().collect(),
            notify_services: self.notify_services.iter().cloned().collect(),
        };
        config.validate()?;
        Ok(ConfigFile::new(vec![config]))
    }

    /// TLS material for the connector.
    ///
    /// # Errors
    ///
    /// `--tls-verify` without all three certificate paths is rejected.
    pub fn tls(&self) -> Result<Option<TlsSettings>, ConfigError> {
        if !self.tls_verify {
            return Ok(None);
        }
        match (&self.tls_ca_cert, &self.tls_cert, &self.tls_key) {
            (Some(ca_cert), Some(cert), Some(key)) => Ok(Some(TlsSettings {
                ca_cert: ca_cert.clone(),
                cert: cert.clone(),
                key: key.clone(),
            })),
            _ => Err(ConfigError::InvalidValue {
                field: "tls_verify".to_owned(),
                reason: "--tls-verify requires --tls-ca-cert, --tls-cert, and --tls-key"
                    .to_owned(),
            }),
        }
    }
}
