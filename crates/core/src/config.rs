//! Render configuration -- config file parsing and validation
//!
//! A [`Config`] describes one destination artifact: where it is rendered,
//! which triggers cause a regeneration (container events, a fixed interval,
//! or only the startup sync), and which notifiers run after a render.
//! [`ConfigFile`] is the ordered collection of configs, loaded from a TOML
//! file with one `[[config]]` table per artifact:
//!
//! ```toml
//! [[config]]
//! dest = "/etc/nginx/conf.d/default.conf"
//! watch = true
//! wait = "500ms:2s"
//! notify_cmd = "nginx -s reload"
//!
//! [[config]]
//! dest = "/etc/haproxy/haproxy.cfg"
//! interval = 30
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Debounce window for event-driven regeneration.
///
/// `min` is the quiet period that must elapse after the last event of a
/// burst; `max` caps how long a continuous burst can delay the
/// regeneration. Parsed from a `"min:max"` pair of humantime durations
/// (`"500ms:2s"`); a bare `"500ms"` sets both bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    /// Quiet period after the last event before emitting
    pub min: Duration,
    /// Upper bound from the first event of a burst
    pub max: Duration,
}

impl Wait {
    /// Creates a window, enforcing `max >= min`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if max < min {
            return Err(ConfigError::InvalidValue {
                field: "wait".to_owned(),
                reason: format!("max ({max:?}) must be >= min ({min:?})"),
            });
        }
        Ok(Self { min, max })
    }
}

impl FromStr for Wait {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "wait".to_owned(),
                reason: "empty wait string".to_owned(),
            });
        }
        let (min_str, max_str) = match s.split_once(':') {
            Some((min, max)) => (min.trim(), max.trim()),
            None => (s, s),
        };
        let parse = |part: &str| {
            humantime::parse_duration(part).map_err(|e| ConfigError::InvalidValue {
                field: "wait".to_owned(),
                reason: format!("'{part}': {e}"),
            })
        };
        Self::new(parse(min_str)?, parse(max_str)?)
    }
}

impl fmt::Display for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            humantime::format_duration(self.min),
            humantime::format_duration(self.max),
        )
    }
}

impl Serialize for Wait {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Wait {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// One render target with its triggers and notifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Destination path of the rendered artifact. Empty means the renderer
    /// decides (the bundled renderer writes to stdout).
    #[serde(default)]
    pub dest: String,
    /// React to container events from the daemon
    #[serde(default)]
    pub watch: bool,
    /// Periodic regeneration interval in seconds; 0 disables it
    #[serde(default)]
    pub interval: u64,
    /// Optional debounce window for event-driven regeneration
    #[serde(default)]
    pub wait: Option<Wait>,
    /// Shell command run after a render; empty means none
    #[serde(default)]
    pub notify_cmd: String,
    /// Log the notify command's combined output line by line
    #[serde(default)]
    pub notify_output: bool,
    /// Container id (or name) to POSIX signal name
    #[serde(default)]
    pub notify_containers: HashMap<String, String>,
    /// Swarm service name to POSIX signal name
    #[serde(default)]
    pub notify_services: HashMap<String, String>,
}

impl Config {
    /// Validates a single config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Wait bounds are enforced at parse time; re-check for configs built
        // programmatically.
        if let Some(wait) = &self.wait {
            Wait::new(wait.min, wait.max)?;
        }
        for (target, signal) in self
            .notify_containers
            .iter()
            .chain(self.notify_services.iter())
        {
            if signal.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "notify_containers/notify_services".to_owned(),
                    reason: format!("empty signal for '{target}'"),
                });
            }
        }
        Ok(())
    }
}

/// Ordered collection of render configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Configs in file order
    #[serde(default, rename = "config")]
    pub config: Vec<Config>,
}

impl ConfigFile {
    /// Wraps a list of configs.
    pub fn new(config: Vec<Config>) -> Self {
        Self { config }
    }

    /// Parses a TOML config document.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(input).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Loads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FileNotFound` when the path does not exist and
    /// `ConfigError::ParseFailed` for malformed TOML.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
        Self::parse(&raw)
    }

    /// Validates every config in the file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for config in &self.config {
            config.validate()?;
        }
        Ok(())
    }

    /// Returns the subsequence of configs with `watch = true`, preserving
    /// file order.
    pub fn filter_watches(&self) -> ConfigFile {
        ConfigFile {
            config: self.config.iter().filter(|c| c.watch).cloned().collect(),
        }
    }

    /// True when no configs are present.
    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_parses_min_max_pair() {
        let wait: Wait = "500ms:2s".parse().unwrap();
        assert_eq!(wait.min, Duration::from_millis(500));
        assert_eq!(wait.max, Duration::from_secs(2));
    }

    #[test]
    fn wait_single_value_sets_both_bounds() {
        let wait: Wait = "750ms".parse().unwrap();
        assert_eq!(wait.min, Duration::from_millis(750));
        assert_eq!(wait.max, Duration::from_millis(750));
    }

    #[test]
    fn wait_rejects_max_below_min() {
        let result: Result<Wait, _> = "2s:500ms".parse();
        assert!(result.is_err());
    }

    #[test]
    fn wait_rejects_garbage() {
        assert!("".parse::<Wait>().is_err());
        assert!("soon".parse::<Wait>().is_err());
        assert!("1s:later".parse::<Wait>().is_err());
    }

    #[test]
    fn wait_display_roundtrip() {
        let wait: Wait = "500ms:2s".parse().unwrap();
        let again: Wait = wait.to_string().parse().unwrap();
        assert_eq!(wait, again);
    }

    #[test]
    fn parse_full_config_file() {
        let toml_str = r#"
[[config]]
dest = "/etc/nginx/conf.d/default.conf"
watch = true
wait = "500ms:2s"
notify_cmd = "nginx -s reload"
notify_output = true

[[config]]
dest = "/etc/haproxy/haproxy.cfg"
interval = 30

[config.notify_containers]
haproxy = "SIGHUP"
"#;
        let file = ConfigFile::parse(toml_str).unwrap();
        assert_eq!(file.config.len(), 2);

        let first = &file.config[0];
        assert_eq!(first.dest, "/etc/nginx/conf.d/default.conf");
        assert!(first.watch);
        assert_eq!(first.wait.unwrap().max, Duration::from_secs(2));
        assert_eq!(first.notify_cmd, "nginx -s reload");
        assert!(first.notify_output);

        let second = &file.config[1];
        assert!(!second.watch);
        assert_eq!(second.interval, 30);
        assert_eq!(
            second.notify_containers.get("haproxy").map(String::as_str),
            Some("SIGHUP")
        );
    }

    #[test]
    fn parse_defaults_for_missing_fields() {
        let file = ConfigFile::parse("[[config]]\ndest = \"/tmp/out\"\n").unwrap();
        let config = &file.config[0];
        assert!(!config.watch);
        assert_eq!(config.interval, 0);
        assert!(config.wait.is_none());
        assert!(config.notify_cmd.is_empty());
        assert!(config.notify_containers.is_empty());
        assert!(config.notify_services.is_empty());
    }

    #[test]
    fn parse_empty_document() {
        let file = ConfigFile::parse("").unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn parse_rejects_bad_wait() {
        let result = ConfigFile::parse("[[config]]\nwait = \"2s:1s\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn parse_rejects_malformed_toml() {
        let result = ConfigFile::parse("[[config]\ndest = 1");
        assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn validate_rejects_empty_signal_name() {
        let mut config = Config::default();
        config
            .notify_containers
            .insert("web".to_owned(), "  ".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_watches_preserves_order() {
        let file = ConfigFile::new(vec![
            Config {
                dest: "a".to_owned(),
                watch: true,
                ..Default::default()
            },
            Config {
                dest: "b".to_owned(),
                ..Default::default()
            },
            Config {
                dest: "c".to_owned(),
                watch: true,
                ..Default::default()
            },
        ]);
        let watching = file.filter_watches();
        let dests: Vec<&str> = watching.config.iter().map(|c| c.dest.as_str()).collect();
        assert_eq!(dests, vec!["a", "c"]);
    }

    #[test]
    fn wait_serializes_as_string() {
        let config = Config {
            wait: Some("100ms:1s".parse().unwrap()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"100ms:1s\""));
    }
}
