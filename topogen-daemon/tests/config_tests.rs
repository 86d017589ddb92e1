//! Configuration loading and validation tests.
//!
//! Tests TOML parsing, single-config flag mode, wait strings, and TLS
//! validation.

use clap::Parser;

use topogen_core::config::ConfigFile;
use topogen_core::error::ConfigError;
use topogen_daemon::cli::DaemonCli;

#[test]
fn test_parse_full_config() {
    // Given: A complete TOML config
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

[config.notify_services]
ingress = "SIGUSR2"
"#;

    // When: Parsing config
    let result = ConfigFile::parse(toml_str);

    // Then: Should succeed with both configs in order
    assert!(result.is_ok(), "full config should parse successfully");
    let file = result.expect("config should parse");
    assert_eq!(file.config.len(), 2);

    assert!(file.config[0].watch);
    assert_eq!(file.config[0].notify_cmd, "nginx -s reload");
    assert!(file.config[0].notify_output);

    assert_eq!(file.config[1].interval, 30);
    assert_eq!(
        file.config[1]
            .notify_containers
            .get("haproxy")
            .map(String::as_str),
        Some("SIGHUP")
    );
    assert_eq!(
        file.config[1]
            .notify_services
            .get("ingress")
            .map(String::as_str),
        Some("SIGUSR2")
    );
}

#[test]
fn test_parse_rejects_inverted_wait() {
    // Given: A wait window with max below min
    let toml_str = "[[config]]\nwait = \"2s:500ms\"\n";

    // When/Then: Parsing fails with a config error
    let result = ConfigFile::parse(toml_str);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_from_file() {
    // Given: A config file on disk
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = dir.path().join("topogen.toml");
    std::fs::write(&path, "[[config]]\ndest = \"/tmp/out\"\nwatch = true\n")
        .expect("should write config");

    // When: Loading
    let file = ConfigFile::load(&path).await.expect("should load config");

    // Then: Contents match
    assert_eq!(file.config.len(), 1);
    assert!(file.config[0].watch);
}

#[tokio::test]
async fn test_load_missing_file() {
    // Given: A path that does not exist
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = dir.path().join("missing.toml");

    // When/Then: Loading reports FileNotFound
    let result = ConfigFile::load(&path).await;
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[tokio::test]
async fn test_cli_single_config_mode() {
    // Given: Single-config flags
    let args = DaemonCli::try_parse_from([
        "topogen",
        "--dest",
        "/tmp/out.conf",
        "--watch",
        "--wait",
        "500ms:2s",
        "--notify",
        "nginx -s reload",
        "--notify-container",
        "web=SIGHUP",
        "--notify-service",
        "proxy=SIGUSR1",
    ])
    .expect("flags should parse");

    // When: Resolving configs
    let file = args.config_file().await.expect("should build config");

    // Then: One config mirrors the flags
    assert_eq!(file.config.len(), 1);
    let config = &file.config[0];
    assert_eq!(config.dest, "/tmp/out.conf");
    assert!(config.watch);
    assert_eq!(
        config.wait.expect("wait should be set").max,
        std::time::Duration::from_secs(2)
    );
    assert_eq!(config.notify_cmd, "nginx -s reload");
    assert_eq!(
        config.notify_containers.get("web").map(String::as_str),
        Some("SIGHUP")
    );
    assert_eq!(
        config.notify_services.get("proxy").map(String::as_str),
        Some("SIGUSR1")
    );
}

#[test]
fn test_cli_rejects_bad_signal_spec() {
    // Given/When: A notify-container flag without '='
    let result = DaemonCli::try_parse_from(["topogen", "--notify-container", "web:SIGHUP"]);

    // Then: clap rejects it
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cli_rejects_bad_wait_string() {
    let args =
        DaemonCli::try_parse_from(["topogen", "--wait", "soon"]).expect("flags should parse");
    let result = args.config_file().await;
    assert!(result.is_err());
}

#[test]
fn test_cli_tls_requires_material() {
    // Given: tls-verify without certificate paths
    let args = DaemonCli::try_parse_from(["topogen", "--tls-verify"]).expect("flags should parse");

    // When/Then: TLS resolution fails
    assert!(args.tls().is_err());

    // And: With all three paths it succeeds
    let args = DaemonCli::try_parse_from([
        "topogen",
        "--tls-verify",
        "--tls-ca-cert",
        "/certs/ca.pem",
        "--tls-cert",
        "/certs/cert.pem",
        "--tls-key",
        "/certs/key.pem",
    ])
    .expect("flags should parse");
    let tls = args.tls().expect("tls should resolve");
    assert!(tls.is_some());
}

#[test]
fn test_cli_defaults() {
    let args = DaemonCli::try_parse_from(["topogen"]).expect("no flags should parse");
    assert!(args.endpoint.is_none());
    assert!(!args.watch);
    assert_eq!(args.interval, 0);
    assert_eq!(args.log_level, "info");
    assert_eq!(args.log_format, "pretty");
}
