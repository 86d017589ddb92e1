//! Context model -- the runtime snapshot consumed by the renderer
//!
//! A [`Context`] is built fresh for every regeneration and never mutated
//! afterwards. It carries one [`RuntimeContainer`] per observed container,
//! the swarm [`Services`] map, and the latest daemon [`DaemonInfo`].
//! Containers reference services through shared [`std::sync::Arc`] handles
//! into the map; snapshots never deep-copy service records.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Swarm services keyed by service id.
pub type Services = HashMap<String, Arc<Service>>;

/// Immutable snapshot of the container runtime for one regeneration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    /// Observed containers, in daemon listing order
    pub containers: Vec<RuntimeContainer>,
    /// Latest daemon info at build time, if any probe has succeeded
    pub info: Option<DaemonInfo>,
    /// Swarm services at build time (possibly stale, see the builder)
    pub services: Services,
}

/// One observed container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeContainer {
    pub id: String,
    /// Container name with the leading `/` stripped
    pub name: String,
    pub hostname: String,
    pub image: DockerImage,
    pub state: ContainerState,
    pub gateway: String,
    pub ip: String,
    pub ip6_link_local: String,
    pub ip6_global: String,
    /// One entry per exposed container port, with the first host binding
    pub addresses: Vec<Address>,
    /// Per-network endpoint records
    pub networks: Vec<Network>,
    /// Container path to volume binding
    pub volumes: HashMap<String, Volume>,
    pub mounts: Vec<Mount>,
    /// Environment, split at the first `=` of each entry
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    /// Swarm node the container runs on; zero when not in a swarm
    pub node: SwarmNode,
    /// Backing swarm service, resolved by the service id label
    pub service: Option<Arc<Service>>,
}

impl RuntimeContainer {
    /// Looks up an environment variable.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Looks up a label.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl fmt::Display for RuntimeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, short_id(&self.id))
    }
}

/// Image reference split into registry, repository, and tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerImage {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl DockerImage {
    /// Splits an image reference.
    ///
    /// The segment before the first `/` is taken as the registry when one is
    /// present; the tag follows the first `:` of the remainder and defaults
    /// to `latest` when unspecified.
    pub fn parse(reference: &str) -> Self {
        let (registry, remainder) = match reference.split_once('/') {
            Some((registry, remainder)) => (registry.to_owned(), remainder),
            None => (String::new(), reference),
        };
        let (repository, tag) = match remainder.split_once(':') {
            Some((repository, tag)) => (repository.to_owned(), tag.to_owned()),
            None => (remainder.to_owned(), "latest".to_owned()),
        };
        Self {
            registry,
            repository,
            tag,
        }
    }
}

impl fmt::Display for DockerImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.registry.is_empty() {
            write!(f, "{}/", self.registry)?;
        }
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Container run state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub running: bool,
}

/// One exposed container port with its optional first host binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub ip: String,
    pub ip6_link_local: String,
    pub ip6_global: String,
    pub port: String,
    pub proto: String,
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

/// Per-network endpoint record of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub ip: String,
    pub gateway: String,
    pub endpoint_id: String,
    pub ipv6_gateway: String,
    pub global_ipv6_address: String,
    pub mac_address: String,
    pub global_ipv6_prefix_len: i64,
    pub ip_prefix_len: i64,
}

/// Volume binding of a container path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub path: String,
    pub host_path: String,
    pub read_write: bool,
}

/// One mount of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub name: String,
    pub source: String,
    pub destination: String,
    pub driver: String,
    pub mode: String,
    pub rw: bool,
}

/// Swarm node a container runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmNode {
    pub id: String,
    pub name: String,
    pub address: Address,
}

/// Swarm service record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub networks: Vec<ServiceNetwork>,
}

/// Resolved virtual IP of a swarm service on one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNetwork {
    /// Virtual IP with the CIDR suffix stripped
    pub ip: String,
    pub name: String,
    pub scope: String,
    pub driver: String,
}

/// Daemon-wide information refreshed on every context build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub name: String,
    pub containers: i64,
    pub images: i64,
    pub os_type: String,
    pub architecture: String,
}

/// Daemon server version, probed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonVersion {
    pub version: String,
    pub api_version: String,
}

/// Splits `KEY=VALUE` entries at the first `=`.
///
/// Entries without an `=` are kept with an empty value.
pub fn split_key_value_slice(entries: &[String]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

/// Truncates an identifier to the usual 12-character short form for logs.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((offset, _)) => &id[..offset],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_parse_bare_repository() {
        let image = DockerImage::parse("nginx");
        assert_eq!(image.registry, "");
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn image_parse_with_tag() {
        let image = DockerImage::parse("redis:7");
        assert_eq!(image.registry, "");
        assert_eq!(image.repository, "redis");
        assert_eq!(image.tag, "7");
    }

    #[test]
    fn image_parse_with_registry() {
        let image = DockerImage::parse("registry.example.com/team/app:1.2");
        assert_eq!(image.registry, "registry.example.com");
        assert_eq!(image.repository, "team/app");
        assert_eq!(image.tag, "1.2");
    }

    #[test]
    fn image_parse_registry_without_tag() {
        let image = DockerImage::parse("quay.io/prometheus/node-exporter");
        assert_eq!(image.registry, "quay.io");
        assert_eq!(image.repository, "prometheus/node-exporter");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn image_display_reassembles_reference() {
        assert_eq!(DockerImage::parse("nginx").to_string(), "nginx:latest");
        assert_eq!(
            DockerImage::parse("quay.io/app:v2").to_string(),
            "quay.io/app:v2"
        );
    }

    #[test]
    fn split_env_at_first_equals() {
        let env = split_key_value_slice(&[
            "PATH=/usr/bin:/bin".to_owned(),
            "OPTS=--flag=value".to_owned(),
            "MARKER".to_owned(),
        ]);
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
        assert_eq!(env.get("OPTS").map(String::as_str), Some("--flag=value"));
        assert_eq!(env.get("MARKER").map(String::as_str), Some(""));
    }

    #[test]
    fn short_id_truncates_long_identifiers() {
        let id = "0123456789abcdef0123456789abcdef";
        assert_eq!(short_id(id), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id(""), "");
    }

    #[test]
    fn container_env_and_label_lookup() {
        let mut container = RuntimeContainer::default();
        container
            .env
            .insert("VIRTUAL_HOST".to_owned(), "app.local".to_owned());
        container
            .labels
            .insert("com.example.role".to_owned(), "web".to_owned());
        assert_eq!(container.env("VIRTUAL_HOST"), Some("app.local"));
        assert_eq!(container.env("MISSING"), None);
        assert_eq!(container.label("com.example.role"), Some("web"));
    }

    #[test]
    fn container_display_uses_short_id() {
        let container = RuntimeContainer {
            id: "0123456789abcdef0123456789abcdef".to_owned(),
            name: "web".to_owned(),
            ..Default::default()
        };
        assert_eq!(container.to_string(), "web (0123456789ab)");
    }

    #[test]
    fn service_handles_are_shared_not_copied() {
        let service = Arc::new(Service {
            id: "svc1".to_owned(),
            name: "proxy".to_owned(),
            ..Default::default()
        });
        let mut services = Services::new();
        services.insert(service.id.clone(), Arc::clone(&service));

        let container = RuntimeContainer {
            service: services.get("svc1").map(Arc::clone),
            ..Default::default()
        };
        assert!(Arc::ptr_eq(
            container.service.as_ref().unwrap(),
            services.get("svc1").unwrap()
        ));
    }

    #[test]
    fn context_serializes_to_json() {
        let mut ctx = Context::default();
        ctx.containers.push(RuntimeContainer {
            id: "abc".to_owned(),
            name: "web".to_owned(),
            image: DockerImage::parse("nginx:1.27"),
            ..Default::default()
        });
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"name\":\"web\""));
        assert!(json.contains("\"tag\":\"1.27\""));
    }
}
