//! Docker API abstraction for testability.
//!
//! The [`DaemonClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardClient`] while tests use `MockDaemonClient`.
//! [`DaemonConnector`] abstracts client construction so the event loop can
//! rebuild a client after the daemon drops the connection.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐     ┌───────────────┐
//! │  Generator │────>│ DaemonClient  │ (trait)
//! └────────────┘     └───────┬───────┘
//!                        │       │
//!                        ▼       ▼
//!                   ┌────────┐ ┌──────┐
//!                   │Bollard │ │ Mock │
//!                   └───┬────┘ └──────┘
//!                       │
//!                       ▼
//!                  Docker Daemon
//! ```
//!
//! Events are delivered through an [`EventSubscription`]: a bounded channel
//! that closes when the daemon drops the stream. Dropping the subscription
//! removes the listener.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use topogen_core::context::{DaemonInfo, DaemonVersion};

use crate::error::EngineError;
use crate::events::EVENT_BUFFER_CAPACITY;

/// Default daemon endpoint when neither config nor `DOCKER_HOST` says
/// otherwise.
pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";

/// Connection timeout for daemon API calls, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Resolved daemon endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix socket path
    Unix(String),
    /// TCP `host:port`
    Tcp(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{path}"),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Resolves an endpoint string into an [`Endpoint`].
///
/// Falls back to the `DOCKER_HOST` environment variable and then to
/// [`DEFAULT_ENDPOINT`] when `raw` is absent or empty. Supported forms are
/// `unix:///path/to/socket` and `tcp://host:port`.
pub fn resolve_endpoint(raw: Option<&str>) -> Result<Endpoint, EngineError> {
    let raw = match raw {
        Some(value) if !value.is_empty() => value.to_owned(),
        _ => std::env::var("DOCKER_HOST")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
    };

    if let Some(path) = raw.strip_prefix("unix://") {
        if path.is_empty() {
            return Err(EngineError::Endpoint(format!("missing socket path in '{raw}'")));
        }
        return Ok(Endpoint::Unix(path.to_owned()));
    }
    if let Some(addr) = raw.strip_prefix("tcp://") {
        if addr.is_empty() {
            return Err(EngineError::Endpoint(format!("missing address in '{raw}'")));
        }
        return Ok(Endpoint::Tcp(addr.to_owned()));
    }
    Err(EngineError::Endpoint(format!(
        "unsupported endpoint '{raw}', expected unix:// or tcp://"
    )))
}

/// TLS material for a `tcp://` endpoint.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub ca_cert: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

// --- Wire types ---
//
// Thin snapshots of what the daemon returns, carrying exactly the fields the
// context builder consumes. Keeping these independent of bollard's generated
// models is what makes the mock (and the whole engine) testable.

/// One entry of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
}

/// One exposed port with its first host binding, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMapping {
    pub port: String,
    pub proto: String,
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

/// Endpoint record of a container on one network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointDetails {
    pub ip: String,
    pub gateway: String,
    pub endpoint_id: String,
    pub ipv6_gateway: String,
    pub global_ipv6_address: String,
    pub mac_address: String,
    pub global_ipv6_prefix_len: i64,
    pub ip_prefix_len: i64,
}

/// One mount of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountDetails {
    pub name: String,
    pub source: String,
    pub destination: String,
    pub driver: String,
    pub mode: String,
    pub rw: bool,
}

/// Swarm node identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDetails {
    pub id: String,
    pub name: String,
    pub addr: String,
}

/// Inspected container.
#[derive(Debug, Clone, Default)]
pub struct ContainerDetails {
    pub id: String,
    /// Name as reported by the daemon, usually with a leading `/`
    pub name: String,
    pub hostname: String,
    /// Raw image reference
    pub image: String,
    pub running: bool,
    /// Raw `KEY=VALUE` environment entries
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub gateway: String,
    pub ip: String,
    pub ip6_link_local: String,
    pub ip6_global: String,
    pub ports: Vec<PortMapping>,
    pub networks: HashMap<String, EndpointDetails>,
    pub mounts: Vec<MountDetails>,
    /// Embedded node, only populated by classic-swarm daemons
    pub node: Option<NodeDetails>,
}

/// Unresolved virtual IP of a swarm service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualIp {
    pub network_id: String,
    /// Address in CIDR form, e.g. `10.0.0.3/24`
    pub addr: String,
}

/// One swarm service as listed by the daemon.
#[derive(Debug, Clone, Default)]
pub struct ServiceDetails {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub virtual_ips: Vec<VirtualIp>,
}

/// One task backing a swarm service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDetails {
    pub id: String,
    /// Task state, e.g. `running`
    pub state: String,
    pub container_id: Option<String>,
}

/// Inspected network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDetails {
    pub name: String,
    pub scope: String,
    pub driver: String,
}

/// Classified daemon event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonEventKind {
    ContainerStart,
    ContainerStop,
    ContainerDie,
    ServiceUpdate,
    /// Anything else; dropped by the event loop
    Other,
}

impl DaemonEventKind {
    /// Classifies a raw `(type, action)` pair from the daemon.
    pub fn from_parts(typ: &str, action: &str) -> Self {
        match (typ, action) {
            ("container", "start") => Self::ContainerStart,
            ("container", "stop") => Self::ContainerStop,
            ("container", "die") => Self::ContainerDie,
            ("service", "update") => Self::ServiceUpdate,
            _ => Self::Other,
        }
    }

    /// True for the event kinds that trigger a regeneration.
    pub fn is_relevant(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for DaemonEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ContainerStart => "start",
            Self::ContainerStop => "stop",
            Self::ContainerDie => "die",
            Self::ServiceUpdate => "service:update",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// One event from the daemon stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEvent {
    pub kind: DaemonEventKind,
    /// Container or service id the event refers to
    pub actor_id: String,
}

/// Active event subscription.
///
/// `recv` yields `None` once the daemon drops the stream. Dropping the
/// subscription aborts the forwarding task, which is the listener removal.
pub struct EventSubscription {
    receiver: mpsc::Receiver<DaemonEvent>,
    forwarder: Option<tokio::task::JoinHandle<()>>,
}

impl EventSubscription {
    /// Wraps a receiving channel and an optional forwarding task.
    pub fn new(
        receiver: mpsc::Receiver<DaemonEvent>,
        forwarder: Option<tokio::task::JoinHandle<()>>,
    ) -> Self {
        Self {
            receiver,
            forwarder,
        }
    }

    /// Receives the next event; `None` means the stream is gone.
    pub async fn recv(&mut self) -> Option<DaemonEvent> {
        self.receiver.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
    }
}

/// Trait abstracting the daemon operations the engine consumes.
///
/// One method per capability: version/info/ping, container listing and
/// inspection, swarm services/networks/nodes/tasks, container kill, and the
/// event subscription. All calls go through this trait, enabling the whole
/// engine to run against `MockDaemonClient` in tests.
pub trait DaemonClient: Send + Sync + 'static {
    /// Queries the server version.
    fn version(&self) -> impl Future<Output = Result<DaemonVersion, EngineError>> + Send;

    /// Queries daemon-wide info.
    fn info(&self) -> impl Future<Output = Result<DaemonInfo, EngineError>> + Send;

    /// Checks daemon liveness.
    fn ping(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Lists containers. With `all` set, stopped containers are included.
    fn list_containers(
        &self,
        all: bool,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>, EngineError>> + Send;

    /// Inspects one container.
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` when the container does not exist,
    /// `EngineError::Api` otherwise.
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerDetails, EngineError>> + Send;

    /// Lists swarm services.
    fn list_services(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceDetails>, EngineError>> + Send;

    /// Inspects one network.
    fn network_info(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<NetworkDetails, EngineError>> + Send;

    /// Inspects one swarm node.
    fn inspect_node(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<NodeDetails, EngineError>> + Send;

    /// Lists the tasks backing one swarm service.
    fn list_tasks(
        &self,
        service: &str,
    ) -> impl Future<Output = Result<Vec<TaskDetails>, EngineError>> + Send;

    /// Sends a signal to a container.
    fn kill_container(
        &self,
        id: &str,
        signal: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Opens an event subscription.
    ///
    /// Subscription failures surface as an immediately closed stream; the
    /// event loop treats that like any other connection loss.
    fn subscribe_events(&self) -> EventSubscription;
}

/// Trait abstracting client construction.
///
/// The event loop discards its client when the daemon connection breaks and
/// asks the connector for a fresh one after the reconnect backoff.
pub trait DaemonConnector: Send + Sync + 'static {
    type Client: DaemonClient;

    /// Builds a new client.
    fn connect(&self) -> impl Future<Output = Result<Self::Client, EngineError>> + Send;
}

/// Production connector carrying the resolved endpoint and TLS material.
#[derive(Debug, Clone)]
pub struct BollardConnector {
    endpoint: Endpoint,
    tls: Option<TlsSettings>,
}

impl BollardConnector {
    pub fn new(endpoint: Endpoint, tls: Option<TlsSettings>) -> Self {
        Self { endpoint, tls }
    }

    /// The endpoint this connector dials.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl DaemonConnector for BollardConnector {
    type Client = BollardClient;

    async fn connect(&self) -> Result<BollardClient, EngineError> {
        let docker = match &self.endpoint {
            Endpoint::Unix(path) => bollard::Docker::connect_with_socket(
                path,
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            Endpoint::Tcp(addr) => match &self.tls {
                Some(tls) => bollard::Docker::connect_with_ssl(
                    &format!("https://{addr}"),
                    &tls.key,
                    &tls.cert,
                    &tls.ca_cert,
                    CONNECT_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                ),
                None => bollard::Docker::connect_with_http(
                    &format!("http://{addr}"),
                    CONNECT_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                ),
            },
        }
        .map_err(|e| {
            EngineError::Connection(format!("failed to connect to {}: {e}", self.endpoint))
        })?;

        Ok(BollardClient {
            docker: Arc::new(docker),
        })
    }
}

/// Production daemon client over `bollard`.
pub struct BollardClient {
    docker: Arc<bollard::Docker>,
}

impl DaemonClient for BollardClient {
    async fn version(&self) -> Result<DaemonVersion, EngineError> {
        let version = self
            .docker
            .version()
            .await
            .map_err(|e| EngineError::Api(format!("version query failed: {e}")))?;
        Ok(DaemonVersion {
            version: version.version.unwrap_or_default(),
            api_version: version.api_version.unwrap_or_default(),
        })
    }

    async fn info(&self) -> Result<DaemonInfo, EngineError> {
        let info = self
            .docker
            .info()
            .await
            .map_err(|e| EngineError::Api(format!("info query failed: {e}")))?;
        Ok(DaemonInfo {
            name: info.name.unwrap_or_default(),
            containers: info.containers.unwrap_or_default(),
            images: info.images.unwrap_or_default(),
            os_type: info.os_type.unwrap_or_default(),
            architecture: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map_err(|e| EngineError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EngineError::Api(format!("list containers failed: {e}")))?;

        Ok(containers
            .into_iter()
            .map(|container| ContainerSummary {
                id: container.id.unwrap_or_default(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, EngineError> {
        use bollard::container::InspectContainerOptions;

        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| {
                if e.to_string().contains("404") {
                    EngineError::NotFound(format!("container {id}"))
                } else {
                    EngineError::Api(format!("inspect container failed: {e}"))
                }
            })?;

        let config = response.config.unwrap_or_default();
        let settings = response.network_settings.unwrap_or_default();

        let mut ports = Vec::new();
        for (spec, bindings) in settings.ports.unwrap_or_default() {
            let (port, proto) = match spec.split_once('/') {
                Some((port, proto)) => (port.to_owned(), proto.to_owned()),
                None => (spec.clone(), "tcp".to_owned()),
            };
            let first = bindings.unwrap_or_default().into_iter().next();
            ports.push(PortMapping {
                port,
                proto,
                host_ip: first.as_ref().and_then(|b| b.host_ip.clone()),
                host_port: first.and_then(|b| b.host_port),
            });
        }

        let networks = settings
            .networks
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| {
                (
                    name,
                    EndpointDetails {
                        ip: endpoint.ip_address.unwrap_or_default(),
                        gateway: endpoint.gateway.unwrap_or_default(),
                        endpoint_id: endpoint.endpoint_id.unwrap_or_default(),
                        ipv6_gateway: endpoint.ipv6_gateway.unwrap_or_default(),
                        global_ipv6_address: endpoint.global_ipv6_address.unwrap_or_default(),
                        mac_address: endpoint.mac_address.unwrap_or_default(),
                        global_ipv6_prefix_len: endpoint.global_ipv6_prefix_len.unwrap_or_default(),
                        ip_prefix_len: endpoint.ip_prefix_len.unwrap_or_default(),
                    },
                )
            })
            .collect();

        let mounts = response
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|mount| MountDetails {
                name: mount.name.unwrap_or_default(),
                source: mount.source.unwrap_or_default(),
                destination: mount.destination.unwrap_or_default(),
                driver: mount.driver.unwrap_or_default(),
                mode: mount.mode.unwrap_or_default(),
                rw: mount.rw.unwrap_or_default(),
            })
            .collect();

        Ok(ContainerDetails {
            id: response.id.unwrap_or_default(),
            name: response.name.unwrap_or_default(),
            hostname: config.hostname.unwrap_or_default(),
            image: config.image.unwrap_or_default(),
            running: response.state.and_then(|s| s.running).unwrap_or_default(),
            env: config.env.unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
            gateway: settings.gateway.unwrap_or_default(),
            ip: settings.ip_address.unwrap_or_default(),
            ip6_link_local: settings.link_local_ipv6_address.unwrap_or_default(),
            ip6_global: settings.global_ipv6_address.unwrap_or_default(),
            ports,
            networks,
            mounts,
            // The engine API never embeds a node; swarm-mode nodes are
            // resolved through labels by the context builder.
            node: None,
        })
    }

    async fn list_services(&self) -> Result<Vec<ServiceDetails>, EngineError> {
        use bollard::service::ListServicesOptions;

        let services = self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await
            .map_err(|e| EngineError::Api(format!("list services failed: {e}")))?;

        Ok(services
            .into_iter()
            .map(|service| {
                let spec = service.spec.unwrap_or_default();
                ServiceDetails {
                    id: service.id.unwrap_or_default(),
                    name: spec.name.unwrap_or_default(),
                    labels: spec.labels.unwrap_or_default(),
                    virtual_ips: service
                        .endpoint
                        .and_then(|endpoint| endpoint.virtual_ips)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|vip| VirtualIp {
                            network_id: vip.network_id.unwrap_or_default(),
                            addr: vip.addr.unwrap_or_default(),
                        })
                        .collect(),
                }
            })
            .collect())
    }

    async fn network_info(&self, id: &str) -> Result<NetworkDetails, EngineError> {
        use bollard::network::InspectNetworkOptions;

        let network = self
            .docker
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|e| {
                if e.to_string().contains("404") {
                    EngineError::NotFound(format!("network {id}"))
                } else {
                    EngineError::Api(format!("inspect network failed: {e}"))
                }
            })?;

        Ok(NetworkDetails {
            name: network.name.unwrap_or_default(),
            scope: network.scope.unwrap_or_default(),
            driver: network.driver.unwrap_or_default(),
        })
    }

    async fn inspect_node(&self, id: &str) -> Result<NodeDetails, EngineError> {
        let node = self.docker.inspect_node(id).await.map_err(|e| {
            if e.to_string().contains("404") {
                EngineError::NotFound(format!("node {id}"))
            } else {
                EngineError::Api(format!("inspect node failed: {e}"))
            }
        })?;

        Ok(NodeDetails {
            id: node.id.unwrap_or_default(),
            name: node
                .spec
                .and_then(|spec| spec.name)
                .unwrap_or_default(),
            addr: node
                .status
                .and_then(|status| status.addr)
                .unwrap_or_default(),
        })
    }

    async fn list_tasks(&self, service: &str) -> Result<Vec<TaskDetails>, EngineError> {
        use bollard::task::ListTasksOptions;

        let mut filters = HashMap::new();
        filters.insert("service".to_owned(), vec![service.to_owned()]);

        let tasks = self
            .docker
            .list_tasks(Some(ListTasksOptions { filters }))
            .await
            .map_err(|e| EngineError::Api(format!("list tasks failed: {e}")))?;

        Ok(tasks
            .into_iter()
            .map(|task| {
                let status = task.status.unwrap_or_default();
                TaskDetails {
                    id: task.id.unwrap_or_default(),
                    state: status
                        .state
                        .map(|state| state.to_string())
                        .unwrap_or_default(),
                    container_id: status
                        .container_status
                        .and_then(|container| container.container_id),
                }
            })
            .collect())
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<(), EngineError> {
        use bollard::container::KillContainerOptions;

        self.docker
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await
            .map_err(|e| EngineError::Api(format!("kill container {id} failed: {e}")))
    }

    fn subscribe_events(&self) -> EventSubscription {
        use bollard::system::EventsOptions;
        use futures_util::StreamExt;

        let docker = Arc::clone(&self.docker);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let forwarder = tokio::spawn(async move {
            let mut stream = docker.events(None::<EventsOptions<String>>);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(message) => {
                        let typ = message
                            .typ
                            .map(|t| t.to_string())
                            .unwrap_or_default();
                        let action = message.action.unwrap_or_default();
                        let event = DaemonEvent {
                            kind: DaemonEventKind::from_parts(&typ, &action),
                            actor_id: message
                                .actor
                                .and_then(|actor| actor.id)
                                .unwrap_or_default(),
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "docker event stream error");
                        return;
                    }
                }
            }
        });
        EventSubscription::new(rx, Some(forwarder))
    }
}

/// 테스트용 Mock 데몬 클라이언트
///
/// 설정 가능한 응답을 반환하여 Docker 없이도 엔진 전체를 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDaemonClient {
    pub containers: Vec<ContainerDetails>,
    pub services: Vec<ServiceDetails>,
    pub networks: HashMap<String, NetworkDetails>,
    pub nodes: HashMap<String, NodeDetails>,
    pub tasks: HashMap<String, Vec<TaskDetails>>,
    pub info: DaemonInfo,
    pub version: DaemonVersion,
    pub fail_list: bool,
    pub fail_info: bool,
    pub fail_network_info: bool,
    /// Container ids whose inspect calls fail
    pub fail_inspect: Vec<String>,
    pub fail_ping: Arc<std::sync::atomic::AtomicBool>,
    /// `(container id, signal)` pairs observed by `kill_container`
    pub kills: Arc<std::sync::Mutex<Vec<(String, String)>>>,
    /// Event stream handed out by `subscribe_events`
    pub events: std::sync::Mutex<Option<mpsc::Receiver<DaemonEvent>>>,
}

#[cfg(test)]
impl MockDaemonClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(mut self, containers: Vec<ContainerDetails>) -> Self {
        self.containers = containers;
        self
    }

    pub fn with_services(mut self, services: Vec<ServiceDetails>) -> Self {
        self.services = services;
        self
    }

    pub fn with_network(mut self, id: impl Into<String>, network: NetworkDetails) -> Self {
        self.networks.insert(id.into(), network);
        self
    }

    pub fn with_node(mut self, id: impl Into<String>, node: NodeDetails) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn with_tasks(mut self, service: impl Into<String>, tasks: Vec<TaskDetails>) -> Self {
        self.tasks.insert(service.into(), tasks);
        self
    }

    pub fn with_event_stream(self, rx: mpsc::Receiver<DaemonEvent>) -> Self {
        *self.events.lock().expect("mock lock") = Some(rx);
        self
    }

    pub fn with_kill_log(mut self, log: Arc<std::sync::Mutex<Vec<(String, String)>>>) -> Self {
        self.kills = log;
        self
    }

    pub fn with_failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn with_failing_network_info(mut self) -> Self {
        self.fail_network_info = true;
        self
    }

    pub fn with_failing_inspect(mut self, id: impl Into<String>) -> Self {
        self.fail_inspect.push(id.into());
        self
    }
}

#[cfg(test)]
impl DaemonClient for MockDaemonClient {
    async fn version(&self) -> Result<DaemonVersion, EngineError> {
        Ok(self.version.clone())
    }

    async fn info(&self) -> Result<DaemonInfo, EngineError> {
        if self.fail_info {
            return Err(EngineError::Api("mock info failure".to_owned()));
        }
        Ok(self.info.clone())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        if self.fail_ping.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(EngineError::Connection("mock ping failure".to_owned()));
        }
        Ok(())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        if self.fail_list {
            return Err(EngineError::Api("mock list failure".to_owned()));
        }
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.running)
            .map(|c| ContainerSummary { id: c.id.clone() })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, EngineError> {
        if self.fail_inspect.iter().any(|failing| failing == id) {
            return Err(EngineError::Api("mock inspect failure".to_owned()));
        }
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("container {id}")))
    }

    async fn list_services(&self) -> Result<Vec<ServiceDetails>, EngineError> {
        Ok(self.services.clone())
    }

    async fn network_info(&self, id: &str) -> Result<NetworkDetails, EngineError> {
        if self.fail_network_info {
            return Err(EngineError::Api("mock network inspect failure".to_owned()));
        }
        self.networks
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("network {id}")))
    }

    async fn inspect_node(&self, id: &str) -> Result<NodeDetails, EngineError> {
        self.nodes
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("node {id}")))
    }

    async fn list_tasks(&self, service: &str) -> Result<Vec<TaskDetails>, EngineError> {
        Ok(self.tasks.get(service).cloned().unwrap_or_default())
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<(), EngineError> {
        self.kills
            .lock()
            .expect("mock lock")
            .push((id.to_owned(), signal.to_owned()));
        Ok(())
    }

    fn subscribe_events(&self) -> EventSubscription {
        let rx = self.events.lock().expect("mock lock").take();
        match rx {
            Some(rx) => EventSubscription::new(rx, None),
            None => {
                // No stream configured: hand out an already-closed channel.
                let (tx, rx) = mpsc::channel(1);
                drop(tx);
                EventSubscription::new(rx, None)
            }
        }
    }
}

/// 테스트용 Mock 커넥터 -- 준비된 클라이언트를 순서대로 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockConnector {
    clients: std::sync::Mutex<std::collections::VecDeque<MockDaemonClient>>,
    pub connects: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockConnector {
    pub fn new(clients: Vec<MockDaemonClient>) -> Self {
        Self {
            clients: std::sync::Mutex::new(clients.into()),
            connects: Arc::default(),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl DaemonConnector for MockConnector {
    type Client = MockDaemonClient;

    async fn connect(&self) -> Result<MockDaemonClient, EngineError> {
        self.connects
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.clients
            .lock()
            .expect("mock lock")
            .pop_front()
            .ok_or_else(|| EngineError::Connection("no more mock clients".to_owned()))
    }
}
