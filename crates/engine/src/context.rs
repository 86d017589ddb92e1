//! Context building -- assembling the runtime snapshot per regeneration
//!
//! [`ContextBuilder`] owns the daemon queries behind one regeneration: it
//! refreshes the ambient info and services (both non-fatal on failure),
//! lists containers (fatal for this trigger), inspects each one (per-item
//! failures skip that container), and assembles the [`Context`] handed to
//! the renderer.

use std::sync::Arc;

use tracing::warn;

use topogen_core::context::{
    short_id, split_key_value_slice, Address, ContainerState, Context, DockerImage, Mount,
    Network, RuntimeContainer, Service, ServiceNetwork, Services, SwarmNode, Volume,
};

use crate::docker::{ContainerDetails, DaemonClient};
use crate::error::EngineError;
use crate::state::DaemonState;

/// Label carrying the swarm node id on swarm-mode containers.
const SWARM_NODE_ID_LABEL: &str = "com.docker.swarm.node.id";
/// Label carrying the swarm service id on swarm-mode containers.
const SWARM_SERVICE_ID_LABEL: &str = "com.docker.swarm.service.id";

/// Builds fresh [`Context`] snapshots from a daemon client.
pub struct ContextBuilder<D: DaemonClient> {
    client: Arc<D>,
    /// Include stopped containers in listings
    all: bool,
    state: Arc<DaemonState>,
}

impl<D: DaemonClient> ContextBuilder<D> {
    pub fn new(client: Arc<D>, all: bool, state: Arc<DaemonState>) -> Self {
        Self { client, all, state }
    }

    /// Builds a context snapshot.
    ///
    /// Info and services refreshes are logged but never fatal (a stale
    /// services map keeps being used); a failed container listing aborts
    /// this trigger.
    pub async fn build(&self) -> Result<Context, EngineError> {
        match self.client.info().await {
            Ok(info) => self.state.set_info(info),
            Err(e) => warn!(error = %e, "error retrieving docker server info"),
        }

        match self.refresh_services().await {
            Ok(services) => self.state.set_services(services),
            Err(e) => warn!(error = %e, "error retrieving docker services"),
        }

        let services = self.state.services();
        let summaries = self.client.list_containers(self.all).await?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let details = match self.client.inspect_container(&summary.id).await {
                Ok(details) => details,
                Err(e) => {
                    warn!(
                        container = short_id(&summary.id),
                        error = %e,
                        "error inspecting container, skipping"
                    );
                    continue;
                }
            };
            containers.push(self.assemble(details, &services).await);
        }

        Ok(Context {
            containers,
            info: self.state.info(),
            services: services.as_ref().clone(),
        })
    }

    /// Rebuilds the swarm services map.
    ///
    /// Every virtual IP is resolved against a network inspection; a single
    /// inspection failure fails the whole refresh so the caller keeps the
    /// previous map.
    pub async fn refresh_services(&self) -> Result<Services, EngineError> {
        let listed = self.client.list_services().await?;

        let mut services = Services::with_capacity(listed.len());
        for entry in listed {
            let mut service = Service {
                id: entry.id,
                name: entry.name,
                labels: entry.labels,
                networks: Vec::with_capacity(entry.virtual_ips.len()),
            };
            for vip in entry.virtual_ips {
                let network = self.client.network_info(&vip.network_id).await.map_err(|e| {
                    EngineError::Api(format!(
                        "error inspecting swarm service vip network {}: {e}",
                        short_id(&vip.network_id)
                    ))
                })?;
                let ip = vip.addr.split('/').next().unwrap_or_default();
                service.networks.push(ServiceNetwork {
                    ip: ip.to_owned(),
                    name: network.name,
                    scope: network.scope,
                    driver: network.driver,
                });
            }
            services.insert(service.id.clone(), Arc::new(service));
        }
        Ok(services)
    }

    async fn assemble(&self, details: ContainerDetails, services: &Services) -> RuntimeContainer {
        let addresses = details
            .ports
            .iter()
            .map(|mapping| Address {
                ip: details.ip.clone(),
                ip6_link_local: details.ip6_link_local.clone(),
                ip6_global: details.ip6_global.clone(),
                port: mapping.port.clone(),
                proto: mapping.proto.clone(),
                host_ip: mapping.host_ip.clone(),
                host_port: mapping.host_port.clone(),
            })
            .collect();

        let networks = details
            .networks
            .into_iter()
            .map(|(name, endpoint)| Network {
                name,
                ip: endpoint.ip,
                gateway: endpoint.gateway,
                endpoint_id: endpoint.endpoint_id,
                ipv6_gateway: endpoint.ipv6_gateway,
                global_ipv6_address: endpoint.global_ipv6_address,
                mac_address: endpoint.mac_address,
                global_ipv6_prefix_len: endpoint.global_ipv6_prefix_len,
                ip_prefix_len: endpoint.ip_prefix_len,
            })
            .collect();

        let volumes = details
            .mounts
            .iter()
            .map(|mount| {
                (
                    mount.destination.clone(),
                    Volume {
                        path: mount.destination.clone(),
                        host_path: mount.source.clone(),
                        read_write: mount.rw,
                    },
                )
            })
            .collect();

        let mounts = details
            .mounts
            .into_iter()
            .map(|mount| Mount {
                name: mount.name,
                source: mount.source,
                destination: mount.destination,
                driver: mount.driver,
                mode: mount.mode,
                rw: mount.rw,
            })
            .collect();

        let mut container = RuntimeContainer {
            id: details.id,
            name: details.name.trim_start_matches('/').to_owned(),
            hostname: details.hostname,
            image: DockerImage::parse(&details.image),
            state: ContainerState {
                running: details.running,
            },
            gateway: details.gateway,
            ip: details.ip,
            ip6_link_local: details.ip6_link_local,
            ip6_global: details.ip6_global,
            addresses,
            networks,
            volumes,
            mounts,
            env: split_key_value_slice(&details.env),
            labels: details.labels,
            node: SwarmNode::default(),
            service: None,
        };

        if let Some(node) = details.node {
            container.node = SwarmNode {
                id: node.id,
                name: node.name,
                address: Address {
                    ip: node.addr,
                    ..Default::default()
                },
            };
        } else if let Some(node_id) = container.labels.get(SWARM_NODE_ID_LABEL) {
            match self.client.inspect_node(node_id).await {
                Ok(node) => {
                    container.node = SwarmNode {
                        id: node.id,
                        name: node.name,
                        address: Address {
                            ip: node.addr,
                            ..Default::default()
                        },
                    };
                }
                Err(e) => {
                    warn!(node = short_id(node_id), error = %e, "error inspecting swarm node");
                }
            }
        }

        if let Some(service_id) = container.labels.get(SWARM_SERVICE_ID_LABEL) {
            match services.get(service_id) {
                Some(service) => container.service = Some(Arc::clone(service)),
                None => warn!(
                    container = short_id(&container.id),
                    service = short_id(service_id),
                    "container belongs to a non-existent service"
                ),
            }
        }

        container
    }
}
