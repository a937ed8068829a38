use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use bollard::{models::Network, network::InspectNetworkOptions, Docker};
use ipnet::Ipv4Net;

use super::NetworkRuntime;

/// Docker Engine view of a network, reached through the local socket.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect with the defaults honoured by the docker CLI, e.g. `DOCKER_HOST`.
    pub fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("failed to connect to docker")?;
        Ok(Self { docker })
    }

    async fn inspect(&self, network: &str) -> Result<Network> {
        self.docker
            .inspect_network(network, None::<InspectNetworkOptions<String>>)
            .await
            .with_context(|| format!("failed to inspect network {network}"))
    }
}

#[async_trait]
impl NetworkRuntime for DockerRuntime {
    async fn network_cidr(&self, network: &str) -> Result<String> {
        ipv4_subnet(&self.inspect(network).await?)
            .ok_or_else(|| anyhow!("network {network} has no IPv4 subnet"))
    }

    async fn live_addresses(&self, network: &str) -> Result<Vec<String>> {
        Ok(container_addresses(&self.inspect(network).await?))
    }
}

// Docker lists the IPv6 subnet next to the IPv4 one on dual stack networks.
fn ipv4_subnet(network: &Network) -> Option<String> {
    network
        .ipam
        .as_ref()?
        .config
        .as_ref()?
        .iter()
        .filter_map(|config| config.subnet.as_deref())
        .find(|subnet| subnet.parse::<Ipv4Net>().is_ok())
        .map(str::to_owned)
}

fn container_addresses(network: &Network) -> Vec<String> {
    network
        .containers
        .iter()
        .flatten()
        .filter_map(|(_, container)| container.ipv4_address.clone())
        .filter(|address| !address.is_empty())
        .collect()
}
