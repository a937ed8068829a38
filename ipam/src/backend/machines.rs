use anyhow::{Context as _, Result};
use async_trait::async_trait;
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind, ListParams},
    client::Client,
    Api, ResourceExt,
};

use super::MachineDirectory;

/// API group of the Docker infrastructure provider.
pub const DOCKER_MACHINE_GROUP: &str = "infrastructure.cluster.x-k8s.io";
/// Kind of the machine resources backed by containers.
pub const DOCKER_MACHINE_KIND: &str = "DockerMachine";
const DOCKER_MACHINE_PLURAL: &str = "dockermachines";

/// Lists DockerMachine resources through the Kubernetes API.
///
/// Only names are read, so the objects are fetched untyped.
#[derive(Clone)]
pub struct KubeMachineDirectory {
    client: Client,
    resource: ApiResource,
}

impl KubeMachineDirectory {
    /// Directory over DockerMachines served at `version`.
    pub fn new(client: Client, version: &str) -> Self {
        let gvk = GroupVersionKind::gvk(DOCKER_MACHINE_GROUP, version, DOCKER_MACHINE_KIND);
        Self {
            client,
            resource: ApiResource::from_gvk_with_plural(&gvk, DOCKER_MACHINE_PLURAL),
        }
    }
}

#[async_trait]
impl MachineDirectory for KubeMachineDirectory {
    async fn list_machine_names(&self, namespace: &str) -> Result<Vec<String>> {
        let machines: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &self.resource);
        let list = machines
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list {DOCKER_MACHINE_PLURAL} in {namespace}"))?;
        Ok(list.items.iter().map(|machine| machine.name_any()).collect())
    }
}
