//! Backends define the collaborators the allocator consumes.
//!
//! Each concern is a narrow trait so the allocator can run against Kubernetes and
//! Docker in production and against in-memory fakes when embedded or tested.
mod configmap;
mod docker;
mod machines;
mod memory;

pub use configmap::ConfigMapStore;
pub use docker::DockerRuntime;
pub use machines::{KubeMachineDirectory, DOCKER_MACHINE_GROUP, DOCKER_MACHINE_KIND};
pub use memory::{MemoryStore, StaticMachineDirectory, StaticNetwork};

use anyhow::Result;
use async_trait::async_trait;

use crate::ipam::AllocationTable;

/// Namespaced persistence for allocation tables.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Read the table of `namespace`, empty when none exists yet.
    async fn get_table(&self, namespace: &str) -> Result<AllocationTable>;
    /// Create the table with `update`, or overwrite the keys of `update` in the existing table.
    async fn upsert_table(&self, namespace: &str, update: &AllocationTable) -> Result<()>;
}

/// Directory of the machines currently registered in a namespace.
#[async_trait]
pub trait MachineDirectory: Send + Sync {
    /// Names of the live machines in `namespace`.
    async fn list_machine_names(&self, namespace: &str) -> Result<Vec<String>>;
}

/// Container runtime view of a network.
#[async_trait]
pub trait NetworkRuntime: Send + Sync {
    /// CIDR of the named network.
    async fn network_cidr(&self, network: &str) -> Result<String>;
    /// Addresses reported by the containers attached to the network.
    async fn live_addresses(&self, network: &str) -> Result<Vec<String>>;
}
