use std::{
    collections::{BTreeSet, HashMap},
    sync::Mutex,
};

use anyhow::Result;
use async_trait::async_trait;

use super::{AllocationStore, MachineDirectory, NetworkRuntime};
use crate::ipam::AllocationTable;

/// Allocation tables kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: tokio::sync::Mutex<HashMap<String, AllocationTable>>,
}

#[async_trait]
impl AllocationStore for MemoryStore {
    async fn get_table(&self, namespace: &str) -> Result<AllocationTable> {
        Ok(self
            .tables
            .lock()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_table(&self, namespace: &str, update: &AllocationTable) -> Result<()> {
        self.tables
            .lock()
            .await
            .entry(namespace.to_owned())
            .or_default()
            .merge(update);
        Ok(())
    }
}

/// Machine directory backed by an explicit registry.
#[derive(Debug, Default)]
pub struct StaticMachineDirectory {
    machines: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl StaticMachineDirectory {
    /// Register `name` as live in `namespace`.
    pub fn register(&self, namespace: &str, name: &str) {
        self.machines
            .lock()
            .expect("should be able to acquire lock")
            .entry(namespace.to_owned())
            .or_default()
            .insert(name.to_owned());
    }

    /// Remove `name` from `namespace`, reporting whether it was registered.
    pub fn deregister(&self, namespace: &str, name: &str) -> bool {
        self.machines
            .lock()
            .expect("should be able to acquire lock")
            .get_mut(namespace)
            .map(|names| names.remove(name))
            .unwrap_or_default()
    }
}

#[async_trait]
impl MachineDirectory for StaticMachineDirectory {
    async fn list_machine_names(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .machines
            .lock()
            .expect("should be able to acquire lock")
            .get(namespace)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// A single network with a fixed CIDR, answering for any network name.
#[derive(Debug)]
pub struct StaticNetwork {
    cidr: String,
    live: Mutex<Vec<String>>,
}

impl StaticNetwork {
    /// Network with `cidr` and no attached containers.
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            live: Mutex::new(Vec::new()),
        }
    }

    /// Report `address` as used by a running container.
    pub fn attach(&self, address: impl Into<String>) {
        self.live
            .lock()
            .expect("should be able to acquire lock")
            .push(address.into());
    }

    /// Stop reporting `address`.
    pub fn detach(&self, address: &str) {
        self.live
            .lock()
            .expect("should be able to acquire lock")
            .retain(|live| live != address);
    }
}

#[async_trait]
impl NetworkRuntime for StaticNetwork {
    async fn network_cidr(&self, _network: &str) -> Result<String> {
        Ok(self.cidr.clone())
    }

    async fn live_addresses(&self, _network: &str) -> Result<Vec<String>> {
        Ok(self
            .live
            .lock()
            .expect("should be able to acquire lock")
            .clone())
    }
}
