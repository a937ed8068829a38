use anyhow::{Context as _, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::PostParams, client::Client, core::ObjectMeta, Api};
use tracing::trace;

use super::AllocationStore;
use crate::{ipam::AllocationTable, labels::managed_labels};

/// Allocation tables stored as the data of one ConfigMap per namespace.
///
/// Updates are read-modify-write with the fetched resource version,
/// so a concurrent writer surfaces as a conflict error for the caller to retry.
#[derive(Clone)]
pub struct ConfigMapStore {
    client: Client,
    name: String,
}

impl ConfigMapStore {
    /// Store tables in ConfigMaps called `name`.
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl AllocationStore for ConfigMapStore {
    async fn get_table(&self, namespace: &str) -> Result<AllocationTable> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let data = config_maps
            .get_opt(&self.name)
            .await
            .with_context(|| format!("failed to retrieve {}", self.name))?
            .and_then(|config_map| config_map.data)
            .unwrap_or_default();
        Ok(data.into())
    }

    async fn upsert_table(&self, namespace: &str, update: &AllocationTable) -> Result<()> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match config_maps
            .get_opt(&self.name)
            .await
            .with_context(|| format!("failed to retrieve {}", self.name))?
        {
            Some(mut config_map) => {
                let mut table: AllocationTable = config_map.data.take().unwrap_or_default().into();
                table.merge(update);
                config_map.data = Some(table.into_inner());
                trace!(namespace, name = %self.name, "replacing allocation table");
                config_maps
                    .replace(&self.name, &PostParams::default(), &config_map)
                    .await
                    .with_context(|| format!("failed to update {}", self.name))?;
            }
            None => {
                let config_map = ConfigMap {
                    metadata: ObjectMeta {
                        name: Some(self.name.clone()),
                        namespace: Some(namespace.to_owned()),
                        labels: managed_labels(),
                        ..ObjectMeta::default()
                    },
                    data: Some(update.clone().into_inner()),
                    ..Default::default()
                };
                trace!(namespace, name = %self.name, "creating allocation table");
                // A racing creator makes this fail with AlreadyExists, the retry then merges
                config_maps
                    .create(&PostParams::default(), &config_map)
                    .await
                    .with_context(|| format!("failed to create {}", self.name))?;
            }
        }
        Ok(())
    }
}
