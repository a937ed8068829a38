use std::{collections::HashSet, net::Ipv4Addr};

use ipnet::Ipv4Net;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    address::{is_reserved, next_address, parse_cidr, parse_live_address, seed_address},
    table::{AllocationTable, AVAILABLE},
    Error, Result,
};
use crate::{
    backend::{AllocationStore, MachineDirectory, NetworkRuntime},
    config::IpamConfig,
    utils::retry,
};

/// How a claim was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// The machine keeps the address it already held.
    Existing,
    /// A released address was handed to the machine.
    Reclaimed,
    /// A new address past the last claimed one.
    Fresh,
}

/// An address chosen for a machine together with the table update recording it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Chosen address
    pub ip: Ipv4Addr,
    /// Which pool the address came from
    pub kind: ClaimKind,
    /// Keys to write to the allocation table
    pub update: AllocationTable,
}

/// Choose the address for `machine` without touching any backend.
///
/// In order of precedence the machine gets
/// 1. the address already bound to it,
/// 2. the lowest released address,
/// 3. the next valid address after the last claimed one.
///
/// The first two are only used while no live container reports the address.
/// A machine moved off its previous address releases that address in the same update.
pub fn plan_claim(
    table: &AllocationTable,
    cidr: &Ipv4Net,
    seed_offset: u32,
    machine: &str,
    live: &HashSet<Ipv4Addr>,
) -> Result<Claim> {
    let usable = |ip: &Ipv4Addr| cidr.contains(ip) && !live.contains(ip);

    let previous = table.claim_for(machine);
    let (ip, kind) = if let Some(ip) = previous.filter(usable) {
        (ip, ClaimKind::Existing)
    } else if let Some(ip) = table.available().into_iter().find(usable) {
        (ip, ClaimKind::Reclaimed)
    } else {
        (
            next_free_address(table, cidr, seed_offset, live)?,
            ClaimKind::Fresh,
        )
    };

    let mut update = AllocationTable::default();
    update.set_cidr(cidr);
    update.bind(ip, machine);
    if kind == ClaimKind::Fresh {
        update.set_last_claimed(ip);
    }
    if let Some(previous) = previous.filter(|previous| *previous != ip) {
        update.release(previous);
    }
    Ok(Claim { ip, kind, update })
}

fn next_free_address(
    table: &AllocationTable,
    cidr: &Ipv4Net,
    seed_offset: u32,
    live: &HashSet<Ipv4Addr>,
) -> Result<Ipv4Addr> {
    // A seed left over from a different network is ignored
    let mut candidate = match table.last_claimed() {
        Some(last) if cidr.contains(&last) => last,
        _ => seed_address(cidr, seed_offset)?,
    };
    loop {
        candidate = next_address(candidate, cidr)?;
        if !is_reserved(candidate)
            && !live.contains(&candidate)
            && !table.contains_address(candidate)
        {
            return Ok(candidate);
        }
    }
}

/// Hands out addresses on one Docker network.
///
/// Every claim runs under a single lock, across all namespaces, so no two callers
/// can pick the same next address before either has persisted it.
pub struct Allocator<S, D, R> {
    store: S,
    machines: D,
    runtime: R,
    config: IpamConfig,
    // Held for the whole of a claim, memoizes the network CIDR once resolved.
    latch: Mutex<Option<Ipv4Net>>,
}

impl<S, D, R> Allocator<S, D, R>
where
    S: AllocationStore,
    D: MachineDirectory,
    R: NetworkRuntime,
{
    /// Create an allocator over the given backends.
    pub fn new(store: S, machines: D, runtime: R, config: IpamConfig) -> Self {
        Self {
            store,
            machines,
            runtime,
            config,
            latch: Mutex::new(None),
        }
    }

    /// Store holding the allocation tables.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Directory consulted during discovery.
    pub fn machines(&self) -> &D {
        &self.machines
    }

    /// Runtime describing the network.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Settings the allocator runs with.
    pub fn config(&self) -> &IpamConfig {
        &self.config
    }

    /// Claim an address for `machine_name` in `namespace`.
    ///
    /// Released addresses are discovered first on a best effort basis,
    /// then the address is chosen with [`plan_claim`] and persisted.
    #[instrument(skip(self), err)]
    pub async fn claim_ip(&self, namespace: &str, machine_name: &str) -> Result<Ipv4Addr> {
        if machine_name.is_empty() || machine_name == AVAILABLE {
            return Err(Error::InvalidMachineName {
                name: machine_name.to_owned(),
            });
        }
        let mut latch = self.latch.lock().await;

        if let Err(err) = self.discover(namespace).await {
            warn!(%err, "ip discovery failed, continuing with recorded allocations");
        }
        let cidr = self.resolve_cidr(&mut latch).await?;
        let table = self
            .store
            .get_table(namespace)
            .await
            .map_err(|source| Error::Store { source })?;
        let live = self.live_addresses().await?;

        let claim = plan_claim(
            &table,
            &cidr,
            self.config.seed_offset,
            machine_name,
            &live,
        )?;
        debug!(ip = %claim.ip, kind = ?claim.kind, "selected address");
        self.persist(namespace, &claim.update).await?;
        info!(ip = %claim.ip, kind = ?claim.kind, "claimed address");
        Ok(claim.ip)
    }

    /// Release the addresses of machines that no longer exist in `namespace`.
    ///
    /// Returns the entries that were flipped to [`AVAILABLE`].
    #[instrument(skip(self), err)]
    pub async fn reclaim(&self, namespace: &str) -> Result<AllocationTable> {
        let _latch = self.latch.lock().await;
        self.discover(namespace).await
    }

    /// The persisted allocation table of `namespace`.
    pub async fn table(&self, namespace: &str) -> Result<AllocationTable> {
        self.store
            .get_table(namespace)
            .await
            .map_err(|source| Error::Store { source })
    }

    /// CIDR of the network, resolved on first use.
    pub async fn cidr(&self) -> Result<Ipv4Net> {
        let mut latch = self.latch.lock().await;
        self.resolve_cidr(&mut latch).await
    }

    async fn discover(&self, namespace: &str) -> Result<AllocationTable> {
        let table = self
            .store
            .get_table(namespace)
            .await
            .map_err(|source| Error::Store { source })?;
        if table.is_empty() {
            return Ok(AllocationTable::default());
        }
        let machines = self
            .machines
            .list_machine_names(namespace)
            .await
            .map_err(|source| Error::Directory { source })?;
        let live: HashSet<&str> = machines.iter().map(String::as_str).collect();

        let released = table.released_entries(&live);
        if !released.is_empty() {
            self.store
                .upsert_table(namespace, &released)
                .await
                .map_err(|source| Error::Store { source })?;
            debug!(released = released.len(), "marked released addresses available");
        }
        Ok(released)
    }

    async fn resolve_cidr(&self, memo: &mut Option<Ipv4Net>) -> Result<Ipv4Net> {
        if let Some(cidr) = *memo {
            return Ok(cidr);
        }
        let network = &self.config.network_name;
        let reported = self
            .runtime
            .network_cidr(network)
            .await
            .map_err(|source| Error::Network {
                network: network.clone(),
                source,
            })?;
        let cidr = parse_cidr(&reported)?;
        debug!(%cidr, network = %network, "resolved network cidr");
        *memo = Some(cidr);
        Ok(cidr)
    }

    async fn live_addresses(&self) -> Result<HashSet<Ipv4Addr>> {
        let network = &self.config.network_name;
        let reported = self
            .runtime
            .live_addresses(network)
            .await
            .map_err(|source| Error::Network {
                network: network.clone(),
                source,
            })?;
        Ok(reported
            .iter()
            .filter_map(|raw| parse_live_address(raw))
            .collect())
    }

    async fn persist(&self, namespace: &str, update: &AllocationTable) -> Result<()> {
        retry(
            &self.config.retry_policy(),
            "persist allocation table",
            || self.store.upsert_table(namespace, update),
        )
        .await
        .map_err(|source| Error::Store { source })
    }
}
