use std::{
    collections::{BTreeMap, HashSet},
    net::Ipv4Addr,
};

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// Key holding the CIDR of the network.
pub const CIDR_KEY: &str = "CIDR";
/// Key holding the most recently claimed address.
pub const LAST_CLAIMED_KEY: &str = "LAST_CLAIMED_IP";
/// Value of an address that was released by its machine.
pub const AVAILABLE: &str = "AVAILABLE";

const LOAD_BALANCER_SUFFIX: &str = "-lb";

/// Flat key value document recording which machine holds which address.
///
/// Besides [`CIDR_KEY`] and [`LAST_CLAIMED_KEY`] every key is an IPv4 address
/// mapped to either a machine name or [`AVAILABLE`].
/// A table is also used as a partial update, only its keys are written.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct AllocationTable(BTreeMap<String, String>);

impl AllocationTable {
    /// Unwrap into the raw key value pairs.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Raw key value pairs.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// True when the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set `key` to `value`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overwrite the keys of `update`, never removing any.
    pub fn merge(&mut self, update: &AllocationTable) {
        self.0
            .extend(update.0.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Record the network CIDR.
    pub fn set_cidr(&mut self, cidr: &Ipv4Net) {
        self.insert(CIDR_KEY, cidr.to_string());
    }

    /// Record `ip` as the seed for the next fresh claim.
    pub fn set_last_claimed(&mut self, ip: Ipv4Addr) {
        self.insert(LAST_CLAIMED_KEY, ip.to_string());
    }

    /// Bind `ip` to `machine`.
    pub fn bind(&mut self, ip: Ipv4Addr, machine: &str) {
        self.insert(ip.to_string(), machine);
    }

    /// Mark `ip` as released.
    pub fn release(&mut self, ip: Ipv4Addr) {
        self.insert(ip.to_string(), AVAILABLE);
    }

    /// CIDR recorded by an earlier claim.
    pub fn cidr(&self) -> Option<&str> {
        self.get(CIDR_KEY)
    }

    /// Most recently claimed address, if it parses.
    pub fn last_claimed(&self) -> Option<Ipv4Addr> {
        self.get(LAST_CLAIMED_KEY)?.parse().ok()
    }

    /// Entries whose key is an address, in address order.
    pub fn addresses(&self) -> impl Iterator<Item = (Ipv4Addr, &str)> {
        let mut addresses: Vec<_> = self
            .0
            .iter()
            .filter_map(|(k, v)| Some((k.parse::<Ipv4Addr>().ok()?, v.as_str())))
            .collect();
        addresses.sort_unstable_by_key(|(ip, _)| *ip);
        addresses.into_iter()
    }

    /// True when `ip` has an entry, bound or released.
    pub fn contains_address(&self, ip: Ipv4Addr) -> bool {
        self.0.contains_key(&ip.to_string())
    }

    /// Address currently bound to `machine`.
    pub fn claim_for(&self, machine: &str) -> Option<Ipv4Addr> {
        self.addresses()
            .find(|(_, owner)| *owner == machine)
            .map(|(ip, _)| ip)
    }

    /// Released addresses, lowest first.
    pub fn available(&self) -> Vec<Ipv4Addr> {
        self.addresses()
            .filter(|(_, owner)| *owner == AVAILABLE)
            .map(|(ip, _)| ip)
            .collect()
    }

    /// Build the update that releases every address whose machine is not in `live_machines`.
    ///
    /// Load balancer reservations and already released addresses are left untouched.
    pub fn released_entries(&self, live_machines: &HashSet<&str>) -> AllocationTable {
        let mut update = AllocationTable::default();
        for (ip, owner) in self.addresses() {
            if owner == AVAILABLE
                || owner.ends_with(LOAD_BALANCER_SUFFIX)
                || live_machines.contains(owner)
            {
                continue;
            }
            update.release(ip);
        }
        update
    }
}

impl From<BTreeMap<String, String>> for AllocationTable {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

impl<K, V> FromIterator<(K, V)> for AllocationTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    fn table() -> AllocationTable {
        AllocationTable::from_iter([
            (CIDR_KEY, "10.0.0.0/16"),
            (LAST_CLAIMED_KEY, "10.0.1.12"),
            ("10.0.1.10", "alpha"),
            ("10.0.0.9", AVAILABLE),
            ("10.0.1.11", "cluster-lb"),
            ("10.0.1.12", "gone"),
            ("10.0.0.200", AVAILABLE),
            ("notes", "bravo"),
        ])
    }

    #[test]
    fn discovery_releases_only_dead_machines() {
        let live = HashSet::from(["alpha"]);
        expect![[r#"
            {
                "10.0.1.12": "AVAILABLE",
            }
        "#]]
        .assert_debug_eq(&table().released_entries(&live).into_inner());
    }

    #[test]
    fn discovery_without_live_machines_spares_load_balancers() {
        let released = table().released_entries(&HashSet::new());
        assert_eq!(released.get("10.0.1.10"), Some(AVAILABLE));
        assert_eq!(released.get("10.0.1.12"), Some(AVAILABLE));
        assert_eq!(released.get("10.0.1.11"), None);
        assert_eq!(released.get("notes"), None);
        assert_eq!(released.len(), 2);
    }

    #[test]
    fn available_is_in_address_order() {
        assert_eq!(
            table().available(),
            vec![Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 200)]
        );
    }

    #[test]
    fn lookups() {
        let table = table();
        assert_eq!(table.claim_for("alpha"), Some(Ipv4Addr::new(10, 0, 1, 10)));
        assert_eq!(table.claim_for("bravo"), None);
        assert_eq!(table.last_claimed(), Some(Ipv4Addr::new(10, 0, 1, 12)));
        assert_eq!(table.cidr(), Some("10.0.0.0/16"));
        assert!(table.contains_address(Ipv4Addr::new(10, 0, 0, 9)));
        assert!(!table.contains_address(Ipv4Addr::new(10, 0, 0, 8)));
    }

    #[test]
    fn merge_overwrites_without_removing() {
        let mut table = table();
        let mut update = AllocationTable::default();
        update.bind(Ipv4Addr::new(10, 0, 0, 9), "charlie");
        update.set_last_claimed(Ipv4Addr::new(10, 0, 0, 9));
        table.merge(&update);
        assert_eq!(table.get("10.0.0.9"), Some("charlie"));
        assert_eq!(table.get(LAST_CLAIMED_KEY), Some("10.0.0.9"));
        assert_eq!(table.get("10.0.1.10"), Some("alpha"));
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn serializes_as_flat_map() {
        let mut table = AllocationTable::default();
        table.bind(Ipv4Addr::new(10, 0, 0, 2), "alpha");
        assert_eq!(
            serde_json::to_string(&table).unwrap(),
            r#"{"10.0.0.2":"alpha"}"#
        );
    }
}
