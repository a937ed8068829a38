//! Ipam hands out IPv4 addresses on a shared Docker network.
//!
//! Allocation decisions are recorded in a per namespace [`AllocationTable`] and
//! checked against the addresses containers currently report on the network.
mod address;
mod allocator;
mod table;

pub use address::{is_reserved, next_address, parse_cidr, parse_live_address, seed_address};
pub use allocator::{plan_claim, Allocator, Claim, ClaimKind};
pub use table::{AllocationTable, AVAILABLE, CIDR_KEY, LAST_CLAIMED_KEY};

use ipnet::Ipv4Net;

/// Errors produced by the allocator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The machine name can not be stored in the table.
    #[error("invalid machine name {name:?}")]
    InvalidMachineName {
        /// Rejected name
        name: String,
    },
    /// Reading or writing the allocation table failed.
    #[error("allocation table error: {source}")]
    Store {
        /// Underlying store error
        source: anyhow::Error,
    },
    /// Listing the live machines failed.
    #[error("machine directory error: {source}")]
    Directory {
        /// Underlying directory error
        source: anyhow::Error,
    },
    /// The container runtime could not describe the network.
    #[error("network {network} unavailable: {source}")]
    Network {
        /// Name of the network
        network: String,
        /// Underlying runtime error
        source: anyhow::Error,
    },
    /// The network reported a CIDR that is not a usable IPv4 range.
    #[error("invalid CIDR {cidr:?}: {reason}")]
    InvalidCidr {
        /// CIDR as reported
        cidr: String,
        /// Why it was rejected
        reason: String,
    },
    /// Incrementing walked off the end of the network.
    #[error("overflowed CIDR {cidr} while incrementing IP")]
    AddressSpaceExhausted {
        /// Exhausted range
        cidr: Ipv4Net,
    },
}

/// Result type for allocator operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
