use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::{Error, Result};

/// Parse the CIDR reported by the container runtime.
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Net> {
    let trimmed = cidr.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidCidr {
            cidr: cidr.to_owned(),
            reason: "network reported no CIDR".to_owned(),
        });
    }
    trimmed.parse().map_err(|err: ipnet::AddrParseError| Error::InvalidCidr {
        cidr: cidr.to_owned(),
        reason: err.to_string(),
    })
}

/// Parse an address reported by a container, e.g. `172.18.0.3/16`.
pub fn parse_live_address(raw: &str) -> Option<Ipv4Addr> {
    raw.split('/').next()?.trim().parse().ok()
}

/// The address following `ip`, failing once it leaves `cidr`.
pub fn next_address(ip: Ipv4Addr, cidr: &Ipv4Net) -> Result<Ipv4Addr> {
    u32::from(ip)
        .checked_add(1)
        .map(Ipv4Addr::from)
        .filter(|next| cidr.contains(next))
        .ok_or(Error::AddressSpaceExhausted { cidr: *cidr })
}

/// The address `offset` steps past the network address of `cidr`.
pub fn seed_address(cidr: &Ipv4Net, offset: u32) -> Result<Ipv4Addr> {
    u32::from(cidr.network())
        .checked_add(offset)
        .map(Ipv4Addr::from)
        .filter(|seed| cidr.contains(seed))
        .ok_or(Error::AddressSpaceExhausted { cidr: *cidr })
}

/// Addresses ending in `.0` or `.1` are left for the network and its gateway.
pub fn is_reserved(ip: Ipv4Addr) -> bool {
    matches!(ip.octets()[3], 0 | 1)
}
