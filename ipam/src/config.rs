//! Settings shared by the allocator and its backends.
use std::{num::ParseIntError, time::Duration};

use clap::Args;

use crate::utils::RetryPolicy;

/// Docker network that kind and the machine containers attach to.
pub const DEFAULT_NETWORK: &str = "kind";
/// Name of the ConfigMap holding the allocation table in each namespace.
pub const DEFAULT_CONFIG_MAP_NAME: &str = "ipam-config";
/// How far into the CIDR the first claim starts.
pub const DEFAULT_SEED_OFFSET: u32 = 520;
/// API version of the DockerMachine resources listed during discovery.
pub const DEFAULT_MACHINE_API_VERSION: &str = "v1alpha4";

/// Allocator settings, readable from flags or the environment.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct IpamConfig {
    /// Docker network that machine containers attach to.
    #[arg(
        long = "network",
        env = "CAPD_IPAM_NETWORK",
        default_value = DEFAULT_NETWORK,
        global = true
    )]
    pub network_name: String,

    /// Name of the ConfigMap storing the allocation table.
    #[arg(
        long = "config-map",
        env = "CAPD_IPAM_CONFIG_MAP",
        default_value = DEFAULT_CONFIG_MAP_NAME,
        global = true
    )]
    pub config_map_name: String,

    /// Number of addresses past the network address where fresh claims begin.
    #[arg(
        long,
        env = "CAPD_IPAM_SEED_OFFSET",
        default_value_t = DEFAULT_SEED_OFFSET,
        global = true
    )]
    pub seed_offset: u32,

    /// Seconds to wait between attempts to write the allocation table.
    #[arg(
        long = "retry-delay-secs",
        env = "CAPD_IPAM_RETRY_DELAY_SECS",
        value_parser = parse_secs,
        default_value = "2",
        global = true
    )]
    pub retry_delay: Duration,

    /// Attempts made to write the allocation table before giving up.
    #[arg(
        long,
        env = "CAPD_IPAM_RETRY_ATTEMPTS",
        default_value_t = 10,
        global = true
    )]
    pub retry_attempts: u32,

    /// API version of the DockerMachine resources.
    #[arg(
        long = "machine-version",
        env = "CAPD_IPAM_MACHINE_VERSION",
        default_value = DEFAULT_MACHINE_API_VERSION,
        global = true
    )]
    pub machine_api_version: String,
}

impl Default for IpamConfig {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK.to_owned(),
            config_map_name: DEFAULT_CONFIG_MAP_NAME.to_owned(),
            seed_offset: DEFAULT_SEED_OFFSET,
            retry_delay: Duration::from_secs(2),
            retry_attempts: 10,
            machine_api_version: DEFAULT_MACHINE_API_VERSION.to_owned(),
        }
    }
}

impl IpamConfig {
    /// Retry policy applied to every write of the allocation table.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: self.retry_delay,
        }
    }
}

fn parse_secs(value: &str) -> Result<Duration, ParseIntError> {
    Ok(Duration::from_secs(value.parse()?))
}
