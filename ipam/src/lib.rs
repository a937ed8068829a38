//! Provides IP address management for machine containers attached to a shared Docker network.
#![warn(missing_docs)]

/// Backends for the allocation table, machine directory and container runtime.
pub mod backend;
/// Config module for allocator settings.
pub mod config;
/// Ipam module with the allocator itself.
pub mod ipam;
/// Labels module for managing resource labels.
pub(crate) mod labels;
/// Utils module for shared utility functions.
pub mod utils;

/// Name used to mark resources written by the allocator.
const CONTROLLER_NAME: &str = "capd-ipam";
