//! Provides types and functions shared by the capd-ipam binaries.
#![deny(missing_docs)]
#[cfg(feature = "telemetry")]
pub mod telemetry;
