//! # berth-provisioner
//!
//! Static address provisioning for addressable containers.
//!
//! [`ContainerNetworkProvisioner`] asks the control plane for container
//! addresses, fills in host DNS and gateway settings, and installs the
//! host rules and routes through `berth-network`.

#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod provisioner;
pub mod strategy;

pub use api::ContainerNetworkApi;
pub use config::{ProvisionerConfig, SharedConfig};
pub use provisioner::ContainerNetworkProvisioner;
pub use strategy::{ProvisioningMode, Strategy};
