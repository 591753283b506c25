//! Per-container interface configuration.

use serde::{Deserialize, Serialize};

use crate::address::NetworkAddress;

/// How the container configures an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// Not specified by the control plane.
    #[default]
    Unknown,
    /// Address obtained with DHCP (used by the fallback configuration).
    Dhcp,
    /// Address assigned statically by the provisioner.
    Static,
    /// Interface left for the workload to configure.
    Manual,
}

/// Network configuration of one container interface.
///
/// Returned by the control plane and completed by the provisioner. A fresh
/// list is built for every provisioning call and handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Position of the interface inside the container, starting at 0.
    pub device_index: usize,
    /// Hardware address, when the provider assigns one.
    pub mac_address: Option<String>,
    /// CIDR of the subnet the address belongs to.
    pub cidr: String,
    /// Provider-side identifier of the interface.
    pub provider_id: Option<String>,
    /// Interface name inside the container, e.g. `eth0`.
    pub interface_name: String,
    /// Host device the interface is attached to, e.g. `lxcbr0`.
    pub parent_interface_name: String,
    /// How the interface is configured.
    pub config_type: ConfigType,
    /// Address of the interface.
    pub address: Option<NetworkAddress>,
    /// DNS servers for the interface.
    pub dns_servers: Vec<NetworkAddress>,
    /// DNS search domains for the interface.
    pub dns_search_domains: Vec<String>,
    /// Default gateway.
    pub gateway_address: Option<NetworkAddress>,
    /// Link MTU, when not the default.
    pub mtu: Option<u32>,
    /// Interface is administratively disabled.
    pub disabled: bool,
    /// Interface is not brought up at boot.
    pub no_auto_start: bool,
}

impl InterfaceConfig {
    /// The container IP of this interface, without any prefix length.
    #[must_use]
    pub fn container_ip(&self) -> Option<String> {
        self.address
            .as_ref()
            .filter(|addr| !addr.value().is_empty())
            .map(|addr| {
                addr.ip()
                    .map_or_else(|| addr.value().to_string(), |ip| ip.to_string())
            })
    }
}

/// Interface name for the given device index (`eth0`, `eth1`, ...).
#[must_use]
pub fn interface_name(device_index: usize) -> String {
    format!("eth{device_index}")
}

/// Default configuration used when the control plane cannot prepare one:
/// a single DHCP interface attached to `bridge`.
#[must_use]
pub fn fallback_interfaces(bridge: &str) -> Vec<InterfaceConfig> {
    vec![InterfaceConfig {
        device_index: 0,
        interface_name: interface_name(0),
        parent_interface_name: bridge.to_string(),
        config_type: ConfigType::Dhcp,
        ..InterfaceConfig::default()
    }]
}
