//! Primary host interface discovery.
//!
//! The primary interface anchors the NAT rules and serves as the gateway
//! of every container interface. It is the first non-loopback interface
//! that is up and has at least one address.

use std::net::{IpAddr, Ipv4Addr};

use berth_common::{BerthError, BerthResult};
use ipnetwork::IpNetwork;
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;

use crate::address::{NetworkAddress, parse_ip_or_cidr};

/// A host network interface as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInterface {
    /// Interface name, e.g. `eth0`.
    pub name: String,
    /// Interface is administratively up.
    pub up: bool,
    /// Interface is a loopback device.
    pub loopback: bool,
}

/// Source of host interface information.
pub trait InterfaceSource {
    /// Enumerate all host interfaces in kernel order.
    ///
    /// # Errors
    ///
    /// Returns an error if the interface list cannot be obtained.
    fn interfaces(&self) -> BerthResult<Vec<HostInterface>>;

    /// Addresses bound to `iface`, as bare IPs or `ip/prefix` strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the address list cannot be obtained.
    fn addresses(&self, iface: &HostInterface) -> BerthResult<Vec<String>>;
}

/// The interface container traffic is routed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryInterface {
    /// Interface name.
    pub name: String,
    /// First address of the interface, without prefix length.
    pub address: NetworkAddress,
}

/// Find the primary interface among those reported by `source`.
///
/// # Errors
///
/// Returns [`BerthError::Discovery`] if enumeration or an address query
/// fails, or an address cannot be parsed, and
/// [`BerthError::NoPrimaryInterface`] if no interface qualifies.
pub fn discover_primary_interface(source: &dyn InterfaceSource) -> BerthResult<PrimaryInterface> {
    let interfaces = source
        .interfaces()
        .map_err(|e| with_context(e, "cannot get network interfaces"))?;

    tracing::trace!("Trying to discover primary network interface");
    for iface in &interfaces {
        if iface.loopback {
            tracing::trace!(interface = %iface.name, "Not using loopback interface");
            continue;
        }
        if !iface.up {
            continue;
        }

        tracing::trace!(interface = %iface.name, "Verifying interface has addresses");
        let addrs = source
            .addresses(iface)
            .map_err(|e| with_context(e, &format!("cannot get {:?} addresses", iface.name)))?;
        let Some(first) = addrs.first() else {
            continue;
        };

        let ip = parse_ip_or_cidr(first).ok_or_else(|| BerthError::Discovery {
            message: format!("cannot parse address {first:?}"),
        })?;
        let address = NetworkAddress::new(ip.to_string());
        tracing::trace!(
            interface = %iface.name,
            address = %address,
            "Found primary network interface"
        );
        return Ok(PrimaryInterface {
            name: iface.name.clone(),
            address,
        });
    }

    Err(BerthError::NoPrimaryInterface)
}

/// Discovery errors pass through as reported; anything else becomes one.
fn with_context(err: BerthError, context: &str) -> BerthError {
    match err {
        BerthError::Discovery { .. } => err,
        other => BerthError::Discovery {
            message: format!("{context}: {other}"),
        },
    }
}

/// Interfaces of the running host, read with `getifaddrs(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> BerthResult<Vec<HostInterface>> {
        let entries = getifaddrs().map_err(|e| BerthError::Discovery {
            message: format!("cannot get network interfaces: getifaddrs failed: {e}"),
        })?;

        let mut interfaces: Vec<HostInterface> = Vec::new();
        for entry in entries {
            if interfaces.iter().any(|i| i.name == entry.interface_name) {
                continue;
            }
            interfaces.push(HostInterface {
                up: entry.flags.contains(InterfaceFlags::IFF_UP),
                loopback: entry.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                name: entry.interface_name,
            });
        }
        Ok(interfaces)
    }

    fn addresses(&self, iface: &HostInterface) -> BerthResult<Vec<String>> {
        let entries = getifaddrs().map_err(|e| BerthError::Discovery {
            message: format!("cannot get {:?} addresses: getifaddrs failed: {e}", iface.name),
        })?;

        let addresses = entries
            .filter(|entry| entry.interface_name == iface.name)
            .filter_map(|entry| {
                let address = entry.address.as_ref()?;
                let netmask = entry.netmask.as_ref();
                if let Some(sin) = address.as_sockaddr_in() {
                    let prefix = netmask
                        .and_then(|m| m.as_sockaddr_in())
                        .map_or(32, |m| u32::from(Ipv4Addr::from(m.ip())).count_ones());
                    Some(format_cidr(IpAddr::V4(Ipv4Addr::from(sin.ip())), prefix))
                } else if let Some(sin6) = address.as_sockaddr_in6() {
                    let prefix = netmask
                        .and_then(|m| m.as_sockaddr_in6())
                        .map_or(128, |m| u128::from(m.ip()).count_ones());
                    Some(format_cidr(IpAddr::V6(sin6.ip()), prefix))
                } else {
                    None
                }
            })
            .collect();
        Ok(addresses)
    }
}

fn format_cidr(ip: IpAddr, prefix: u32) -> String {
    u8::try_from(prefix)
        .ok()
        .and_then(|prefix| IpNetwork::new(ip, prefix).ok())
        .map_or_else(|| ip.to_string(), |net| net.to_string())
}
