//! Network addresses handed to containers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Reachability scope of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressScope {
    /// Scope could not be derived (e.g. a hostname).
    #[default]
    Unknown,
    /// Reachable from the internet.
    Public,
    /// Reachable only inside the provider's private network.
    CloudLocal,
    /// Reachable only from the machine itself.
    MachineLocal,
    /// Link-local address.
    LinkLocal,
}

/// An IP or CIDR value together with its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    value: String,
    scope: AddressScope,
}

impl NetworkAddress {
    /// Create an address, deriving the scope from the value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let scope = derive_scope(&value);
        Self { value, scope }
    }

    /// The textual value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The address scope.
    #[must_use]
    pub const fn scope(&self) -> AddressScope {
        self.scope
    }

    /// The IP part of the value, if it is an IP or CIDR.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        parse_ip_or_cidr(&self.value)
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Parse a bare IP, or the IP part of a CIDR.
pub(crate) fn parse_ip_or_cidr(value: &str) -> Option<IpAddr> {
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<IpNetwork>().ok().map(|net| net.ip()))
}

fn derive_scope(value: &str) -> AddressScope {
    match parse_ip_or_cidr(value) {
        Some(IpAddr::V4(ip)) => v4_scope(ip),
        Some(IpAddr::V6(ip)) => v6_scope(ip),
        None => AddressScope::Unknown,
    }
}

fn v4_scope(ip: Ipv4Addr) -> AddressScope {
    if ip.is_loopback() {
        AddressScope::MachineLocal
    } else if ip.is_link_local() {
        AddressScope::LinkLocal
    } else if ip.is_private() {
        AddressScope::CloudLocal
    } else {
        AddressScope::Public
    }
}

fn v6_scope(ip: Ipv6Addr) -> AddressScope {
    let first = ip.segments()[0];
    if ip.is_loopback() {
        AddressScope::MachineLocal
    } else if first & 0xffc0 == 0xfe80 {
        AddressScope::LinkLocal
    } else if first & 0xfe00 == 0xfc00 {
        AddressScope::CloudLocal
    } else {
        AddressScope::Public
    }
}
