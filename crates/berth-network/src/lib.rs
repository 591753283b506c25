//! # berth-network
//!
//! Host networking primitives for addressable Berth containers.
//!
//! This crate reads what the host already has (resolver configuration and
//! the primary interface) and installs the iptables rules and routes that
//! make container addresses reachable.

#![warn(missing_docs)]

pub mod address;
pub mod command;
pub mod discover;
pub mod install;
pub mod interface;
pub mod resolv;
pub mod rules;

pub use address::{AddressScope, NetworkAddress};
pub use command::{CommandOutput, CommandRunner, ExitPolicy, HostCommand, SystemRunner, apply};
pub use discover::{
    HostInterface, InterfaceSource, PrimaryInterface, SystemInterfaces, discover_primary_interface,
};
pub use install::{NatPolicy, default_intra_network_subnet, ensure_rule, setup_routes_and_iptables};
pub use interface::{ConfigType, InterfaceConfig, fallback_interfaces, interface_name};
pub use resolv::{ResolverConfig, parse_resolver_config, read_resolver_config};
pub use rules::{IptablesRule, RuleData};
