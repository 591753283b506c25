//! Idempotent installation of container iptables rules and routes.
//!
//! Every rule is checked with `iptables -C` before it is inserted, so
//! repeated provisioning never duplicates a rule. The check and the insert
//! are not atomic; a concurrent writer can still race us into a duplicate.

use std::net::IpAddr;

use berth_common::{BerthError, BerthResult};
use ipnetwork::IpNetwork;

use crate::command::{CommandRunner, ExitPolicy, apply};
use crate::discover::PrimaryInterface;
use crate::interface::InterfaceConfig;
use crate::rules::{INTERFACE_RULES, IptablesRule, RuleData, SKIP_SNAT_RULE, route_add_command};

/// Prefix applied to the host address when no intra-network subnet is configured.
pub const DEFAULT_INTRA_NETWORK_PREFIX_V4: u8 = 16;

/// IPv6 counterpart of [`DEFAULT_INTRA_NETWORK_PREFIX_V4`].
pub const DEFAULT_INTRA_NETWORK_PREFIX_V6: u8 = 48;

/// `ip route add` exit code for a route that already exists.
const ROUTE_EXISTS: i32 = 2;

/// Egress NAT settings for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NatPolicy {
    /// Install the SNAT and skip-SNAT rules.
    pub enabled: bool,
    /// Subnets whose traffic keeps the container source address. Empty
    /// means "derive one from the host address".
    pub intra_network_subnets: Vec<String>,
}

impl NatPolicy {
    /// NAT switched off: only forwarding rules and routes are installed.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// NAT switched on with the given intra-network subnets.
    #[must_use]
    pub fn enabled(intra_network_subnets: Vec<String>) -> Self {
        Self {
            enabled: true,
            intra_network_subnets,
        }
    }

    fn subnets_for(&self, host_ip: &str) -> BerthResult<Vec<String>> {
        if self.intra_network_subnets.is_empty() {
            Ok(vec![default_intra_network_subnet(host_ip)?])
        } else {
            Ok(self.intra_network_subnets.clone())
        }
    }
}

/// Subnet around `host_ip` assumed to be the provider's private network.
///
/// # Errors
///
/// Returns [`BerthError::InvalidArgument`] if `host_ip` is not an IP address.
pub fn default_intra_network_subnet(host_ip: &str) -> BerthResult<String> {
    let ip: IpAddr = host_ip.parse().map_err(|_| BerthError::InvalidArgument {
        message: format!("host address {host_ip:?} is not an IP address"),
    })?;
    let prefix = match ip {
        IpAddr::V4(_) => DEFAULT_INTRA_NETWORK_PREFIX_V4,
        IpAddr::V6(_) => DEFAULT_INTRA_NETWORK_PREFIX_V6,
    };
    let net = IpNetwork::new(ip, prefix).map_err(|e| BerthError::InvalidArgument {
        message: e.to_string(),
    })?;
    Ok(format!("{}/{}", net.network(), net.prefix()))
}

/// Make sure `rule` exists for `data`, inserting it at the top of its chain
/// if it does not.
///
/// # Errors
///
/// Returns [`BerthError::UnexpectedRuleState`] when the existence check
/// exits with anything but 0 or 1, and command errors from the insert.
pub fn ensure_rule(
    runner: &dyn CommandRunner,
    rule: &IptablesRule,
    data: &RuleData,
) -> BerthResult<()> {
    let check = rule.check_command(data);
    match apply(runner, &check, ExitPolicy::AnyCode)? {
        0 => {
            tracing::trace!(rule = rule.name, "Rule already present");
        }
        1 => {
            apply(runner, &rule.insert_command(data), ExitPolicy::Success)?;
            tracing::debug!(
                rule = rule.name,
                table = rule.table,
                chain = rule.chain,
                "Rule inserted"
            );
        }
        code => {
            return Err(BerthError::UnexpectedRuleState {
                command: check.to_string(),
                code,
            });
        }
    }
    Ok(())
}

/// Install iptables rules and static routes for addressable container
/// interfaces.
///
/// Interfaces are handled one after the other; the first failure aborts
/// the call and rules installed so far are left in place.
///
/// # Errors
///
/// Returns [`BerthError::InvalidArgument`] for missing inputs and the first
/// rule or route error otherwise.
pub fn setup_routes_and_iptables(
    runner: &dyn CommandRunner,
    primary: &PrimaryInterface,
    bridge: &str,
    interfaces: &[InterfaceConfig],
    nat: &NatPolicy,
) -> BerthResult<()> {
    if primary.name.is_empty()
        || primary.address.value().is_empty()
        || bridge.is_empty()
        || interfaces.is_empty()
    {
        return Err(BerthError::InvalidArgument {
            message: "primary interface, primary address, bridge and interfaces must all be set"
                .to_string(),
        });
    }

    let subnets = if nat.enabled {
        nat.subnets_for(primary.address.value())?
    } else {
        Vec::new()
    };

    for iface in interfaces {
        let container_ip = iface.container_ip().ok_or_else(|| BerthError::InvalidArgument {
            message: format!("container address of {:?} must be set", iface.interface_name),
        })?;
        let container_cidr = if iface.cidr.is_empty() {
            format!("{container_ip}/32")
        } else {
            iface.cidr.clone()
        };
        let mut data = RuleData {
            host_if: primary.name.clone(),
            host_ip: primary.address.value().to_string(),
            host_bridge: bridge.to_string(),
            container_ip,
            subnet_cidr: container_cidr.clone(),
            container_cidr,
        };

        for rule in &INTERFACE_RULES {
            if rule.is_nat() && !nat.enabled {
                continue;
            }
            ensure_rule(runner, rule, &data)?;
        }

        for subnet in &subnets {
            data.subnet_cidr.clone_from(subnet);
            ensure_rule(runner, &SKIP_SNAT_RULE, &data)?;
        }

        let route = route_add_command(&data);
        match apply(runner, &route, ExitPolicy::AnyCode)? {
            0 => tracing::trace!(container_ip = %data.container_ip, "Route added"),
            ROUTE_EXISTS => {
                tracing::trace!(container_ip = %data.container_ip, "Route already exists");
            }
            code => {
                return Err(BerthError::CommandFailed {
                    command: route.to_string(),
                    code,
                });
            }
        }
    }

    tracing::info!(
        interfaces = interfaces.len(),
        bridge,
        "Successfully configured iptables and routes for container interfaces"
    );
    Ok(())
}
