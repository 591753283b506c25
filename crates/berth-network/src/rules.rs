//! Catalogue of iptables rules and routes for addressable containers.

use crate::command::HostCommand;

/// Addressing data a rule is rendered from, built per container interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleData {
    /// Primary host interface, usually `eth0`.
    pub host_if: String,
    /// Address of the primary host interface.
    pub host_ip: String,
    /// Bridge the container is attached to, usually `lxcbr0` or `virbr0`.
    pub host_bridge: String,
    /// Container address.
    pub container_ip: String,
    /// Subnet of the container address.
    pub container_cidr: String,
    /// Subnet exempted from SNAT by the skip-SNAT rule.
    pub subnet_cidr: String,
}

/// Match expression of a catalogued rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleMatch {
    Snat,
    ForwardOut,
    ForwardIn,
    SkipSnat,
}

/// An iptables rule: table, chain and a match over [`RuleData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IptablesRule {
    /// Short name used in logs.
    pub name: &'static str,
    /// iptables table.
    pub table: &'static str,
    /// Chain inside the table.
    pub chain: &'static str,
    matcher: RuleMatch,
}

/// Egress NAT: traffic leaving through the host interface appears to come
/// from the host address.
pub const SNAT_RULE: IptablesRule = IptablesRule {
    name: "snat",
    table: "nat",
    chain: "POSTROUTING",
    matcher: RuleMatch::Snat,
};

/// Accepts traffic towards the container subnet, ahead of any DROP rules
/// the hypervisor puts on the bridge.
pub const FORWARD_OUT_RULE: IptablesRule = IptablesRule {
    name: "forward-out",
    table: "filter",
    chain: "FORWARD",
    matcher: RuleMatch::ForwardOut,
};

/// Accepts traffic coming from the container subnet.
pub const FORWARD_IN_RULE: IptablesRule = IptablesRule {
    name: "forward-in",
    table: "filter",
    chain: "FORWARD",
    matcher: RuleMatch::ForwardIn,
};

/// Sits above [`SNAT_RULE`] and keeps the container source address for
/// traffic that stays inside the provider network.
pub const SKIP_SNAT_RULE: IptablesRule = IptablesRule {
    name: "skip-snat",
    table: "nat",
    chain: "POSTROUTING",
    matcher: RuleMatch::SkipSnat,
};

/// Rules installed for every container interface, in installation order.
pub const INTERFACE_RULES: [IptablesRule; 3] = [SNAT_RULE, FORWARD_OUT_RULE, FORWARD_IN_RULE];

impl IptablesRule {
    /// Whether this is the egress NAT rule, which is skipped when NAT is off.
    #[must_use]
    pub fn is_nat(&self) -> bool {
        self.matcher == RuleMatch::Snat
    }

    /// The rule specification for `data`.
    #[must_use]
    pub fn rule_args(&self, data: &RuleData) -> Vec<String> {
        let args: [&str; 6] = match self.matcher {
            RuleMatch::Snat => [
                "-o",
                data.host_if.as_str(),
                "-j",
                "SNAT",
                "--to-source",
                data.host_ip.as_str(),
            ],
            RuleMatch::ForwardOut => [
                "-d",
                data.container_cidr.as_str(),
                "-o",
                data.host_bridge.as_str(),
                "-j",
                "ACCEPT",
            ],
            RuleMatch::ForwardIn => [
                "-s",
                data.container_cidr.as_str(),
                "-i",
                data.host_bridge.as_str(),
                "-j",
                "ACCEPT",
            ],
            RuleMatch::SkipSnat => [
                "-d",
                data.subnet_cidr.as_str(),
                "-o",
                data.host_if.as_str(),
                "-j",
                "RETURN",
            ],
        };
        args.iter().map(ToString::to_string).collect()
    }

    /// `iptables -C`: exits 0 when the rule exists and 1 when it does not.
    #[must_use]
    pub fn check_command(&self, data: &RuleData) -> HostCommand {
        HostCommand::new("iptables")
            .args(["-t", self.table, "-C", self.chain])
            .args(self.rule_args(data))
    }

    /// `iptables -I <chain> 1`: inserts at the top so the rule precedes any
    /// REJECT or DROP rules already in the chain.
    #[must_use]
    pub fn insert_command(&self, data: &RuleData) -> HostCommand {
        HostCommand::new("iptables")
            .args(["-t", self.table, "-I", self.chain, "1"])
            .args(self.rule_args(data))
    }
}

/// Static route for the container address through the host bridge.
#[must_use]
pub fn route_add_command(data: &RuleData) -> HostCommand {
    HostCommand::new("ip").args([
        "route",
        "add",
        data.container_ip.as_str(),
        "dev",
        data.host_bridge.as_str(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> RuleData {
        RuleData {
            host_if: "ethA".to_string(),
            host_ip: "10.0.0.5".to_string(),
            host_bridge: "brX".to_string(),
            container_ip: "10.0.0.9".to_string(),
            container_cidr: "10.0.0.0/24".to_string(),
            subnet_cidr: "10.0.0.0/16".to_string(),
        }
    }

    #[test]
    fn snat_commands() {
        let data = data();
        assert_eq!(
            SNAT_RULE.check_command(&data).to_string(),
            "iptables -t nat -C POSTROUTING -o ethA -j SNAT --to-source 10.0.0.5"
        );
        assert_eq!(
            SNAT_RULE.insert_command(&data).to_string(),
            "iptables -t nat -I POSTROUTING 1 -o ethA -j SNAT --to-source 10.0.0.5"
        );
    }

    #[test]
    fn forward_commands() {
        let data = data();
        assert_eq!(
            FORWARD_OUT_RULE.check_command(&data).to_string(),
            "iptables -t filter -C FORWARD -d 10.0.0.0/24 -o brX -j ACCEPT"
        );
        assert_eq!(
            FORWARD_IN_RULE.insert_command(&data).to_string(),
            "iptables -t filter -I FORWARD 1 -s 10.0.0.0/24 -i brX -j ACCEPT"
        );
    }

    #[test]
    fn skip_snat_and_route_commands() {
        let data = data();
        assert_eq!(
            SKIP_SNAT_RULE.check_command(&data).to_string(),
            "iptables -t nat -C POSTROUTING -d 10.0.0.0/16 -o ethA -j RETURN"
        );
        assert_eq!(
            route_add_command(&data).to_string(),
            "ip route add 10.0.0.9 dev brX"
        );
    }

    #[test]
    fn only_snat_is_nat() {
        assert!(SNAT_RULE.is_nat());
        assert!(!SKIP_SNAT_RULE.is_nat());
        assert_eq!(INTERFACE_RULES.iter().filter(|r| r.is_nat()).count(), 1);
    }
}
