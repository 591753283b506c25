//! Simulated host and control plane shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::rc::Rc;

use berth_common::{BerthError, BerthResult, MachineTag};
use berth_network::{
    CommandOutput, CommandRunner, HostCommand, HostInterface, InterfaceConfig, InterfaceSource,
    NetworkAddress,
};
use berth_provisioner::{ContainerNetworkProvisioner, ProvisionerConfig, SharedConfig};
use tempfile::NamedTempFile;

pub const RESOLV_CONF: &str = "\
nameserver 10.0.0.2
nameserver 10.0.0.3
search internal.example # provider
";

/// Kernel iptables and routing state, driven through `CommandRunner`.
#[derive(Clone, Default)]
pub struct SimulatedHost {
    state: Rc<RefCell<HostState>>,
}

#[derive(Default)]
struct HostState {
    rules: Vec<(String, String, Vec<String>)>,
    routes: BTreeSet<String>,
    log: Vec<String>,
}

impl SimulatedHost {
    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    pub fn commands(&self, prefix: &str) -> Vec<String> {
        self.log().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    pub fn rule_count(&self) -> usize {
        self.state.borrow().rules.len()
    }

    pub fn routes(&self) -> Vec<String> {
        self.state.borrow().routes.iter().cloned().collect()
    }
}

impl CommandRunner for SimulatedHost {
    fn run(&self, command: &HostCommand) -> io::Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.log.push(command.to_string());
        let args = command.arguments();
        let code = match (command.program(), args.get(2).map(String::as_str)) {
            ("iptables", Some("-C")) => {
                let present = state
                    .rules
                    .iter()
                    .any(|(t, c, r)| *t == args[1] && *c == args[3] && r.as_slice() == &args[4..]);
                i32::from(!present)
            }
            ("iptables", Some("-I")) => {
                let rule = (args[1].clone(), args[3].clone(), args[5..].to_vec());
                state.rules.push(rule);
                0
            }
            ("ip", _) => {
                if state.routes.insert(args[2].clone()) {
                    0
                } else {
                    2
                }
            }
            _ => return Err(io::Error::new(io::ErrorKind::NotFound, command.to_string())),
        };
        Ok(CommandOutput {
            code,
            ..CommandOutput::default()
        })
    }
}

/// Host with `lo` and one primary interface.
#[derive(Clone)]
pub struct HostInterfaces {
    pub name: String,
    pub address: String,
}

impl HostInterfaces {
    pub fn primary(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }

    pub fn none() -> Self {
        Self::primary("", "")
    }
}

impl InterfaceSource for HostInterfaces {
    fn interfaces(&self) -> BerthResult<Vec<HostInterface>> {
        let mut interfaces = vec![HostInterface {
            name: "lo".to_string(),
            up: true,
            loopback: true,
        }];
        if !self.name.is_empty() {
            interfaces.push(HostInterface {
                name: self.name.clone(),
                up: true,
                loopback: false,
            });
        }
        Ok(interfaces)
    }

    fn addresses(&self, iface: &HostInterface) -> BerthResult<Vec<String>> {
        Ok(if iface.loopback {
            vec!["127.0.0.1/8".to_string()]
        } else {
            vec![self.address.clone()]
        })
    }
}

/// Scripted control plane that records every call.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    pub prepared: Rc<RefCell<Option<BerthResult<Vec<InterfaceConfig>>>>>,
    pub allocated: Rc<RefCell<Option<BerthResult<Vec<InterfaceConfig>>>>>,
    pub release: Rc<RefCell<Option<BerthResult<()>>>>,
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl ScriptedApi {
    pub fn preparing(self, result: BerthResult<Vec<InterfaceConfig>>) -> Self {
        *self.prepared.borrow_mut() = Some(result);
        self
    }

    pub fn allocated(self, result: BerthResult<Vec<InterfaceConfig>>) -> Self {
        *self.allocated.borrow_mut() = Some(result);
        self
    }

    pub fn releasing(self, result: BerthResult<()>) -> Self {
        *self.release.borrow_mut() = Some(result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &str, tag: &MachineTag) {
        self.calls.borrow_mut().push(format!("{call} {tag}"));
    }
}

fn take<T>(slot: &RefCell<Option<BerthResult<T>>>, call: &str) -> BerthResult<T> {
    slot.borrow_mut()
        .take()
        .unwrap_or_else(|| Err(BerthError::api(format!("unexpected {call} call"))))
}

impl berth_provisioner::ContainerNetworkApi for ScriptedApi {
    fn prepare_interface_info(&self, tag: &MachineTag) -> BerthResult<Vec<InterfaceConfig>> {
        self.record("prepare", tag);
        take(&self.prepared, "prepare")
    }

    fn get_interface_info(&self, tag: &MachineTag) -> BerthResult<Vec<InterfaceConfig>> {
        self.record("get", tag);
        take(&self.allocated, "get")
    }

    fn release_addresses(&self, tag: &MachineTag) -> BerthResult<()> {
        self.record("release", tag);
        take(&self.release, "release")
    }
}

pub fn allocated_interface(address: &str, cidr: &str) -> InterfaceConfig {
    InterfaceConfig {
        device_index: 3,
        interface_name: "eth3".to_string(),
        address: Some(NetworkAddress::new(address)),
        cidr: cidr.to_string(),
        ..InterfaceConfig::default()
    }
}

pub fn resolv_conf(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

pub type TestProvisioner = ContainerNetworkProvisioner<ScriptedApi, SimulatedHost, HostInterfaces>;

pub fn provisioner(
    api: &ScriptedApi,
    host: &SimulatedHost,
    interfaces: HostInterfaces,
    config: ProvisionerConfig,
) -> TestProvisioner {
    ContainerNetworkProvisioner::new(
        api.clone(),
        host.clone(),
        interfaces,
        SharedConfig::new(config),
    )
}
