//! Provisioner configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use berth_common::{BerthError, BerthPaths, BerthResult, Namespace};
use berth_network::{InterfaceConfig, NatPolicy, fallback_interfaces};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Bridge containers attach to unless configured otherwise.
pub const DEFAULT_BRIDGE: &str = "lxcbr0";

/// Provider that registers container devices itself; static address
/// allocation never applies to it.
pub const MAAS_PROVIDER: &str = "maas";

/// Settings for one provisioner instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Bridge device container interfaces are attached to.
    pub bridge_device: String,
    /// Install SNAT rules for container egress.
    pub enable_nat: bool,
    /// Address allocation feature flag.
    pub address_allocation: bool,
    /// Cloud provider type, e.g. `ec2` or `maas`.
    pub provider_type: String,
    /// Host resolver configuration.
    pub resolv_conf: PathBuf,
    /// Subnets exempt from SNAT; derived from the host address when empty.
    pub intra_network_subnets: Vec<String>,
    /// Prefix of instance ids handed out by this provisioner.
    pub instance_namespace: String,
    /// Interfaces used when the control plane cannot prepare any.
    pub fallback_interfaces: Vec<InterfaceConfig>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            bridge_device: DEFAULT_BRIDGE.to_string(),
            enable_nat: false,
            address_allocation: false,
            provider_type: String::new(),
            resolv_conf: BerthPaths::default().resolv_conf,
            intra_network_subnets: Vec::new(),
            instance_namespace: "berth".to_string(),
            fallback_interfaces: fallback_interfaces(DEFAULT_BRIDGE),
        }
    }
}

impl ProvisionerConfig {
    /// Parse from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::Config`] if the text is not a valid configuration.
    pub fn from_toml(content: &str) -> BerthResult<Self> {
        toml::from_str(content).map_err(|e| BerthError::Config {
            message: format!("Failed to parse TOML: {e}"),
        })
    }

    /// Load from a TOML file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::Io`] if the file cannot be read and
    /// [`BerthError::Config`] if it cannot be parsed.
    pub fn load(path: &Path) -> BerthResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No provisioner configuration, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Whether containers get statically allocated addresses.
    #[must_use]
    pub fn address_allocation_enabled(&self) -> bool {
        self.address_allocation && self.provider_type != MAAS_PROVIDER
    }

    /// NAT settings for the rule installer.
    #[must_use]
    pub fn nat_policy(&self) -> NatPolicy {
        NatPolicy {
            enabled: self.enable_nat,
            intra_network_subnets: self.intra_network_subnets.clone(),
        }
    }

    /// Instance-id namespace.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.instance_namespace.clone())
    }
}

/// Configuration shared between the agent and in-flight provisioning calls.
///
/// Readers take a [`snapshot`](Self::snapshot); a call never observes a
/// configuration that changes half way through.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<Mutex<ProvisionerConfig>>,
}

impl SharedConfig {
    /// Share `config`.
    #[must_use]
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    /// Copy of the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> ProvisionerConfig {
        self.inner.lock().clone()
    }

    /// Mutate the configuration under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut ProvisionerConfig) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}
