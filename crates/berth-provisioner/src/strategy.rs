//! Choice of provisioning path for one call.

use crate::config::ProvisionerConfig;

/// Why the provisioner is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningMode {
    /// A container is being created and needs addresses.
    Allocate,
    /// An existing container is re-verified, e.g. after a host reboot.
    Maintain,
}

/// Provisioning path, fixed when a call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Allocate a static address and install rules and routes.
    StaticAllocate,
    /// Re-fetch the allocated address and reinstall rules and routes.
    StaticMaintain,
    /// Ask the control plane for prepared interfaces, falling back to the
    /// configured defaults.
    Prepared,
    /// Nothing to do.
    Disabled,
}

impl Strategy {
    /// Strategy for `mode` under `config`.
    #[must_use]
    pub fn select(mode: ProvisioningMode, config: &ProvisionerConfig) -> Self {
        match (config.address_allocation_enabled(), mode) {
            (true, ProvisioningMode::Allocate) => Self::StaticAllocate,
            (true, ProvisioningMode::Maintain) => Self::StaticMaintain,
            (false, ProvisioningMode::Allocate) => Self::Prepared,
            (false, ProvisioningMode::Maintain) => Self::Disabled,
        }
    }
}
