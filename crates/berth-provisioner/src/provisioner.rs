//! Container address orchestration.
//!
//! Ties host discovery, the control plane and the rule installer together
//! for one container at a time. Every call works from one configuration
//! snapshot and holds no state between calls.

use berth_common::{BerthError, BerthResult, ContainerId, MachineTag};
use berth_network::{
    CommandRunner, ConfigType, InterfaceConfig, InterfaceSource, discover_primary_interface,
    interface_name, read_resolver_config, setup_routes_and_iptables,
};

use crate::api::ContainerNetworkApi;
use crate::config::{ProvisionerConfig, SharedConfig};
use crate::strategy::{ProvisioningMode, Strategy};

/// Provisions addressable container networking on this host.
pub struct ContainerNetworkProvisioner<A, R, S> {
    api: A,
    runner: R,
    interfaces: S,
    config: SharedConfig,
}

impl<A, R, S> ContainerNetworkProvisioner<A, R, S>
where
    A: ContainerNetworkApi,
    R: CommandRunner,
    S: InterfaceSource,
{
    /// Create a provisioner talking to `api` and mutating the host through
    /// `runner`.
    pub fn new(api: A, runner: R, interfaces: S, config: SharedConfig) -> Self {
        Self {
            api,
            runner,
            interfaces,
            config,
        }
    }

    /// Shared configuration handle.
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Allocate a static address for a new container and install its rules
    /// and routes.
    ///
    /// A non-empty `existing` list is returned unchanged without touching
    /// the host or the control plane.
    ///
    /// # Errors
    ///
    /// Returns the first discovery, control-plane, resolver or installer
    /// error. The failure is also logged as a warning.
    pub fn configure_new_container(
        &self,
        id: &ContainerId,
        existing: &[InterfaceConfig],
    ) -> BerthResult<Vec<InterfaceConfig>> {
        self.configure(id, existing, ProvisioningMode::Allocate, &self.config.snapshot())
    }

    /// Re-fetch the address of an existing container and reinstall its rules
    /// and routes.
    ///
    /// # Errors
    ///
    /// Same as [`configure_new_container`](Self::configure_new_container).
    pub fn configure_existing_container(
        &self,
        id: &ContainerId,
        existing: &[InterfaceConfig],
    ) -> BerthResult<Vec<InterfaceConfig>> {
        self.configure(id, existing, ProvisioningMode::Maintain, &self.config.snapshot())
    }

    /// Interface configuration for a container, honouring the address
    /// allocation feature flag.
    ///
    /// # Errors
    ///
    /// Returns static-path errors unchanged. On the prepared path, an
    /// unsupported response falls back to the configured interfaces; other
    /// control-plane errors and resolver errors are returned.
    pub fn prepare_or_get_interface_info(
        &self,
        id: &ContainerId,
        mode: ProvisioningMode,
        existing: &[InterfaceConfig],
    ) -> BerthResult<Vec<InterfaceConfig>> {
        let config = self.config.snapshot();
        let strategy = Strategy::select(mode, &config);
        tracing::debug!(container = %id, ?strategy, "Selected provisioning strategy");

        match strategy {
            Strategy::StaticAllocate => {
                tracing::debug!(container = %id, "Trying to allocate static IP");
                self.configure(id, existing, mode, &config).inspect_err(|e| {
                    tracing::info!(container = %id, error = %e, "Not allocating static IP");
                })
            }
            Strategy::StaticMaintain => {
                tracing::debug!(container = %id, "Running maintenance");
                self.configure(id, existing, mode, &config)
            }
            Strategy::Prepared => self.prepared_interfaces(id, &config),
            Strategy::Disabled => {
                tracing::debug!(
                    container = %id,
                    "Address allocation disabled, not running maintenance"
                );
                Ok(existing.to_vec())
            }
        }
    }

    /// Ask the control plane to release the addresses of a stopped
    /// instance. Never fails: every error is logged and dropped.
    pub fn release_addresses(&self, instance_id: &str) {
        let config = self.config.snapshot();
        if config.address_allocation_enabled() {
            // Allocated addresses are reclaimed by the control plane's own reconciler.
            return;
        }

        let tag = match config.namespace().machine_tag(instance_id) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::warn!(instance = instance_id, error = %e, "Unexpected container tag");
                return;
            }
        };

        match self.api.release_addresses(&tag) {
            Ok(()) => {
                tracing::info!(container = %tag.id(), "Released all addresses");
            }
            Err(e) if e.is_unsupported() => {
                tracing::warn!(container = %tag.id(), error = %e, "Not releasing all addresses");
            }
            Err(e) => {
                tracing::warn!(
                    container = %tag.id(),
                    error = %e,
                    "Unexpected error trying to release container addresses"
                );
            }
        }
    }

    fn configure(
        &self,
        id: &ContainerId,
        existing: &[InterfaceConfig],
        mode: ProvisioningMode,
        config: &ProvisionerConfig,
    ) -> BerthResult<Vec<InterfaceConfig>> {
        if !existing.is_empty() {
            tracing::trace!(container = %id, "Interface info already known, not overwriting");
            return Ok(existing.to_vec());
        }

        self.configure_static(&id.tag(), mode, config)
            .inspect_err(|e| {
                tracing::warn!(container = %id, error = %e, "Failed configuring a static IP");
            })
    }

    fn configure_static(
        &self,
        tag: &MachineTag,
        mode: ProvisioningMode,
        config: &ProvisionerConfig,
    ) -> BerthResult<Vec<InterfaceConfig>> {
        let primary = discover_primary_interface(&self.interfaces)?;

        let mut interfaces = match mode {
            ProvisioningMode::Allocate => self.api.prepare_interface_info(tag)?,
            ProvisioningMode::Maintain => self.api.get_interface_info(tag)?,
        };
        tracing::debug!(container = %tag.id(), ?interfaces, "Container interface info result");

        let resolver = read_resolver_config(&config.resolv_conf)?;
        for (index, iface) in interfaces.iter_mut().enumerate() {
            // Containers must not inherit the host's device index or name.
            iface.device_index = index;
            iface.interface_name = interface_name(index);
            iface.config_type = ConfigType::Static;
            iface.dns_servers.clone_from(&resolver.nameservers);
            iface.dns_search_domains = resolver.search_domains();
            iface.gateway_address = Some(primary.address.clone());
        }

        setup_routes_and_iptables(
            &self.runner,
            &primary,
            &config.bridge_device,
            &interfaces,
            &config.nat_policy(),
        )?;
        Ok(interfaces)
    }

    fn prepared_interfaces(
        &self,
        id: &ContainerId,
        config: &ProvisionerConfig,
    ) -> BerthResult<Vec<InterfaceConfig>> {
        tracing::debug!(
            container = %id,
            "Address allocation not enabled, using prepared interface info"
        );

        let mut interfaces = match self.api.prepare_interface_info(&id.tag()) {
            Ok(interfaces) => interfaces,
            Err(e) if e.is_unsupported() => {
                tracing::warn!(container = %id, error = %e, "Using fallback config");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        tracing::trace!(container = %id, ?interfaces, "Prepared interface info");

        if interfaces.is_empty() {
            tracing::info!(container = %id, "Using fallback network config");
            interfaces.clone_from(&config.fallback_interfaces);
        }

        if interfaces.iter().all(|iface| iface.dns_servers.is_empty()) {
            tracing::warn!(
                container = %id,
                "No DNS settings found, discovering the host settings"
            );
            let resolver = read_resolver_config(&config.resolv_conf)?;
            // The list is sorted, so the first entry is the primary interface.
            let primary = interfaces.first_mut().ok_or_else(|| BerthError::Config {
                message: "no fallback interfaces configured".to_string(),
            })?;
            primary.dns_search_domains = resolver.search_domains();
            primary.dns_servers = resolver.nameservers;
            tracing::debug!(
                container = %id,
                interface = %primary.interface_name,
                dns_servers = ?primary.dns_servers,
                search_domains = ?primary.dns_search_domains,
                "Setting DNS servers on container interface"
            );
        }

        Ok(interfaces)
    }
}
