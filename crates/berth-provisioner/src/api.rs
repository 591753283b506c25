//! Control-plane calls used by the provisioner.

use berth_common::{BerthResult, MachineTag};
use berth_network::InterfaceConfig;

/// Container networking calls exposed by the control plane.
///
/// Providers that cannot perform an operation answer with
/// [`berth_common::BerthError::Unsupported`].
pub trait ContainerNetworkApi {
    /// Allocate addresses for a new container and return its interfaces.
    ///
    /// # Errors
    ///
    /// Returns the control plane's error.
    fn prepare_interface_info(&self, tag: &MachineTag) -> BerthResult<Vec<InterfaceConfig>>;

    /// Fetch the interfaces previously allocated to a container.
    ///
    /// # Errors
    ///
    /// Returns the control plane's error.
    fn get_interface_info(&self, tag: &MachineTag) -> BerthResult<Vec<InterfaceConfig>>;

    /// Release every address allocated to a container.
    ///
    /// # Errors
    ///
    /// Returns the control plane's error.
    fn release_addresses(&self, tag: &MachineTag) -> BerthResult<()>;
}
