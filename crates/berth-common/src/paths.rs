//! Standard host paths for Berth.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Default location of the host's DNS resolver configuration.
pub static RESOLV_CONF: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("BERTH_RESOLV_CONF")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/resolv.conf"))
});

/// Host paths read by the provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BerthPaths {
    /// DNS resolver configuration (default: /etc/resolv.conf).
    pub resolv_conf: PathBuf,
}

impl Default for BerthPaths {
    fn default() -> Self {
        Self {
            resolv_conf: RESOLV_CONF.clone(),
        }
    }
}
