//! Common error types for Berth.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`BerthError`].
pub type BerthResult<T> = Result<T, BerthError>;

/// Errors raised while provisioning container networking.
#[derive(Error, Diagnostic, Debug)]
pub enum BerthError {
    /// No host interface qualifies as the primary one.
    #[error("cannot detect the primary network interface")]
    #[diagnostic(
        code(berth::discovery::no_primary),
        help("The host needs a non-loopback interface that is up and has an address")
    )]
    NoPrimaryInterface,

    /// Interface enumeration or address inspection failed.
    #[error("interface discovery failed: {message}")]
    #[diagnostic(code(berth::discovery))]
    Discovery {
        /// The error message.
        message: String,
    },

    /// The resolver configuration exists but could not be read.
    #[error("cannot read DNS servers from {path:?}: {source}")]
    #[diagnostic(code(berth::resolv_conf))]
    ResolvConf {
        /// Path of the resolver configuration.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The control plane rejected or failed a request.
    #[error("control plane error: {message}")]
    #[diagnostic(code(berth::api))]
    Api {
        /// The error message.
        message: String,
    },

    /// The control plane does not support the requested operation.
    #[error("{feature} not supported")]
    #[diagnostic(code(berth::unsupported))]
    Unsupported {
        /// The unsupported operation.
        feature: String,
    },

    /// A host command could not be started.
    #[error("cannot run command {command:?}: {source}")]
    #[diagnostic(code(berth::command::spawn))]
    CommandSpawn {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A host command exited with a failure code.
    #[error("command {command:?} failed with exit code {code}")]
    #[diagnostic(code(berth::command::failed))]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Process exit code.
        code: i32,
    },

    /// An iptables existence check returned neither "present" nor "absent".
    #[error("iptables failed with unexpected exit code {code} running {command:?}")]
    #[diagnostic(
        code(berth::iptables::unexpected_state),
        help("Inspect the host firewall state manually; no rule was changed")
    )]
    UnexpectedRuleState {
        /// Rendered check command.
        command: String,
        /// Process exit code.
        code: i32,
    },

    /// A caller supplied incomplete input.
    #[error("invalid argument: {message}")]
    #[diagnostic(code(berth::invalid_argument))]
    InvalidArgument {
        /// The error message.
        message: String,
    },

    /// Invalid container id format.
    #[error("invalid container id: {id}")]
    #[diagnostic(
        code(berth::container::invalid_id),
        help("Container ids look like '0/lxc/1': a machine number followed by type/number pairs")
    )]
    InvalidContainerId {
        /// The invalid container id.
        id: String,
    },

    /// An instance id does not belong to the configured namespace.
    #[error("unexpected instance id {id:?} for namespace {namespace:?}")]
    #[diagnostic(code(berth::instance::invalid_id))]
    InvalidInstanceId {
        /// The instance id.
        id: String,
        /// The namespace prefix it was checked against.
        namespace: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(berth::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(berth::io))]
    Io(#[from] std::io::Error),
}

impl BerthError {
    /// Whether this error reports an operation the control plane does not implement.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Build an [`BerthError::Api`] from any message.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Build an [`BerthError::Unsupported`] for the named operation.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }
}
