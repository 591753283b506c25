//! # berth-common
//!
//! Shared utilities and types for the Berth network provisioner.
//!
//! This crate provides functionality used across all Berth crates:
//! - Container ids, control-plane machine tags and instance namespaces
//! - Default host paths
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod paths;

pub use error::{BerthError, BerthResult};
pub use id::{ContainerId, MachineTag, Namespace};
pub use paths::BerthPaths;
