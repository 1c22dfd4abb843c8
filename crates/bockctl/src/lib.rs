//! # bockctl
//!
//! Creates containers from the command line, resolving their networking:
//! CNI-managed networks, the host network, no network, or another running
//! container's network namespace.
//!
//! The runtime spec and state of each container are persisted under
//! `<root>/containers/<namespace>/<id>/`.

#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod config;
pub mod create;
pub mod rootless;

pub use client::StateClient;
pub use config::RuntimeConfig;
