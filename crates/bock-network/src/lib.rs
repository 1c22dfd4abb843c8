//! # bock-network
//!
//! Network attachment for Bock containers.
//!
//! Given the networking flags of a container being created, this crate
//! decides the network mode, validates it against the CNI configuration and
//! running containers, writes the container's resolv.conf and returns the
//! runtime-spec edits that attach it. Interfaces themselves are wired later by
//! the CNI plugins.

#![warn(missing_docs)]

pub mod assemble;
pub mod cni;
pub mod dns;
pub mod flags;
pub mod hosts;
pub mod mac;
pub mod nettype;
pub mod peer;
pub mod platform;
pub mod portmap;
pub mod resolvconf;

pub use assemble::{NetContext, NetworkAttachment, NetworkSetup, assemble};
pub use cni::{CniEnv, NetworkStore};
pub use dns::{DnsConfig, DnsOptions, HostResolvConf, ResolvSource, RootlessDns};
pub use flags::NetFlags;
pub use mac::MacAddress;
pub use nettype::{NetworkMode, classify};
pub use peer::{ContainerClient, ContainerSummary, PeerResolver, PeerTarget, TaskInfo};
pub use platform::Platform;
pub use portmap::{PortMapping, Protocol, parse_publish};
