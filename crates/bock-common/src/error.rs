//! Common error types for the Bock ecosystem.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`BockError`].
pub type BockResult<T> = Result<T, BockError>;

/// Common errors across the Bock ecosystem.
#[derive(Error, Diagnostic, Debug)]
pub enum BockError {
    /// No container matches the given reference.
    #[error("No such container: {id}")]
    #[diagnostic(code(bock::container::not_found))]
    ContainerNotFound {
        /// The container ID, name or prefix that was not found.
        id: String,
    },

    /// A reference matched more than one container.
    #[error("Multiple containers found with prefix: {reference}")]
    #[diagnostic(
        code(bock::container::ambiguous),
        help("Use a longer ID prefix or the full container name")
    )]
    AmbiguousContainer {
        /// The ambiguous reference.
        reference: String,
        /// Number of containers that matched.
        matches: usize,
    },

    /// A container was expected to be running but is not.
    #[error("Invalid target container: {id}, should be running")]
    #[diagnostic(code(bock::container::not_running))]
    ContainerNotRunning {
        /// The container ID.
        id: String,
    },

    /// A container name is already taken in the namespace.
    #[error("Name {name} is already used by container {id}")]
    #[diagnostic(code(bock::container::name_in_use))]
    NameInUse {
        /// The requested name.
        name: String,
        /// The container holding it.
        id: String,
    },

    /// Invalid container ID or name format.
    #[error("Invalid container ID or name: {id:?}")]
    #[diagnostic(
        code(bock::container::invalid_id),
        help("IDs and names must start alphanumeric and use only alphanumerics, hyphens and underscores, 1-64 characters")
    )]
    InvalidContainerId {
        /// The invalid container ID or name.
        id: String,
    },

    /// Network not present in the network configuration store.
    #[error("Network {name} not found")]
    #[diagnostic(
        code(bock::network::not_found),
        help("Check the CNI configuration directory (--cni-netconfpath)")
    )]
    NetworkNotFound {
        /// The missing network name.
        name: String,
    },

    /// Malformed `--network` value or an illegal combination of network tokens.
    #[error("Invalid network: {message}")]
    #[diagnostic(code(bock::network::invalid))]
    InvalidNetwork {
        /// Details about the rejected value.
        message: String,
    },

    /// A MAC address was requested on a network type that cannot honour it.
    #[error("{net_type} interfaces on network {network} do not support --mac-address")]
    #[diagnostic(
        code(bock::network::mac_unsupported),
        help("Only bridge and macvlan networks accept a MAC address")
    )]
    MacAddressUnsupported {
        /// The network name.
        network: String,
        /// The plugin type backing the network.
        net_type: String,
    },

    /// The MAC address could not be parsed.
    #[error("Invalid MAC address: {value}")]
    #[diagnostic(
        code(bock::network::invalid_mac),
        help("Use a form like 02:42:ac:11:00:02")
    )]
    InvalidMacAddress {
        /// The rejected value.
        value: String,
    },

    /// The port publish string could not be parsed.
    #[error("Invalid port mapping {value}: {reason}")]
    #[diagnostic(
        code(bock::network::invalid_port),
        help("Use [hostIP:]hostPort:containerPort[/protocol]")
    )]
    InvalidPortMapping {
        /// The rejected publish string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Mutually exclusive options were set together.
    #[error("Conflicting options: {message}")]
    #[diagnostic(code(bock::conflict))]
    Conflict {
        /// Which options conflict.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(bock::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(bock::serialization))]
    Serialization(String),

    /// Feature not supported on this platform.
    #[error("Feature not supported: {feature}")]
    #[diagnostic(code(bock::unsupported), help("This feature requires Linux"))]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(bock::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl BockError {
    /// Shorthand for [`BockError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for [`BockError::InvalidNetwork`].
    pub fn invalid_network(message: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BockError {
    fn from(err: serde_json::Error) -> Self {
        BockError::Serialization(err.to_string())
    }
}
