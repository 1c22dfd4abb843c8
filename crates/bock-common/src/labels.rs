//! Annotation keys Bock records on containers.

/// Human-readable container name.
pub const NAME: &str = "bock/name";

/// Namespace the container belongs to.
pub const NAMESPACE: &str = "bock/namespace";

/// JSON array of the normalized network tokens.
pub const NETWORKS: &str = "bock/networks";

/// JSON array of published port mappings.
pub const PORTS: &str = "bock/ports";

/// Requested static IP address.
pub const IP_ADDRESS: &str = "bock/ip";

/// Requested MAC address.
pub const MAC_ADDRESS: &str = "bock/mac-address";

/// JSON array of `--add-host` entries, applied when the hosts file is filled.
pub const EXTRA_HOSTS: &str = "bock/extra-hosts";

/// Hostname assigned at creation.
pub const HOSTNAME: &str = "bock/hostname";
