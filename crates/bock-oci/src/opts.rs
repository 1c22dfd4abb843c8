//! Deferred edits to a runtime [`Spec`].
//!
//! Components that decide *what* a container should look like record
//! [`SpecMutation`]s in order; whoever owns the spec applies them later with
//! [`apply_all`].

use std::path::PathBuf;

use crate::runtime::{Mount, Namespace, NamespaceType, Spec};

/// Propagation used for writable per-container bind mounts.
pub const DEFAULT_PROPAGATION: &str = "rprivate";

/// Host hosts file.
pub const HOST_HOSTS_FILE: &str = "/etc/hosts";

/// Host resolver configuration.
pub const HOST_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Host hostname file.
pub const HOST_HOSTNAME_FILE: &str = "/etc/hostname";

/// A single deferred edit to a runtime spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecMutation {
    /// Join an existing namespace instead of creating one.
    JoinNamespace {
        /// Namespace type.
        ns_type: NamespaceType,
        /// Path of the namespace to join.
        path: PathBuf,
    },
    /// Share the host's namespace (drop the namespace entry).
    HostNamespace {
        /// Namespace type.
        ns_type: NamespaceType,
    },
    /// Add a mount.
    Mount(Mount),
    /// Override the hostname.
    Hostname(String),
}

impl SpecMutation {
    /// Writable bind mount of `source` at `destination`.
    pub fn bind(source: impl Into<PathBuf>, destination: &str) -> Self {
        Self::Mount(Mount {
            destination: destination.into(),
            mount_type: Some("bind".to_string()),
            source: Some(source.into()),
            options: vec!["bind".to_string(), DEFAULT_PROPAGATION.to_string()],
        })
    }

    /// Read-only bind of a host file at the same path inside the container.
    pub fn host_file(path: &str) -> Self {
        Self::Mount(Mount {
            destination: path.into(),
            mount_type: Some("bind".to_string()),
            source: Some(path.into()),
            options: vec!["rbind".to_string(), "ro".to_string()],
        })
    }

    /// `/etc/resolv.conf` backed by `source`.
    pub fn custom_resolv_conf(source: impl Into<PathBuf>) -> Self {
        Self::bind(source, HOST_RESOLV_CONF)
    }

    /// `/etc/hosts` backed by `source`.
    pub fn custom_hosts(source: impl Into<PathBuf>) -> Self {
        Self::bind(source, HOST_HOSTS_FILE)
    }

    /// `/etc/hostname` backed by `source`.
    pub fn custom_hostname_file(source: impl Into<PathBuf>) -> Self {
        Self::bind(source, HOST_HOSTNAME_FILE)
    }

    /// The host's `/etc/hosts`.
    #[must_use]
    pub fn host_hosts_file() -> Self {
        Self::host_file(HOST_HOSTS_FILE)
    }

    /// The host's `/etc/resolv.conf`.
    #[must_use]
    pub fn host_resolv_conf() -> Self {
        Self::host_file(HOST_RESOLV_CONF)
    }

    /// Apply this edit to `spec`.
    pub fn apply(&self, spec: &mut Spec) {
        match self {
            Self::JoinNamespace { ns_type, path } => {
                let linux = spec.linux_mut();
                let entry = Namespace {
                    ns_type: *ns_type,
                    path: Some(path.clone()),
                };
                match linux.namespaces.iter().position(|ns| ns.ns_type == *ns_type) {
                    Some(idx) => linux.namespaces[idx] = entry,
                    None => linux.namespaces.push(entry),
                }
            }
            Self::HostNamespace { ns_type } => {
                if let Some(linux) = spec.linux.as_mut() {
                    linux.namespaces.retain(|ns| ns.ns_type != *ns_type);
                }
            }
            Self::Mount(mount) => spec.mounts.push(mount.clone()),
            Self::Hostname(hostname) => spec.hostname = Some(hostname.clone()),
        }
    }
}

/// Apply `mutations` to `spec` in order.
pub fn apply_all(spec: &mut Spec, mutations: &[SpecMutation]) {
    for mutation in mutations {
        mutation.apply(spec);
    }
}
