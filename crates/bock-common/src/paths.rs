//! Standard filesystem paths for Bock.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Default root directory for Bock data.
pub static BOCK_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("BOCK_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/bock"))
});

/// Standard paths used by Bock.
///
/// Container state is partitioned by namespace:
/// `<root>/containers/<namespace>/<id>/`.
#[derive(Debug, Clone)]
pub struct BockPaths {
    /// Root data directory (default: /var/lib/bock).
    pub root: PathBuf,
}

impl BockPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding container state for every namespace.
    #[must_use]
    pub fn containers(&self) -> PathBuf {
        self.root.join("containers")
    }

    /// Directory holding container state for one namespace.
    #[must_use]
    pub fn namespace_containers(&self, namespace: &str) -> PathBuf {
        self.containers().join(namespace)
    }

    /// Per-container state directory.
    #[must_use]
    pub fn container(&self, namespace: &str, id: &str) -> PathBuf {
        self.namespace_containers(namespace).join(id)
    }

    /// Container state file.
    #[must_use]
    pub fn container_state(&self, namespace: &str, id: &str) -> PathBuf {
        self.container(namespace, id).join("state.json")
    }

    /// Container runtime spec.
    #[must_use]
    pub fn container_config(&self, namespace: &str, id: &str) -> PathBuf {
        self.container(namespace, id).join("config.json")
    }

    /// Synthesized resolv.conf of a container.
    #[must_use]
    pub fn container_resolv_conf(&self, namespace: &str, id: &str) -> PathBuf {
        self.container(namespace, id).join("resolv.conf")
    }

    /// Hostname file of a container.
    #[must_use]
    pub fn container_hostname(&self, namespace: &str, id: &str) -> PathBuf {
        self.container(namespace, id).join("hostname")
    }

    /// Root of the hosts-file store.
    #[must_use]
    pub fn etchosts(&self) -> PathBuf {
        self.root.join("etchosts")
    }
}

impl Default for BockPaths {
    fn default() -> Self {
        Self::with_root(BOCK_ROOT.clone())
    }
}
