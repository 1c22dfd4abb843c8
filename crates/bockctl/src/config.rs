//! Runtime configuration.

use std::path::PathBuf;

use bock_common::BockPaths;
use bock_network::CniEnv;

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Runtime configuration options.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Paths for runtime data.
    pub paths: BockPaths,
    /// Namespace containers are created in and listed from.
    pub namespace: String,
    /// CNI plugin and configuration directories.
    pub cni: CniEnv,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            paths: BockPaths::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            cni: CniEnv::default(),
        }
    }
}

impl RuntimeConfig {
    /// Configuration rooted in the user's data directory.
    #[must_use]
    pub fn rootless() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::default().with_root(home.join(".local/share/bock"))
    }

    /// Rootless configuration for unprivileged users, the default otherwise.
    #[must_use]
    pub fn for_current_user() -> Self {
        if rustix::process::geteuid().is_root() {
            Self::default()
        } else {
            Self::rootless()
        }
    }

    /// Set the root directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths = BockPaths::with_root(root);
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the CNI plugin directory.
    #[must_use]
    pub fn with_cni_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cni.path = path.into();
        self
    }

    /// Set the CNI configuration directory.
    #[must_use]
    pub fn with_netconf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cni.netconf_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.cni.path, PathBuf::from("/opt/cni/bin"));
        assert_eq!(config.cni.netconf_path, PathBuf::from("/etc/cni/net.d"));
    }

    #[test]
    fn rootless_config() {
        let config = RuntimeConfig::rootless();
        assert!(config.paths.root.ends_with(".local/share/bock"));
    }

    #[test]
    fn builder_pattern() {
        let config = RuntimeConfig::default()
            .with_root("/custom/root")
            .with_namespace("k8s.io")
            .with_cni_path("/usr/libexec/cni")
            .with_netconf_path("/custom/net.d");

        assert_eq!(config.paths.root, PathBuf::from("/custom/root"));
        assert_eq!(config.namespace, "k8s.io");
        assert_eq!(config.cni.path, PathBuf::from("/usr/libexec/cni"));
        assert_eq!(config.cni.netconf_path, PathBuf::from("/custom/net.d"));
    }
}
