//! CNI network configuration store.
//!
//! Managed networks are described by CNI configuration files in the netconf
//! directory. Bock only reads them here: the plugins themselves run later,
//! when the container starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bock_common::{BockError, BockResult};
use serde::{Deserialize, Serialize};

use crate::mac::MacAddress;
use crate::nettype::DEFAULT_NETWORK;

/// Default CNI plugin binary directory.
pub const DEFAULT_CNI_PATH: &str = "/opt/cni/bin";

/// Default CNI configuration directory.
pub const DEFAULT_NETCONF_PATH: &str = "/etc/cni/net.d";

/// Plugin types whose interfaces accept a caller-chosen MAC address.
pub const MAC_CAPABLE_TYPES: &[&str] = &["bridge", "macvlan"];

/// One plugin in a network's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin type (binary name), e.g. `bridge`.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Plugin-specific settings.
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl PluginConfig {
    fn new(plugin_type: &str) -> Self {
        Self {
            plugin_type: plugin_type.to_string(),
            settings: serde_json::Map::new(),
        }
    }
}

/// A CNI network configuration list (`.conflist`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigList {
    /// CNI spec version.
    #[serde(default)]
    pub cni_version: String,
    /// Network name.
    pub name: String,
    /// Plugin chain; the first entry determines the network type.
    pub plugins: Vec<PluginConfig>,
}

/// A single-plugin CNI configuration (`.conf`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkConfig {
    #[serde(default)]
    cni_version: String,
    name: String,
    #[serde(flatten)]
    plugin: PluginConfig,
}

impl From<NetworkConfig> for NetworkConfigList {
    fn from(conf: NetworkConfig) -> Self {
        Self {
            cni_version: conf.cni_version,
            name: conf.name,
            plugins: vec![conf.plugin],
        }
    }
}

impl NetworkConfigList {
    /// Type of the first plugin, which is the network's type.
    #[must_use]
    pub fn network_type(&self) -> Option<&str> {
        self.plugins.first().map(|p| p.plugin_type.as_str())
    }

    /// The built-in default bridge network.
    #[must_use]
    pub fn default_bridge() -> Self {
        Self {
            cni_version: "1.0.0".to_string(),
            name: DEFAULT_NETWORK.to_string(),
            plugins: vec![
                PluginConfig::new("bridge"),
                PluginConfig::new("portmap"),
                PluginConfig::new("firewall"),
                PluginConfig::new("tuning"),
            ],
        }
    }
}

/// Where CNI plugins and their configuration live.
#[derive(Debug, Clone)]
pub struct CniEnv {
    /// Plugin binary directory.
    pub path: PathBuf,
    /// Configuration directory.
    pub netconf_path: PathBuf,
}

impl Default for CniEnv {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CNI_PATH),
            netconf_path: PathBuf::from(DEFAULT_NETCONF_PATH),
        }
    }
}

impl CniEnv {
    /// Create an environment with explicit directories.
    pub fn new(path: impl Into<PathBuf>, netconf_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            netconf_path: netconf_path.into(),
        }
    }

    /// Load every network configuration from the netconf directory.
    ///
    /// Files are read in name order and the first definition of a network
    /// name wins. A missing directory yields only the default network.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn network_store(&self) -> BockResult<NetworkStore> {
        let mut store = NetworkStore::default();

        if self.netconf_path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(&self.netconf_path)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| {
                    matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("conflist" | "conf")
                    )
                })
                .collect();
            files.sort();

            for file in files {
                let list = load_config_file(&file)?;
                tracing::debug!(
                    network = %list.name,
                    path = %file.display(),
                    "Loaded CNI network config"
                );
                store.insert(list);
            }
        } else {
            tracing::debug!(
                path = %self.netconf_path.display(),
                "CNI config directory does not exist"
            );
        }

        store.insert(NetworkConfigList::default_bridge());
        Ok(store)
    }
}

fn load_config_file(path: &Path) -> BockResult<NetworkConfigList> {
    let data = std::fs::read_to_string(path)?;
    let parse_err = |e: serde_json::Error| BockError::Config {
        message: format!("failed to parse CNI config {}: {e}", path.display()),
    };

    if path.extension().and_then(|e| e.to_str()) == Some("conflist") {
        serde_json::from_str::<NetworkConfigList>(&data).map_err(parse_err)
    } else {
        serde_json::from_str::<NetworkConfig>(&data)
            .map(NetworkConfigList::from)
            .map_err(parse_err)
    }
}

/// Network name → configuration, as seen at load time.
#[derive(Debug, Clone, Default)]
pub struct NetworkStore {
    networks: BTreeMap<String, NetworkConfigList>,
}

impl NetworkStore {
    /// Add a network unless one with the same name is already present.
    pub fn insert(&mut self, list: NetworkConfigList) {
        self.networks.entry(list.name.clone()).or_insert(list);
    }

    /// Look up a network by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NetworkConfigList> {
        self.networks.get(name)
    }

    /// Check that every requested network exists and, when a MAC address is
    /// requested, that each one can carry it.
    ///
    /// # Errors
    ///
    /// [`BockError::NetworkNotFound`] for an unknown name,
    /// [`BockError::MacAddressUnsupported`] for a MAC on a network whose type
    /// is not in [`MAC_CAPABLE_TYPES`].
    pub fn validate(&self, networks: &[String], mac: Option<&MacAddress>) -> BockResult<()> {
        for name in networks {
            let config = self
                .get(name)
                .ok_or_else(|| BockError::NetworkNotFound { name: name.clone() })?;

            if mac.is_some() {
                let net_type = config.network_type().unwrap_or_default();
                if !MAC_CAPABLE_TYPES.contains(&net_type) {
                    return Err(BockError::MacAddressUnsupported {
                        network: name.clone(),
                        net_type: net_type.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
