//! DNS configuration for containers on managed networks.
//!
//! The container's resolv.conf is built from the user's `--dns`,
//! `--dns-search` and `--dns-opt` values, falling back per field to the
//! host's resolver configuration. In rootless mode the user-mode network
//! proxy's resolver is put in front.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use bock_common::BockResult;

use crate::resolvconf::{self, IpFamily};

/// Default location of the host resolver configuration.
pub const HOST_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Source of the host's resolv.conf content.
pub trait ResolvSource {
    /// Read the raw content.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; `NotFound` is treated as an empty file
    /// by callers.
    fn read(&self) -> io::Result<String>;
}

/// Reads resolv.conf from the filesystem.
#[derive(Debug, Clone)]
pub struct HostResolvConf {
    path: PathBuf,
}

impl HostResolvConf {
    /// Read from a specific path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for HostResolvConf {
    fn default() -> Self {
        Self::new(HOST_RESOLV_CONF)
    }
}

impl ResolvSource for HostResolvConf {
    fn read(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// How the container reaches DNS when Bock itself runs rootless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RootlessDns {
    /// Not rootless, or rootless without a user-mode proxy.
    #[default]
    Disabled,
    /// Rootless behind slirp4netns; these resolvers take priority.
    Slirp4netns(Vec<String>),
}

impl RootlessDns {
    fn nameservers(&self) -> &[String] {
        match self {
            Self::Disabled => &[],
            Self::Slirp4netns(servers) => servers,
        }
    }
}

/// DNS values supplied explicitly by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsOptions {
    /// `--dns`.
    pub servers: Vec<String>,
    /// `--dns-search`.
    pub search: Vec<String>,
    /// `--dns-opt` / `--dns-option`.
    pub options: Vec<String>,
}

/// The resolver configuration a container will see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsConfig {
    /// Nameservers, rootless proxy first.
    pub nameservers: Vec<String>,
    /// Search domains.
    pub search: Vec<String>,
    /// Resolver options.
    pub options: Vec<String>,
}

/// Remove duplicates, keeping the first occurrence of each value.
#[must_use]
pub fn dedupe(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

impl DnsConfig {
    /// Merge explicit options with the host configuration.
    ///
    /// `host` is only read when at least one explicit list is empty; a
    /// missing host file counts as empty.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host file exists but cannot be read.
    pub fn resolve(
        explicit: &DnsOptions,
        host: &dyn ResolvSource,
        rootless: &RootlessDns,
    ) -> BockResult<Self> {
        let mut nameservers = dedupe(&explicit.servers);
        let mut search = dedupe(&explicit.search);
        let mut options = dedupe(&explicit.options);

        if nameservers.is_empty() || search.is_empty() || options.is_empty() {
            let content = match host.read() {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(error = %e, "host resolv.conf does not exist");
                    String::new()
                }
                Err(e) => return Err(e.into()),
            };
            let filtered = resolvconf::filter_resolv_dns(&content, true);

            if search.is_empty() {
                search = resolvconf::search_domains(&filtered);
            }
            if nameservers.is_empty() {
                nameservers = resolvconf::nameservers(&filtered, IpFamily::V4);
            }
            if options.is_empty() {
                options = resolvconf::options(&filtered);
            }
        }

        let proxy = rootless.nameservers();
        if !proxy.is_empty() {
            nameservers = proxy.iter().cloned().chain(nameservers).collect();
        }

        Ok(Self {
            nameservers,
            search,
            options,
        })
    }

    /// Write this configuration as a resolv.conf at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn write(&self, path: &Path) -> BockResult<()> {
        resolvconf::build(path, &self.nameservers, &self.search, &self.options)
    }
}

/// Resolve the DNS configuration and materialize it at `path`.
///
/// # Errors
///
/// Fails if the host configuration cannot be read (other than not existing)
/// or the file cannot be written.
pub fn synthesize(
    path: &Path,
    explicit: &DnsOptions,
    host: &dyn ResolvSource,
    rootless: &RootlessDns,
) -> BockResult<PathBuf> {
    let config = DnsConfig::resolve(explicit, host, rootless)?;
    config.write(path)?;

    tracing::debug!(
        path = %path.display(),
        nameservers = ?config.nameservers,
        search = ?config.search,
        options = ?config.options,
        "Wrote resolv.conf"
    );

    Ok(path.to_path_buf())
}
