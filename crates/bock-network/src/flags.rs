//! Network-related options of `bockctl create`, as parsed by the CLI.

use crate::dns::DnsOptions;

/// Raw networking flags of a container-create request.
#[derive(Debug, Clone, Default)]
pub struct NetFlags {
    /// `--network` values.
    pub network: Vec<String>,
    /// `--net` values (alias of `--network`).
    pub net: Vec<String>,
    /// `--publish` values.
    pub publish: Vec<String>,
    /// `--ip`.
    pub ip: Option<String>,
    /// `--mac-address`.
    pub mac_address: Option<String>,
    /// `--hostname`.
    pub hostname: Option<String>,
    /// `--dns`.
    pub dns: Vec<String>,
    /// `--dns-search`.
    pub dns_search: Vec<String>,
    /// `--dns-opt`.
    pub dns_opt: Vec<String>,
    /// `--dns-option`.
    pub dns_option: Vec<String>,
    /// `--add-host`.
    pub add_host: Vec<String>,
}

impl NetFlags {
    /// Network tokens from `--network` followed by `--net`.
    #[must_use]
    pub fn network_tokens(&self) -> Vec<String> {
        self.network.iter().chain(&self.net).cloned().collect()
    }

    /// Explicit DNS settings; `--dns-opt` and `--dns-option` are merged.
    #[must_use]
    pub fn dns_options(&self) -> DnsOptions {
        DnsOptions {
            servers: self.dns.clone(),
            search: self.dns_search.clone(),
            options: self.dns_opt.iter().chain(&self.dns_option).cloned().collect(),
        }
    }

    /// The requested IP, ignoring an empty value.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip.as_deref().filter(|ip| !ip.is_empty())
    }
}
