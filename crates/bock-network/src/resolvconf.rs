//! resolv.conf parsing, filtering and generation.

use std::net::IpAddr;
use std::path::Path;

use bock_common::BockResult;

/// Public resolvers used when filtering leaves no IPv4 nameserver.
pub const DEFAULT_IPV4_DNS: [&str; 2] = ["8.8.8.8", "8.8.4.4"];

/// Public resolvers used when filtering leaves no nameserver and IPv6 is on.
pub const DEFAULT_IPV6_DNS: [&str; 2] = ["2001:4860:4860::8888", "2001:4860:4860::8844"];

/// Address family filter for [`nameservers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
    /// Either family.
    Any,
}

impl IpFamily {
    fn matches(self, addr: &IpAddr) -> bool {
        match self {
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
            Self::Any => true,
        }
    }
}

/// Fields of every non-empty, non-comment line.
fn entries(content: &str) -> impl Iterator<Item = Vec<&str>> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            return None;
        }
        Some(line.split_whitespace().collect())
    })
}

/// Parse a nameserver address, ignoring an IPv6 zone suffix.
fn parse_nameserver(value: &str) -> Option<IpAddr> {
    let addr = value.split_once('%').map_or(value, |(addr, _zone)| addr);
    addr.parse().ok()
}

/// The nameserver address on a `nameserver <addr>` line, if that is what it is.
fn nameserver_of(fields: &[&str]) -> Option<IpAddr> {
    match fields {
        ["nameserver", addr] => parse_nameserver(addr),
        _ => None,
    }
}

/// All nameservers of the given family, in file order.
#[must_use]
pub fn nameservers(content: &str, family: IpFamily) -> Vec<String> {
    entries(content)
        .filter_map(|fields| {
            let addr = nameserver_of(&fields)?;
            family.matches(&addr).then(|| fields[1].to_string())
        })
        .collect()
}

/// Values of the last line starting with `keyword`.
fn last_line_values(content: &str, keyword: &str) -> Vec<String> {
    entries(content)
        .filter(|fields| fields.first() == Some(&keyword))
        .last()
        .map(|fields| fields[1..].iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}

/// Search domains from the last `search` line.
#[must_use]
pub fn search_domains(content: &str) -> Vec<String> {
    last_line_values(content, "search")
}

/// Resolver options from the last `options` line.
#[must_use]
pub fn options(content: &str) -> Vec<String> {
    last_line_values(content, "options")
}

/// Drop nameservers a container cannot reach.
///
/// Loopback nameservers (`127.0.0.0/8`, `::1`) are removed, and IPv6 ones too
/// unless `ipv6_enabled`. When nothing is left the public defaults are added.
#[must_use]
pub fn filter_resolv_dns(content: &str, ipv6_enabled: bool) -> String {
    let mut kept: Vec<String> = content
        .lines()
        .filter(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match nameserver_of(&fields) {
                Some(addr) if addr.is_loopback() => false,
                Some(addr) if addr.is_ipv6() && !ipv6_enabled => false,
                _ => true,
            }
        })
        .map(ToString::to_string)
        .collect();

    let mut cleaned = kept.join("\n");
    if nameservers(&cleaned, IpFamily::Any).is_empty() {
        tracing::debug!("no usable nameserver on the host, using public defaults");
        kept.extend(DEFAULT_IPV4_DNS.iter().map(|ns| format!("nameserver {ns}")));
        if ipv6_enabled {
            kept.extend(DEFAULT_IPV6_DNS.iter().map(|ns| format!("nameserver {ns}")));
        }
        cleaned = kept.join("\n");
    }
    cleaned.push('\n');
    cleaned
}

/// Render resolv.conf content.
///
/// A search list consisting only of `.` is omitted.
#[must_use]
pub fn render(nameservers: &[String], search: &[String], options: &[String]) -> String {
    let mut content = String::new();

    let search_line = search.join(" ");
    if !search.is_empty() && search_line.trim() != "." {
        content.push_str(&format!("search {search_line}\n"));
    }
    for ns in nameservers {
        content.push_str(&format!("nameserver {ns}\n"));
    }
    let options_line = options.join(" ");
    if !options_line.trim().is_empty() {
        content.push_str(&format!("options {options_line}\n"));
    }

    content
}

/// Write a resolv.conf to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an I/O error if the parent directory or file cannot be written.
pub fn build(
    path: &Path,
    nameservers: &[String],
    search: &[String],
    options: &[String],
) -> BockResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(nameservers, search, options))?;
    Ok(())
}
