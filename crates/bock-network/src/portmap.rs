//! Port publishing (`--publish`) for containers on managed networks.
//!
//! Accepted form: `[hostIP:]hostPort:containerPort[/protocol]`, where both
//! ports may be equal-length ranges (`8000-8001:80-81`). The mappings are
//! recorded on the container and applied by the CNI `portmap` plugin.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::str::FromStr;

use bock_common::{BockError, BockResult};
use serde::{Deserialize, Serialize};

/// Protocol for port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP protocol.
    #[default]
    Tcp,
    /// UDP protocol.
    Udp,
    /// SCTP protocol.
    Sctp,
}

impl Protocol {
    /// Lowercase protocol name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            other => Err(format!("unsupported protocol {other:?}")),
        }
    }
}

/// A port mapping between host and container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    /// Host IP to bind to.
    #[serde(rename = "hostIP")]
    pub host_ip: IpAddr,
    /// Host port.
    pub host_port: u16,
    /// Container port.
    pub container_port: u16,
    /// Protocol.
    pub protocol: Protocol,
}

impl PortMapping {
    /// A TCP mapping on all host addresses.
    #[must_use]
    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self {
            host_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            host_port,
            container_port,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host_ip {
            IpAddr::V6(ip) => write!(f, "[{ip}]")?,
            IpAddr::V4(ip) => write!(f, "{ip}")?,
        }
        write!(
            f,
            ":{}->{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

/// Parse one `--publish` value into its mappings.
///
/// # Errors
///
/// [`BockError::InvalidPortMapping`] for a malformed value, an unknown
/// protocol, mismatched range lengths, or a value without a host port.
pub fn parse_publish(value: &str) -> BockResult<Vec<PortMapping>> {
    let invalid = |reason: &str| BockError::InvalidPortMapping {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let (spec, protocol) = match value.rsplit_once('/') {
        Some((spec, proto)) => (spec, proto.parse::<Protocol>().map_err(|e| invalid(&e))?),
        None => (value, Protocol::Tcp),
    };

    let (rest, container) = spec
        .rsplit_once(':')
        .ok_or_else(|| invalid("automatic host port assignment is not supported"))?;

    let (host_ip, host) = match rest.rsplit_once(':') {
        Some((ip, port)) => (parse_host_ip(ip).map_err(|e| invalid(&e))?, port),
        None => (IpAddr::V4(Ipv4Addr::UNSPECIFIED), rest),
    };

    let host_ports = parse_range(host).map_err(|e| invalid(&format!("host port: {e}")))?;
    let container_ports =
        parse_range(container).map_err(|e| invalid(&format!("container port: {e}")))?;

    if host_ports.clone().count() != container_ports.clone().count() {
        return Err(invalid(
            "host and container port ranges must have the same length",
        ));
    }

    Ok(host_ports
        .zip(container_ports)
        .map(|(host_port, container_port)| PortMapping {
            host_ip,
            host_port,
            container_port,
            protocol,
        })
        .collect())
}

/// Parse every `--publish` value, in order.
///
/// # Errors
///
/// Fails on the first invalid value.
pub fn parse_all(values: &[String]) -> BockResult<Vec<PortMapping>> {
    let mut mappings = Vec::new();
    for value in values {
        mappings.extend(parse_publish(value)?);
    }
    Ok(mappings)
}

fn parse_host_ip(ip: &str) -> Result<IpAddr, String> {
    if ip.is_empty() {
        return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    let bare = ip
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(ip);
    bare.parse()
        .map_err(|_| format!("invalid host IP {ip:?}"))
}

fn parse_port(port: &str) -> Result<u16, String> {
    match port.parse::<u16>() {
        Ok(0) => Err("port 0 is not allowed".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err(format!("invalid port {port:?}")),
    }
}

fn parse_range(range: &str) -> Result<RangeInclusive<u16>, String> {
    if range.is_empty() {
        return Err("missing port".to_string());
    }
    let (start, end) = match range.split_once('-') {
        Some((start, end)) => (parse_port(start)?, parse_port(end)?),
        None => {
            let port = parse_port(range)?;
            (port, port)
        }
    };
    if start > end {
        return Err(format!("invalid range {range:?}"));
    }
    Ok(start..=end)
}
