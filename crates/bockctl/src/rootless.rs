//! Rootless mode detection.
//!
//! Rootless bockctl re-runs itself inside RootlessKit, where it appears as
//! uid 0 and `ROOTLESSKIT_STATE_DIR` is set. Containers there reach the
//! outside through slirp4netns, whose built-in DNS forwarder listens on the
//! third address of its network.
//!
//! RootlessKit's network driver is not queried. Setups running pasta or
//! vpnkit still get the slirp4netns `.3` address, and need `--dns` when their
//! forwarder lives elsewhere.

use std::net::Ipv4Addr;

use bock_common::{BockError, BockResult};
use bock_network::RootlessDns;

/// Set by RootlessKit in the child namespace.
pub const ROOTLESSKIT_STATE_DIR_ENV: &str = "ROOTLESSKIT_STATE_DIR";

/// Overrides the slirp4netns network.
pub const SLIRP4NETNS_CIDR_ENV: &str = "BOCK_SLIRP4NETNS_CIDR";

/// slirp4netns default network.
pub const DEFAULT_SLIRP4NETNS_CIDR: &str = "10.0.2.0/24";

/// Probe the current process.
///
/// # Errors
///
/// [`BockError::Config`] if `BOCK_SLIRP4NETNS_CIDR` is malformed.
pub fn probe() -> BockResult<RootlessDns> {
    let cidr = std::env::var(SLIRP4NETNS_CIDR_ENV).ok();
    detect(
        rustix::process::geteuid().is_root(),
        std::env::var_os(ROOTLESSKIT_STATE_DIR_ENV).is_some(),
        cidr.as_deref(),
    )
}

/// Decide the rootless DNS mode from already-gathered facts.
///
/// Any RootlessKit child is assumed to use slirp4netns.
///
/// # Errors
///
/// [`BockError::Config`] if `cidr` is malformed.
pub fn detect(euid_is_root: bool, in_rootlesskit: bool, cidr: Option<&str>) -> BockResult<RootlessDns> {
    if !(euid_is_root && in_rootlesskit) {
        return Ok(RootlessDns::Disabled);
    }

    let dns = slirp4netns_dns(cidr.unwrap_or(DEFAULT_SLIRP4NETNS_CIDR))?;
    tracing::debug!(%dns, "Running rootless, using slirp4netns DNS");
    Ok(RootlessDns::Slirp4netns(vec![dns.to_string()]))
}

/// DNS forwarder address of a slirp4netns network.
///
/// # Errors
///
/// [`BockError::Config`] if `cidr` is not an IPv4 network with room for it.
pub fn slirp4netns_dns(cidr: &str) -> BockResult<Ipv4Addr> {
    let invalid = || BockError::Config {
        message: format!("invalid {SLIRP4NETNS_CIDR_ENV} {cidr:?}"),
    };

    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 30 {
        return Err(invalid());
    }

    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    let network = u32::from(addr) & mask;
    Ok(Ipv4Addr::from(network + 3))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn not_rootless() {
        assert_eq!(detect(false, true, None).unwrap(), RootlessDns::Disabled);
        assert_eq!(detect(true, false, None).unwrap(), RootlessDns::Disabled);
    }

    #[test]
    fn rootless_default_network() {
        assert_eq!(
            detect(true, true, None).unwrap(),
            RootlessDns::Slirp4netns(vec!["10.0.2.3".to_string()])
        );
    }

    #[test]
    fn custom_network() {
        assert_eq!(
            slirp4netns_dns("192.168.77.129/25").unwrap(),
            Ipv4Addr::new(192, 168, 77, 131)
        );
        assert_eq!(slirp4netns_dns("0.0.0.0/0").unwrap(), Ipv4Addr::new(0, 0, 0, 3));
    }

    #[test]
    fn malformed_cidr() {
        for cidr in ["10.0.2.0", "10.0.2.0/33", "10.0.2.0/31", "fd00::/64", "x/24"] {
            assert!(
                matches!(slirp4netns_dns(cidr), Err(BockError::Config { .. })),
                "{cidr}"
            );
        }
    }

    proptest! {
        #[test]
        fn dns_stays_inside_network(addr in any::<u32>(), prefix in 0u32..=30) {
            let cidr = format!("{}/{prefix}", Ipv4Addr::from(addr));
            let dns = u32::from(slirp4netns_dns(&cidr).unwrap());
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            prop_assert_eq!(dns & mask, addr & mask);
            prop_assert_eq!(dns & !mask, 3);
        }
    }
}
