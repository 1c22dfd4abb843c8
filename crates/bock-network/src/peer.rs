//! Sharing another container's network namespace (`--network container:<ref>`).
//!
//! The peer is looked up through a [`ContainerClient`], must be running, and
//! its namespace is addressed through `/proc/<pid>/ns/net`. The new container
//! also bind-mounts the peer's hosts, resolv.conf and hostname files.
//!
//! Nothing keeps the peer running after it has been resolved; if it stops
//! before the new container starts, joining its namespace fails at start.

use std::path::PathBuf;

use bock_common::{BockError, BockPaths, BockResult};
use bock_oci::opts::SpecMutation;
use bock_oci::runtime::NamespaceType;
use bock_oci::state::ContainerStatus;
use bock_oci::Spec;

use crate::flags::NetFlags;
use crate::hosts::HostsStore;
use crate::platform::Platform;

/// A container as listed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Full container ID.
    pub id: String,
    /// User-assigned name, if any.
    pub name: Option<String>,
}

/// The current task of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    /// Init process ID, when there is a live process.
    pub pid: Option<u32>,
    /// Task status.
    pub status: ContainerStatus,
}

/// Read-only view of the container runtime.
pub trait ContainerClient {
    /// All containers in the current namespace.
    ///
    /// # Errors
    ///
    /// Fails when the runtime cannot be queried.
    fn containers(&self) -> BockResult<Vec<ContainerSummary>>;

    /// The task of container `id`.
    ///
    /// # Errors
    ///
    /// Fails when the container or its task does not exist.
    fn task(&self, id: &str) -> BockResult<TaskInfo>;

    /// The persisted runtime spec of container `id`.
    ///
    /// # Errors
    ///
    /// Fails when the container does not exist or its spec is unreadable.
    fn spec(&self, id: &str) -> BockResult<Spec>;
}

/// Containers matching `reference`.
///
/// An exact ID match is returned alone. Otherwise every container whose name
/// equals the reference or whose ID starts with it matches.
///
/// # Errors
///
/// Propagates client failures.
pub fn find_containers(
    client: &dyn ContainerClient,
    reference: &str,
) -> BockResult<Vec<ContainerSummary>> {
    let containers = client.containers()?;

    if let Some(exact) = containers.iter().find(|c| c.id == reference) {
        return Ok(vec![exact.clone()]);
    }

    Ok(containers
        .into_iter()
        .filter(|c| c.name.as_deref() == Some(reference) || c.id.starts_with(reference))
        .collect())
}

/// Network namespace path of a process.
#[must_use]
pub fn netns_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/ns/net"))
}

/// Reject options that cannot be combined with sharing a peer's network.
///
/// Runs before any container lookup.
///
/// # Errors
///
/// [`BockError::Conflict`] for publish, hostname, dns or add-host,
/// [`BockError::Unsupported`] off Linux, and [`BockError::InvalidNetwork`]
/// when more than one network was requested.
pub fn check_peer_options(flags: &NetFlags, platform: Platform) -> BockResult<()> {
    if !flags.publish.is_empty() {
        return Err(BockError::conflict(
            "port publishing and the container type network mode",
        ));
    }
    if flags.hostname.is_some() {
        return Err(BockError::conflict("hostname and the network mode"));
    }
    if !flags.dns.is_empty() {
        return Err(BockError::conflict("dns and the network mode"));
    }
    if !flags.add_host.is_empty() {
        return Err(BockError::conflict(
            "custom host-to-IP mapping and the network mode",
        ));
    }
    if !platform.is_linux() {
        return Err(BockError::Unsupported {
            feature: "--network=container:<container>".to_string(),
        });
    }
    if flags.network_tokens().len() > 1 {
        return Err(BockError::invalid_network(
            "only one network allowed using '--network=container:<container>'",
        ));
    }
    Ok(())
}

/// A running container whose network is to be shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTarget {
    /// Full ID of the peer.
    pub id: String,
    /// Path of the peer's network namespace.
    pub netns_path: PathBuf,
    /// Hostname from the peer's spec.
    pub hostname: Option<String>,
    /// The peer's hosts file.
    pub hosts_path: PathBuf,
    /// The peer's resolv.conf.
    pub resolv_conf_path: PathBuf,
    /// The peer's hostname file.
    pub hostname_path: PathBuf,
}

impl PeerTarget {
    /// Spec edits that make a container share this peer's network.
    ///
    /// The namespace join comes first; the hostname is only set when the peer
    /// has one.
    #[must_use]
    pub fn mutations(&self) -> Vec<SpecMutation> {
        let mut mutations = vec![
            SpecMutation::JoinNamespace {
                ns_type: NamespaceType::Network,
                path: self.netns_path.clone(),
            },
            SpecMutation::custom_resolv_conf(&self.resolv_conf_path),
            SpecMutation::custom_hosts(&self.hosts_path),
        ];
        if let Some(hostname) = &self.hostname {
            mutations.push(SpecMutation::Hostname(hostname.clone()));
        }
        mutations.push(SpecMutation::custom_hostname_file(&self.hostname_path));
        mutations
    }
}

/// Resolves `container:<ref>` references in one namespace.
pub struct PeerResolver<'a> {
    client: &'a dyn ContainerClient,
    paths: &'a BockPaths,
    namespace: &'a str,
}

impl<'a> PeerResolver<'a> {
    /// Create a resolver.
    pub fn new(client: &'a dyn ContainerClient, paths: &'a BockPaths, namespace: &'a str) -> Self {
        Self {
            client,
            paths,
            namespace,
        }
    }

    /// Resolve `reference` to a running peer.
    ///
    /// # Errors
    ///
    /// [`BockError::ContainerNotFound`], [`BockError::AmbiguousContainer`],
    /// [`BockError::ContainerNotRunning`], or a client failure.
    pub fn resolve(&self, reference: &str) -> BockResult<PeerTarget> {
        let matches = find_containers(self.client, reference)?;
        let found = match matches.as_slice() {
            [] => {
                return Err(BockError::ContainerNotFound {
                    id: reference.to_string(),
                });
            }
            [one] => one,
            many => {
                return Err(BockError::AmbiguousContainer {
                    reference: reference.to_string(),
                    matches: many.len(),
                });
            }
        };

        let task = self.client.task(&found.id)?;
        let pid = match task.pid {
            Some(pid) if task.status.is_running() => pid,
            _ => {
                return Err(BockError::ContainerNotRunning {
                    id: found.id.clone(),
                });
            }
        };

        let spec = self.client.spec(&found.id)?;
        let hosts = HostsStore::from_paths(self.paths);

        let target = PeerTarget {
            id: found.id.clone(),
            netns_path: netns_path(pid),
            hostname: spec.hostname,
            hosts_path: hosts.path(self.namespace, &found.id),
            resolv_conf_path: self.paths.container_resolv_conf(self.namespace, &found.id),
            hostname_path: self.paths.container_hostname(self.namespace, &found.id),
        };

        tracing::debug!(
            reference,
            container_id = %target.id,
            pid,
            "Resolved peer container network"
        );

        Ok(target)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeClient;
    use super::*;

    fn paths() -> BockPaths {
        BockPaths::with_root("/var/lib/bock")
    }

    #[test]
    fn names_are_not_prefix_matched() {
        let client = FakeClient::default()
            .with("1111aaaa", Some("web1"), Some(10), ContainerStatus::Running)
            .with("2222bbbb", Some("web2"), Some(11), ContainerStatus::Running);
        let paths = paths();
        let err = PeerResolver::new(&client, &paths, "default")
            .resolve("web")
            .unwrap_err();
        assert!(matches!(err, BockError::ContainerNotFound { .. }));
        assert!(err.to_string().contains("No such container: web"));
    }

    #[test]
    fn ambiguous_id_prefix() {
        let client = FakeClient::default()
            .with("web1aaaa", None, Some(10), ContainerStatus::Running)
            .with("web2bbbb", None, Some(11), ContainerStatus::Running);
        let paths = paths();
        let err = PeerResolver::new(&client, &paths, "default")
            .resolve("web")
            .unwrap_err();
        assert!(matches!(
            err,
            BockError::AmbiguousContainer { matches: 2, .. }
        ));
    }

    #[test]
    fn exact_id_beats_prefix() {
        let client = FakeClient::default()
            .with("abc", None, Some(10), ContainerStatus::Running)
            .with("abcdef", None, Some(11), ContainerStatus::Running);
        let found = find_containers(&client, "abc").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "abc");
    }

    #[test]
    fn stopped_peer_is_rejected_until_running() {
        let paths = paths();
        let stopped =
            FakeClient::default().with("c0ffee00", Some("db"), None, ContainerStatus::Stopped);
        let err = PeerResolver::new(&stopped, &paths, "default")
            .resolve("db")
            .unwrap_err();
        assert!(matches!(err, BockError::ContainerNotRunning { ref id } if id == "c0ffee00"));
        assert!(err.to_string().contains("should be running"));

        let running =
            FakeClient::default().with("c0ffee00", Some("db"), Some(4242), ContainerStatus::Running);
        let target = PeerResolver::new(&running, &paths, "default")
            .resolve("db")
            .unwrap();
        assert_eq!(target.netns_path, PathBuf::from("/proc/4242/ns/net"));
    }

    #[test]
    fn target_paths_come_from_peer_state_dir() {
        let paths = paths();
        let client =
            FakeClient::default().with("c0ffee00", Some("db"), Some(7), ContainerStatus::Running);
        let target = PeerResolver::new(&client, &paths, "ns1")
            .resolve("c0f")
            .unwrap();

        assert_eq!(target.id, "c0ffee00");
        assert_eq!(target.hostname.as_deref(), Some("db-host"));
        assert_eq!(
            target.hosts_path,
            PathBuf::from("/var/lib/bock/etchosts/ns1/c0ffee00/hosts")
        );
        assert_eq!(
            target.resolv_conf_path,
            PathBuf::from("/var/lib/bock/containers/ns1/c0ffee00/resolv.conf")
        );
        assert_eq!(
            target.hostname_path,
            PathBuf::from("/var/lib/bock/containers/ns1/c0ffee00/hostname")
        );

        let mutations = target.mutations();
        assert!(matches!(
            mutations[0],
            SpecMutation::JoinNamespace { ns_type: NamespaceType::Network, .. }
        ));
        assert_eq!(mutations[3], SpecMutation::Hostname("db-host".to_string()));
        assert_eq!(mutations.len(), 5);
    }

    #[test]
    fn conflicting_options() {
        let cases = [
            NetFlags {
                publish: vec!["8080:80".to_string()],
                ..Default::default()
            },
            NetFlags {
                hostname: Some("h".to_string()),
                ..Default::default()
            },
            NetFlags {
                dns: vec!["1.1.1.1".to_string()],
                ..Default::default()
            },
            NetFlags {
                add_host: vec!["db:10.0.0.2".to_string()],
                ..Default::default()
            },
        ];
        for flags in cases {
            let err = check_peer_options(&flags, Platform::Linux).unwrap_err();
            assert!(matches!(err, BockError::Conflict { .. }), "{flags:?}");
        }
    }

    #[test]
    fn peer_mode_requires_linux() {
        let flags = NetFlags {
            network: vec!["container:web".to_string()],
            ..Default::default()
        };
        check_peer_options(&flags, Platform::Linux).unwrap();
        assert!(matches!(
            check_peer_options(&flags, Platform::Other),
            Err(BockError::Unsupported { .. })
        ));
    }
}
