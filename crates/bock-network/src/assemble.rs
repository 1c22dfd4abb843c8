//! Network attachment for a container being created.
//!
//! [`assemble`] turns the raw networking flags into the spec edits, the
//! normalized network list and the port mappings that `create` persists.

use bock_common::{BockError, BockPaths, BockResult};
use bock_oci::opts::SpecMutation;
use bock_oci::runtime::NamespaceType;

use crate::cni::CniEnv;
use crate::dns::{self, ResolvSource, RootlessDns};
use crate::flags::NetFlags;
use crate::hosts::HostsStore;
use crate::mac::MacAddress;
use crate::nettype::{self, NetworkMode};
use crate::peer::{self, ContainerClient, PeerResolver, PeerTarget};
use crate::platform::Platform;
use crate::portmap::{self, PortMapping};

/// Everything the assembler needs besides the flags.
pub struct NetContext<'a> {
    /// Bock state directories.
    pub paths: &'a BockPaths,
    /// Namespace of the new container.
    pub namespace: &'a str,
    /// ID of the new container.
    pub container_id: &'a str,
    /// CNI directories.
    pub cni: &'a CniEnv,
    /// Runtime view used to find peer containers.
    pub client: &'a dyn ContainerClient,
    /// Host resolver configuration.
    pub host_resolv: &'a dyn ResolvSource,
    /// Rootless DNS proxy, if any.
    pub rootless: &'a RootlessDns,
    /// Platform being targeted.
    pub platform: Platform,
}

/// How the container is attached, once references are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAttachment {
    /// Own empty network namespace.
    Isolated,
    /// The host's network namespace.
    Host,
    /// CNI-managed networks.
    Managed {
        /// Validated network names.
        networks: Vec<String>,
        /// Requested MAC address.
        mac: Option<MacAddress>,
    },
    /// Another container's network namespace.
    Peer(PeerTarget),
}

/// Result of [`assemble`].
#[derive(Debug, Clone)]
pub struct NetworkSetup {
    /// Resolved attachment.
    pub attachment: NetworkAttachment,
    /// Spec edits, in application order.
    pub mutations: Vec<SpecMutation>,
    /// Network tokens to persist; `container:<id>` for a peer.
    pub networks: Vec<String>,
    /// Requested static IP.
    pub ip: Option<String>,
    /// Published ports (managed networks on Linux only).
    pub ports: Vec<PortMapping>,
    /// Requested MAC address, canonicalized (managed networks only).
    pub mac_address: Option<String>,
}

/// Resolve the networking of a new container.
///
/// Mutations come out in a fixed order: namespace join, resolv.conf mount,
/// hosts mount, hostname with its file mount, then host namespace and host
/// files.
///
/// # Errors
///
/// Any classification, validation, lookup or I/O failure; nothing is
/// returned partially.
pub fn assemble(flags: &NetFlags, ctx: &NetContext<'_>) -> BockResult<NetworkSetup> {
    let tokens = flags.network_tokens();
    let ip = flags.ip_address().map(ToString::to_string);
    if ip.is_some() && tokens.is_empty() {
        tracing::warn!(
            network = nettype::DEFAULT_NETWORK,
            "--ip given without --network, using the default network"
        );
    }

    let mode = nettype::classify(&tokens)?;
    let mac = MacAddress::parse_flag(flags.mac_address.as_deref())?;

    let setup = match mode {
        NetworkMode::Isolated => {
            if mac.is_some() {
                tracing::debug!("Ignoring --mac-address for a container without networking");
            }
            NetworkSetup {
                attachment: NetworkAttachment::Isolated,
                mutations: Vec::new(),
                networks: tokens,
                ip,
                ports: Vec::new(),
                mac_address: None,
            }
        }
        NetworkMode::HostShared => {
            if mac.is_some() {
                return Err(BockError::conflict("mac-address and the network mode host"));
            }
            NetworkSetup {
                attachment: NetworkAttachment::Host,
                mutations: vec![
                    SpecMutation::HostNamespace {
                        ns_type: NamespaceType::Network,
                    },
                    SpecMutation::host_hosts_file(),
                    SpecMutation::host_resolv_conf(),
                ],
                networks: tokens,
                ip,
                ports: Vec::new(),
                mac_address: None,
            }
        }
        NetworkMode::Managed(networks) => managed(flags, ctx, networks, mac, ip)?,
        NetworkMode::PeerShared(reference) => {
            if mac.is_some() {
                return Err(BockError::conflict(
                    "mac-address and the container type network mode",
                ));
            }
            peer::check_peer_options(flags, ctx.platform)?;
            let target =
                PeerResolver::new(ctx.client, ctx.paths, ctx.namespace).resolve(&reference)?;
            NetworkSetup {
                mutations: target.mutations(),
                networks: vec![nettype::container_token(&target.id)],
                attachment: NetworkAttachment::Peer(target),
                ip,
                ports: Vec::new(),
                mac_address: None,
            }
        }
    };

    tracing::debug!(
        container_id = %ctx.container_id,
        networks = ?setup.networks,
        mutations = setup.mutations.len(),
        "Assembled network attachment"
    );

    Ok(setup)
}

fn managed(
    flags: &NetFlags,
    ctx: &NetContext<'_>,
    networks: Vec<String>,
    mac: Option<MacAddress>,
    ip: Option<String>,
) -> BockResult<NetworkSetup> {
    let store = ctx.cni.network_store()?;
    store.validate(&networks, mac.as_ref())?;

    let mut ports = Vec::new();
    let mut mutations = Vec::new();
    if ctx.platform.is_linux() {
        ports = portmap::parse_all(&flags.publish)?;

        let resolv_path = ctx
            .paths
            .container_resolv_conf(ctx.namespace, ctx.container_id);
        let written = dns::synthesize(
            &resolv_path,
            &flags.dns_options(),
            ctx.host_resolv,
            ctx.rootless,
        )?;
        mutations.push(SpecMutation::custom_resolv_conf(written));

        let hosts_path =
            HostsStore::from_paths(ctx.paths).allocate(ctx.namespace, ctx.container_id)?;
        mutations.push(SpecMutation::custom_hosts(hosts_path));
    }

    Ok(NetworkSetup {
        mac_address: mac.as_ref().map(ToString::to_string),
        attachment: NetworkAttachment::Managed {
            networks: networks.clone(),
            mac,
        },
        mutations,
        networks,
        ip,
        ports,
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use bock_oci::state::ContainerStatus;

    use super::*;
    use crate::peer::testing::FakeClient;

    struct StaticHost(&'static str);

    impl ResolvSource for StaticHost {
        fn read(&self) -> io::Result<String> {
            Ok(self.0.to_string())
        }
    }

    static HOST: StaticHost = StaticHost("nameserver 192.168.1.1\nsearch lan\n");
    const ID: &str = "0123456789ab";

    struct Fixture {
        _temp: tempfile::TempDir,
        paths: BockPaths,
        cni: CniEnv,
        client: FakeClient,
        rootless: RootlessDns,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().unwrap();
            let netconf = temp.path().join("net.d");
            std::fs::create_dir_all(&netconf).unwrap();
            std::fs::write(
                netconf.join("10-ov.conflist"),
                r#"{"cniVersion":"1.0.0","name":"ov0","plugins":[{"type":"overlay"}]}"#,
            )
            .unwrap();
            Self {
                paths: BockPaths::with_root(temp.path().join("root")),
                cni: CniEnv::new(temp.path().join("bin"), netconf),
                client: FakeClient::default().with(
                    "feedface0000",
                    Some("web"),
                    Some(321),
                    ContainerStatus::Running,
                ),
                rootless: RootlessDns::Disabled,
                _temp: temp,
            }
        }

        fn ctx(&self, platform: Platform) -> NetContext<'_> {
            NetContext {
                paths: &self.paths,
                namespace: "default",
                container_id: ID,
                cni: &self.cni,
                client: &self.client,
                host_resolv: &HOST,
                rootless: &self.rootless,
                platform,
            }
        }
    }

    fn network(tokens: &[&str]) -> NetFlags {
        NetFlags {
            network: tokens.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn default_network_writes_resolv_conf_and_hosts() {
        let fx = Fixture::new();
        let flags = NetFlags {
            publish: vec!["8080:80".to_string()],
            mac_address: Some("02-42-AC-11-00-02".to_string()),
            ..Default::default()
        };

        let setup = assemble(&flags, &fx.ctx(Platform::Linux)).unwrap();

        assert_eq!(setup.networks, vec!["bridge"]);
        assert_eq!(setup.ports, vec![PortMapping::tcp(8080, 80)]);
        assert_eq!(setup.mac_address.as_deref(), Some("02:42:ac:11:00:02"));

        let resolv = fx.paths.container_resolv_conf("default", ID);
        let hosts = fx.paths.etchosts().join("default").join(ID).join("hosts");
        assert_eq!(
            setup.mutations,
            vec![
                SpecMutation::custom_resolv_conf(&resolv),
                SpecMutation::custom_hosts(&hosts),
            ]
        );
        assert_eq!(
            std::fs::read_to_string(resolv).unwrap(),
            "search lan\nnameserver 192.168.1.1\n"
        );
        assert!(hosts.is_file());
    }

    #[test]
    fn non_linux_skips_resolv_conf() {
        let fx = Fixture::new();
        let setup = assemble(&NetFlags::default(), &fx.ctx(Platform::Other)).unwrap();
        assert!(setup.mutations.is_empty());
        assert!(!fx.paths.container_resolv_conf("default", ID).exists());
    }

    #[test]
    fn mac_on_incapable_network_names_it() {
        let fx = Fixture::new();
        let flags = NetFlags {
            mac_address: Some("02:42:ac:11:00:02".to_string()),
            ..network(&["ov0"])
        };
        let err = assemble(&flags, &fx.ctx(Platform::Linux)).unwrap_err();
        assert!(err.to_string().contains("ov0"));
        assert!(err.to_string().contains("overlay"));
        assert!(!fx.paths.container_resolv_conf("default", ID).exists());
    }

    #[test]
    fn unknown_network_fails() {
        let fx = Fixture::new();
        let err = assemble(&network(&["nope"]), &fx.ctx(Platform::Linux)).unwrap_err();
        assert!(matches!(err, BockError::NetworkNotFound { ref name } if name == "nope"));
    }

    #[test]
    fn host_mode_mutations() {
        let fx = Fixture::new();
        let setup = assemble(&network(&["host"]), &fx.ctx(Platform::Linux)).unwrap();
        assert_eq!(setup.attachment, NetworkAttachment::Host);
        assert_eq!(
            setup.mutations,
            vec![
                SpecMutation::HostNamespace {
                    ns_type: NamespaceType::Network
                },
                SpecMutation::host_hosts_file(),
                SpecMutation::host_resolv_conf(),
            ]
        );
    }

    #[test]
    fn mac_conflicts_with_host_but_not_none() {
        let fx = Fixture::new();
        let mac = Some("02:42:ac:11:00:02".to_string());

        let host = NetFlags {
            mac_address: mac.clone(),
            ..network(&["host"])
        };
        assert!(matches!(
            assemble(&host, &fx.ctx(Platform::Linux)),
            Err(BockError::Conflict { .. })
        ));

        let none = NetFlags {
            mac_address: mac,
            ..network(&["none"])
        };
        let setup = assemble(&none, &fx.ctx(Platform::Linux)).unwrap();
        assert_eq!(setup.attachment, NetworkAttachment::Isolated);
        assert!(setup.mutations.is_empty());
        assert!(setup.mac_address.is_none());
    }

    #[test]
    fn invalid_mac_is_rejected() {
        let fx = Fixture::new();
        let flags = NetFlags {
            mac_address: Some("02:42:zz:11:00:02".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            assemble(&flags, &fx.ctx(Platform::Linux)),
            Err(BockError::InvalidMacAddress { .. })
        ));
    }

    #[test_log::test]
    fn peer_mode_rewrites_token_and_orders_mutations() {
        let fx = Fixture::new();
        let setup = assemble(&network(&["container:web"]), &fx.ctx(Platform::Linux)).unwrap();

        assert_eq!(setup.networks, vec!["container:feedface0000"]);
        assert!(setup.ports.is_empty());
        assert_eq!(
            setup.mutations[0],
            SpecMutation::JoinNamespace {
                ns_type: NamespaceType::Network,
                path: PathBuf::from("/proc/321/ns/net"),
            }
        );
        assert_eq!(
            setup.mutations[1],
            SpecMutation::custom_resolv_conf(
                fx.paths.container_resolv_conf("default", "feedface0000")
            )
        );
        assert_eq!(
            setup.mutations[3],
            SpecMutation::Hostname("web-host".to_string())
        );
    }

    #[test]
    fn peer_conflict_checked_before_lookup() {
        let fx = Fixture::new();
        let flags = NetFlags {
            publish: vec!["8080:80".to_string()],
            ..network(&["container:web"])
        };
        let err = assemble(&flags, &fx.ctx(Platform::Linux)).unwrap_err();
        assert!(matches!(err, BockError::Conflict { .. }));
        assert_eq!(fx.client.list_calls.get(), 0);
    }

    #[test]
    fn peer_mode_unsupported_off_linux() {
        let fx = Fixture::new();
        let err = assemble(&network(&["container:web"]), &fx.ctx(Platform::Other)).unwrap_err();
        assert!(matches!(err, BockError::Unsupported { .. }));
        assert_eq!(fx.client.list_calls.get(), 0);
    }

    /// Log sink shared with a `fmt` subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(ToString::to_string)
                .collect()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn ip_without_network_warns_and_uses_default() {
        let fx = Fixture::new();
        let flags = NetFlags {
            ip: Some("10.4.0.20".to_string()),
            ..Default::default()
        };

        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let setup = tracing::subscriber::with_default(subscriber, || {
            assemble(&flags, &fx.ctx(Platform::Linux))
        })
        .unwrap();

        assert_eq!(setup.networks, vec!["bridge"]);
        assert_eq!(setup.ip.as_deref(), Some("10.4.0.20"));

        let lines = logs.lines();
        let warning = lines
            .iter()
            .find(|line| line.contains("--ip given without --network"))
            .unwrap_or_else(|| panic!("no warning in {lines:#?}"));
        assert!(warning.contains("WARN"), "{warning}");
    }

    #[test]
    fn ip_with_network_does_not_warn() {
        let fx = Fixture::new();
        let flags = NetFlags {
            ip: Some("10.4.0.20".to_string()),
            ..network(&["bridge"])
        };

        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assemble(&flags, &fx.ctx(Platform::Linux))
        })
        .unwrap();

        assert!(logs.lines().iter().all(|line| !line.contains("WARN")));
    }

    #[test]
    fn publish_is_parsed_only_on_linux() {
        let fx = Fixture::new();
        let flags = NetFlags {
            publish: vec!["80".to_string()],
            ..Default::default()
        };

        let setup = assemble(&flags, &fx.ctx(Platform::Other)).unwrap();
        assert!(setup.ports.is_empty());

        let err = assemble(&flags, &fx.ctx(Platform::Linux)).unwrap_err();
        assert!(matches!(err, BockError::InvalidPortMapping { .. }));
    }
}
