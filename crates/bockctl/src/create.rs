//! `bockctl create`: persist a new container with its networking resolved.

use std::collections::HashMap;

use bock_common::{BockError, BockResult, ContainerId, labels};
use bock_network::{
    HostResolvConf, NetContext, NetFlags, NetworkAttachment, NetworkSetup, Platform, RootlessDns,
    assemble,
};
use bock_oci::{ContainerState, Spec, SpecMutation, apply_all};

use crate::client::StateClient;
use crate::config::RuntimeConfig;

/// A create request.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// `--name`.
    pub name: Option<String>,
    /// Networking flags.
    pub net: NetFlags,
}

/// Environment the container is created in.
pub struct CreateEnv<'a> {
    /// Runtime configuration.
    pub config: &'a RuntimeConfig,
    /// Host resolver configuration.
    pub host_resolv: &'a HostResolvConf,
    /// Rootless DNS mode.
    pub rootless: &'a RootlessDns,
    /// Target platform.
    pub platform: Platform,
}

/// Create a container and return its persisted state.
///
/// On failure, files already written for the container are removed.
///
/// # Errors
///
/// Invalid or taken names, any network resolution failure, or I/O errors.
pub fn create(request: &CreateRequest, env: &CreateEnv<'_>) -> BockResult<ContainerState> {
    let config = env.config;
    let client = StateClient::new(config.paths.clone(), config.namespace.clone());

    if let Some(name) = &request.name {
        ContainerId::validate(name)?;
        if let Some(id) = client.find_by_name(name)? {
            return Err(BockError::NameInUse {
                name: name.clone(),
                id,
            });
        }
    }

    let id = ContainerId::generate();
    let result = persist(request, env, &client, &id);
    if result.is_err() {
        cleanup(env, &client, id.as_str());
    }
    result
}

fn persist(
    request: &CreateRequest,
    env: &CreateEnv<'_>,
    client: &StateClient,
    container_id: &ContainerId,
) -> BockResult<ContainerState> {
    let config = env.config;
    let id = container_id.as_str();
    let ctx = NetContext {
        paths: &config.paths,
        namespace: &config.namespace,
        container_id: id,
        cni: &config.cni,
        client,
        host_resolv: env.host_resolv,
        rootless: env.rootless,
        platform: env.platform,
    };
    let setup = assemble(&request.net, &ctx)?;

    let mut spec = Spec::linux_default();
    apply_all(&mut spec, &setup.mutations);

    // Peers already carry their hostname; everything else gets its own.
    let hostname = if matches!(setup.attachment, NetworkAttachment::Peer(_)) {
        spec.hostname.clone()
    } else {
        let hostname = request
            .net
            .hostname
            .clone()
            .unwrap_or_else(|| container_id.short().to_string());
        let path = config.paths.container_hostname(&config.namespace, id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, format!("{hostname}\n"))?;
        apply_all(
            &mut spec,
            &[
                SpecMutation::Hostname(hostname.clone()),
                SpecMutation::custom_hostname_file(path),
            ],
        );
        Some(hostname)
    };

    let annotations = annotations(request, &config.namespace, &setup, hostname.as_deref())?;
    spec.annotations.clone_from(&annotations);

    let mut state = ContainerState::new(id, config.paths.container(&config.namespace, id));
    state.annotations = annotations;
    state.set_created();
    client.save(&state, &spec)?;

    tracing::info!(
        container_id = %id,
        name = request.name.as_deref().unwrap_or_default(),
        networks = ?setup.networks,
        "Created container"
    );

    Ok(state)
}

fn annotations(
    request: &CreateRequest,
    namespace: &str,
    setup: &NetworkSetup,
    hostname: Option<&str>,
) -> BockResult<HashMap<String, String>> {
    let mut annotations = HashMap::new();
    let mut set = |key: &str, value: String| {
        annotations.insert(key.to_string(), value);
    };

    set(labels::NAMESPACE, namespace.to_string());
    set(labels::NETWORKS, serde_json::to_string(&setup.networks)?);
    if let Some(name) = &request.name {
        set(labels::NAME, name.clone());
    }
    if !setup.ports.is_empty() {
        set(labels::PORTS, serde_json::to_string(&setup.ports)?);
    }
    if let Some(ip) = &setup.ip {
        set(labels::IP_ADDRESS, ip.clone());
    }
    if let Some(mac) = &setup.mac_address {
        set(labels::MAC_ADDRESS, mac.clone());
    }
    if !request.net.add_host.is_empty() {
        set(labels::EXTRA_HOSTS, serde_json::to_string(&request.net.add_host)?);
    }
    if let Some(hostname) = hostname {
        set(labels::HOSTNAME, hostname.to_string());
    }

    Ok(annotations)
}

fn cleanup(env: &CreateEnv<'_>, client: &StateClient, id: &str) {
    let hosts_dir = env
        .config
        .paths
        .etchosts()
        .join(&env.config.namespace)
        .join(id);
    let removed = client.delete(id).and_then(|()| {
        if hosts_dir.exists() {
            std::fs::remove_dir_all(&hosts_dir)?;
        }
        Ok(())
    });
    if let Err(e) = removed {
        tracing::warn!(container_id = %id, error = %e, "Failed to clean up container files");
    }
}

#[cfg(test)]
mod tests {
    use bock_network::ContainerClient;
    use bock_oci::runtime::NamespaceType;

    use super::*;

    struct Fixture {
        _temp: tempfile::TempDir,
        config: RuntimeConfig,
        host: HostResolvConf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().unwrap();
            let host_path = temp.path().join("resolv.conf");
            std::fs::write(&host_path, "nameserver 10.10.0.1\n").unwrap();
            Self {
                config: RuntimeConfig::default()
                    .with_root(temp.path().join("root"))
                    .with_netconf_path(temp.path().join("net.d")),
                host: HostResolvConf::new(host_path),
                _temp: temp,
            }
        }

        fn create(&self, request: &CreateRequest) -> BockResult<ContainerState> {
            create(
                request,
                &CreateEnv {
                    config: &self.config,
                    host_resolv: &self.host,
                    rootless: &RootlessDns::Disabled,
                    platform: Platform::Linux,
                },
            )
        }

        fn client(&self) -> StateClient {
            StateClient::new(self.config.paths.clone(), "default")
        }
    }

    fn named(name: &str, net: NetFlags) -> CreateRequest {
        CreateRequest {
            name: Some(name.to_string()),
            net,
        }
    }

    #[test_log::test]
    fn create_records_network_labels() {
        let fx = Fixture::new();
        let state = fx
            .create(&named(
                "web",
                NetFlags {
                    publish: vec!["8080:80".to_string()],
                    ip: Some("10.4.0.9".to_string()),
                    add_host: vec!["db:10.4.0.2".to_string()],
                    ..Default::default()
                },
            ))
            .unwrap();

        assert_eq!(state.status.to_string(), "created");
        assert_eq!(state.annotation(labels::NAME), Some("web"));
        assert_eq!(state.annotation(labels::NETWORKS), Some(r#"["bridge"]"#));
        assert_eq!(state.annotation(labels::IP_ADDRESS), Some("10.4.0.9"));
        assert_eq!(
            state.annotation(labels::EXTRA_HOSTS),
            Some(r#"["db:10.4.0.2"]"#)
        );
        let ports: serde_json::Value =
            serde_json::from_str(state.annotation(labels::PORTS).unwrap()).unwrap();
        assert_eq!(ports[0]["hostPort"], 8080);

        let short = &state.id[..12];
        assert_eq!(state.annotation(labels::HOSTNAME), Some(short));

        let spec = fx.client().spec(&state.id).unwrap();
        assert_eq!(spec.hostname.as_deref(), Some(short));
        assert!(spec.mount_at("/etc/resolv.conf").is_some());
        assert!(spec.mount_at("/etc/hosts").is_some());
        let hostname_file = spec.mount_at("/etc/hostname").unwrap().source.clone().unwrap();
        assert_eq!(
            std::fs::read_to_string(hostname_file).unwrap(),
            format!("{short}\n")
        );
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let fx = Fixture::new();
        fx.create(&named("web", NetFlags::default())).unwrap();
        let err = fx.create(&named("web", NetFlags::default())).unwrap_err();
        assert!(matches!(err, BockError::NameInUse { .. }));
    }

    #[test]
    fn unusable_names_are_rejected() {
        let fx = Fixture::new();
        for name in ["", "web:1", "../x", "-web"] {
            let err = fx.create(&named(name, NetFlags::default())).unwrap_err();
            assert!(
                matches!(err, BockError::InvalidContainerId { .. }),
                "{name:?}: {err}"
            );
        }
        assert!(fx.client().list().unwrap().is_empty());
        assert!(!fx.config.paths.etchosts().exists());
    }

    #[test]
    fn failed_create_leaves_nothing_behind() {
        let fx = Fixture::new();
        let err = fx
            .create(&named(
                "web",
                NetFlags {
                    publish: vec!["80".to_string()],
                    ..Default::default()
                },
            ))
            .unwrap_err();
        assert!(matches!(err, BockError::InvalidPortMapping { .. }));
        assert!(fx.client().list().unwrap().is_empty());

        let etchosts = fx.config.paths.etchosts().join("default");
        let leftover = std::fs::read_dir(&etchosts)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[test]
    fn peer_requires_running_container() {
        let fx = Fixture::new();
        let db = fx.create(&named("db", NetFlags::default())).unwrap();

        let peer = named(
            "app",
            NetFlags {
                network: vec!["container:db".to_string()],
                ..Default::default()
            },
        );
        let err = fx.create(&peer).unwrap_err();
        assert!(matches!(err, BockError::ContainerNotRunning { .. }));

        let client = fx.client();
        let mut running = client.load(&db.id).unwrap();
        running.set_running(std::process::id());
        let db_spec = client.spec(&db.id).unwrap();
        client.save(&running, &db_spec).unwrap();

        let app = fx.create(&peer).unwrap();
        assert_eq!(
            app.annotation(labels::NETWORKS).unwrap(),
            format!(r#"["container:{}"]"#, db.id)
        );
        let spec = client.spec(&app.id).unwrap();
        assert_eq!(
            spec.namespace(NamespaceType::Network).unwrap().path,
            Some(format!("/proc/{}/ns/net", std::process::id()).into())
        );
        assert_eq!(spec.hostname, db_spec.hostname);
        assert!(!fx.config.paths.container_hostname("default", &app.id).exists());
    }
}
