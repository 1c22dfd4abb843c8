//! Container state persistence and lookup.
//!
//! Each container has a directory under `<root>/containers/<namespace>/`
//! holding `state.json` and the runtime spec `config.json`.

use std::path::{Path, PathBuf};

use bock_common::{BockError, BockPaths, BockResult, labels};
use bock_network::{ContainerClient, ContainerSummary, TaskInfo};
use bock_oci::state::ContainerStatus;
use bock_oci::{ContainerState, Spec};

/// Container store over the state directory of one namespace.
#[derive(Debug)]
pub struct StateClient {
    paths: BockPaths,
    namespace: String,
}

impl StateClient {
    /// Create a client for `namespace`.
    pub fn new(paths: BockPaths, namespace: impl Into<String>) -> Self {
        Self {
            paths,
            namespace: namespace.into(),
        }
    }

    /// Get the path to a container's state file.
    #[must_use]
    pub fn state_path(&self, container_id: &str) -> PathBuf {
        self.paths.container_state(&self.namespace, container_id)
    }

    /// Get the path to a container's runtime spec.
    #[must_use]
    pub fn config_path(&self, container_id: &str) -> PathBuf {
        self.paths.container_config(&self.namespace, container_id)
    }

    /// Save container state and spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn save(&self, state: &ContainerState, spec: &Spec) -> BockResult<()> {
        let state_path = self.state_path(&state.id);
        if let Some(parent) = state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(self.config_path(&state.id), serde_json::to_string_pretty(spec)?)?;
        std::fs::write(&state_path, serde_json::to_string_pretty(state)?)?;

        tracing::debug!(
            container_id = %state.id,
            path = %state_path.display(),
            "Saved container state"
        );

        Ok(())
    }

    /// Load container state.
    ///
    /// # Errors
    ///
    /// [`BockError::ContainerNotFound`] if there is no state file.
    pub fn load(&self, container_id: &str) -> BockResult<ContainerState> {
        let path = self.state_path(container_id);

        if !path.exists() {
            return Err(BockError::ContainerNotFound {
                id: container_id.to_string(),
            });
        }

        let json = std::fs::read_to_string(&path)?;
        let state: ContainerState = serde_json::from_str(&json)?;

        tracing::debug!(
            container_id = %container_id,
            path = %path.display(),
            "Loaded container state"
        );

        Ok(state)
    }

    /// IDs of all containers in the namespace, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be read.
    pub fn list(&self) -> BockResult<Vec<String>> {
        let dir = self.paths.namespace_containers(&self.namespace);
        let mut containers = Vec::new();

        if !dir.exists() {
            return Ok(containers);
        }

        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().join("state.json").is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    containers.push(name.to_string());
                }
            }
        }
        containers.sort();

        Ok(containers)
    }

    /// States of all containers in the namespace, with liveness applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a state file cannot be read.
    pub fn states(&self) -> BockResult<Vec<ContainerState>> {
        self.list()?
            .iter()
            .map(|id| self.load(id).map(refresh_status))
            .collect()
    }

    /// Remove a container's state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self, container_id: &str) -> BockResult<()> {
        let container_dir = self.paths.container(&self.namespace, container_id);

        if container_dir.exists() {
            std::fs::remove_dir_all(&container_dir)?;
            tracing::debug!(
                container_id = %container_id,
                path = %container_dir.display(),
                "Deleted container state"
            );
        }

        Ok(())
    }

    /// Container currently holding `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the states cannot be read.
    pub fn find_by_name(&self, name: &str) -> BockResult<Option<String>> {
        Ok(self
            .states()?
            .into_iter()
            .find(|s| s.annotation(labels::NAME) == Some(name))
            .map(|s| s.id))
    }
}

/// A state recorded as running whose process has exited is stopped.
fn refresh_status(mut state: ContainerState) -> ContainerState {
    if let (ContainerStatus::Running, Some(pid)) = (state.status, state.pid) {
        if !process_alive(pid) {
            state.set_stopped();
        }
    }
    state
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

impl ContainerClient for StateClient {
    fn containers(&self) -> BockResult<Vec<ContainerSummary>> {
        Ok(self
            .states()?
            .into_iter()
            .map(|state| ContainerSummary {
                name: state.annotation(labels::NAME).map(ToString::to_string),
                id: state.id,
            })
            .collect())
    }

    fn task(&self, id: &str) -> BockResult<TaskInfo> {
        let state = refresh_status(self.load(id)?);
        Ok(TaskInfo {
            pid: state.pid,
            status: state.status,
        })
    }

    fn spec(&self, id: &str) -> BockResult<Spec> {
        let path = self.config_path(id);
        if !path.exists() {
            return Err(BockError::ContainerNotFound { id: id.to_string() });
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
