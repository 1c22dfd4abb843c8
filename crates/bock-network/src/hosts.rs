//! Per-container `/etc/hosts` files.
//!
//! Files live at `<root>/etchosts/<namespace>/<id>/hosts`. They are allocated
//! empty at creation time and filled once the container has an address.

use std::path::PathBuf;

use bock_common::{BockPaths, BockResult};

/// Store of per-container hosts files.
#[derive(Debug, Clone)]
pub struct HostsStore {
    root: PathBuf,
}

impl HostsStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the standard Bock paths.
    #[must_use]
    pub fn from_paths(paths: &BockPaths) -> Self {
        Self::new(paths.etchosts())
    }

    /// Path of a container's hosts file, whether or not it exists.
    #[must_use]
    pub fn path(&self, namespace: &str, id: &str) -> PathBuf {
        self.root.join(namespace).join(id).join("hosts")
    }

    /// Create an empty hosts file for a container and return its path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be created.
    pub fn allocate(&self, namespace: &str, id: &str) -> BockResult<PathBuf> {
        let path = self.path(namespace, id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, "")?;

        tracing::debug!(
            container_id = %id,
            path = %path.display(),
            "Allocated hosts file"
        );

        Ok(path)
    }
}
