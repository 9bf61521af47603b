use std::sync::Arc;

use tracing::{error, info, warn};

use modelator_core::config::ContainerConfig;
use modelator_core::{ModelatorError, Result};

use super::runtime::ContainerRuntime;

/// A created and started container.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    /// Runtime identifier.
    pub id: String,
    /// Spec the container was created from.
    pub spec: ContainerConfig,
}

/// Run-level container operations over a [`ContainerRuntime`].
#[derive(Clone)]
pub struct ContainerManager {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Pull the image unless it is already present locally.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.runtime.image_exists(image).await? {
            info!(image = %image, "Image present locally");
            return Ok(());
        }
        self.runtime.pull(image).await?;
        info!(image = %image, "Image pulled");
        Ok(())
    }

    /// Force-remove every container carrying the label. Returns how many were removed.
    pub async fn remove_stale(&self, label_key: &str, label_value: &str) -> Result<usize> {
        let stale = self.runtime.list_containers(label_key, label_value).await?;

        for id in &stale {
            warn!(
                container_id = %id,
                label = %format!("{}={}", label_key, label_value),
                "Removing stale container from a previous run"
            );
            self.runtime.remove_container(id).await?;
        }

        Ok(stale.len())
    }

    /// Create and start a container.
    ///
    /// If the start fails the created container is removed again before the
    /// error is returned, so a failed create never leaves anything behind.
    pub async fn create(&self, spec: &ContainerConfig) -> Result<ContainerHandle> {
        let id = self.runtime.create_container(spec).await?;
        info!(container_id = %id, image = %spec.image, "Created container");

        if let Err(e) = self.runtime.start_container(&id).await {
            if let Err(cleanup) = self.runtime.remove_container(&id).await {
                error!(container_id = %id, error = %cleanup, "Failed to remove unstarted container");
            }
            return Err(match e {
                ModelatorError::ContainerCreate { reason, .. } => ModelatorError::ContainerCreate {
                    image: spec.image.clone(),
                    reason,
                },
                other => other,
            });
        }

        info!(
            container_id = %id,
            host_port = spec.host_port,
            container_port = spec.container_port,
            "Started container"
        );

        Ok(ContainerHandle {
            id,
            spec: spec.clone(),
        })
    }

    /// Create a container whose removal is tied to the returned guard.
    pub async fn acquire(&self, spec: &ContainerConfig) -> Result<ContainerGuard> {
        let handle = self.create(spec).await?;
        Ok(ContainerGuard {
            manager: self.clone(),
            handle,
            armed: true,
        })
    }

    /// Force-kill and remove the container.
    pub async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        self.runtime.remove_container(&handle.id).await?;
        info!(container_id = %handle.id, "Removed container");
        Ok(())
    }
}

/// Owns a running container until [`ContainerGuard::release`] removes it.
///
/// A guard dropped without being released (the owning future was dropped or
/// panicked) spawns a forced removal on the current tokio runtime.
pub struct ContainerGuard {
    manager: ContainerManager,
    handle: ContainerHandle,
    armed: bool,
}

impl ContainerGuard {
    pub fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    /// Remove the container. Consumes the guard so removal happens once.
    pub async fn release(mut self) -> Result<()> {
        self.armed = false;
        self.manager.remove(&self.handle).await
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let id = self.handle.id.clone();
        warn!(container_id = %id, "Container guard dropped without release");

        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let runtime = self.manager.runtime.clone();
                rt.spawn(async move {
                    if let Err(e) = runtime.remove_container(&id).await {
                        error!(container_id = %id, error = %e, "Deferred container removal failed");
                    }
                });
            }
            Err(_) => {
                error!(container_id = %id, "No runtime available to remove container; it will be reaped as stale by the next run");
            }
        }
    }
}
