use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use modelator_core::config::ContainerConfig;
use modelator_core::{ModelatorError, Result};

use crate::container::ContainerRuntime;

#[derive(Debug, Clone)]
struct FakeContainer {
    label: (String, String),
    host_port: Option<u16>,
    running: bool,
}

#[derive(Debug, Default)]
struct State {
    images: HashSet<String>,
    containers: BTreeMap<String, FakeContainer>,
    next_id: u32,
    pulls: Vec<String>,
    removals: Vec<String>,
    created: Vec<ContainerConfig>,
    fail_pull: bool,
    fail_start: Option<String>,
    fail_remove: Option<String>,
    unavailable: bool,
}

/// Container engine kept in memory.
///
/// Removals are recorded by id, including removals of unknown ids.
#[derive(Debug, Default)]
pub struct FakeContainerRuntime {
    state: Mutex<State>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the image present locally.
    pub fn seed_image(&self, image: &str) {
        self.state().images.insert(image.to_string());
    }

    /// Add a running container left over from an earlier run.
    pub fn seed_container(&self, label_key: &str, label_value: &str) -> String {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("stale-{}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                label: (label_key.to_string(), label_value.to_string()),
                host_port: None,
                running: true,
            },
        );
        id
    }

    pub fn fail_pull(&self) {
        self.state().fail_pull = true;
    }

    pub fn fail_start(&self, reason: &str) {
        self.state().fail_start = Some(reason.to_string());
    }

    pub fn fail_remove(&self, reason: &str) {
        self.state().fail_remove = Some(reason.to_string());
    }

    /// Every call fails as if the daemon were down.
    pub fn set_unavailable(&self) {
        self.state().unavailable = true;
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state().pulls.clone()
    }

    pub fn removals(&self) -> Vec<String> {
        self.state().removals.clone()
    }

    /// Specs passed to `create_container`, in order.
    pub fn created(&self) -> Vec<ContainerConfig> {
        self.state().created.clone()
    }

    /// Containers that currently exist, running or not.
    pub fn container_count(&self) -> usize {
        self.state().containers.len()
    }

    /// Host ports published by running containers.
    pub fn published_ports(&self) -> Vec<u16> {
        self.state()
            .containers
            .values()
            .filter(|c| c.running)
            .filter_map(|c| c.host_port)
            .collect()
    }

    fn check_available(state: &State) -> Result<()> {
        if state.unavailable {
            return Err(ModelatorError::RuntimeUnavailable(
                "Cannot connect to the Docker daemon".into(),
            ));
        }
        Ok(())
    }
}

impl ContainerRuntime for FakeContainerRuntime {
    fn image_exists<'a>(
        &'a self,
        image: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state();
            Self::check_available(&state)?;
            Ok(state.images.contains(image))
        })
    }

    fn pull<'a>(&'a self, image: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state();
            Self::check_available(&state)?;
            state.pulls.push(image.to_string());
            if state.fail_pull {
                return Err(ModelatorError::ImagePull {
                    image: image.to_string(),
                    reason: "manifest unknown".into(),
                });
            }
            state.images.insert(image.to_string());
            Ok(())
        })
    }

    fn list_containers<'a>(
        &'a self,
        label_key: &'a str,
        label_value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state();
            Self::check_available(&state)?;
            Ok(state
                .containers
                .iter()
                .filter(|(_, c)| c.label.0 == label_key && c.label.1 == label_value)
                .map(|(id, _)| id.clone())
                .collect())
        })
    }

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state();
            Self::check_available(&state)?;
            state.removals.push(container_id.to_string());
            if let Some(reason) = state.fail_remove.clone() {
                return Err(ModelatorError::ContainerRemove {
                    container_id: container_id.to_string(),
                    reason,
                });
            }
            state.containers.remove(container_id);
            Ok(())
        })
    }

    fn create_container<'a>(
        &'a self,
        spec: &'a ContainerConfig,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state();
            Self::check_available(&state)?;
            state.next_id += 1;
            let id = format!("fake-{}", state.next_id);
            let (key, value) = spec.label();
            state.containers.insert(
                id.clone(),
                FakeContainer {
                    label: (key.to_string(), value.to_string()),
                    host_port: Some(spec.host_port),
                    running: false,
                },
            );
            state.created.push(spec.clone());
            Ok(id)
        })
    }

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state();
            Self::check_available(&state)?;
            if let Some(reason) = state.fail_start.clone() {
                return Err(ModelatorError::ContainerCreate {
                    image: container_id.to_string(),
                    reason,
                });
            }
            match state.containers.get_mut(container_id) {
                Some(container) => {
                    container.running = true;
                    Ok(())
                }
                None => Err(ModelatorError::ContainerCreate {
                    image: container_id.to_string(),
                    reason: "No such container".into(),
                }),
            }
        })
    }
}
