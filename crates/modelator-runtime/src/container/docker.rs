//! Docker implementation of [`ContainerRuntime`] backed by bollard.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::service::{HostConfig, PortBinding};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info};

use modelator_core::config::ContainerConfig;
use modelator_core::{ModelatorError, Result};

use super::runtime::ContainerRuntime;

/// Container runtime talking to the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket)
    /// and verify the daemon answers.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(unavailable)?;
        docker.ping().await.map_err(unavailable)?;

        info!("Connected to Docker daemon");
        Ok(Self { docker })
    }
}

impl ContainerRuntime for DockerRuntime {
    fn image_exists<'a>(
        &'a self,
        image: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            match self.docker.inspect_image(image).await {
                Ok(_) => Ok(true),
                Err(DockerError::DockerResponseServerError {
                    status_code: 404, ..
                }) => Ok(false),
                Err(e) => Err(unavailable(e)),
            }
        })
    }

    fn pull<'a>(&'a self, image: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!(image = %image, "Pulling image");

            let options = CreateImageOptions {
                from_image: image,
                ..Default::default()
            };

            let mut stream = self.docker.create_image(Some(options), None, None);

            while let Some(result) = stream.next().await {
                match result {
                    Ok(progress) => {
                        if let Some(status) = progress.status {
                            debug!(status = %status, "Pull progress");
                        }
                    }
                    Err(e) => {
                        return Err(ModelatorError::ImagePull {
                            image: image.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            Ok(())
        })
    }

    fn list_containers<'a>(
        &'a self,
        label_key: &'a str,
        label_value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            let filters: HashMap<String, Vec<String>> = [(
                "label".to_string(),
                vec![format!("{}={}", label_key, label_value)],
            )]
            .into_iter()
            .collect();

            let options = ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            };

            let containers = self
                .docker
                .list_containers(Some(options))
                .await
                .map_err(unavailable)?;

            Ok(containers.into_iter().filter_map(|c| c.id).collect())
        })
    }

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let options = RemoveContainerOptions {
                force: true,
                v: true,
                ..Default::default()
            };

            match self.docker.remove_container(container_id, Some(options)).await {
                Ok(()) => Ok(()),
                Err(DockerError::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    debug!(container_id = %container_id, "Container already gone");
                    Ok(())
                }
                Err(DockerError::DockerResponseServerError { message, .. }) => {
                    Err(ModelatorError::ContainerRemove {
                        container_id: container_id.to_string(),
                        reason: message,
                    })
                }
                Err(e) => Err(unavailable(e)),
            }
        })
    }

    fn create_container<'a>(
        &'a self,
        spec: &'a ContainerConfig,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let port_key = format!("{}/tcp", spec.container_port);
            let (label_key, label_value) = spec.label();

            let exposed_ports: HashMap<String, HashMap<(), ()>> =
                [(port_key.clone(), HashMap::new())].into_iter().collect();

            let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = [(
                port_key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(spec.host_port.to_string()),
                }]),
            )]
            .into_iter()
            .collect();

            let labels: HashMap<String, String> =
                [(label_key.to_string(), label_value.to_string())]
                    .into_iter()
                    .collect();

            let config = Config {
                image: Some(spec.image.clone()),
                env: Some(spec.env.clone()),
                labels: Some(labels),
                exposed_ports: Some(exposed_ports),
                host_config: Some(HostConfig {
                    port_bindings: Some(port_bindings),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let response = self
                .docker
                .create_container(None::<CreateContainerOptions<String>>, config)
                .await
                .map_err(|e| create_failed(&spec.image, e))?;

            Ok(response.id)
        })
    }

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.docker
                .start_container(container_id, None::<StartContainerOptions<String>>)
                .await
                .map_err(|e| create_failed(container_id, e))
        })
    }
}

/// Errors that never reached the daemon, or that the daemon could not answer.
fn unavailable(e: DockerError) -> ModelatorError {
    ModelatorError::RuntimeUnavailable(e.to_string())
}

/// Daemon rejections (port in use, unknown image) are create failures;
/// anything else means the runtime itself is the problem.
fn create_failed(image: &str, e: DockerError) -> ModelatorError {
    match e {
        DockerError::DockerResponseServerError { message, .. } => {
            ModelatorError::ContainerCreate {
                image: image.to_string(),
                reason: message,
            }
        }
        other => unavailable(other),
    }
}
