use std::future::Future;
use std::pin::Pin;

use modelator_core::config::ContainerConfig;
use modelator_core::Result;

/// Operations the container engine must provide.
///
/// Every method may fail with `ModelatorError::RuntimeUnavailable` when the
/// engine cannot be reached.
pub trait ContainerRuntime: Send + Sync {
    /// Whether the image is present locally.
    fn image_exists<'a>(
        &'a self,
        image: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Pull the image from its registry.
    fn pull<'a>(&'a self, image: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Ids of all containers, running or not, carrying `label_key=label_value`.
    fn list_containers<'a>(
        &'a self,
        label_key: &'a str,
        label_value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

    /// Force-kill and remove a container. Removing an unknown id succeeds.
    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Create a container from the spec, labelled with its label pair.
    fn create_container<'a>(
        &'a self,
        spec: &'a ContainerConfig,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
