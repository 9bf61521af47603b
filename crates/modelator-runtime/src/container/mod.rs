//! Disposable container lifecycle.
//!
//! The [`ContainerRuntime`] trait is the narrow seam to the container engine;
//! [`DockerRuntime`] talks to a Docker daemon through bollard. The
//! [`ContainerManager`] layers the run semantics on top: image presence,
//! label-based cleanup of stale containers, and guaranteed teardown through
//! [`ContainerGuard`].

mod docker;
mod manager;
mod runtime;

pub use docker::DockerRuntime;
pub use manager::{ContainerGuard, ContainerHandle, ContainerManager};
pub use runtime::ContainerRuntime;
