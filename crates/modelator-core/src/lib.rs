//! Configuration model and error taxonomy shared by the modelator crates.

pub mod config;
pub mod error;

pub use config::ModelatorConfig;
pub use error::{ModelatorError, Result};
