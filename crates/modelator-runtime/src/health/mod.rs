mod checker;

pub use checker::{HealthChecker, Readiness};
