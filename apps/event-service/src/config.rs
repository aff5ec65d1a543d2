//! Recognized environment variables (§6), loaded with `dotenvy` the way
//! both teacher apps do (`dotenv().ok()` then `std::env::var`).

use std::env;

#[derive(thiserror::Error, Debug)]
#[error("configuration error: {0}")]
pub struct ConfigError(String);

pub struct ServiceConfig {
    /// Identifies the publisher (`app_id`) and is used in target service
    /// queue names.
    pub service_name: String,
    pub rabbitmq_url: String,
    pub database_url: String,
    /// Where the task executor registry is loaded from. Logged at startup;
    /// registration itself happens in ordinary Rust code, not a dynamic
    /// import (§9 Open Questions).
    pub tasks_package: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            service_name: env::var("SERVICE_NAME").map_err(|_| ConfigError("SERVICE_NAME must be set".to_string()))?,
            rabbitmq_url: env::var("RABBITMQ_URL").map_err(|_| ConfigError("RABBITMQ_URL must be set".to_string()))?,
            database_url: env::var("DATABASE_URL").map_err(|_| ConfigError("DATABASE_URL must be set".to_string()))?,
            tasks_package: env::var("TASKS_PACKAGE").unwrap_or_else(|_| "tasks".to_string()),
        })
    }
}
