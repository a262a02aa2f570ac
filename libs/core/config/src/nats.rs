use crate::{env_or_default, env_required, ConfigError, FromEnv};

/// Client name reported to the NATS server when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "subscriber";

/// NATS connection configuration
#[derive(Clone, Debug)]
pub struct NatsConfig {
    pub url: String,
    /// Connection name shown in `nats server report connections`
    pub client_name: String,
}

impl NatsConfig {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}

impl FromEnv for NatsConfig {
    /// Requires NATS_URL to be set (no default); NATS_CLIENT_NAME is optional
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("NATS_URL")?,
            client_name: env_or_default("NATS_CLIENT_NAME", DEFAULT_CLIENT_NAME),
        })
    }
}
