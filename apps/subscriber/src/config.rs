use core_config::nats::NatsConfig;
use core_config::server::ServerConfig;
use core_config::{env_required, ConfigError, Environment, FromEnv};
use messaging::PipelineConfig;

/// Service configuration
#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    /// Reported in logs; also the NATS connection name unless NATS_CLIENT_NAME is set
    pub service_name: String,
    pub environment: Environment,
    pub server: ServerConfig,
    pub nats: NatsConfig,
    pub pipeline: PipelineConfig,
}

impl FromEnv for SubscriberConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let service_name = env_required("SERVICE_NAME")?;

        let mut nats = NatsConfig::from_env()?;
        if std::env::var("NATS_CLIENT_NAME").is_err() {
            nats.client_name = service_name.clone();
        }

        Ok(Self {
            service_name,
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            nats,
            pipeline: PipelineConfig::from_env()?,
        })
    }
}
