//! Configuration for the consumption pipeline.

use core_config::{env_parse_or, ConfigError, FromEnv};
use std::time::Duration;

/// Pipeline configuration shared by every consumer.
///
/// # Environment
///
/// | Variable | Default |
/// |---|---|
/// | `PIPELINE_BATCH_SIZE` | 10 |
/// | `PIPELINE_WAIT_TIMEOUT_MS` | 50 |
/// | `PIPELINE_QUEUE_CAPACITY` | 10 |
/// | `PIPELINE_WORKER_COUNT` | 10 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Messages requested per pull
    pub batch_size: usize,

    /// Maximum time a pull waits for messages, also the retry delay after a
    /// failed pull
    pub wait_timeout: Duration,

    /// Work queue capacity; the fetch loop blocks when it is full
    pub queue_capacity: usize,

    /// Number of concurrent workers per consumer
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait_timeout: Duration::from_millis(50),
            queue_capacity: 10,
            worker_count: 10,
        }
    }
}

impl PipelineConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the pull wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the work queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the worker count.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Reject zero values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("PIPELINE_BATCH_SIZE", self.batch_size as u128),
            ("PIPELINE_WAIT_TIMEOUT_MS", self.wait_timeout.as_millis()),
            ("PIPELINE_QUEUE_CAPACITY", self.queue_capacity as u128),
            ("PIPELINE_WORKER_COUNT", self.worker_count as u128),
        ];

        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::ParseError {
                    key: key.to_string(),
                    details: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl FromEnv for PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            batch_size: env_parse_or("PIPELINE_BATCH_SIZE", defaults.batch_size)?,
            wait_timeout: Duration::from_millis(env_parse_or(
                "PIPELINE_WAIT_TIMEOUT_MS",
                defaults.wait_timeout.as_millis() as u64,
            )?),
            queue_capacity: env_parse_or("PIPELINE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            worker_count: env_parse_or("PIPELINE_WORKER_COUNT", defaults.worker_count)?,
        };

        config.validate()?;
        Ok(config)
    }
}
