//! Shared test utilities for messaging tests
//!
//! - `TestNats`: NATS container with JetStream and automatic cleanup (feature: "nats")
//! - `TestDataBuilder`: Deterministic, per-test stream and subject names (always available)
//!
//! # Features
//!
//! - `nats` (default): Enables NATS JetStream test infrastructure
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestNats};
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn my_jetstream_test() {
//!     let nats = TestNats::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_jetstream_test");
//!
//!     let stream = builder.stream("orders");
//!     let subject = builder.subject("orders", "created");
//! }
//! ```

#[cfg(feature = "nats")]
mod nats;

#[cfg(feature = "nats")]
pub use nats::TestNats;

/// Builder for test names with deterministic randomization
///
/// Tests sharing one NATS server must not share streams or durable consumers;
/// names derived from the test name keep them apart and reproducible.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_consume_example");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Stream name, e.g. `TEST_ORDERS_12345`
    pub fn stream(&self, prefix: &str) -> String {
        format!("TEST_{}_{}", prefix.to_uppercase(), self.seed)
    }

    /// Subject inside the test's namespace, e.g. `test.12345.orders.created`
    pub fn subject(&self, prefix: &str, suffix: &str) -> String {
        format!("test.{}.{}.{}", self.seed, prefix, suffix)
    }

    /// Durable consumer name, e.g. `test-orders-12345`
    pub fn durable(&self, prefix: &str) -> String {
        format!("test-{}-{}", prefix, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.stream("orders"), builder2.stream("orders"));
        assert_eq!(builder1.stream("orders"), "TEST_ORDERS_42");
        assert_eq!(builder1.subject("orders", "created"), "test.42.orders.created");
        assert_eq!(builder1.durable("orders"), "test-orders-42");
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        // Different test names should generate different names
        assert_ne!(builder1.stream("orders"), builder2.stream("orders"));
    }
}
