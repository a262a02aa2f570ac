//! Pull-based pub/sub consumption with classified acknowledgment.
//!
//! A consumer pulls batches from a durable subscription, feeds them through a
//! bounded work queue to a fixed pool of workers, and acknowledges each
//! message according to how its handler classified the outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  pull_batch  ┌───────────┐  bounded   ┌─────────────┐
//! │ Subscription │─────────────▶│ FetchLoop │───queue───▶│ WorkerPool  │
//! │ (JetStream / │              └───────────┘            │  N workers  │
//! │   memory)    │◀──────────── ack (Ack decision) ──────│  Handler    │
//! └──────────────┘                                       └─────────────┘
//! ```
//!
//! | Handler outcome | Acknowledged | Logged as error |
//! |---|---|---|
//! | `Ok(())` | yes | no |
//! | NonRecoverable | yes | unless marked expected |
//! | Expected | no | no |
//! | Recoverable | no | yes |
//!
//! Shutdown closes the work queue: the fetch loop stops pulling, workers
//! finish whatever was already queued and exit.
//!
//! # Example
//!
//! ```ignore
//! use messaging::{EventConsumer, EventRegistry, PipelineConfig, SubscriptionDescriptor};
//!
//! let registry = EventRegistry::new().subscribe(
//!     SubscriptionDescriptor::new("Example", "example", "example"),
//!     ExampleHandler::new(recorder),
//! );
//!
//! let (shutdown, token) = messaging::shutdown_channel();
//! let (errors_tx, mut errors_rx) = tokio::sync::mpsc::channel(8);
//!
//! for registration in registry.events() {
//!     let consumer = EventConsumer::new(registration.clone(), PipelineConfig::default());
//!     let subscriber = subscriber.clone();
//!     let token = token.clone();
//!     let errors_tx = errors_tx.clone();
//!     tokio::spawn(async move { consumer.run(subscriber.as_ref(), token, errors_tx).await });
//! }
//! ```

mod ack;
mod app_event;
mod config;
mod consumer;
mod context;
mod error;
mod fetch;
mod handler;
pub mod health;
pub mod memory;
mod message;
pub mod metrics;
mod registry;
mod shutdown;
mod subscription;
mod worker;

#[cfg(feature = "nats")]
pub mod nats;

pub use ack::{acknowledge, decide, AckDecision};
pub use app_event::AppEvent;
pub use config::PipelineConfig;
pub use consumer::EventConsumer;
pub use context::PipelineContext;
pub use error::{ErrorKind, HandlerError, PipelineError, SubscriptionError};
pub use fetch::{FetchLoop, FetchState};
pub use handler::{FailingHandler, Handler, HandlerContext, NoOpHandler};
pub use message::{Acker, Headers, InboundMessage};
pub use registry::{EventRegistration, EventRegistry, SubscriptionDescriptor};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use subscription::{Subscriber, Subscription};
pub use worker::{process_message, WorkerPool, TRACEPARENT_HEADER};
