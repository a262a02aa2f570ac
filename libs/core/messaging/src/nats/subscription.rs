use crate::error::SubscriptionError;
use crate::message::{Acker, Headers, InboundMessage};
use crate::registry::SubscriptionDescriptor;
use crate::subscription::{Subscriber, Subscription};
use async_nats::jetstream::consumer::pull::Config as ConsumerConfig;
use async_nats::jetstream::consumer::{AckPolicy, Consumer, DeliverPolicy};
use async_nats::jetstream::{self, Context};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens durable pull consumers on JetStream.
#[derive(Clone)]
pub struct JetStreamSubscriber {
    jetstream: Context,
}

impl JetStreamSubscriber {
    pub fn new(jetstream: Context) -> Self {
        Self { jetstream }
    }
}

#[async_trait]
impl Subscriber for JetStreamSubscriber {
    async fn subscribe(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<Arc<dyn Subscription>, SubscriptionError> {
        let subject = descriptor.subscription_name();
        let durable = descriptor.queue();

        let stream_name = self
            .jetstream
            .stream_by_subject(subject)
            .await
            .map_err(|e| SubscriptionError::Setup(format!("no stream for '{}': {}", subject, e)))?;

        let stream = self
            .jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| SubscriptionError::Setup(e.to_string()))?;

        let consumer = match stream.get_consumer::<ConsumerConfig>(durable).await {
            Ok(consumer) => {
                debug!(consumer = %durable, stream = %stream_name, "Consumer already exists");
                consumer
            }
            Err(_) => {
                info!(
                    consumer = %durable,
                    stream = %stream_name,
                    subject = %subject,
                    "Creating consumer"
                );

                stream
                    .create_consumer(ConsumerConfig {
                        durable_name: Some(durable.to_string()),
                        ack_policy: AckPolicy::Explicit,
                        deliver_policy: DeliverPolicy::All,
                        filter_subject: subject.to_string(),
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| SubscriptionError::Setup(e.to_string()))?
            }
        };

        Ok(Arc::new(JetStreamSubscription {
            consumer,
            subject: subject.to_string(),
        }))
    }
}

/// A durable pull consumer.
pub struct JetStreamSubscription {
    consumer: Consumer<ConsumerConfig>,
    subject: String,
}

#[async_trait]
impl Subscription for JetStreamSubscription {
    async fn pull_batch(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, SubscriptionError> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max)
            .expires(wait)
            .messages()
            .await
            .map_err(|e| SubscriptionError::Fetch(e.to_string()))?;

        let mut batch = Vec::with_capacity(max);
        while let Some(next) = messages.next().await {
            match next {
                Ok(message) => batch.push(into_inbound(message)),
                Err(e) => {
                    // Keep what was already received, the rest is redelivered
                    if batch.is_empty() {
                        return Err(SubscriptionError::Fetch(e.to_string()));
                    }
                    warn!(subject = %self.subject, error = %e, "Batch ended early");
                    break;
                }
            }
        }

        Ok(batch)
    }
}

fn into_inbound(message: jetstream::Message) -> InboundMessage {
    let id = match message.info() {
        Ok(info) => format!("{}:{}", info.stream, info.stream_sequence),
        Err(_) => message.subject.to_string(),
    };
    let payload = message.payload.to_vec();
    let headers = message
        .headers
        .as_ref()
        .map(convert_headers)
        .unwrap_or_default();

    InboundMessage::new(id, payload, headers, Box::new(JetStreamAcker { message }))
}

fn convert_headers(map: &async_nats::HeaderMap) -> Headers {
    map.iter()
        .map(|(name, values)| {
            let joined = values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            (name.to_string(), joined)
        })
        .collect()
}

struct JetStreamAcker {
    message: jetstream::Message,
}

impl Acker for JetStreamAcker {
    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), SubscriptionError>> {
        let message = self.message;
        async move {
            message
                .ack()
                .await
                .map_err(|e| SubscriptionError::Ack(e.to_string()))
        }
        .boxed()
    }
}
