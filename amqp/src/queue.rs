//! [`MessageQueue`] implementation over the AMQP gateway.
//!
//! Publishes are persistent (delivery mode 2) so messages survive a broker
//! restart; the returned boolean is the broker's acceptance of the message
//! into its buffers, not a consumption confirmation. Consumption maps each
//! AMQP delivery into a [`Delivery`] handle whose negative acknowledgement
//! (no requeue) lets the broker's dead-letter routing move the message,
//! payload intact, to the queue's DLQ.

use crate::gateway::{AmqpGateway, DELIVERY_MODE_PERSISTENT};
use coursehub_core::queue::{BoxFuture, BrokerError, Delivery, DeliveryStream, MessageQueue};
use coursehub_core::topology::Topology;
use futures::StreamExt;
use lapin::BasicProperties;
use lapin::message::Delivery as AmqpMessage;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;

impl MessageQueue for AmqpGateway {
    fn declare_topology(&self, topology: &Topology) -> BoxFuture<'_, Result<(), BrokerError>> {
        let topology = topology.clone();
        Box::pin(async move { Self::declare_topology(self, &topology).await })
    }

    fn publish(&self, queue: &str, body: Vec<u8>) -> BoxFuture<'_, Result<bool, BrokerError>> {
        let queue = queue.to_owned();
        Box::pin(async move {
            // channel() makes at most one lazy reconnection attempt.
            let channel = self.channel().await?;

            let confirmation = channel
                .basic_publish(
                    "",
                    &queue,
                    BasicPublishOptions::default(),
                    &body,
                    BasicProperties::default()
                        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
                        .with_content_type("application/json".into()),
                )
                .await
                .map_err(|error| BrokerError::PublishFailed {
                    queue: queue.clone(),
                    reason: error.to_string(),
                })?
                .await
                .map_err(|error| BrokerError::PublishFailed {
                    queue: queue.clone(),
                    reason: error.to_string(),
                })?;

            let accepted = !matches!(confirmation, Confirmation::Nack(_));
            if accepted {
                tracing::debug!(queue = %queue, "Message accepted");
            } else {
                tracing::warn!(queue = %queue, "Broker nacked message");
            }
            Ok(accepted)
        })
    }

    fn consume(&self, queue: &str) -> BoxFuture<'_, Result<DeliveryStream, BrokerError>> {
        let queue = queue.to_owned();
        Box::pin(async move {
            let channel = self.channel().await?;

            let consumer = channel
                .basic_consume(
                    &queue,
                    // Empty tag: the broker generates a unique one.
                    "",
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|error| BrokerError::ConsumeFailed {
                    queue: queue.clone(),
                    reason: error.to_string(),
                })?;

            tracing::info!(queue = %queue, "Consumer registered");

            let stream = consumer.map(move |delivery| match delivery {
                Ok(message) => Ok(Box::new(AmqpDelivery { message }) as Box<dyn Delivery>),
                Err(error) => Err(BrokerError::ConsumeFailed {
                    queue: queue.clone(),
                    reason: error.to_string(),
                }),
            });

            Ok(Box::pin(stream) as DeliveryStream)
        })
    }
}

/// One AMQP delivery awaiting settlement.
struct AmqpDelivery {
    message: AmqpMessage,
}

impl Delivery for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.message.data
    }

    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), BrokerError>> {
        Box::pin(async move {
            self.message
                .acker
                .ack(BasicAckOptions::default())
                .await
                .map_err(|error| BrokerError::AckFailed(error.to_string()))
        })
    }

    fn dead_letter(self: Box<Self>) -> BoxFuture<'static, Result<(), BrokerError>> {
        Box::pin(async move {
            self.message
                .acker
                .nack(BasicNackOptions {
                    requeue: false,
                    ..BasicNackOptions::default()
                })
                .await
                .map_err(|error| BrokerError::AckFailed(error.to_string()))
        })
    }
}
