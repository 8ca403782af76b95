use crate::messaging::config::RabbitMqConfig;
use chrono::{DateTime, Utc};
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const MESSAGE_TYPE: &str = "urn:message:ratings:PeriodProcessed";

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to connect to RabbitMQ: {0}")]
    ConnectionError(#[from] lapin::Error),

    #[error("Failed to serialize message: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Publisher not initialized")]
    NotInitialized
}

/// Sent after a period has been rated or a population replayed. A replay
/// carries the last period it rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodProcessedMessage {
    pub population_id: i32,
    pub period_id: i32,
    pub action: String,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    message_id: String,
    message_type: &'static str,
    message: &'a PeriodProcessedMessage
}


/// RabbitMQ publisher for period processing events
pub struct RabbitMqPublisher {
    connection: Option<Arc<Connection>>,
    channel: Option<Channel>,
    exchange: String,
    routing_key: String
}

impl RabbitMqPublisher {
    pub fn new(exchange: String, routing_key: String) -> Self {
        Self {
            connection: None,
            channel: None,
            exchange,
            routing_key
        }
    }

    pub fn from_config(config: &RabbitMqConfig) -> Self {
        Self::new(config.exchange.clone(), config.routing_key.clone())
    }

    /// Creates and connects a publisher from configuration
    pub async fn connect_from_config(config: &RabbitMqConfig) -> Result<Self, PublisherError> {
        let mut publisher = Self::from_config(config);
        publisher.connect(&config.connection_url()).await?;
        Ok(publisher)
    }

    /// Connects to RabbitMQ and declares the durable fanout exchange
    pub async fn connect(&mut self, rabbitmq_url: &str) -> Result<(), PublisherError> {
        let connection = Arc::new(Connection::connect(rabbitmq_url, ConnectionProperties::default()).await?);
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default()
            )
            .await?;

        self.connection = Some(connection);
        self.channel = Some(channel);

        info!(exchange = %self.exchange, "Connected to RabbitMQ");

        Ok(())
    }

    /// JSON body for a message, wrapped with its message id
    pub fn encode(message: &PeriodProcessedMessage, message_id: Uuid) -> Result<Vec<u8>, PublisherError> {
        let envelope = Envelope {
            message_id: message_id.to_string(),
            message_type: MESSAGE_TYPE,
            message
        };

        Ok(serde_json::to_vec(&envelope)?)
    }

    pub async fn publish_period_processed(&self, message: &PeriodProcessedMessage) -> Result<(), PublisherError> {
        let channel = self.channel.as_ref().ok_or(PublisherError::NotInitialized)?;

        let message_id = Uuid::new_v4();
        let payload = Self::encode(message, message_id)?;

        let mut headers = BTreeMap::new();
        headers.insert(
            ShortString::from("Content-Type"),
            AMQPValue::LongString(LongString::from("application/json"))
        );

        channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_headers(FieldTable::from(headers))
                    .with_message_id(message_id.to_string().into())
                    .with_timestamp(message.processed_at.timestamp() as u64)
            )
            .await?;

        debug!(
            population_id = message.population_id,
            period_id = message.period_id,
            action = %message.action,
            "Published period processed message"
        );

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() && self.channel.is_some()
    }

    pub async fn close(&mut self) -> Result<(), PublisherError> {
        if let Some(channel) = self.channel.take() {
            channel.close(200, "Normal shutdown").await?;
        }

        if let Some(connection) = self.connection.take() {
            if let Ok(conn) = Arc::try_unwrap(connection) {
                conn.close(200, "Normal shutdown").await?;
            }
        }

        info!("RabbitMQ connection closed");
        Ok(())
    }
}
