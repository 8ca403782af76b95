use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_EXCHANGE: &str = "ratings.periods.processed";

/// Configuration for RabbitMQ connection and messaging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RabbitMqConfig {
    /// Notifications are only sent when this is set
    pub enabled: bool,
    /// RabbitMQ host address
    pub host: String,
    /// RabbitMQ username for authentication
    pub username: String,
    /// RabbitMQ password for authentication
    pub password: String,
    /// Virtual host to use (default: "/")
    pub vhost: String,
    /// Port number (default: 5672)
    pub port: u16,
    /// Fanout exchange period events are published to
    pub exchange: String,
    pub routing_key: String
}

impl RabbitMqConfig {
    /// Reads the configuration from `RABBITMQ_*` environment variables.
    /// Credentials are only required when `RABBITMQ_ENABLED=true`.
    pub fn from_env() -> Result<Self, env::VarError> {
        let enabled = env::var("RABBITMQ_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let defaults = Self::default();
        let (username, password) = if enabled {
            (env::var("RABBITMQ_USERNAME")?, env::var("RABBITMQ_PASSWORD")?)
        } else {
            (defaults.username, defaults.password)
        };

        let routing_key = env::var("RABBITMQ_ROUTING_KEY").unwrap_or_else(|_| DEFAULT_EXCHANGE.to_string());

        Ok(Self {
            enabled,
            host: env::var("RABBITMQ_HOST").unwrap_or(defaults.host),
            username,
            password,
            vhost: env::var("RABBITMQ_VHOST").unwrap_or(defaults.vhost),
            port: env::var("RABBITMQ_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            exchange: env::var("RABBITMQ_EXCHANGE").unwrap_or_else(|_| routing_key.clone()),
            routing_key
        })
    }

    /// Builds the AMQP connection URL from the configuration
    pub fn connection_url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('/', "%2F")
        )
    }
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            port: 5672,
            exchange: DEFAULT_EXCHANGE.to_string(),
            routing_key: DEFAULT_EXCHANGE.to_string()
        }
    }
}
