//! Message broker adapter.
//!
//! Implements the [`handler::EventPublisher`] trait over AMQP 0.9.1 (RabbitMQ)
//! using `lapin`.
//!
//! ## Topology
//!
//! On [`AmqpPublisher::connect`] the publisher declares a durable direct
//! exchange and a durable queue and binds them with the empty routing key.
//! Declarations are idempotent, so several handler instances can start against
//! the same broker. Every event is published to that exchange.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection handling, topology and wire encoding live
//! here. The [`handler`] crate sees only [`handler::EventPublisher`].
//!
//! ## Concurrency
//!
//! One connection and one channel are opened at startup and shared by every
//! request. `lapin` channels are safe to publish on from many tasks at once.
//! Reconnection is not attempted; a publish on a dead channel fails and the
//! event is lost.

use async_trait::async_trait;
use handler::{EnvironmentName, EventPublisher, OutboundEvent, PublishError};
use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use thiserror::Error;
use tracing::{info, instrument};

/// Content type set on every published message.
const CONTENT_TYPE: &str = "text/plain";

/// Reply code sent when closing the connection normally.
const REPLY_SUCCESS: u16 = 200;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection and topology settings for the broker.
#[derive(Clone)]
pub struct BrokerConfig {
    /// Broker hostname.
    pub host: String,
    /// AMQP port, usually 5672.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password. Never logged or shown by `Debug`.
    pub password: String,
    /// Durable queue consumers read from.
    pub queue_name: String,
    /// Durable direct exchange events are published to.
    pub exchange_name: String,
}

impl BrokerConfig {
    /// Builds the AMQP URI for the default vhost.
    ///
    /// Credentials are carried as structured fields, so no escaping is needed.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            ..AMQPUri::default()
        }
    }

    /// The broker address without credentials, for logging.
    pub fn redacted_uri(&self) -> String {
        format!("amqp://{}@{}:{}", self.username, self.host, self.port)
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("queue_name", &self.queue_name)
            .field("exchange_name", &self.exchange_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures inside the broker adapter.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The connection or channel could not be opened.
    #[error("failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    /// A topology declaration failed.
    #[error("failed to declare {what}: {source}")]
    Topology {
        /// Which declaration failed.
        what: &'static str,
        source: lapin::Error,
    },

    /// The event could not be serialised.
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    /// The publish did not reach the broker.
    #[error("failed to publish: {0}")]
    Publish(#[source] lapin::Error),

    /// The broker negatively acknowledged the publish.
    #[error("broker nacked the message")]
    Nacked,

    /// Closing the connection failed.
    #[error("failed to close broker connection: {0}")]
    Close(#[source] lapin::Error),
}

impl From<BrokerError> for PublishError {
    fn from(err: BrokerError) -> Self {
        let message = err.to_string();
        match err {
            BrokerError::Encode(_) => PublishError::Encoding { message },
            BrokerError::Nacked => PublishError::Rejected { message },
            BrokerError::Connect(_)
            | BrokerError::Topology { .. }
            | BrokerError::Publish(_)
            | BrokerError::Close(_) => PublishError::Unavailable { message },
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialises an event to the bytes placed on the queue.
pub fn encode(event: &OutboundEvent) -> Result<Vec<u8>, BrokerError> {
    serde_json::to_vec(event).map_err(BrokerError::Encode)
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishes events to a RabbitMQ exchange over a single shared channel.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    /// Connects, enables publisher confirms and declares the topology.
    #[instrument(skip_all, fields(broker = %config.redacted_uri()))]
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let connection = Connection::connect_uri(config.amqp_uri(), ConnectionProperties::default())
            .await
            .map_err(BrokerError::Connect)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::Connect)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(BrokerError::Connect)?;

        declare_topology(&channel, config).await?;
        info!(
            exchange = %config.exchange_name,
            queue = %config.queue_name,
            "connected to broker and declared topology"
        );

        Ok(Self {
            connection,
            channel,
            exchange: config.exchange_name.clone(),
        })
    }

    /// Closes the channel's connection.
    pub async fn close(&self) -> Result<(), BrokerError> {
        self.connection
            .close(REPLY_SUCCESS, "shutting down")
            .await
            .map_err(BrokerError::Close)
    }

    async fn send(&self, event: &OutboundEvent) -> Result<(), BrokerError> {
        let payload = encode(event)?;
        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type(CONTENT_TYPE.into()),
            )
            .await
            .map_err(BrokerError::Publish)?
            .await
            .map_err(BrokerError::Publish)?;

        if confirmation.is_nack() {
            return Err(BrokerError::Nacked);
        }
        Ok(())
    }
}

async fn declare_topology(channel: &Channel, config: &BrokerConfig) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            &config.exchange_name,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Topology {
            what: "exchange",
            source,
        })?;

    let queue = channel
        .queue_declare(
            &config.queue_name,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Topology {
            what: "queue",
            source,
        })?;

    channel
        .queue_bind(
            queue.name().as_str(),
            &config.exchange_name,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Topology {
            what: "queue binding",
            source,
        })
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    #[instrument(skip_all, fields(event = %event.event, event_id = %event.id))]
    async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError> {
        self.send(event).await?;

        let environment = event.body.name.as_ref().map(EnvironmentName::as_str);

        match event.snapshot() {
            Some(snapshot) => info!(
                environment,
                hostname = %snapshot.hostname,
                snapshot_id = %snapshot.id,
                "event added to queue"
            ),
            None => info!(
                environment,
                snapshot_id = event.body.snapshot_id.as_deref().unwrap_or_default(),
                "event added to queue"
            ),
        }
        Ok(())
    }
}
