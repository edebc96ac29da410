//! Command line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it, which is how the handler is configured when deployed.
//! Secrets are accepted the same way but never echoed in `--help` output.

use std::net::SocketAddr;
use std::time::Duration;

use broker::BrokerConfig;
use clap::{Args, Parser, ValueEnum};
use lagoon::LagoonConfig;

/// Receives backup webhooks, drops already-known snapshots, and queues the rest.
#[derive(Parser)]
#[command(name = "backup-handler", version, about)]
pub struct Config {
    /// Address the webhook endpoint listens on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub broker: BrokerArgs,

    #[command(flatten)]
    pub api: ApiArgs,

    #[command(flatten)]
    pub telemetry: TelemetryArgs,
}

/// RabbitMQ connection and topology.
#[derive(Args)]
pub struct BrokerArgs {
    #[arg(long = "rabbitmq-host", env = "RABBITMQ_HOST", default_value = "broker")]
    pub host: String,

    #[arg(long = "rabbitmq-port", env = "RABBITMQ_PORT", default_value_t = 5672)]
    pub port: u16,

    #[arg(long = "rabbitmq-username", env = "RABBITMQ_USERNAME", default_value = "guest")]
    pub username: String,

    #[arg(
        long = "rabbitmq-password",
        env = "RABBITMQ_PASSWORD",
        default_value = "guest",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    #[arg(
        long = "rabbitmq-queue",
        env = "RABBITMQ_QUEUE_NAME",
        default_value = "lagoon-webhooks:queue"
    )]
    pub queue_name: String,

    #[arg(
        long = "rabbitmq-exchange",
        env = "RABBITMQ_EXCHANGE_NAME",
        default_value = "lagoon-webhooks"
    )]
    pub exchange_name: String,
}

impl BrokerArgs {
    pub fn to_broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            queue_name: self.queue_name.clone(),
            exchange_name: self.exchange_name.clone(),
        }
    }
}

/// Lagoon API access.
#[derive(Args)]
pub struct ApiArgs {
    /// GraphQL endpoint URL.
    #[arg(
        long = "graphql-endpoint",
        env = "GRAPHQL_ENDPOINT",
        default_value = "http://api:3000/graphql"
    )]
    pub endpoint: String,

    /// Audience claim of minted API tokens.
    #[arg(long = "jwt-audience", env = "JWTAUDIENCE", default_value = "api.dev")]
    pub audience: String,

    /// Secret the API tokens are signed with.
    #[arg(long = "jwt-secret", env = "JWTSECRET", hide_env_values = true)]
    pub token_signing_key: String,

    /// Per-request timeout for API calls, in seconds.
    #[arg(long = "api-timeout-secs", env = "API_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ApiArgs {
    pub fn to_lagoon_config(&self) -> LagoonConfig {
        LagoonConfig {
            endpoint: self.endpoint.clone(),
            audience: self.audience.clone(),
            token_signing_key: self.token_signing_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable, for local runs.
    Pretty,
}

/// Logging and tracing export.
#[derive(Args)]
pub struct TelemetryArgs {
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// OTLP/gRPC collector endpoint. Span export is disabled when unset.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Config::command().debug_assert();
    }

    #[test]
    fn flags_build_adapter_configs() {
        let config = Config::try_parse_from([
            "backup-handler",
            "--listen",
            "127.0.0.1:8080",
            "--rabbitmq-host",
            "rabbit.local",
            "--rabbitmq-port",
            "5673",
            "--rabbitmq-password",
            "hunter2",
            "--rabbitmq-queue",
            "backups",
            "--rabbitmq-exchange",
            "backups-x",
            "--graphql-endpoint",
            "http://api.local/graphql",
            "--jwt-secret",
            "signing-key",
            "--api-timeout-secs",
            "5",
            "--log-format",
            "pretty",
        ])
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);

        let broker = config.broker.to_broker_config();
        assert_eq!(broker.host, "rabbit.local");
        assert_eq!(broker.port, 5673);
        assert_eq!(broker.password, "hunter2");
        assert_eq!(broker.queue_name, "backups");
        assert_eq!(broker.exchange_name, "backups-x");

        let api = config.api.to_lagoon_config();
        assert_eq!(api.endpoint, "http://api.local/graphql");
        assert_eq!(api.token_signing_key, "signing-key");
        assert_eq!(api.timeout, Duration::from_secs(5));
    }
}
