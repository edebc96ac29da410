//! Backup handler entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — flags with environment fallbacks, see
//!    [`config::Config`].
//! 2. **Wire observability** — configure `tracing-subscriber` with a JSON layer
//!    and an optional OpenTelemetry OTLP exporter. All `tracing` spans and
//!    structured events emitted by every crate in the workspace flow through
//!    this layer.
//! 3. **Construct infrastructure** — create the `LagoonClient` and connect the
//!    `AmqpPublisher` (declaring the queue topology), then inject both into a
//!    [`handler::Dispatcher`].
//! 4. **Serve** — run the webhook listener until Ctrl-C or SIGTERM, then close
//!    the broker connection and flush spans.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use broker::AmqpPublisher;
use clap::Parser;
use handler::Dispatcher;
use lagoon::LagoonClient;
use tracing::{error, info, warn};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let telemetry = telemetry::init(&config.telemetry)?;

    let result = run(config).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "backup handler stopped");
    }

    telemetry.shutdown();
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    let records = LagoonClient::new(config.api.to_lagoon_config())
        .context("failed to create Lagoon API client")?;

    let broker_config = config.broker.to_broker_config();
    let publisher = AmqpPublisher::connect(&broker_config)
        .await
        .with_context(|| {
            format!("failed to set up broker at {}", broker_config.redacted_uri())
        })?;
    let publisher = Arc::new(publisher);

    let dispatcher = Dispatcher::new(Arc::new(records), publisher.clone());
    listener::serve(config.listen, dispatcher, shutdown_signal()).await?;

    info!("webhook listener stopped, closing broker connection");
    if let Err(e) = publisher.close().await {
        warn!(error = %e, "broker connection did not close cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
