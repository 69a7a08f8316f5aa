//! Process-wide logging and metrics export.

use std::net::SocketAddr;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_level: &str, json: bool) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        subscriber
            .with(json_layer)
            .try_init()
            .context("installing json subscriber")?;
    } else {
        let pretty_layer = fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        subscriber
            .with(pretty_layer)
            .try_init()
            .context("installing subscriber")?;
    }

    Ok(())
}

/// Starts the Prometheus scrape endpoint on `port`.
///
/// # Errors
///
/// Returns an error if the recorder is already installed or the port
/// cannot be bound.
pub fn init_prometheus_exporter(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing prometheus exporter")?;

    tracing::info!(port, "Prometheus metrics exporter started");
    Ok(())
}
