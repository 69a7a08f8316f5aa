//! tenantscope server binary.
//!
//! Serves the tenant-scoped API and the isolation admin surface over an
//! in-memory row store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tenantscope_core::ScopedEntityRegistry;
use tenantscope_server::network::{NetworkConfig, NetworkModule};
use tenantscope_server::scope::GuardConfig;
use tenantscope_server::service::ScopeConfig;
use tenantscope_server::storage::{MemoryRowStore, RowPolicyEnforcement, RowStore};
use tenantscope_server::{telemetry, ScopeRuntime};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "tenantscope-server", version, about)]
struct Args {
    #[arg(long, env = "TENANTSCOPE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "TENANTSCOPE_PORT", default_value_t = 8080)]
    port: u16,

    /// Shared secret for `/admin` routes. Unset leaves them open.
    #[arg(long, env = "TENANTSCOPE_ADMIN_TOKEN")]
    admin_token: Option<String>,

    /// HS256 secret used to verify bearer tokens.
    #[arg(long, env = "TENANTSCOPE_JWT_SECRET")]
    jwt_secret: Option<String>,

    #[arg(long, env = "TENANTSCOPE_TENANT_HEADER", default_value = "x-tenant-id")]
    tenant_header: String,

    /// Refuse requests that carry no verified claims.
    #[arg(long, env = "TENANTSCOPE_NO_HEADER_FALLBACK")]
    no_header_fallback: bool,

    /// Regex every tenant id must match in full, e.g. `c[a-z0-9]{24}`.
    #[arg(long, env = "TENANTSCOPE_TENANT_ID_PATTERN")]
    tenant_id_pattern: Option<String>,

    #[arg(long, env = "TENANTSCOPE_OPERATION_TIMEOUT_MS", default_value_t = 30_000)]
    operation_timeout_ms: u64,

    #[arg(long, env = "TENANTSCOPE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Enable engine-level row policies on every scoped entity.
    #[arg(long, env = "TENANTSCOPE_ROW_POLICIES")]
    row_policies: bool,

    /// Port for the Prometheus scrape endpoint. Unset disables export.
    #[arg(long, env = "TENANTSCOPE_METRICS_PORT")]
    metrics_port: Option<u16>,

    #[arg(long, env = "TENANTSCOPE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init_logging("info", args.log_json)?;
    if let Some(port) = args.metrics_port {
        telemetry::init_prometheus_exporter(port)?;
    }

    let registry = ScopedEntityRegistry::standard();
    let store = Arc::new(if args.row_policies {
        MemoryRowStore::with_row_policies(&registry)
    } else {
        MemoryRowStore::new()
    });

    let scope_config = ScopeConfig {
        operation_timeout_ms: args.operation_timeout_ms,
    };
    let guard_config = GuardConfig {
        tenant_header: args.tenant_header,
        allow_header_fallback: !args.no_header_fallback,
        tenant_id_pattern: args.tenant_id_pattern,
    };
    let row_store: Arc<dyn RowStore> = store.clone();
    let enforcement: Arc<dyn RowPolicyEnforcement> = store;
    let runtime = ScopeRuntime::new(row_store, registry, &scope_config, &guard_config)
        .context("invalid tenant id pattern")?
        .with_enforcement(enforcement);

    info!(
        entities = runtime.registry.len(),
        row_policies = args.row_policies,
        header_fallback = guard_config.allow_header_fallback,
        "isolation runtime ready"
    );

    let config = NetworkConfig {
        host: args.host,
        port: args.port,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        admin_token: args.admin_token,
        jwt_secret: args.jwt_secret,
    };
    let mut network = NetworkModule::new(config, Arc::new(runtime));
    network.start().await?;
    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
