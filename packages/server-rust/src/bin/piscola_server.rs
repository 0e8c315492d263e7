//! Piscola server entry point.
//!
//! Serves the item store over HTTP until Ctrl-C or a fatal store fault.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use piscola_server::network::{NetworkConfig, NetworkModule, TlsConfig, DEFAULT_LISTEN_ADDR};
use piscola_server::service::{
    register_domain_services, ServerConfig, ServiceContext, ServiceRegistry,
};
use piscola_server::storage::{IndexedStore, ItemStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "piscola-server", version)]
#[command(about = "In-memory item store with glob lookups", long_about = None)]
struct Args {
    /// Address to listen on (host:port).
    #[arg(env = "PISCOLA_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    addr: String,

    #[arg(long, env = "PISCOLA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// HTTP request timeout in milliseconds.
    #[arg(long, env = "PISCOLA_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// Per-operation timeout in milliseconds.
    #[arg(long, env = "PISCOLA_OPERATION_TIMEOUT_MS", default_value_t = 30_000)]
    operation_timeout_ms: u64,

    /// Operations allowed in flight before requests are shed.
    #[arg(long, env = "PISCOLA_MAX_CONCURRENT_OPERATIONS", default_value_t = 1000)]
    max_concurrent_operations: u32,

    /// Disable per-request lookup logging.
    #[arg(long, env = "PISCOLA_QUIET")]
    quiet: bool,

    #[arg(long, env = "PISCOLA_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "PISCOLA_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
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
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let mut network = NetworkConfig::from_listen_addr(&args.addr)?;
    network.request_timeout = Duration::from_millis(args.request_timeout_ms);
    if let (Some(cert_path), Some(key_path)) = (args.tls_cert, args.tls_key) {
        network.tls = Some(TlsConfig {
            cert_path,
            key_path,
        });
    }

    let server_config = Arc::new(ServerConfig {
        default_operation_timeout_ms: args.operation_timeout_ms,
        max_concurrent_operations: args.max_concurrent_operations,
        log_requests: !args.quiet,
    });

    let store: Arc<dyn ItemStore> = Arc::new(IndexedStore::new());
    let registry = ServiceRegistry::new();
    let router = register_domain_services(&registry, &store);
    registry
        .init_all(&ServiceContext {
            config: Arc::clone(&server_config),
        })
        .await
        .context("failed to initialize services")?;
    info!(services = ?registry.names(), "services initialized");

    let mut module = NetworkModule::new(network, server_config, store, router);
    module.start().await.context("failed to bind listen address")?;
    info!(addr = %args.addr, "piscola server listening");

    let ctrl = module.shutdown_controller();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        ctrl.trigger_shutdown();
    });

    let served = module.serve().await;

    let terminate = served.is_err();
    registry.shutdown_all(terminate).await?;
    served
}
