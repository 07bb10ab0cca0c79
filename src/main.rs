use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use tablegate::admin::setup_admin_router;
use tablegate::config::{load_config, GatewayConfig};
use tablegate::http::AppState;
use tablegate::lifecycle::{shutdown, signals, MaintenanceTask};
use tablegate::observability::{logging, metrics};
use tablegate::{Gateway, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "tablegate")]
#[command(about = "REST gateway over relational tables", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run every plugin's install step, then exit.
    #[arg(long, conflicts_with = "uninstall_plugins")]
    install_plugins: bool,

    /// Run every plugin's uninstall step in reverse order, then exit.
    #[arg(long)]
    uninstall_plugins: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    logging::init_tracing(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tablegate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        config = ?args.config,
        "Configuration loaded"
    );

    let gateway = Arc::new(Gateway::from_config(config)?);

    if args.install_plugins {
        gateway.plugins.install_all()?;
        tracing::info!("Plugins installed");
        return Ok(());
    }
    if args.uninstall_plugins {
        gateway.plugins.uninstall_all()?;
        tracing::info!("Plugins uninstalled");
        return Ok(());
    }

    if gateway.config.observability.metrics_enabled {
        match gateway.config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %gateway.config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let maintenance = MaintenanceTask::new(
        gateway.limiter.clone(),
        gateway.cache.clone(),
        gateway.authenticator.clone(),
        &gateway.config.rate_limit,
    );
    let maintenance_handle = tokio::spawn(maintenance.run(shutdown.subscribe()));

    if gateway.config.admin.enabled {
        let listener = TcpListener::bind(&gateway.config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AppState {
            gateway: gateway.clone(),
        });
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown::wait(rx))
                .await
            {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&gateway.config.listener.bind_address).await?;
    let server = HttpServer::new(gateway.clone());
    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    if let Err(e) = maintenance_handle.await {
        tracing::warn!(error = %e, "Maintenance task ended abnormally");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
