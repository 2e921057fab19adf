use std::sync::Arc;

use anyhow::Context;

use storefront_api::app::{build_app, services::AppServices};
use storefront_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        AppServices::build(&config)
            .await
            .context("failed to wire stores")?,
    );
    let workers = services.spawn_workers(&config);

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for worker in workers {
        worker.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
