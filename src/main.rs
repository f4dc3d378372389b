use anyhow::Context;
use cde_chat::{app, store, AppState, Config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let db_pool = store::open(&config.database_url, config.database_max_connections).await?;
    let port = config.port;

    let app_state = AppState::new(db_pool, config);
    if !app_state.directory.is_configured() {
        warn!("DIRECTORY_URL is not set, messages will only reach room members");
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!("chat server listening on {}", listener.local_addr()?);

    axum::serve(listener, app(app_state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining {} background task(s)", app_state.tasks.len());
    app_state.tasks.close();
    app_state.tasks.wait().await;
    app_state.db_pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("could not listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
