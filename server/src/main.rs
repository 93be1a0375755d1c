mod api;
mod config;
mod protocol;
mod store;
mod surface;
mod ws;

use std::sync::Arc;

use painter::Controller;
use tower_http::cors::CorsLayer;

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!("No SIGTERM handler ({}), waiting for SIGINT only", e);
                let _ = ctrl_c.await;
                return;
            }
        };
    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("server=info".parse()?)
                .add_directive("painter=info".parse()?),
        )
        .init();

    let config = config::Config::from_env();
    tracing::info!("Starting painter bridge on {}", config.listen_addr);

    let valkey_client = redis::Client::open(config.valkey_url.as_str())?;
    let valkey_con = valkey_client.get_multiplexed_async_connection().await?;

    let painter = Arc::new(Controller::new(surface::WsSurface::new(), config.painter));
    let state = api::AppState {
        painter: painter.clone(),
        store: store::SessionStore::new(valkey_con, config.session_name),
    };

    let app = api::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Server listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    painter.cancel();
    tracing::info!("Server stopped.");
    Ok(())
}
