use std::net::SocketAddr;
use std::sync::Arc;

use focusflow::config::AppConfig;
use focusflow::gateway::supabase::SupabaseClient;
use focusflow::routes;
use focusflow::services::auth::{AuthAdapter, Backend, RedirectTargets};
use focusflow::services::session::SessionController;
use focusflow::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    // Missing gateway settings are non-fatal: every auth call answers NotConfigured.
    let backend = match config.gateway.credentials() {
        Some((url, anon_key)) => {
            let client =
                Arc::new(SupabaseClient::new(url, anon_key, config.timeouts).expect("gateway client init failed"));
            tracing::info!(url, "auth gateway configured");
            Some(Backend { gateway: client.clone(), profiles: client })
        }
        None => {
            tracing::warn!("SUPABASE_URL or SUPABASE_ANON_KEY missing; authentication disabled");
            None
        }
    };

    let adapter = Arc::new(AuthAdapter::new(config.gateway.clone(), backend, RedirectTargets::from_config(&config)));
    let session = Arc::new(SessionController::start(adapter));
    let state = AppState::new(Arc::clone(&session), &config.origin);

    let app = routes::app(state, config.cors_allow_any);
    let addr = SocketAddr::new(config.bind_addr, config.port);
    if !addr.ip().is_loopback() {
        tracing::warn!(%addr, "listening beyond loopback; every client shares the one signed-in session");
    }
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind");

    tracing::info!(%addr, origin = %config.origin, "focusflow listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    session.shutdown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
