use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aether_booking::{MemoryStore, Stores, SystemClock};
use aether_core::intent::KeywordInterpreter;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aether_api::config::ServerConfig;
use aether_api::router::build_app_router;
use aether_api::state::AppState;
use aether_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "aether_api=debug,aether_booking=debug,aether_events=info,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Stores ---
    let (stores, pool) = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = aether_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            aether_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            aether_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            (
                Stores::postgres(pool.clone(), config.booking_policy().lock_wait),
                Some(pool),
            )
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            let memory = Arc::new(MemoryStore::new());
            let product = memory.add_product("Consultation", false).await;
            tracing::info!(product_id = product.id, "Seeded default product");
            (Stores::from_memory(memory), None)
        }
    };

    // --- App state ---
    let state = AppState::new(
        config.clone(),
        stores,
        Arc::new(KeywordInterpreter::default()),
        Arc::new(SystemClock),
    );
    let ws_manager = Arc::clone(&state.ws_manager);

    // --- Heartbeat ---
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), heartbeat_cancel.clone());

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let cleanup_budget = Duration::from_secs(config.shutdown_timeout_secs);

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_cancel.cancel();
    let _ = tokio::time::timeout(cleanup_budget, heartbeat_handle).await;
    tracing::info!("Heartbeat task stopped");

    if let Some(pool) = pool {
        if tokio::time::timeout(cleanup_budget, pool.close()).await.is_err() {
            tracing::warn!("Timed out closing database pool");
        } else {
            tracing::info!("Database pool closed");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
