use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentState, PromotionSweeper, SupabaseAppointmentStore, SweepHandle};
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseIdentityDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Amae booking API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // One pooled client for request traffic, one keyed for background work
    let supabase = Arc::new(SupabaseClient::new(&config));
    let background = Arc::new(SupabaseClient::background(&config));

    // Promotion sweep runs outside the request path with its own credentials
    let sweep = SweepHandle::new();
    let sweep_service = AppointmentState::service(
        &config,
        Arc::new(SupabaseAppointmentStore::new(background.clone())),
        Arc::new(SupabaseIdentityDirectory::new(background)),
    );
    let sweeper = PromotionSweeper::new(
        Arc::new(sweep_service),
        Duration::from_secs(config.promotion_sweep_interval_seconds),
        sweep.clone(),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let sweep_task = tokio::spawn(sweeper.run(async move {
        let _ = shutdown_rx.changed().await;
    }));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), supabase, sweep)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop the sweep after in-flight requests drain
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep_task.await {
        warn!("Promotion sweep task ended abnormally: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
