use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use notification_cell::{
    InMemoryQueue, NotificationDispatcher, NotificationQueue, NotificationWorker, ProviderSender, RedisQueue,
    WorkerConfig,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dental Clinic API server");

    let config = Arc::new(AppConfig::from_env());

    let queue = notification_queue(&config).await;
    let notifier = Arc::new(NotificationDispatcher::new(queue.clone(), &config));

    let worker = Arc::new(NotificationWorker::new(
        WorkerConfig::from_app_config(&config),
        queue,
        Arc::new(ProviderSender::new(&config)),
    ));
    let worker_handles = worker.start();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), notifier)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    worker.shutdown();
    for handle in worker_handles {
        if let Err(e) = handle.await {
            warn!("Notification worker loop ended abnormally: {}", e);
        }
    }
    info!("Server stopped");
    Ok(())
}

/// Redis when configured and reachable, otherwise an in-process queue that
/// loses pending jobs on restart.
async fn notification_queue(config: &AppConfig) -> Arc<dyn NotificationQueue> {
    match config.redis_url.as_deref() {
        Some(url) => match RedisQueue::new(url).await {
            Ok(queue) => Arc::new(queue),
            Err(e) => {
                warn!("Redis queue unavailable ({}), falling back to in-memory queue", e);
                Arc::new(InMemoryQueue::new())
            }
        },
        None => {
            info!("REDIS_URL not set, using in-memory notification queue");
            Arc::new(InMemoryQueue::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
