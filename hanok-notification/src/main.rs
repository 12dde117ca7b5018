use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod models;
mod registry;
mod routes;
mod schema;
mod services;

use config::AppConfig;
use events::dispatcher::EventDispatcher;
use events::queries::PgDirectoryQueries;
use hanok_shared::clients::db::create_pool;
use hanok_shared::clients::rabbitmq::RabbitMQClient;
use registry::ConnectionRegistry;
use services::notification_service::NotificationService;
use services::store::PgNotificationStore;

pub struct AppState {
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub registry: Arc<ConnectionRegistry>,
    pub notifications: Arc<NotificationService>,
    pub dispatcher: EventDispatcher,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hanok_shared::middleware::init_tracing("hanok-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    // Set JWT_SECRET env var for the auth extractor middleware
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let metrics_handle = hanok_shared::middleware::init_metrics();

    let db = create_pool(&config.database_url);
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;

    let registry = Arc::new(ConnectionRegistry::new());
    let store = Arc::new(PgNotificationStore::new(db.clone()));
    let notifications = Arc::new(NotificationService::new(store, registry.clone()));
    let directory = Arc::new(PgDirectoryQueries::new(db));
    let dispatcher = EventDispatcher::new(notifications.clone(), directory);

    let state = Arc::new(AppState {
        config,
        rabbitmq,
        registry: registry.clone(),
        notifications,
        dispatcher,
        metrics_handle,
    });

    // Spawn signup event subscriber
    let signup_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_signup_events(signup_state).await {
            tracing::error!(error = %e, "signup event subscriber failed");
        }
    });

    // Spawn complaint event subscriber
    let complaint_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_complaint_events(complaint_state).await {
            tracing::error!(error = %e, "complaint event subscriber failed");
        }
    });

    // Spawn notice/poll event subscriber
    let publication_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_publication_events(publication_state).await {
            tracing::error!(error = %e, "publication event subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/unread", get(routes::notifications::list_unread))
        .route("/notifications/read-all", post(routes::notifications::mark_all_read))
        .route("/notifications/:id/read", post(routes::notifications::mark_read))
        .route("/notifications/stream", get(routes::stream::notification_stream))
        .layer(axum::middleware::from_fn(hanok_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "hanok-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then drain every live stream before the server stops
/// accepting connections.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, draining live streams");
    registry.close_all();
}
