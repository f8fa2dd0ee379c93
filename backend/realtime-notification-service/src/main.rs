use actix_web::{middleware, web, App, HttpServer};
use realtime_notification_service::{
    config::{Config, LogFormat},
    error::AppError,
    handlers, logging, metrics, AppState,
};

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing(LogFormat::from_env());

    let cfg = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    tracing::info!("Starting realtime notification service");

    if cfg.socket_jwt_secret.is_none() {
        tracing::warn!(
            "SOCKET_JWT_SECRET not set: socket handshakes are keyed on the client-supplied userId without verification"
        );
    }

    let bind_addr = cfg.bind_addr();
    let state = AppState::new(cfg);
    tracing::info!("WebSocket connection registry initialized");

    let registry = state.registry.clone();

    tracing::info!(%bind_addr, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::RequestMetrics)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::register_routes)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    registry.clear_all().await;
    tracing::info!("Realtime notification service stopped");
    Ok(())
}
