mod adapters;
mod application;
mod domain;
mod services;

#[cfg(test)]
mod testing;

use std::{process, sync::Arc};

use adapters::{repositories::PgPoiRepository, routes, state::AppState};
use application::{
    repositories::poi_repository::PoiRepository,
    services::{PoiService, StorageService},
};
use axum::{extract::DefaultBodyLimit, http::HeaderValue};
use domain::config::app::AppConfig;
use services::S3StorageService;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        // Allow all origins if not specified (only for development)
        None => CorsLayer::permissive(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

fn fail(message: String) -> ! {
    tracing::error!("{}", message);
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must run before the S3 client performs any TLS handshake
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = AppConfig::from_env()
        .unwrap_or_else(|e| fail(format!("ERROR: invalid configuration: {}", e)));

    tracing::info!("Connecting to PostgreSQL...");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database.url)
        .await
        .unwrap_or_else(|e| {
            fail(format!(
                "ERROR: Failed to connect to PostgreSQL database: {}. Check DATABASE_URL and network connectivity.",
                e
            ))
        });
    tracing::info!("Database connection established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .unwrap_or_else(|e| fail(format!("ERROR: Failed to run migrations: {}", e)));
        tracing::info!("Database migrations applied");
    }

    let s3_storage = S3StorageService::new(&config.s3);
    s3_storage.ensure_bucket().await.unwrap_or_else(|e| {
        fail(format!(
            "ERROR: Object storage bucket '{}' is not usable: {}",
            config.s3.bucket, e
        ))
    });
    tracing::info!(
        "Object storage ready: endpoint={}, bucket={}",
        config.s3.endpoint_url(),
        config.s3.bucket
    );

    let storage_service = Arc::new(s3_storage) as Arc<dyn StorageService>;
    let poi_repository = Arc::new(PgPoiRepository::new(pool)) as Arc<dyn PoiRepository>;
    let poi_service = PoiService::new(
        poi_repository,
        storage_service.clone(),
        config.upload_limits,
        config.create_timeout,
    );

    let app_state = AppState {
        poi_service: Arc::new(poi_service),
        storage_service,
    };

    let router = routes::router(app_state)
        .layer(DefaultBodyLimit::max(config.max_request_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_allowed_origins.as_deref()));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .unwrap_or_else(|e| fail(format!("Failed to bind to port {}: {}", config.port, e)));

    tracing::info!("Server listening on 0.0.0.0:{}", config.port);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        fail(format!("Server error: {}", e));
    }

    tracing::info!("Server stopped");
}
