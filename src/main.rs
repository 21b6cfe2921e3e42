//! Image Safety Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use image_safety_lib::api;
use image_safety_lib::config::Config;
use image_safety_lib::middleware::RequestLogger;
use image_safety_lib::services::{self, FileStore, HeuristicAnalyzer, SharedAnalyzer, SweepConfig};
use image_safety_lib::store;

/// Perform health check (for Docker healthcheck).
async fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        if health_check().await {
            std::process::exit(0);
        } else {
            std::process::exit(1);
        }
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Image Safety Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for DATABASE_URL and data paths");
    }

    // Create data directory for uploaded files
    if let Err(e) = tokio::fs::create_dir_all(&config.data_dir).await {
        error!(
            "Failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        );
        std::process::exit(1);
    }

    // Open the record store (runs migrations on the database backend)
    let record_store = match store::open(&config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open record store: {}", e);
            std::process::exit(1);
        }
    };
    info!("Record store ready ({})", config.store_backend);

    // File storage for uploaded bytes
    let file_store = Arc::new(FileStore::new(config.data_dir.clone()));
    if let Err(e) = file_store.init().await {
        error!("Failed to initialize file storage: {}", e);
        std::process::exit(1);
    }

    let analyzer: SharedAnalyzer = Arc::new(HeuristicAnalyzer::new());

    // Start the background analysis sweep
    let sweep_config = SweepConfig {
        interval_secs: config.sweep_interval_secs,
        min_age_secs: config.sweep_min_age_secs,
        ..SweepConfig::default()
    };
    services::start_sweep_task(
        record_store.clone(),
        file_store.clone(),
        analyzer.clone(),
        sweep_config,
    );
    info!(
        "Analysis sweep started (every {}s, min record age {}s)",
        config.sweep_interval_secs, config.sweep_min_age_secs
    );

    // Prepare shared state
    let bind_address = config.bind_address();
    let max_upload_size = config.max_upload_size;
    let is_development = config.is_development();

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = if is_development {
            // Permissive CORS for development
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-owner-id"),
                ])
                .max_age(3600)
        } else {
            // Restrictive CORS for production (same-origin only)
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-owner-id"),
                ])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(web::Data::new(record_store.clone()))
            .app_data(web::Data::new(file_store.clone()))
            .app_data(web::Data::new(analyzer.clone()))
            .app_data(web::Data::new(max_upload_size))
            // Allow 2x max_upload_size at the HTTP layer; the streaming code
            // enforces the real limit per field
            .app_data(web::PayloadConfig::new(max_upload_size * 2))
            .configure(api::configure_health_routes)
            .service(
                web::scope("/api/v1")
                    .configure(services::configure_upload_routes)
                    .configure(api::configure_image_routes)
                    .configure(api::configure_stats_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
            )
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}
