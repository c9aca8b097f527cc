//! QuickPay Gateway Service - Main Application Entry Point
//!
//! This is a REST API server that connects a storefront's checkout to the
//! QuickPay v10 card-processing API. It manages orders, builds signed hosted
//! payment-window forms, drives the server-side create/authorize/capture
//! flow, and verifies asynchronous payment callbacks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing (merchant routes);
//!   HMAC-SHA256 checksum (provider callback)
//! - **Provider**: QuickPay v10 REST API via reqwest
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the QuickPay API client
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod quickpay;
mod services;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::DbPool;
use crate::quickpay::client::QuickPayClient;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub pool: DbPool,

    /// Loaded configuration (QuickPay credentials, URLs, defaults)
    pub config: Arc<Config>,

    /// QuickPay v10 API client
    pub quickpay: Arc<QuickPayClient>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Build the QuickPay client
    let quickpay = QuickPayClient::new(&config.quickpay_api_url, &config.quickpay_api_key)?;
    tracing::info!("QuickPay client ready (test_mode: {})", config.test_mode);

    let state = AppState {
        pool,
        config: Arc::new(config),
        quickpay: Arc::new(quickpay),
    };

    // Create authenticated routes (merchant-facing API endpoints)
    let authenticated_routes = Router::new()
        // Order management routes
        .route("/api/v1/orders", post(handlers::orders::create_order))
        .route("/api/v1/orders", get(handlers::orders::list_orders))
        .route("/api/v1/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/api/v1/orders/{id}/comments",
            get(handlers::orders::list_comments),
        )
        .route(
            "/api/v1/orders/{id}/callbacks",
            get(handlers::orders::list_callbacks),
        )
        // Payment window (hosted form) route
        .route(
            "/api/v1/orders/{id}/payment-window",
            post(handlers::orders::build_payment_window),
        )
        // Card-token payment routes
        .route(
            "/api/v1/orders/{id}/payments",
            post(handlers::payments::create_payment),
        )
        .route(
            "/api/v1/payments/{id}",
            get(handlers::payments::get_payment),
        )
        .route(
            "/api/v1/payments/{id}/capture",
            post(handlers::payments::capture_payment),
        )
        .route(
            "/api/v1/payments/{id}/refund",
            post(handlers::payments::refund_payment),
        )
        .route(
            "/api/v1/payments/{id}/cancel",
            post(handlers::payments::cancel_payment),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Provider callback, authenticated by its HMAC checksum header
        .route(
            "/callbacks/quickpay",
            post(handlers::callback::quickpay_callback),
        )
        // Shopper return URLs from the payment window
        .route(
            "/checkout/{order_id}/complete",
            get(handlers::checkout::checkout_complete),
        )
        .route(
            "/checkout/{order_id}/cancel",
            get(handlers::checkout::checkout_cancel),
        )
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state (pool, config, provider client) with all handlers
        .with_state(state.clone());

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
