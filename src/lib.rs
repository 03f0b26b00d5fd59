//! Car-rental marketplace backend.
//!
//! Browsing, search, and an admin back office for car/brand/category
//! listings. Documents live in Redis (one hash per collection, JSON values);
//! a Meilisearch index over the car fleet is kept in sync for full-text
//! search and is only ever reached through this backend.
//!
//! # Notes
//!
//! ## Redis + Meilisearch
//! Redis is the source of truth: listings are small (hundreds of cars, tens
//! of brands), so hash lookups and full-collection reads are cheap and
//! atomic writes come for free. Meilisearch is only a projection of the car
//! collection for typo-tolerant text search; it is resynced at startup and
//! trailed on every write, and losing it degrades `/search` without touching
//! CRUD.
//!
//! ## Schema drift
//! Years of admin-console edits left documents written under two generations
//! of field names (`fuel`/`fuelType`, `category`/`type`,
//! `isAvailable`/`available`, `isFeatured`/`featured`). Nothing leaves the
//! store without passing [`normalize`], which resolves the aliases into one
//! canonical shape; the legacy names survive only as read-only mirrors on
//! the wire.

use std::time::Duration;

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod featured;
pub mod model;
pub mod normalize;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
pub mod store;

use routes::{
    create_brand, create_car, create_category, delete_brand, delete_car, delete_category,
    featured_brands, featured_cars, featured_categories, get_brand, get_car, get_category,
    home_featured, list_brands, list_cars, list_categories, search_cars, update_brand, update_car,
    update_category,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/cars", get(list_cars).post(create_car))
        .route("/cars/featured", get(featured_cars))
        .route("/cars/{id}", get(get_car).put(update_car).delete(delete_car))
        .route("/brands", get(list_brands).post(create_brand))
        .route("/brands/featured", get(featured_brands))
        .route(
            "/brands/{id}",
            get(get_brand).put(update_brand).delete(delete_brand),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/featured", get(featured_categories))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/home/featured", get(home_featured))
        .route("/search", get(search_cars))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
