#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for farm discovery.
//!
//! Loads the farm directory snapshot at startup, builds the in-memory
//! spatial and text-search indexes over it, and serves the discovery
//! endpoints under `/api`. Bind address, port, and the snapshot path come
//! from the environment (`BIND_ADDR`, `PORT`, `FARM_MAP_FARMS_FILE`),
//! with CLI flags taking precedence.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use farm_map_discovery::DiscoveryService;
use farm_map_ingest::load_snapshot;
use farm_map_search::FarmSearchIndex;
use farm_map_spatial::{FarmIndex, SharedFarmIndex};

/// Shared application state.
pub struct AppState {
    /// The discovery facade every handler calls into.
    pub service: DiscoveryService,
}

/// Server configuration with environment fallbacks.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind; `BIND_ADDR`, default `127.0.0.1`.
    pub bind_addr: String,
    /// Port to listen on; `PORT`, default `8080`.
    pub port: u16,
    /// Farm directory snapshot path; `FARM_MAP_FARMS_FILE`, default
    /// `data/farms.uk.json`.
    pub farms_file: PathBuf,
}

impl ServerConfig {
    /// Resolves configuration from the environment, falling back to the
    /// defaults documented on each field.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            farms_file: std::env::var("FARM_MAP_FARMS_FILE")
                .map_or_else(|_| PathBuf::from("data/farms.uk.json"), PathBuf::from),
        }
    }
}

/// The `/api` route tree, shared by [`run_server`] and the handler tests
/// so both exercise the same routing table.
fn api_scope() -> actix_web::Scope {
    web::scope("/api")
        .route("/health", web::get().to(handlers::health))
        .route("/discover", web::get().to(handlers::discover))
        .route("/clusters", web::get().to(handlers::clusters))
        .route("/farms/{id}/nearby", web::get().to(handlers::farm_nearby))
        .route("/nearest", web::get().to(handlers::nearest))
}

/// Starts the farm map API server.
///
/// Loads the farm directory snapshot, builds the spatial and text-search
/// indexes, and starts the Actix-Web HTTP server. This is a regular async
/// function; the caller is responsible for providing the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the farm snapshot cannot be loaded or the text-search index
/// cannot be built.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let ServerConfig {
        bind_addr,
        port,
        farms_file,
    } = config;

    log::info!(
        "Loading farm directory snapshot from {}...",
        farms_file.display()
    );
    let snapshot = load_snapshot(&farms_file).expect("Failed to load farm snapshot");

    log::info!("Building spatial index...");
    let store = SharedFarmIndex::new(FarmIndex::build(snapshot.points()));

    log::info!("Building text search index...");
    let search = FarmSearchIndex::build(&snapshot.records).expect("Failed to build search index");

    let service = DiscoveryService::new(Arc::new(store), Arc::new(search));
    let state = web::Data::new(AppState { service });

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(api_scope())
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
