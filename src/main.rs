//! Birth Trauma Predict
//!
//! Clinician-facing demo: enter one patient's features, get the random
//! forest's predicted childbirth psychological trauma score together with a
//! SHAP force plot and the precomputed global-importance plot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    BIRTH TRAUMA PREDICT                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────────┐  ┌───────────────────┐  │
//! │  │  Router   │  │  Prediction      │  │  Reference image  │  │
//! │  │  (Axum)   │─▶│  Service         │  │  fetcher          │  │
//! │  │  HTML/API │  │  schema+TreeSHAP │  │  (reqwest)        │  │
//! │  └───────────┘  └────────┬─────────┘  └───────────────────┘  │
//! │                          ▼                                   │
//! │                 ┌─────────────────┐                          │
//! │                 │ Forest artifact │                          │
//! │                 └─────────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod constants;
mod error;
mod handlers;
mod logic;
mod models;
mod render;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logic::model::{load_model, ModelInfo};
use logic::{ImageFetcher, PredictionService};
use models::FeatureSchema;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "birth_trauma_predict=debug,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("{} v{} starting...", constants::APP_NAME, constants::APP_VERSION);

    let state = match build_state(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            return Err(e);
        }
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub service: PredictionService,
    pub model_info: Arc<ModelInfo>,
    pub images: ImageFetcher,
}

/// Load the model and schema and bind them; any failure here is fatal
pub fn build_state(config: config::Config) -> anyhow::Result<AppState> {
    let loaded = load_model(&config.model_path)
        .with_context(|| format!("failed to load model from {}", config.model_path.display()))?;

    let schema = match &config.schema_path {
        Some(path) => {
            tracing::info!("Loading feature schema from: {}", path.display());
            FeatureSchema::load(path)
                .with_context(|| format!("failed to load schema from {}", path.display()))?
        }
        None => FeatureSchema::builtin(),
    };

    let service = PredictionService::bind(schema, loaded.forest)
        .context("feature schema does not match the model")?;

    let images = ImageFetcher::new(config.reference_image_url.clone(), config.image_fetch_timeout())
        .context("failed to build HTTP client")?;
    tracing::info!(
        "Reference image: {} (timeout {}s)",
        images.url(),
        config.image_fetch_timeout_secs
    );

    Ok(AppState {
        config,
        service,
        model_info: Arc::new(loaded.info),
        images,
    })
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // HTML form page
    let page_routes = Router::new()
        .route("/", get(handlers::page::index))
        .route("/predict", post(handlers::page::predict));

    // JSON API
    let api_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/schema", get(handlers::predict::schema))
        .route("/api/v1/model", get(handlers::predict::model))
        .route("/api/v1/predict", post(handlers::predict::predict));

    Router::new()
        .merge(page_routes)
        .merge(api_routes)
        .fallback(error::not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
