pub mod auth;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod validation;

use std::{path::PathBuf, sync::Arc};

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{config::Config, db::Store};

use handlers::ApiDoc;

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, api_key: &str) -> Self {
        Self {
            store,
            api_key: Arc::from(api_key),
        }
    }
}

/// Router-level settings that are not needed by handlers.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub static_dir: PathBuf,
    pub expose_error_details: bool,
}

impl From<&Config> for RouterConfig {
    fn from(config: &Config) -> Self {
        Self {
            static_dir: config.static_dir.clone(),
            expose_error_details: config.environment.exposes_error_details(),
        }
    }
}

pub fn router(state: AppState, config: RouterConfig) -> Router {
    let require_key = from_fn_with_state(state.clone(), auth::require_api_key);

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/health", get(handlers::health))
        .route("/api/stats", get(handlers::get_stats))
        .route(
            "/api/sensor",
            get(handlers::get_latest_sensor)
                .merge(post(handlers::create_sensor_reading).route_layer(require_key.clone())),
        )
        .route(
            "/api/sensor/http",
            post(handlers::create_sensor_reading).route_layer(require_key.clone()),
        )
        .route("/api/sensor/history", get(handlers::get_sensor_history))
        .route(
            "/api/accident",
            post(handlers::create_accident_event).route_layer(require_key),
        )
        .route("/api/accident/{id}", get(handlers::get_accident))
        .route("/api/accidents", get(handlers::get_accidents))
        .route("/api/map", get(handlers::get_map))
        .route("/api/car/position", get(handlers::get_car_position))
        .with_state(state)
        .split_for_parts();

    router
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .fallback_service(middleware::dashboard_service(&config.static_dir))
        .layer(CatchPanicLayer::custom(middleware::panic_response(
            config.expose_error_details,
        )))
        .layer(middleware::cors_layer())
        .layer(from_fn(middleware::log_requests))
}
