pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ApiConfig, SecurityConfig};
use crate::state::AppState;

/// All routes behind the authorization gate.
///
/// The gate is a route layer so it sees the matched path template, which is
/// what the bypass list names (`"POST /sign/up"`).
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .merge(sign_routes())
        // Protected
        .merge(account_routes())
        .merge(pet_routes())
        .merge(feed_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.gate.clone(),
            middleware::authorize,
        ))
        .with_state(state)
}

/// [`app`] plus the transport layers: call deadline, body limit, CORS, tracing.
pub fn app_with_layers(state: AppState, api: &ApiConfig, security: &SecurityConfig) -> Router {
    let mut router = app(state)
        .layer(DefaultBodyLimit::max(api.max_request_size_bytes))
        .layer(RequestBodyLimitLayer::new(api.max_request_size_bytes))
        .layer(TimeoutLayer::new(api.call_timeout()));

    if security.enable_cors {
        router = router.layer(cors_layer(&security.cors_origins));
    }

    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn sign_routes() -> Router<AppState> {
    use handlers::{protected::account, public};

    Router::new()
        .route("/sign/up", post(public::sign_up))
        .route("/sign/in", post(public::sign_in))
        .route("/sign/refresh", post(public::sign_refresh))
        .route("/sign/out", post(account::sign_out))
}

fn account_routes() -> Router<AppState> {
    use handlers::protected::account;

    Router::new()
        .route(
            "/account",
            get(account::get).patch(account::patch).delete(account::delete),
        )
        .route("/account/photo", put(account::put_photo))
}

fn pet_routes() -> Router<AppState> {
    use handlers::protected::pets;

    Router::new()
        .route("/pets", get(pets::list).post(pets::create))
        .route(
            "/pets/:pet_id",
            get(pets::get).patch(pets::patch).delete(pets::delete),
        )
        .route("/pets/:pet_id/photo", put(pets::put_photo))
        .route("/pets/:pet_id/feeders", post(pets::join))
}

fn feed_routes() -> Router<AppState> {
    use handlers::protected::feeds;

    Router::new()
        .route("/pets/:pet_id/feeds", get(feeds::list).post(feeds::create))
        .route(
            "/pets/:pet_id/feeds/:feed_id",
            axum::routing::patch(feeds::patch).delete(feeds::delete),
        )
}
