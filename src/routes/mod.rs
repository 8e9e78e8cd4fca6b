pub mod assets;
pub mod auth;
pub mod health;
pub mod pages;
pub mod posts;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application: server-rendered pages, embedded assets, and the JSON API under `/api`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .merge(posts::router())
        .merge(auth::router())
        .layer(CorsLayer::permissive());

    Router::new()
        .merge(pages::router())
        .route("/assets/{*path}", get(assets::serve))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
