//! Root document and `/static` assets served from disk.

use axum::Router;
use axum::routing::get_service;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::AppConfig;

/// `GET /` serves the index document; `/static/*` serves the asset tree.
/// Missing files answer 404.
pub fn frontend_routes(config: &AppConfig) -> Router {
    Router::new()
        .route("/", get_service(ServeFile::new(&config.index_file)))
        .nest_service("/static", ServeDir::new(&config.static_dir))
}
