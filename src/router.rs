//! Route table and middleware stack.

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::handler::Handler;
use axum::routing::{MethodRouter, get, post};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::commands::{self, CommandSlot};
use crate::config::AppConfig;
use crate::runner::CommandRunner;
use crate::storage::Storage;
use crate::{files, frontend, http, upload};

/// Builds the application router. Every API route accepts a single method;
/// anything else is answered by [`http::method_not_supported`].
pub fn build_router(
    config: Arc<AppConfig>,
    storage: Arc<Storage>,
    runner: Arc<CommandRunner>,
) -> Router {
    let body_limit = usize::try_from(config.upload_limit_bytes).unwrap_or(usize::MAX);

    let mut api = Router::new()
        .route(
            "/api/upload",
            post_only(upload::upload_files).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/delete", post_only(files::delete_file))
        .route("/api/list", get_only(files::list_files));
    for slot in CommandSlot::ALL {
        let handler =
            move |config: Extension<Arc<AppConfig>>, runner: Extension<Arc<CommandRunner>>| {
                commands::run_command(slot, config, runner)
            };
        api = api.route(slot.route(), get_only(handler));
    }

    api.merge(frontend::frontend_routes(&config))
        .fallback(http::not_found)
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = http::resolve_client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(Extension(storage))
        .layer(Extension(runner))
        .layer(Extension(config))
}

/// GET-only route. axum answers HEAD with the GET handler unless a HEAD
/// endpoint is set, so HEAD is routed to the 405 handler explicitly.
fn get_only<H, T>(handler: H) -> MethodRouter
where
    H: Handler<T, ()>,
    T: 'static,
{
    get(handler)
        .head(http::method_not_supported)
        .fallback(http::method_not_supported)
}

fn post_only<H, T>(handler: H) -> MethodRouter
where
    H: Handler<T, ()>,
    T: 'static,
{
    post(handler).fallback(http::method_not_supported)
}
