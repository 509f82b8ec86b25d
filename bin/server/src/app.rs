//! Host-dispatching router.
//!
//! The same listener serves the authentication domain and every protected
//! domain; the effective host of each request picks the route table.

use axum::{Router, extract::Request, routing::get};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::auth::{AppState, middleware::effective_authority, routes};

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let access_host = state.config.access_host();

    let access = Router::new()
        .route("/", get(routes::delegate))
        .route("/authorize", get(routes::authorize))
        .route("/health", get(routes::health))
        .route("/whoami", get(routes::whoami))
        .fallback(routes::not_found)
        .with_state(state.clone());

    // The delegation path ends in `/` (see `validate`) and covers its subtree.
    let delegation_subtree = format!("{}{{*rest}}", state.config.delegation_path);
    let protected = Router::new()
        .route(&state.config.delegation_path, get(routes::finalize_delegation))
        .route(&delegation_subtree, get(routes::finalize_delegation))
        .fallback(routes::verify_access)
        .with_state(state);

    Router::new()
        .fallback(move |request: Request| {
            let on_access_domain = effective_authority(request.headers())
                .is_some_and(|host| host == access_host);
            let router = if on_access_domain {
                access.clone()
            } else {
                protected.clone()
            };
            async move { router.oneshot(request).await }
        })
        .layer(TraceLayer::new_for_http())
}
