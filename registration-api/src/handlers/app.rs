use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing, Router};
use tower::limit::ConcurrencyLimitLayer;

use registration_common::handler::FormHandler;

use super::hook;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<FormHandler>,
    pub webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(handler: FormHandler, webhook_secret: &str) -> Self {
        Self {
            handler: Arc::new(handler),
            webhook_secret: Arc::from(webhook_secret),
        }
    }
}

pub fn add_routes(
    router: Router,
    state: AppState,
    max_body_size: usize,
    concurrency_limit: usize,
) -> Router {
    router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route("/_liveness", routing::get(index))
        .route("/health", routing::get(health))
        .route(
            "/hook",
            routing::post(hook::post_hook)
                .with_state(state)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(concurrency_limit))
                .layer(DefaultBodyLimit::max(max_body_size)),
        )
}

pub async fn index() -> &'static str {
    "registration handler"
}

pub async fn health() -> &'static str {
    "OK"
}
