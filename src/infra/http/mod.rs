//! HTTP surface: `GET`/`POST /formula` and `GET /health`.

mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};

use axum::{Router, middleware::from_fn, routing::get};

use crate::application::formula::FormulaService;

#[derive(Clone)]
pub struct HttpState {
    pub service: FormulaService,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/formula",
            get(handlers::render_from_query).post(handlers::render_from_json),
        )
        .route("/health", get(handlers::health))
        .layer(from_fn(middleware::log_responses))
        .with_state(state)
}
