//! API module
//!
//! HTTP API endpoints, shared state and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AccessControl;
use crate::clock::Clock;
use crate::handlers::{BorrowHandler, CatalogHandler, LoanQueryHandler, ReturnHandler};
use crate::store::Store;

pub use routes::create_router;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub access: AccessControl,
    pub borrow: BorrowHandler,
    pub returns: ReturnHandler,
    pub loans: LoanQueryHandler,
    pub catalog: CatalogHandler,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, token_ttl: chrono::Duration) -> Self {
        Self {
            access: AccessControl::new(store.clone(), clock.clone(), token_ttl),
            borrow: BorrowHandler::new(store.clone(), clock.clone()),
            returns: ReturnHandler::new(store.clone(), clock.clone()),
            loans: LoanQueryHandler::new(store.clone(), clock),
            catalog: CatalogHandler::new(store),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: trace -> logging -> auth -> handler
    create_router()
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
