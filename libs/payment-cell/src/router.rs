// libs/payment-cell/src/router.rs
use axum::{routing::post, Router};

use shared_database::AppState;

use crate::handlers;

pub fn payment_routes(state: AppState) -> Router {
    // The processor authenticates with the signature header, not a bearer token
    Router::new()
        .route("/webhook", post(handlers::paddle_webhook))
        .with_state(state)
}
