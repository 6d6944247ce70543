// libs/payment-cell/src/handlers.rs
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{PaymentError, PaymentEvent};
use crate::services::{PaymentReconciler, SignatureVerifier};

pub const SIGNATURE_HEADER: &str = "Paddle-Signature";

fn to_app_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::NotConfigured => {
            AppError::Internal("Webhook secret is not configured".to_string())
        }
        PaymentError::MissingSignature => AppError::Auth("Missing signature".to_string()),
        PaymentError::InvalidSignature => AppError::Auth("Invalid signature".to_string()),
        PaymentError::MalformedPayload(msg) => AppError::BadRequest(msg),
        // 400 so the processor redelivers; the detail stays in the log
        PaymentError::AppointmentNotFound(id) => {
            warn!("Webhook references unknown appointment {}", id);
            AppError::BadRequest("Webhook processing failed".to_string())
        }
        PaymentError::CorruptRecord(e) => {
            error!("Unreadable record while reconciling payment: {}", e);
            AppError::BadRequest("Webhook processing failed".to_string())
        }
        PaymentError::Store(e) => {
            error!("Store failure while reconciling payment: {}", e);
            AppError::BadRequest("Webhook processing failed".to_string())
        }
    }
}

fn verifier_from(config: &AppConfig) -> SignatureVerifier {
    SignatureVerifier::new(config.paddle_webhook_secret.clone())
        .with_tolerance(config.webhook_tolerance_secs.map(chrono::Duration::seconds))
}

/// Signature is checked against the raw bytes before anything is parsed.
fn authenticate(config: &AppConfig, headers: &HeaderMap, body: &[u8]) -> Result<(), PaymentError> {
    if !config.is_payment_configured() {
        return Err(PaymentError::NotConfigured);
    }

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or(PaymentError::MissingSignature)?;

    if !verifier_from(config).verify(body, header) {
        return Err(PaymentError::InvalidSignature);
    }

    Ok(())
}

#[axum::debug_handler]
pub async fn paddle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    authenticate(&state.config, &headers, &body).map_err(to_app_error)?;

    let event = PaymentEvent::from_slice(&body).map_err(to_app_error)?;

    if let PaymentEvent::Unhandled(event_type) = &event {
        debug!("Ignoring webhook event type {}", event_type);
        return Ok(Json(json!({ "ok": true })));
    }

    let reconciler = PaymentReconciler::new(state.store.clone());
    reconciler.reconcile(&event).await.map_err(to_app_error)?;

    Ok(Json(json!({ "ok": true })))
}
