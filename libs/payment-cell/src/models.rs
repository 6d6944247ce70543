// libs/payment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_database::{DocumentKey, StoreError};

pub const PAYMENTS_COLLECTION: &str = "payments";
pub const PADDLE_PROVIDER: &str = "paddle";
pub const TRANSACTION_COMPLETED: &str = "transaction.completed";

// ==============================================================================
// PAYMENT LEDGER
// ==============================================================================

/// One settled charge. The document id is the processor's transaction id,
/// which makes it the idempotency key for reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub appointment_id: String,
    pub status: PaymentStatus,
    pub provider: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn key(transaction_id: &str) -> DocumentKey {
        DocumentKey::new(PAYMENTS_COLLECTION, transaction_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
}

// ==============================================================================
// WEBHOOK EVENTS
// ==============================================================================

/// Webhook payload normalized into the one shape reconciliation works on.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    TransactionCompleted(CompletedTransaction),
    /// Event types this service does not act on.
    Unhandled(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedTransaction {
    pub transaction_id: Option<String>,
    pub appointment_id: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

const TRANSACTION_ID_PATHS: &[&str] = &["/id", "/transaction_id", "/transactionId"];

const APPOINTMENT_ID_PATHS: &[&str] = &[
    "/custom_data/appointmentId",
    "/custom_data/appointment_id",
    "/custom_data/appointmentID",
    "/customData/appointmentId",
    "/customData/appointment_id",
    "/customData/appointmentID",
    "/metadata/appointmentId",
    "/metadata/appointment_id",
    "/metadata/appointmentID",
];

const AMOUNT_PATHS: &[&str] = &["/details/totals/grand_total", "/details/totals/total"];

const CURRENCY_PATHS: &[&str] = &["/currency_code"];

/// First non-empty string found at any of the JSON pointers.
fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl PaymentEvent {
    /// Parse raw webhook bytes. Fails only when the body is not a JSON object
    /// or carries no event type; missing ids are left for the reconciler.
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, PaymentError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::MalformedPayload(format!("body is not valid JSON: {}", e)))?;

        if !payload.is_object() {
            return Err(PaymentError::MalformedPayload("body is not a JSON object".to_string()));
        }

        let event_type = first_string(&payload, &["/event_type", "/type"])
            .ok_or_else(|| PaymentError::MalformedPayload("missing event type".to_string()))?;

        if event_type != TRANSACTION_COMPLETED {
            return Ok(PaymentEvent::Unhandled(event_type));
        }

        let data = payload.get("data").unwrap_or(&Value::Null);
        Ok(PaymentEvent::TransactionCompleted(CompletedTransaction {
            transaction_id: first_string(data, TRANSACTION_ID_PATHS),
            appointment_id: first_string(data, APPOINTMENT_ID_PATHS),
            amount: first_string(data, AMOUNT_PATHS),
            currency: first_string(data, CURRENCY_PATHS),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payment recorded and appointment marked paid.
    Applied,
    /// A payment for this transaction id already exists.
    AlreadyApplied,
    /// The appointment was paid under another transaction id.
    AlreadyPaid { existing_transaction_id: Option<String> },
    /// The event did not name both an appointment and a transaction.
    Ignored,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Webhook secret is not configured")]
    NotConfigured,

    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    #[error("Stored record is unreadable: {0}")]
    CorruptRecord(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
