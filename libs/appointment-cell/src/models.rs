// libs/appointment-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use shared_database::{DocumentKey, StoreError};

pub const APPOINTMENTS_COLLECTION: &str = "appointments";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_provider: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    /// Viewers who hid this appointment from their notifications.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dismissed_by: BTreeMap<String, bool>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn key(appointment_id: &str) -> DocumentKey {
        DocumentKey::new(APPOINTMENTS_COLLECTION, appointment_id)
    }

    pub fn is_dismissed_by(&self, viewer_id: &str) -> bool {
        self.dismissed_by.get(viewer_id).copied().unwrap_or(false)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    /// Most recent write to the record, falling back to creation time for
    /// documents written without `updated_at`.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.updated_at.max(self.created_at)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Paid,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Defaults to the caller.
    pub patient_id: Option<String>,
    pub doctor_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    /// The appointment's doctor, who accepts or rejects pending bookings.
    Clinician,
    /// The other party, who follows the appointment's status.
    Counterpart,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NeedsAction,
    StatusUpdate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    Accept,
    Reject,
    Reschedule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub appointment_id: String,
    pub kind: NotificationKind,
    pub status: AppointmentStatus,
    pub scheduled_for: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub counterpart_id: String,
    pub is_paid: bool,
    pub actions: Vec<NotificationAction>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized access to appointment: {0}")]
    Unauthorized(String),

    #[error("Appointment was modified concurrently: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Stored appointment is unreadable: {0}")]
    CorruptRecord(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_appointment_tolerates_missing_and_null_optional_fields() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": "apt_1",
            "patient_id": "patient-1",
            "doctor_id": "doctor-1",
            "scheduled_for": "2026-11-01T09:00:00Z",
            "status": "pending",
            "dismissed_by": null,
            "created_at": "2026-10-01T09:00:00Z"
        }))
        .unwrap();

        assert!(!appointment.is_paid);
        assert!(appointment.dismissed_by.is_empty());
        assert_eq!(appointment.last_activity(), appointment.created_at);
    }

    #[test]
    fn test_status_round_trips_as_snake_case() {
        assert_eq!(json!(AppointmentStatus::Cancelled), json!("cancelled"));
        let parsed: AppointmentStatus = serde_json::from_value(json!("paid")).unwrap();
        assert_eq!(parsed, AppointmentStatus::Paid);
    }
}
