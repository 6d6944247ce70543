// libs/appointment-cell/src/services/status.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_database::{DocumentStore, DocumentStoreExt, Precondition, StoreError};
use shared_models::auth::User;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::lifecycle::StatusTransitionGuard;

/// Clinician accept/reject/complete decisions.
pub struct AppointmentStatusService {
    store: Arc<dyn DocumentStore>,
    guard: StatusTransitionGuard,
}

impl AppointmentStatusService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            guard: StatusTransitionGuard::new(),
        }
    }

    /// Validate the requested edge against the stored status and write it
    /// with a precondition on that same status, so a concurrent change
    /// between the read and the write is reported instead of overwritten.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        requested: AppointmentStatus,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Status update {} -> {} requested by {}", appointment_id, requested, actor.id);

        let key = Appointment::key(appointment_id);
        let appointment: Appointment = self
            .store
            .get_as(&key)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))?;

        if appointment.doctor_id != actor.id && !actor.is_admin() {
            warn!("User {} attempted to change status of appointment {}", actor.id, appointment_id);
            return Err(AppointmentError::Unauthorized(
                "Only the appointment's clinician can change its status".to_string(),
            ));
        }

        let next = self.guard.execute(appointment.status, requested)?;

        let patch = json!({
            "status": next,
            "updated_at": Utc::now(),
        });
        let precondition = Precondition::field_equals("status", json!(appointment.status));

        let updated = self
            .store
            .merge_if(&key, &precondition, patch)
            .await
            .map_err(|e| match e {
                StoreError::PreconditionFailed { .. } => AppointmentError::Conflict(format!(
                    "status of {} changed while the update was in flight",
                    appointment_id
                )),
                StoreError::NotFound(_) => AppointmentError::NotFound(appointment_id.to_string()),
                other => AppointmentError::Store(other),
            })?;

        info!("Appointment {} moved {} -> {}", appointment_id, appointment.status, next);
        Ok(serde_json::from_value(updated)?)
    }
}
