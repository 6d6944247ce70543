// libs/appointment-cell/src/services/booking.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{DocumentStore, DocumentStoreExt};
use shared_models::auth::User;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest};

/// Minimal booking intake: records a new `pending`, unpaid appointment.
pub struct AppointmentBookingService {
    store: Arc<dyn DocumentStore>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = request.patient_id.unwrap_or_else(|| actor.id.clone());
        debug!("Booking appointment for patient {} with doctor {}", patient_id, request.doctor_id);

        if patient_id != actor.id && !actor.is_admin() {
            return Err(AppointmentError::Unauthorized(
                "Not authorized to book appointment for this patient".to_string(),
            ));
        }
        if request.doctor_id.trim().is_empty() {
            return Err(AppointmentError::ValidationError("doctor_id is required".to_string()));
        }
        if request.doctor_id == patient_id {
            return Err(AppointmentError::ValidationError(
                "patient and doctor must be different users".to_string(),
            ));
        }

        let now = Utc::now();
        if request.scheduled_for <= now {
            return Err(AppointmentError::ValidationError(
                "Appointment must be scheduled for a future time".to_string(),
            ));
        }

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id,
            doctor_id: request.doctor_id,
            scheduled_for: request.scheduled_for,
            status: AppointmentStatus::Pending,
            is_paid: false,
            transaction_id: None,
            payment_status: None,
            payment_provider: None,
            paid_at: None,
            dismissed_by: BTreeMap::new(),
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        self.store
            .set(&Appointment::key(&appointment.id), serde_json::to_value(&appointment)?)
            .await?;

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Fetch one appointment for one of its participants (or an admin).
    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment: Appointment = self
            .store
            .get_as(&Appointment::key(appointment_id))
            .await?
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))?;

        if !appointment.is_participant(&actor.id) && !actor.is_admin() {
            return Err(AppointmentError::Unauthorized(
                "Not authorized to view this appointment".to_string(),
            ));
        }

        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use shared_database::InMemoryDocumentStore;
    use shared_utils::test_utils::TestUser;

    fn request(doctor_id: &str, hours_ahead: i64) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: None,
            doctor_id: doctor_id.to_string(),
            scheduled_for: Utc::now() + Duration::hours(hours_ahead),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_booking_creates_pending_unpaid_appointment() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = AppointmentBookingService::new(store.clone());
        let patient = TestUser::patient("patient@example.com").to_user();

        let appointment = service.book_appointment(request("doctor-1", 24), &patient).await.unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert!(!appointment.is_paid);
        assert!(appointment.dismissed_by.is_empty());
        assert_eq!(appointment.patient_id, patient.id);

        let fetched = service.get_appointment(&appointment.id, &patient).await.unwrap();
        assert_eq!(fetched, appointment);
    }

    #[tokio::test]
    async fn test_booking_rejects_past_times_and_foreign_patients() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = AppointmentBookingService::new(store);
        let patient = TestUser::patient("patient@example.com").to_user();

        assert_matches!(
            service.book_appointment(request("doctor-1", -1), &patient).await,
            Err(AppointmentError::ValidationError(_))
        );

        let mut foreign = request("doctor-1", 24);
        foreign.patient_id = Some("another-patient".to_string());
        assert_matches!(
            service.book_appointment(foreign, &patient).await,
            Err(AppointmentError::Unauthorized(_))
        );
    }
}
