// libs/appointment-cell/src/services/notifications.rs
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use shared_database::DocumentStore;
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, Notification, NotificationAction,
    NotificationKind, ViewerRole, APPOINTMENTS_COLLECTION,
};

/// Pure projection of appointments into one viewer's notification list.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationProjector;

impl NotificationProjector {
    pub fn new() -> Self {
        Self
    }

    /// Newest activity first. Appointments the viewer does not take part in,
    /// or has dismissed, are skipped.
    pub fn project<I>(&self, viewer_id: &str, role: ViewerRole, appointments: I) -> Vec<Notification>
    where
        I: IntoIterator<Item = Appointment>,
    {
        let mut visible: Vec<Appointment> = appointments
            .into_iter()
            .filter(|appointment| !appointment.is_dismissed_by(viewer_id))
            .filter(|appointment| match role {
                ViewerRole::Clinician => {
                    appointment.doctor_id == viewer_id
                        && appointment.status == AppointmentStatus::Pending
                }
                ViewerRole::Counterpart => appointment.patient_id == viewer_id,
            })
            .collect();

        visible.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        visible
            .into_iter()
            .map(|appointment| Self::notification(role, appointment))
            .collect()
    }

    fn notification(role: ViewerRole, appointment: Appointment) -> Notification {
        let (kind, counterpart_id, actions) = match role {
            ViewerRole::Clinician => (
                NotificationKind::NeedsAction,
                appointment.patient_id.clone(),
                vec![NotificationAction::Accept, NotificationAction::Reject],
            ),
            ViewerRole::Counterpart => {
                let actions = if appointment.status == AppointmentStatus::Cancelled {
                    vec![NotificationAction::Reschedule]
                } else {
                    Vec::new()
                };
                (NotificationKind::StatusUpdate, appointment.doctor_id.clone(), actions)
            }
        };

        Notification {
            updated_at: appointment.last_activity(),
            appointment_id: appointment.id,
            kind,
            status: appointment.status,
            scheduled_for: appointment.scheduled_for,
            counterpart_id,
            is_paid: appointment.is_paid,
            actions,
        }
    }
}

pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    projector: NotificationProjector,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            projector: NotificationProjector::new(),
        }
    }

    pub fn role_of(viewer: &User) -> ViewerRole {
        if viewer.is_doctor() {
            ViewerRole::Clinician
        } else {
            ViewerRole::Counterpart
        }
    }

    pub async fn notifications_for(&self, viewer: &User) -> Result<Vec<Notification>, AppointmentError> {
        let role = Self::role_of(viewer);
        let field = match role {
            ViewerRole::Clinician => "doctor_id",
            ViewerRole::Counterpart => "patient_id",
        };

        let documents = self
            .store
            .query(APPOINTMENTS_COLLECTION, field, &json!(viewer.id))
            .await?;

        let appointments: Vec<Appointment> = documents
            .into_iter()
            .filter_map(|document| match serde_json::from_value(document) {
                Ok(appointment) => Some(appointment),
                Err(e) => {
                    warn!("Skipping unreadable appointment document: {}", e);
                    None
                }
            })
            .collect();

        debug!("Projecting {} appointments for viewer {}", appointments.len(), viewer.id);
        Ok(self.projector.project(&viewer.id, role, appointments))
    }
}
