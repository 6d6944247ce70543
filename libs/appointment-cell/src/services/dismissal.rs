// libs/appointment-cell/src/services/dismissal.rs
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use shared_database::{DocumentStore, DocumentStoreExt, StoreError};
use shared_models::auth::User;

use crate::models::{Appointment, AppointmentError};

/// Per-viewer notification dismissals stored on the appointment itself.
pub struct DismissalTracker {
    store: Arc<dyn DocumentStore>,
}

impl DismissalTracker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Add the viewer to `dismissed_by`. The write is a merge that touches
    /// only `dismissed_by.<viewer_id>`, so concurrent dismissals by other
    /// viewers are never lost. Repeat calls are no-ops.
    pub async fn dismiss(&self, appointment_id: &str, viewer: &User) -> Result<(), AppointmentError> {
        let key = Appointment::key(appointment_id);
        let appointment: Appointment = self
            .store
            .get_as(&key)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))?;

        if !appointment.is_participant(&viewer.id) && !viewer.is_admin() {
            return Err(AppointmentError::Unauthorized(
                "Only participants can dismiss appointment notifications".to_string(),
            ));
        }

        if appointment.is_dismissed_by(&viewer.id) {
            debug!("Appointment {} already dismissed by {}", appointment_id, viewer.id);
            return Ok(());
        }

        self.store
            .merge(&key, dismissal_patch(&viewer.id))
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AppointmentError::NotFound(appointment_id.to_string()),
                other => AppointmentError::Store(other),
            })?;

        info!("Appointment {} dismissed by {}", appointment_id, viewer.id);
        Ok(())
    }
}

fn dismissal_patch(viewer_id: &str) -> Value {
    let mut entry = Map::new();
    entry.insert(viewer_id.to_string(), Value::Bool(true));
    json!({ "dismissed_by": entry })
}
