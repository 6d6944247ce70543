// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use shared_database::AppState;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentError, BookAppointmentRequest, UpdateStatusRequest};
use crate::services::{
    AppointmentBookingService, AppointmentStatusService, DismissalTracker, NotificationService,
};

fn to_app_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound(_) => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::InvalidTransition { from, to } => {
            AppError::BadRequest(format!("Invalid status transition from {} to {}", from, to))
        }
        AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
        AppointmentError::Conflict(_) => AppError::Conflict(
            "Appointment was updated by someone else, reload and retry".to_string(),
        ),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::CorruptRecord(e) => {
            error!("Unreadable appointment record: {}", e);
            AppError::Internal(e.to_string())
        }
        AppointmentError::Store(e) => AppError::Database(e.to_string()),
    }
}

/// Body rejections render through `AppError` like every other failure.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            Err(AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text())))
        }
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = json_body(payload)?;
    let booking_service = AppointmentBookingService::new(state.store.clone());

    let appointment = booking_service
        .book_appointment(request, &user)
        .await
        .map_err(to_app_error)?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(state.store.clone());

    let appointment = booking_service
        .get_appointment(&appointment_id, &user)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

/// Clinician accept/reject/complete. Body: `{ "status": "<new-status>" }`.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    let status_service = AppointmentStatusService::new(state.store.clone());

    let appointment = status_service
        .update_status(&appointment_id, request.status, &user)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn dismiss_notification(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let tracker = DismissalTracker::new(state.store.clone());

    tracker
        .dismiss(&appointment_id, &user)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "ok": true })))
}

#[axum::debug_handler]
pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(state.store.clone());

    let notifications = notification_service
        .notifications_for(&user)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len(),
    })))
}
