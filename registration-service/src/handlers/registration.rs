use crate::dtos::{
    RegisterRequest, RegistrationListResponse, RegistrationResponse, SubscribeRequest,
    SubscribeResponse,
};
use crate::middleware::UserId;
use crate::services::RegistrationError;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;
use validator::Validate;

/// Register the calling user for an event and subscribe their device to the
/// event's topic.
pub async fn register_for_event(
    State(state): State<AppState>,
    user_id: UserId,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let registration = state
        .orchestrator
        .register_for_event(&user_id.0, &req.event_id, &req.device_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse::from(registration)),
    ))
}

pub async fn list_registrations(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let registrations = state
        .orchestrator
        .store()
        .enrollments_for(&user_id.0)
        .await
        .map_err(RegistrationError::from)?;

    Ok(Json(RegistrationListResponse {
        user_id: user_id.0,
        registrations,
    }))
}

/// Subscribe a device to festival-wide announcements. A failed subscription
/// is reported as 502.
pub async fn subscribe_to_broadcasts(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let receipt = state
        .orchestrator
        .subscribe_to_broadcasts(&req.device_id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    Ok(Json(SubscribeResponse::from(receipt)))
}
