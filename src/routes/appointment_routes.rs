// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        AppState, Appointment, AvailableSlotsQuery, CreateAppointmentRequest, MessageResponse,
        Slot, UpdateAppointmentRequest,
    },
    services::BookingService,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/available-slots", get(available_slots))
        .route(
            "/appointments/{appointment_id}",
            put(update_appointment).delete(cancel_appointment),
        )
}

fn service(state: &AppState) -> BookingService<'_> {
    BookingService::new(state.store.as_ref(), state.notifier.as_ref(), &state.policy)
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let rows = service(&state).list(&auth.user).await?;
    Ok(Json(rows))
}

/* ============================================================
   POST /appointments
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let out = service(&state).create(&auth.user, req).await?;
    Ok(Json(out.appointment))
}

/* ============================================================
   PUT /appointments/{id}  (reschedule / partial update)
   ============================================================ */

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let out = service(&state)
        .update(&auth.user, appointment_id, &req)
        .await?;
    Ok(Json(out.appointment))
}

/* ============================================================
   DELETE /appointments/{id}  (cancel, status flip only)
   ============================================================ */

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    service(&state).cancel(&auth.user, appointment_id).await?;
    Ok(Json(MessageResponse {
        message: "Appointment canceled successfully".into(),
    }))
}

/* ============================================================
   GET /appointments/available-slots  (no auth)
   ============================================================ */

pub async fn available_slots(
    State(state): State<AppState>,
    Query(q): Query<AvailableSlotsQuery>,
) -> Result<Json<Vec<Slot>>, ApiError> {
    let free = service(&state)
        .available_slots(q.date, q.psychologist_id)
        .await?;
    Ok(Json(free))
}
