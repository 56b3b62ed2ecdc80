use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::Identity;
use crate::engine::dispatch;
use crate::error::AppError;
use crate::models::ride::{FareEstimate, Ride, RidePoint, RideStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/match", post(match_ride))
        .route("/rides/:id/accept", post(accept_ride))
        .route("/rides/:id/reject", post(reject_offer))
        .route("/rides/:id/status", post(advance_status))
        .route("/estimate", post(estimate))
}

#[derive(Deserialize)]
pub struct CreateRideRequest {
    pub pickup: RidePoint,
    pub dropoff: RidePoint,
    pub distance_km: f64,
    pub duration_min: f64,
}

#[derive(Serialize)]
pub struct CreateRideResponse {
    pub ride_id: Uuid,
    pub estimate: FareEstimate,
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<CreateRideResponse>, AppError> {
    let ride = dispatch::create_ride(
        &state,
        &identity,
        dispatch::CreateRideInput {
            pickup: payload.pickup,
            dropoff: payload.dropoff,
            distance_km: payload.distance_km,
            duration_min: payload.duration_min,
        },
    )?;

    Ok(Json(CreateRideResponse {
        ride_id: ride.id,
        estimate: ride.estimate,
    }))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .rides
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))?;

    let involved = ride.client_id == identity.uid || ride.driver_id == Some(identity.uid);
    if !identity.is_admin() && !involved {
        return Err(AppError::Forbidden(
            "not a participant of this ride".to_string(),
        ));
    }

    Ok(Json(ride))
}

#[derive(Deserialize, Default)]
pub struct MatchRideRequest {
    pub radius_km: Option<f64>,
}

async fn match_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    payload: Option<Json<MatchRideRequest>>,
) -> Result<Json<Value>, AppError> {
    let radius_km = payload.and_then(|Json(body)| body.radius_km);
    let offered = dispatch::match_ride(&state, &identity, id, radius_km)?;
    Ok(Json(json!({ "offered": offered })))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    dispatch::accept_ride(&state, &identity, id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn reject_offer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    dispatch::reject_offer(&state, &identity, id)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: RideStatus,
}

async fn advance_status(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdvanceStatusRequest>,
) -> Result<Json<Value>, AppError> {
    dispatch::advance_status(&state, &identity, id, payload.status)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct EstimateRequest {
    pub distance_km: f64,
    pub duration_min: f64,
}

async fn estimate(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Json(payload): Json<EstimateRequest>,
) -> Result<Json<FareEstimate>, AppError> {
    let fare = dispatch::estimate(&state, payload.distance_km, payload.duration_min)?;
    Ok(Json(fare))
}
