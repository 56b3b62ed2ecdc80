use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::driver::{ApprovalStatus, DriverLocation, DriverPresence};
use crate::models::offer::Offer;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id/presence", patch(update_presence))
        .route("/drivers/:id/approval", patch(update_approval))
        .route("/drivers/:id/offers", get(list_offers))
}

/// Location and presence belong to the driver's own stream; nobody else may
/// write them, admins included.
fn require_self(identity: &Identity, driver_id: Uuid) -> Result<(), AppError> {
    identity.require(Role::Driver, "report their own state")?;
    if identity.uid != driver_id {
        return Err(AppError::Forbidden(
            "drivers can only report their own state".to_string(),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DriverLocation>, AppError> {
    require_self(&identity, id)?;

    let point = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    if !point.is_finite() {
        return Err(AppError::Validation(
            "lat and lng must be finite numbers".to_string(),
        ));
    }

    Ok(Json(state.drivers.update_location(id, point)))
}

#[derive(Deserialize)]
pub struct UpdatePresenceRequest {
    pub online: bool,
}

async fn update_presence(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePresenceRequest>,
) -> Result<Json<DriverPresence>, AppError> {
    require_self(&identity, id)?;
    Ok(Json(state.drivers.set_presence(id, payload.online)))
}

#[derive(Deserialize)]
pub struct UpdateApprovalRequest {
    pub status: ApprovalStatus,
}

async fn update_approval(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalRequest>,
) -> Result<Json<Value>, AppError> {
    identity.require(Role::Admin, "change driver approval")?;
    state.drivers.set_approval(id, payload.status);
    Ok(Json(json!({ "ok": true })))
}

async fn list_offers(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Offer>>, AppError> {
    if !identity.is_admin() && identity.uid != id {
        return Err(AppError::Forbidden(
            "drivers can only list their own offers".to_string(),
        ));
    }
    Ok(Json(state.offers.offers_for_driver(id)))
}
