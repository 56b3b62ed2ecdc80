use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde_json::{Value, json};
use tracing::info;

use crate::auth::{Identity, Role};
use crate::error::AppError;
use crate::pricing::{self, PricingConfig};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pricing", get(get_pricing).put(put_pricing))
}

async fn get_pricing(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Json<PricingConfig> {
    Json(state.pricing.current())
}

async fn put_pricing(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<PricingConfig>,
) -> Result<Json<Value>, AppError> {
    identity.require(Role::Admin, "change pricing")?;
    pricing::validate(&payload).map_err(AppError::Validation)?;

    state.pricing.replace(payload);
    info!(admin_id = %identity.uid, "pricing config replaced");
    Ok(Json(json!({ "ok": true })))
}
