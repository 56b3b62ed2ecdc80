//! Dispatch coordinator: ride creation, candidate search and offer fan-out,
//! first-accept-wins resolution, and status propagation.
//!
//! Handlers call these from independent concurrent tasks; the at-most-one-
//! winner guarantee comes from running every status/driver write inside
//! [`RideStore::transact`](crate::store::rides::RideStore::transact). Offer
//! expiry fan-out runs right after the winning transaction commits and
//! finishes before the call returns; it is idempotent, so a retry after a
//! partial apply is safe.

use std::time::Instant;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::engine::candidates::{MAX_CANDIDATES, find_candidates};
use crate::engine::transitions::{apply_transition, try_assign};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::event::DispatchEvent;
use crate::models::ride::{
    AppliedMultipliers, FareEstimate, Ride, RidePoint, RideStatus,
};
use crate::pricing::compute_price;
use crate::state::AppState;

pub struct CreateRideInput {
    pub pickup: RidePoint,
    pub dropoff: RidePoint,
    pub distance_km: f64,
    pub duration_min: f64,
}

fn validate_point(point: &RidePoint, which: &str) -> Result<(), AppError> {
    if point.address.trim().is_empty() {
        return Err(AppError::Validation(format!("{which} address is required")));
    }
    if !point.lat.is_finite() || !point.lng.is_finite() {
        return Err(AppError::Validation(format!(
            "{which} coordinates are not resolvable"
        )));
    }
    Ok(())
}

fn build_estimate(state: &AppState, distance_km: f64, duration_min: f64) -> FareEstimate {
    let config = state.pricing.current();
    let quote = compute_price(distance_km, &config, state.pricing_local_time());

    FareEstimate {
        distance_km: (distance_km * 100.0).round() / 100.0,
        duration_min: duration_min.round() as u32,
        price: quote.final_price,
        applied_multipliers: AppliedMultipliers {
            time: quote.breakdown.time_multiplier,
            weather: quote.breakdown.weather_multiplier,
            time_rule_name: quote.breakdown.time_rule_name.clone(),
            weather_label: quote.breakdown.weather_label.clone(),
        },
        pricing_breakdown: quote.breakdown,
    }
}

/// Pure pricing read; no ride is written.
pub fn estimate(
    state: &AppState,
    distance_km: f64,
    duration_min: f64,
) -> Result<FareEstimate, AppError> {
    if !(distance_km.is_finite() && distance_km > 0.0) {
        return Err(AppError::Validation(
            "distance_km must be positive".to_string(),
        ));
    }
    if !(duration_min.is_finite() && duration_min > 0.0) {
        return Err(AppError::Validation(
            "duration_min must be positive".to_string(),
        ));
    }

    Ok(build_estimate(state, distance_km, duration_min))
}

pub fn create_ride(
    state: &AppState,
    identity: &Identity,
    input: CreateRideInput,
) -> Result<Ride, AppError> {
    identity.require(Role::Client, "request rides")?;

    validate_point(&input.pickup, "pickup")?;
    validate_point(&input.dropoff, "dropoff")?;
    let fare = estimate(state, input.distance_km, input.duration_min)?;

    let now = Utc::now();
    let ride = Ride {
        id: Uuid::new_v4(),
        client_id: identity.uid,
        driver_id: None,
        status: RideStatus::Requested,
        pickup: input.pickup,
        dropoff: input.dropoff,
        estimate: fare,
        final_fare: None,
        canceled_by: None,
        created_at: now,
        updated_at: now,
    };

    state.rides.insert(ride.clone());
    state.metrics.rides_created_total.inc();
    state.publish(DispatchEvent::RideStatus {
        ride_id: ride.id,
        status: ride.status,
        driver_id: None,
        client_id: ride.client_id,
    });

    info!(ride_id = %ride.id, client_id = %ride.client_id, price = ride.estimate.price, "ride created");
    Ok(ride)
}

/// Searches candidates around the pickup and fans offers out to the nearest
/// eligible drivers. Safe to call repeatedly: a finished ride returns 0, a
/// re-match supersedes unanswered offers from the previous round.
pub fn match_ride(
    state: &AppState,
    identity: &Identity,
    ride_id: Uuid,
    radius_km: Option<f64>,
) -> Result<usize, AppError> {
    let started = Instant::now();

    let ride = state
        .rides
        .get(ride_id)
        .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

    if !identity.is_admin() && ride.client_id != identity.uid {
        return Err(AppError::Forbidden(
            "only the ride's client or an admin can match it".to_string(),
        ));
    }

    // Re-matching a finished ride is disallowed; once a driver holds the
    // ride there is nothing left to offer either.
    if ride.status.is_terminal() || ride.driver_id.is_some() {
        return Ok(0);
    }

    let radius_km = radius_km.unwrap_or(state.config.default_radius_km);
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(AppError::Validation(
            "radius_km must be positive".to_string(),
        ));
    }

    let pickup = GeoPoint {
        lat: ride.pickup.lat,
        lng: ride.pickup.lng,
    };
    let candidates = find_candidates(
        &state.drivers,
        &pickup,
        radius_km,
        Duration::seconds(state.config.presence_stale_secs),
        Utc::now(),
    );

    let next_status = if candidates.is_empty() {
        RideStatus::Requested
    } else {
        RideStatus::Offered
    };

    let ride = state.rides.transact(ride_id, |ride| {
        // Re-check under the lock; an accept may have landed meanwhile.
        if ride.status.is_terminal() || ride.driver_id.is_some() {
            return Err(AppError::RideAlreadyTaken);
        }
        ride.status = next_status;
        ride.updated_at = Utc::now();
        Ok(ride.clone())
    });
    let ride = match ride {
        Ok(ride) => ride,
        // Lost to a concurrent accept: report zero new offers.
        Err(AppError::RideAlreadyTaken) => return Ok(0),
        Err(err) => return Err(err),
    };

    let driver_ids: Vec<Uuid> = candidates
        .iter()
        .take(MAX_CANDIDATES)
        .map(|candidate| candidate.driver_id)
        .collect();
    let offered = if driver_ids.is_empty() {
        0
    } else {
        state.offers.create_offers(&ride, &driver_ids)
    };

    state.metrics.offers_sent_total.inc_by(offered as u64);
    let outcome = if offered > 0 { "offered" } else { "empty" };
    state
        .metrics
        .match_latency_seconds
        .with_label_values(&[outcome])
        .observe(started.elapsed().as_secs_f64());

    state.publish(DispatchEvent::RideStatus {
        ride_id,
        status: ride.status,
        driver_id: None,
        client_id: ride.client_id,
    });
    if offered > 0 {
        state.publish(DispatchEvent::OffersSent { ride_id, offered });
    }

    info!(ride_id = %ride_id, offered, radius_km, "match completed");
    Ok(offered)
}

/// First accept wins. Losers get `RideAlreadyTaken` and mutate nothing.
pub fn accept_ride(state: &AppState, identity: &Identity, ride_id: Uuid) -> Result<Ride, AppError> {
    identity.require(Role::Driver, "accept rides")?;

    // Any offer row admits the driver to the race, whatever its status;
    // the ride transaction decides the winner. Only a driver who was never
    // offered the ride is turned away here.
    if state.offers.get(ride_id, identity.uid).is_none() {
        state
            .metrics
            .accept_attempts_total
            .with_label_values(&["unavailable"])
            .inc();
        return Err(AppError::OfferNotAvailable);
    }

    let result = state
        .rides
        .transact(ride_id, |ride| {
            try_assign(ride, identity.uid, Utc::now())?;
            Ok(ride.clone())
        });

    let ride = match result {
        Ok(ride) => ride,
        Err(err) => {
            if matches!(err, AppError::RideAlreadyTaken) {
                state
                    .metrics
                    .accept_attempts_total
                    .with_label_values(&["lost"])
                    .inc();
            }
            return Err(err);
        }
    };

    // Outside the transaction by design: idempotent, and it must finish
    // before we report success.
    state.offers.resolve_acceptance(ride_id, identity.uid);

    state
        .metrics
        .accept_attempts_total
        .with_label_values(&["won"])
        .inc();
    state.publish(DispatchEvent::RideStatus {
        ride_id,
        status: ride.status,
        driver_id: ride.driver_id,
        client_id: ride.client_id,
    });

    info!(ride_id = %ride_id, driver_id = %identity.uid, "ride accepted");
    Ok(ride)
}

/// Driver declines their pending offer. The ride itself is untouched.
pub fn reject_offer(state: &AppState, identity: &Identity, ride_id: Uuid) -> Result<(), AppError> {
    identity.require(Role::Driver, "reject offers")?;
    state.offers.reject(ride_id, identity.uid)?;
    info!(ride_id = %ride_id, driver_id = %identity.uid, "offer rejected");
    Ok(())
}

/// One step through the lifecycle table, then status fan-out for live
/// tracking.
pub fn advance_status(
    state: &AppState,
    identity: &Identity,
    ride_id: Uuid,
    next: RideStatus,
) -> Result<Ride, AppError> {
    let ride = state.rides.transact(ride_id, |ride| {
        apply_transition(ride, next, identity, Utc::now())?;
        Ok(ride.clone())
    })?;

    state.publish(DispatchEvent::RideStatus {
        ride_id,
        status: ride.status,
        driver_id: ride.driver_id,
        client_id: ride.client_id,
    });

    info!(ride_id = %ride_id, status = %ride.status, "ride status advanced");
    Ok(ride)
}
