//! Nearby eligible drivers for a pickup point.
//!
//! Eligibility: online with a fresh heartbeat, approved, finite coordinates,
//! within the radius. Results come back closest-first, capped at
//! [`MAX_CANDIDATES`]. The geohash cover only prunes the scan; the exact
//! haversine distance decides membership. Zero candidates is a valid
//! outcome, not an error.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::geo::{GeoPoint, geohash, haversine_km};
use crate::store::drivers::DriverDirectory;

pub const MAX_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
}

pub fn find_candidates(
    directory: &DriverDirectory,
    pickup: &GeoPoint,
    radius_km: f64,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let cover = geohash::cover(pickup, radius_km);

    let mut candidates: Vec<Candidate> = directory
        .locations_snapshot()
        .into_iter()
        .filter_map(|location| {
            if !location.point.is_finite() {
                return None;
            }
            if !cover.is_empty()
                && !cover
                    .iter()
                    .any(|cell| location.geohash.starts_with(cell.as_str()))
            {
                return None;
            }
            if !directory.is_online(location.driver_id, stale_after, now) {
                return None;
            }
            if !directory.is_approved(location.driver_id) {
                return None;
            }

            let distance_km = haversine_km(&location.point, pickup);
            (distance_km <= radius_km).then_some(Candidate {
                driver_id: location.driver_id,
                distance_km,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}
