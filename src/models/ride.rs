use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::PricingBreakdown;

/// A pickup or dropoff resolved by the external geocoding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidePoint {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,
    Offered,
    Accepted,
    Arriving,
    InProgress,
    Completed,
    Canceled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Canceled)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RideStatus::Requested => "requested",
            RideStatus::Offered => "offered",
            RideStatus::Accepted => "accepted",
            RideStatus::Arriving => "arriving",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMultipliers {
    pub time: f64,
    pub weather: f64,
    pub time_rule_name: Option<String>,
    pub weather_label: Option<String>,
}

/// Fare snapshot computed at creation time and frozen on the ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareEstimate {
    pub distance_km: f64,
    pub duration_min: u32,
    pub price: f64,
    pub pricing_breakdown: PricingBreakdown,
    pub applied_multipliers: AppliedMultipliers,
}

/// A trip request from creation to completion or cancellation. Never deleted
/// in normal operation; completed and canceled rides stay as history.
///
/// `driver_id` is `None` exactly while status is requested or offered; once
/// a driver wins the accept race the assignment is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub client_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: RideStatus,
    pub pickup: RidePoint,
    pub dropoff: RidePoint,
    pub estimate: FareEstimate,
    /// Set on completion; defaults to the estimate when nothing overrode it.
    pub final_fare: Option<FareEstimate>,
    pub canceled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
