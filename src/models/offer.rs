use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ride::{FareEstimate, RidePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Sent,
    Accepted,
    Rejected,
    Expired,
}

/// A candidate driver's pending invitation to accept a specific ride,
/// keyed by (ride, driver). Carries a snapshot of the ride's pickup,
/// dropoff and estimate so the driver can evaluate it without a second
/// read. Terminal once responded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub status: OfferStatus,
    pub pickup: RidePoint,
    pub dropoff: RidePoint,
    pub estimate: FareEstimate,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}
