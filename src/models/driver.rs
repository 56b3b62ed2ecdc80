use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Blocked,
}

/// Last reported position, overwritten on every update from the driver's
/// own tracking stream. Dispatch only reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLocation {
    pub driver_id: Uuid,
    pub point: GeoPoint,
    /// Geohash of `point`, the range-query key for the candidate search.
    pub geohash: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPresence {
    pub driver_id: Uuid,
    pub online: bool,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverApproval {
    pub driver_id: Uuid,
    pub status: ApprovalStatus,
    pub updated_at: DateTime<Utc>,
}
