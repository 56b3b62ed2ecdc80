//! Driver location, presence and approval.
//!
//! Locations and presence are owned by each driver's own update stream;
//! dispatch reads them and never writes. Approval is owned by admins.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::{GeoPoint, geohash};
use crate::models::driver::{ApprovalStatus, DriverApproval, DriverLocation, DriverPresence};

#[derive(Default)]
pub struct DriverDirectory {
    locations: DashMap<Uuid, DriverLocation>,
    presence: DashMap<Uuid, DriverPresence>,
    approvals: DashMap<Uuid, DriverApproval>,
}

impl DriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the driver's position and derives its geohash key.
    pub fn update_location(&self, driver_id: Uuid, point: GeoPoint) -> DriverLocation {
        let location = DriverLocation {
            driver_id,
            geohash: geohash::encode(point.lat, point.lng, geohash::STORED_PRECISION),
            point,
            updated_at: Utc::now(),
        };
        self.locations.insert(driver_id, location.clone());
        location
    }

    pub fn set_presence(&self, driver_id: Uuid, online: bool) -> DriverPresence {
        let presence = DriverPresence {
            driver_id,
            online,
            last_seen_at: Utc::now(),
        };
        self.presence.insert(driver_id, presence.clone());
        presence
    }

    pub fn set_approval(&self, driver_id: Uuid, status: ApprovalStatus) -> DriverApproval {
        let approval = DriverApproval {
            driver_id,
            status,
            updated_at: Utc::now(),
        };
        self.approvals.insert(driver_id, approval.clone());
        approval
    }

    pub fn locations_snapshot(&self) -> Vec<DriverLocation> {
        self.locations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.presence
            .iter()
            .filter(|entry| entry.value().online)
            .count()
    }

    /// Online means the flag is set and the heartbeat is fresh; a silent
    /// driver drops out of candidate search once the heartbeat goes stale.
    pub fn is_online(&self, driver_id: Uuid, stale_after: Duration, now: DateTime<Utc>) -> bool {
        self.presence
            .get(&driver_id)
            .map(|entry| {
                let presence = entry.value();
                presence.online && now - presence.last_seen_at <= stale_after
            })
            .unwrap_or(false)
    }

    pub fn is_approved(&self, driver_id: Uuid) -> bool {
        self.approvals
            .get(&driver_id)
            .map(|entry| entry.value().status == ApprovalStatus::Approved)
            .unwrap_or(false)
    }
}
