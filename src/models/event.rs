use serde::Serialize;
use uuid::Uuid;

use crate::models::ride::RideStatus;

/// Events published on the dispatch bus for live tracking. Delivery to
/// clients is the realtime channel's concern; the coordinator only emits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    RideStatus {
        ride_id: Uuid,
        status: RideStatus,
        driver_id: Option<Uuid>,
        client_id: Uuid,
    },
    OffersSent {
        ride_id: Uuid,
        offered: usize,
    },
}

impl DispatchEvent {
    pub fn ride_id(&self) -> Uuid {
        match self {
            DispatchEvent::RideStatus { ride_id, .. } => *ride_id,
            DispatchEvent::OffersSent { ride_id, .. } => *ride_id,
        }
    }
}
