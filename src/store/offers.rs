//! Per-ride, per-driver offer records.
//!
//! The fan-out and the acceptance resolution here run after the ride
//! transaction commits; every mutation is idempotent so a retry after a
//! partial failure converges to the same state.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::offer::{Offer, OfferStatus};
use crate::models::ride::Ride;

#[derive(Default)]
pub struct OfferLedger {
    offers: DashMap<(Uuid, Uuid), Offer>,
}

impl OfferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ride_id: Uuid, driver_id: Uuid) -> Option<Offer> {
        self.offers
            .get(&(ride_id, driver_id))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// Writes one "sent" offer per candidate, snapshotting the ride's
    /// pickup, dropoff and estimate. A re-match supersedes: offers still
    /// "sent" to drivers not selected again are expired first, so repeated
    /// matching never grows the ledger unboundedly.
    pub fn create_offers(&self, ride: &Ride, driver_ids: &[Uuid]) -> usize {
        let now = Utc::now();

        for mut entry in self.offers.iter_mut() {
            let offer = entry.value_mut();
            if offer.ride_id == ride.id
                && offer.status == OfferStatus::Sent
                && !driver_ids.contains(&offer.driver_id)
            {
                offer.status = OfferStatus::Expired;
                offer.responded_at = Some(now);
            }
        }

        for &driver_id in driver_ids {
            self.offers.insert(
                (ride.id, driver_id),
                Offer {
                    ride_id: ride.id,
                    driver_id,
                    status: OfferStatus::Sent,
                    pickup: ride.pickup.clone(),
                    dropoff: ride.dropoff.clone(),
                    estimate: ride.estimate.clone(),
                    sent_at: now,
                    responded_at: None,
                },
            );
        }

        driver_ids.len()
    }

    /// Marks the winner accepted and expires every sibling still "sent".
    /// Idempotent: replaying after a partial apply is a no-op for rows
    /// already resolved.
    pub fn resolve_acceptance(&self, ride_id: Uuid, winner: Uuid) {
        let now = Utc::now();

        for mut entry in self.offers.iter_mut() {
            let offer = entry.value_mut();
            if offer.ride_id != ride_id {
                continue;
            }

            if offer.driver_id == winner {
                offer.status = OfferStatus::Accepted;
                offer.responded_at.get_or_insert(now);
            } else if offer.status == OfferStatus::Sent {
                offer.status = OfferStatus::Expired;
                offer.responded_at = Some(now);
            }
        }
    }

    /// Driver declines a pending offer. Only ever touches the offer row;
    /// the ride stays open for the remaining candidates.
    pub fn reject(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Offer, AppError> {
        let mut entry = self
            .offers
            .get_mut(&(ride_id, driver_id))
            .ok_or(AppError::OfferNotAvailable)?;

        let offer = entry.value_mut();
        if offer.status != OfferStatus::Sent {
            return Err(AppError::OfferNotAvailable);
        }

        offer.status = OfferStatus::Rejected;
        offer.responded_at = Some(Utc::now());
        Ok(offer.clone())
    }

    pub fn offers_for_driver(&self, driver_id: Uuid) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect();
        offers.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        offers
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::OfferLedger;
    use crate::models::offer::OfferStatus;
    use crate::models::ride::Ride;

    fn ride_fixture() -> Ride {
        crate::store::rides::test_support::requested_ride(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn acceptance_expires_all_sent_siblings() {
        let ledger = OfferLedger::new();
        let ride = ride_fixture();
        let drivers: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        assert_eq!(ledger.create_offers(&ride, &drivers), 3);
        ledger.resolve_acceptance(ride.id, drivers[0]);

        assert_eq!(
            ledger.get(ride.id, drivers[0]).unwrap().status,
            OfferStatus::Accepted
        );
        for loser in &drivers[1..] {
            let offer = ledger.get(ride.id, *loser).unwrap();
            assert_eq!(offer.status, OfferStatus::Expired);
            assert!(offer.responded_at.is_some());
        }
    }

    #[test]
    fn resolve_acceptance_is_idempotent() {
        let ledger = OfferLedger::new();
        let ride = ride_fixture();
        let drivers: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        ledger.create_offers(&ride, &drivers);

        ledger.resolve_acceptance(ride.id, drivers[0]);
        let first = ledger.get(ride.id, drivers[1]).unwrap();
        ledger.resolve_acceptance(ride.id, drivers[0]);
        let second = ledger.get(ride.id, drivers[1]).unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.responded_at, second.responded_at);
    }

    #[test]
    fn rematch_supersedes_unanswered_offers() {
        let ledger = OfferLedger::new();
        let ride = ride_fixture();
        let stale_driver = Uuid::new_v4();
        let fresh_driver = Uuid::new_v4();

        ledger.create_offers(&ride, &[stale_driver]);
        ledger.create_offers(&ride, &[fresh_driver]);

        assert_eq!(
            ledger.get(ride.id, stale_driver).unwrap().status,
            OfferStatus::Expired
        );
        assert_eq!(
            ledger.get(ride.id, fresh_driver).unwrap().status,
            OfferStatus::Sent
        );
    }

    #[test]
    fn offers_snapshot_the_ride_estimate() {
        let ledger = OfferLedger::new();
        let ride = ride_fixture();
        let driver = Uuid::new_v4();

        ledger.create_offers(&ride, &[driver]);
        let offer = ledger.get(ride.id, driver).unwrap();

        assert_eq!(offer.estimate.price, ride.estimate.price);
        assert_eq!(offer.pickup.address, ride.pickup.address);
    }

    #[test]
    fn reject_only_applies_to_sent_offers() {
        let ledger = OfferLedger::new();
        let ride = ride_fixture();
        let driver = Uuid::new_v4();
        ledger.create_offers(&ride, &[driver]);

        let rejected = ledger.reject(ride.id, driver).unwrap();
        assert_eq!(rejected.status, OfferStatus::Rejected);
        assert!(ledger.reject(ride.id, driver).is_err());
        assert!(ledger.reject(ride.id, Uuid::new_v4()).is_err());
    }
}
