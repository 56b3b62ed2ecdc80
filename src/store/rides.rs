//! Ride records with conditional-commit mutation.
//!
//! The ride record is the single source of truth for `status` and
//! `driver_id`. The only way to write either is [`RideStore::transact`],
//! which gives the closure exclusive access to one record and discards all
//! changes when the closure aborts. The accept race resolves to at most one
//! winner because losing closures abort before anything is committed.

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ride::Ride;

#[derive(Default)]
pub struct RideStore {
    rides: DashMap<Uuid, Ride>,
}

impl RideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ride: Ride) {
        self.rides.insert(ride.id, ride);
    }

    pub fn get(&self, id: Uuid) -> Option<Ride> {
        self.rides.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    /// Read-modify-write on a single ride under an exclusive lock. The
    /// closure works on a draft; an `Err` abort leaves the stored record
    /// untouched even if the draft was partially mutated.
    pub fn transact<T>(
        &self,
        id: Uuid,
        mutate: impl FnOnce(&mut Ride) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut entry = self
            .rides
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))?;

        let mut draft = entry.value().clone();
        let outcome = mutate(&mut draft)?;
        *entry.value_mut() = draft;
        Ok(outcome)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use uuid::Uuid;

    use super::RideStore;
    use super::test_support::requested_ride as test_ride;
    use crate::error::AppError;
    use crate::models::ride::RideStatus;

    #[test]
    fn aborted_transaction_leaves_record_untouched() {
        let store = RideStore::new();
        let id = Uuid::new_v4();
        store.insert(test_ride(id, Uuid::new_v4()));

        let result: Result<(), AppError> = store.transact(id, |ride| {
            ride.status = RideStatus::Accepted;
            ride.driver_id = Some(Uuid::new_v4());
            Err(AppError::RideAlreadyTaken)
        });

        assert!(matches!(result, Err(AppError::RideAlreadyTaken)));
        let ride = store.get(id).unwrap();
        assert_eq!(ride.status, RideStatus::Requested);
        assert!(ride.driver_id.is_none());
    }

    #[test]
    fn missing_ride_is_not_found() {
        let store = RideStore::new();
        let result = store.transact(Uuid::new_v4(), |_| Ok(()));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let store = RideStore::new();
        let id = Uuid::new_v4();
        store.insert(test_ride(id, Uuid::new_v4()));

        let wins = AtomicUsize::new(0);
        let losses = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let driver_id = Uuid::new_v4();
                let store = &store;
                let wins = &wins;
                let losses = &losses;
                scope.spawn(move || {
                    let result = store.transact(id, |ride| {
                        if ride.driver_id.is_some() {
                            return Err(AppError::RideAlreadyTaken);
                        }
                        ride.driver_id = Some(driver_id);
                        ride.status = RideStatus::Accepted;
                        Ok(driver_id)
                    });
                    match result {
                        Ok(_) => wins.fetch_add(1, Ordering::SeqCst),
                        Err(_) => losses.fetch_add(1, Ordering::SeqCst),
                    };
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(losses.load(Ordering::SeqCst), 7);

        let ride = store.get(id).unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        assert!(ride.driver_id.is_some());
    }
}
