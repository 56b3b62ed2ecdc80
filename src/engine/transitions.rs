//! Ride lifecycle state machine.
//!
//! requested → offered → accepted → arriving → in_progress → completed,
//! with canceled absorbing from any non-terminal state. Drivers move only
//! rides assigned to them; clients never transition a ride directly; admins
//! may force any transition as an operational escape hatch, which is logged
//! for audit.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::error::AppError;
use crate::models::ride::{Ride, RideStatus};

/// Targets a non-admin caller may request from each state. The
/// requested/offered → accepted edge is not here: it only happens through
/// the accept race (`try_assign`).
pub fn allowed_next(from: RideStatus) -> &'static [RideStatus] {
    match from {
        RideStatus::Accepted => &[RideStatus::Arriving, RideStatus::Canceled],
        RideStatus::Arriving => &[RideStatus::InProgress, RideStatus::Canceled],
        RideStatus::InProgress => &[RideStatus::Completed, RideStatus::Canceled],
        RideStatus::Requested
        | RideStatus::Offered
        | RideStatus::Completed
        | RideStatus::Canceled => &[],
    }
}

/// The requested/offered → accepted edge, taken only by the driver winning
/// the accept race. Must run inside the ride store transaction.
pub fn try_assign(ride: &mut Ride, driver_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
    if let Some(current) = ride.driver_id {
        if current != driver_id {
            return Err(AppError::RideAlreadyTaken);
        }
    }

    if !matches!(ride.status, RideStatus::Requested | RideStatus::Offered) {
        return Err(AppError::RideAlreadyTaken);
    }

    ride.driver_id = Some(driver_id);
    ride.status = RideStatus::Accepted;
    ride.updated_at = now;
    Ok(())
}

/// Applies one table-governed transition on behalf of `actor`. Must run
/// inside the ride store transaction.
pub fn apply_transition(
    ride: &mut Ride,
    next: RideStatus,
    actor: &Identity,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    match actor.role {
        Role::Admin => {
            if !allowed_next(ride.status).contains(&next) {
                warn!(
                    ride_id = %ride.id,
                    admin_id = %actor.uid,
                    from = %ride.status,
                    to = %next,
                    "admin forced ride transition"
                );
            }
        }
        Role::Driver => {
            if ride.driver_id != Some(actor.uid) {
                return Err(AppError::Forbidden(
                    "ride is not assigned to this driver".to_string(),
                ));
            }
            if !allowed_next(ride.status).contains(&next) {
                return Err(AppError::InvalidTransition {
                    from: ride.status,
                    to: next,
                });
            }
        }
        Role::Client => {
            return Err(AppError::Forbidden(
                "clients cannot change ride status".to_string(),
            ));
        }
    }

    ride.status = next;
    ride.updated_at = now;

    if next == RideStatus::Completed && ride.final_fare.is_none() {
        ride.final_fare = Some(ride.estimate.clone());
    }
    if next == RideStatus::Canceled {
        ride.canceled_by = Some(actor.uid);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{allowed_next, apply_transition, try_assign};
    use crate::auth::{Identity, Role};
    use crate::error::AppError;
    use crate::models::ride::RideStatus;
    use crate::store::rides::test_support::requested_ride;

    fn driver(uid: Uuid) -> Identity {
        Identity {
            uid,
            role: Role::Driver,
        }
    }

    #[test]
    fn happy_path_runs_in_order() {
        let driver_id = Uuid::new_v4();
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        try_assign(&mut ride, driver_id, now).unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);

        let actor = driver(driver_id);
        for next in [
            RideStatus::Arriving,
            RideStatus::InProgress,
            RideStatus::Completed,
        ] {
            apply_transition(&mut ride, next, &actor, now).unwrap();
            assert_eq!(ride.status, next);
        }
    }

    #[test]
    fn cannot_step_backwards() {
        let driver_id = Uuid::new_v4();
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        try_assign(&mut ride, driver_id, now).unwrap();

        let actor = driver(driver_id);
        apply_transition(&mut ride, RideStatus::Arriving, &actor, now).unwrap();
        apply_transition(&mut ride, RideStatus::InProgress, &actor, now).unwrap();

        let err = apply_transition(&mut ride, RideStatus::Arriving, &actor, now).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: RideStatus::InProgress,
                to: RideStatus::Arriving,
            }
        ));
        assert_eq!(ride.status, RideStatus::InProgress);
    }

    #[test]
    fn second_driver_loses_the_assignment() {
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let winner = Uuid::new_v4();
        try_assign(&mut ride, winner, now).unwrap();

        let err = try_assign(&mut ride, Uuid::new_v4(), now).unwrap_err();
        assert!(matches!(err, AppError::RideAlreadyTaken));
        assert_eq!(ride.driver_id, Some(winner));
    }

    #[test]
    fn assignment_is_idempotent_for_the_winner() {
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let winner = Uuid::new_v4();

        try_assign(&mut ride, winner, now).unwrap();
        // Re-validating the same precondition after an ambiguous failure
        // must not double-apply: accepted is no longer assignable.
        let err = try_assign(&mut ride, winner, now).unwrap_err();
        assert!(matches!(err, AppError::RideAlreadyTaken));
    }

    #[test]
    fn unassigned_driver_is_forbidden() {
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        try_assign(&mut ride, Uuid::new_v4(), now).unwrap();

        let err = apply_transition(
            &mut ride,
            RideStatus::Arriving,
            &driver(Uuid::new_v4()),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn clients_never_transition() {
        let client_id = Uuid::new_v4();
        let mut ride = requested_ride(Uuid::new_v4(), client_id);
        let now = Utc::now();
        try_assign(&mut ride, Uuid::new_v4(), now).unwrap();

        let actor = Identity {
            uid: client_id,
            role: Role::Client,
        };
        let err = apply_transition(&mut ride, RideStatus::Canceled, &actor, now).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn admin_may_force_any_transition() {
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let admin = Identity {
            uid: Uuid::new_v4(),
            role: Role::Admin,
        };

        apply_transition(&mut ride, RideStatus::Canceled, &admin, now).unwrap();
        assert_eq!(ride.status, RideStatus::Canceled);
        assert_eq!(ride.canceled_by, Some(admin.uid));
    }

    #[test]
    fn completion_defaults_final_fare_to_estimate() {
        let driver_id = Uuid::new_v4();
        let mut ride = requested_ride(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        try_assign(&mut ride, driver_id, now).unwrap();

        let actor = driver(driver_id);
        apply_transition(&mut ride, RideStatus::Arriving, &actor, now).unwrap();
        apply_transition(&mut ride, RideStatus::InProgress, &actor, now).unwrap();
        apply_transition(&mut ride, RideStatus::Completed, &actor, now).unwrap();

        assert_eq!(ride.final_fare.as_ref().unwrap(), &ride.estimate);
    }

    #[test]
    fn terminal_states_allow_nothing() {
        assert!(allowed_next(RideStatus::Completed).is_empty());
        assert!(allowed_next(RideStatus::Canceled).is_empty());
        assert!(allowed_next(RideStatus::Requested).is_empty());
    }
}
