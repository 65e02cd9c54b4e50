use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::ApiError;
use crate::models::AppointmentStatus;
use crate::models::AppointmentStatus::*;

/// Legal next states.
///
/// pending   -> confirmed | completed | cancelled   (admin)
/// pending   -> cancelled                           (owner self-service)
/// confirmed -> completed | cancelled               (admin only)
/// completed / cancelled are terminal.
pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    match from {
        Pending => &[Confirmed, Completed, Cancelled],
        Confirmed => &[Completed, Cancelled],
        Completed | Cancelled => &[],
    }
}

/// Admin updates may only target confirmed/completed/cancelled; pending is
/// the implicit initial state, never a target.
pub fn ensure_admin_target(target: AppointmentStatus) -> Result<(), ApiError> {
    if target == Pending {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "status must be one of confirmed, completed, cancelled".into(),
        ));
    }
    Ok(())
}

pub fn ensure_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), ApiError> {
    if !valid_transitions(from).contains(&to) {
        return Err(ApiError::BadRequest(
            "INVALID_TRANSITION",
            format!(
                "cannot move appointment from {} to {}",
                from.label(),
                to.label()
            ),
        ));
    }
    Ok(())
}

/// The row moved on between the guard read and the update (for example two
/// admins raced and the other one won). The caller should re-fetch and
/// retry; the write that hit this did not change anything.
pub fn transition_conflict() -> ApiError {
    ApiError::BadRequest(
        "INVALID_TRANSITION",
        "appointment status changed concurrently; re-fetch and retry".into(),
    )
}

/// Self-service cancellation guard: only a still-pending appointment whose
/// date/time has not yet passed may be cancelled by its owner. The check runs
/// against the row as read at request time; an admin confirm racing this
/// cancel is resolved by whichever write lands last.
pub fn ensure_self_cancel(
    status: AppointmentStatus,
    date: NaiveDate,
    time: NaiveTime,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if status != Pending {
        return Err(ApiError::BadRequest(
            "CANCEL_NOT_ALLOWED",
            format!(
                "only pending appointments can be cancelled (current status: {})",
                status.label()
            ),
        ));
    }
    let starts_at = date.and_time(time).and_utc();
    if starts_at <= now {
        return Err(ApiError::BadRequest(
            "CANCEL_NOT_ALLOWED",
            "past appointments cannot be cancelled".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::clock::{Clock, FixedClock};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        assert!(valid_transitions(Completed).is_empty());
        assert!(valid_transitions(Cancelled).is_empty());
    }

    #[test]
    fn test_pending_transitions() {
        assert!(ensure_transition(Pending, Confirmed).is_ok());
        assert!(ensure_transition(Pending, Completed).is_ok());
        assert!(ensure_transition(Pending, Cancelled).is_ok());
    }

    #[test]
    fn test_confirmed_transitions() {
        assert!(ensure_transition(Confirmed, Completed).is_ok());
        assert!(ensure_transition(Confirmed, Cancelled).is_ok());
        assert!(ensure_transition(Confirmed, Confirmed).is_err());
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        assert!(ensure_transition(Completed, Cancelled).is_err());
        assert!(ensure_transition(Cancelled, Confirmed).is_err());
    }

    #[test]
    fn test_stale_guard_read_maps_to_invalid_transition() {
        // the status-guarded UPDATE matching zero rows reports the same
        // violated guard as a failed pre-check, never a silent overwrite
        match transition_conflict() {
            ApiError::BadRequest(code, _) => assert_eq!(code, "INVALID_TRANSITION"),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn test_pending_is_not_an_admin_target() {
        assert!(ensure_admin_target(Pending).is_err());
        assert!(ensure_admin_target(Confirmed).is_ok());
        assert!(ensure_admin_target(Completed).is_ok());
        assert!(ensure_admin_target(Cancelled).is_ok());
    }

    #[test]
    fn test_self_cancel_future_pending_ok() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();
        assert!(ensure_self_cancel(Pending, d(2025, 6, 11), t(9, 0), now).is_ok());
    }

    #[test]
    fn test_self_cancel_rejects_non_pending() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();
        assert!(ensure_self_cancel(Confirmed, d(2025, 6, 11), t(9, 0), now).is_err());
        assert!(ensure_self_cancel(Cancelled, d(2025, 6, 11), t(9, 0), now).is_err());
    }

    #[test]
    fn test_self_cancel_guard_with_injected_clock() {
        // guards read time through the Clock trait, so a pinned clock makes
        // the future/past boundary deterministic
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap());
        assert!(ensure_self_cancel(Pending, d(2025, 6, 10), t(9, 0), clock.now()).is_ok());
        assert!(ensure_self_cancel(Pending, d(2025, 6, 10), t(7, 0), clock.now()).is_err());
    }

    #[test]
    fn test_self_cancel_rejects_elapsed_appointment() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap();
        // earlier the same day
        assert!(ensure_self_cancel(Pending, d(2025, 6, 10), t(9, 0), now).is_err());
        // exactly now is also too late
        assert!(ensure_self_cancel(Pending, d(2025, 6, 10), t(10, 0), now).is_err());
    }
}
