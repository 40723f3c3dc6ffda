//! Advisory double-booking check for technicians.
//!
//! The window is symmetric and fixed; appointment lengths are not known to
//! storage, so the count can over- or under-report real overlaps. Callers
//! surface the number and proceed regardless.

use super::ScheduleError;
use crate::model::request::RequestId;
use crate::model::user::UserId;
use crate::repo::request_repo::RequestRepository;
use crate::repo::RepoError;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a conflict estimate could not be produced.
#[derive(Debug)]
pub enum ConflictError {
    /// The window around the proposed slot leaves the representable range.
    Window(ScheduleError),
    Repo(RepoError),
}

impl Display for ConflictError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Window(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConflictError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Window(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ScheduleError> for ConflictError {
    fn from(value: ScheduleError) -> Self {
        Self::Window(value)
    }
}

impl From<RepoError> for ConflictError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Inclusive `[start - window, start + window]` bounds.
///
/// # Errors
/// - `InvalidDate` when either bound falls outside the `DateTime<Utc>` range.
pub fn conflict_window_bounds(
    proposed_start: DateTime<Utc>,
    window: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ScheduleError> {
    let window = window.abs();
    let out_of_range = || {
        ScheduleError::InvalidDate(format!(
            "conflict window around {} is out of range",
            proposed_start.to_rfc3339()
        ))
    };
    let from = proposed_start
        .checked_sub_signed(window)
        .ok_or_else(out_of_range)?;
    let to = proposed_start
        .checked_add_signed(window)
        .ok_or_else(out_of_range)?;
    Ok((from, to))
}

/// Counts other requests assigned to `technician_id` with a slot inside the
/// window around `proposed_start`.
///
/// `exclude` skips the request currently being (re)scheduled.
pub fn estimate_conflicts<R: RequestRepository + ?Sized>(
    repo: &R,
    technician_id: UserId,
    proposed_start: DateTime<Utc>,
    window: Duration,
    exclude: Option<RequestId>,
) -> Result<u64, ConflictError> {
    let (from, to) = conflict_window_bounds(proposed_start, window)?;
    let count = repo.count_assigned_between(technician_id, from, to, exclude)?;
    debug!(
        "event=conflict_estimate module=schedule status=ok technician_id={} window_min={} conflicts={}",
        technician_id,
        window.abs().num_minutes(),
        count
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::conflict_window_bounds;
    use crate::schedule::ScheduleError;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn bounds_are_symmetric_for_negative_windows_too() {
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let (from, to) = conflict_window_bounds(start, Duration::minutes(-60)).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 7, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn window_past_the_calendar_edge_is_invalid_date() {
        let window = Duration::minutes(60);
        assert!(matches!(
            conflict_window_bounds(DateTime::<Utc>::MAX_UTC, window),
            Err(ScheduleError::InvalidDate(_))
        ));
        assert!(matches!(
            conflict_window_bounds(DateTime::<Utc>::MIN_UTC, window),
            Err(ScheduleError::InvalidDate(_))
        ));
    }
}
