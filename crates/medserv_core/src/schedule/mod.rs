//! Scheduling math: due-date projection and assignment conflict estimates.
//!
//! # Responsibility
//! - Project the next service date from a visit date and device interval.
//! - Classify due dates for dashboards and reminder sweeps.
//! - Count nearby assignments for a technician (advisory only).

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod conflict;
pub mod projector;

pub use conflict::{conflict_window_bounds, estimate_conflicts, ConflictError};
pub use projector::{
    classify_due_date, parse_calendar_date, project_next_date, DueBand, DueClassification,
};

/// Date computation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Input text is not a `YYYY-MM-DD` date, or a result is out of range.
    InvalidDate(String),
    /// Interval must be at least one month.
    InvalidInterval(u32),
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate(detail) => write!(f, "invalid date: {detail}"),
            Self::InvalidInterval(months) => {
                write!(f, "service interval must be at least 1 month, got {months}")
            }
        }
    }
}

impl Error for ScheduleError {}
