//! Pure due-date projection and classification.
//!
//! # Invariants
//! - `project_next_date(d, m)` is strictly later than `d` for every `m >= 1`.
//! - Month arithmetic overflows like a calendar "set month": when the target
//!   month is too short for the day-of-month, the surplus days roll into the
//!   following month (2024-01-31 + 1 month = 2024-03-02).
//! - Classification compares calendar days only.

use super::ScheduleError;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// Advances `service_date` by `interval_months` calendar months.
///
/// # Errors
/// - `InvalidInterval` when `interval_months == 0`.
/// - `InvalidDate` when the result is outside the representable range.
pub fn project_next_date(
    service_date: NaiveDate,
    interval_months: u32,
) -> Result<NaiveDate, ScheduleError> {
    if interval_months == 0 {
        return Err(ScheduleError::InvalidInterval(interval_months));
    }

    let out_of_range = || {
        ScheduleError::InvalidDate(format!(
            "{service_date} + {interval_months} months is out of range"
        ))
    };

    let month_index = i64::from(service_date.year()) * 12
        + i64::from(service_date.month0())
        + i64::from(interval_months);
    let year = i32::try_from(month_index.div_euclid(12)).map_err(|_| out_of_range())?;
    let month = u32::try_from(month_index.rem_euclid(12)).map_err(|_| out_of_range())? + 1;

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(service_date.day() - 1))))
        .ok_or_else(out_of_range)
}

/// Parses a boundary calendar date (`YYYY-MM-DD`).
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(value.trim(), CALENDAR_DATE_FORMAT)
        .map_err(|err| ScheduleError::InvalidDate(format!("`{value}`: {err}")))
}

/// Raw due-date position relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum DueClassification {
    /// Device has no next service date.
    Unscheduled,
    /// Due date already passed.
    Overdue { days_overdue: i64 },
    /// Due today (`0`) or later.
    Due { days_left: i64 },
}

/// Dashboard band after applying a due-soon threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "band", content = "days_left")]
pub enum DueBand {
    Overdue,
    DueSoon(i64),
    Scheduled(i64),
    Unscheduled,
}

impl DueClassification {
    /// Days until due; negative when overdue, `None` when unscheduled.
    pub fn days_left(self) -> Option<i64> {
        match self {
            Self::Unscheduled => None,
            Self::Overdue { days_overdue } => Some(-days_overdue),
            Self::Due { days_left } => Some(days_left),
        }
    }

    pub fn band(self, due_soon_days: i64) -> DueBand {
        match self {
            Self::Unscheduled => DueBand::Unscheduled,
            Self::Overdue { .. } => DueBand::Overdue,
            Self::Due { days_left } if days_left <= due_soon_days => DueBand::DueSoon(days_left),
            Self::Due { days_left } => DueBand::Scheduled(days_left),
        }
    }
}

/// Classifies a device due date against `today`.
pub fn classify_due_date(due: Option<NaiveDate>, today: NaiveDate) -> DueClassification {
    let Some(due) = due else {
        return DueClassification::Unscheduled;
    };

    let days = due.signed_duration_since(today).num_days();
    if days < 0 {
        DueClassification::Overdue {
            days_overdue: -days,
        }
    } else {
        DueClassification::Due { days_left: days }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        classify_due_date, parse_calendar_date, project_next_date, DueBand, DueClassification,
    };
    use crate::schedule::ScheduleError;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn projects_same_day_of_month() {
        assert_eq!(project_next_date(date(2024, 6, 15), 6).unwrap(), date(2024, 12, 15));
        assert_eq!(project_next_date(date(2024, 11, 10), 3).unwrap(), date(2025, 2, 10));
        assert_eq!(project_next_date(date(2024, 1, 15), 24).unwrap(), date(2026, 1, 15));
    }

    #[test]
    fn short_target_month_rolls_over() {
        assert_eq!(project_next_date(date(2024, 1, 31), 1).unwrap(), date(2024, 3, 2));
        assert_eq!(project_next_date(date(2023, 1, 31), 1).unwrap(), date(2023, 3, 3));
        assert_eq!(project_next_date(date(2024, 8, 31), 1).unwrap(), date(2024, 10, 1));
    }

    #[test]
    fn projection_is_strictly_later_for_every_interval() {
        let mut day = date(2023, 1, 1);
        while day < date(2025, 1, 1) {
            for months in [1, 2, 6, 11, 12, 60] {
                assert!(project_next_date(day, months).unwrap() > day);
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert_eq!(
            project_next_date(date(2024, 1, 1), 0),
            Err(ScheduleError::InvalidInterval(0))
        );
    }

    #[test]
    fn out_of_range_projection_is_invalid_date() {
        assert!(matches!(
            project_next_date(NaiveDate::MAX, 1),
            Err(ScheduleError::InvalidDate(_))
        ));
    }

    #[test]
    fn parse_calendar_date_accepts_iso_only() {
        assert_eq!(parse_calendar_date(" 2024-06-15 ").unwrap(), date(2024, 6, 15));
        assert!(parse_calendar_date("15.06.2024").is_err());
        assert!(parse_calendar_date("2024-02-30").is_err());
    }

    #[test]
    fn classification_boundaries() {
        let today = date(2024, 7, 10);
        assert_eq!(classify_due_date(None, today), DueClassification::Unscheduled);
        assert_eq!(
            classify_due_date(Some(date(2024, 7, 9)), today),
            DueClassification::Overdue { days_overdue: 1 }
        );
        assert_eq!(
            classify_due_date(Some(today), today),
            DueClassification::Due { days_left: 0 }
        );
        assert_eq!(
            classify_due_date(Some(date(2024, 8, 9)), today).days_left(),
            Some(30)
        );
    }

    #[test]
    fn band_applies_caller_threshold() {
        let today = date(2024, 7, 10);
        let band = |due: Option<NaiveDate>| classify_due_date(due, today).band(30);
        assert_eq!(band(None), DueBand::Unscheduled);
        assert_eq!(band(Some(date(2024, 7, 1))), DueBand::Overdue);
        assert_eq!(band(Some(date(2024, 8, 9))), DueBand::DueSoon(30));
        assert_eq!(band(Some(date(2024, 8, 10))), DueBand::Scheduled(31));
    }
}
