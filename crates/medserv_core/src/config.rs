//! Tunable scheduling policy.
//!
//! # Invariants
//! - Defaults reproduce the production behavior: a fixed ±60 minute conflict
//!   window, 60 seconds of clock tolerance for "not in the past", a 30 day
//!   due-soon band and reminders at 30/14/7/1 days.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    /// Half-width of the symmetric conflict window.
    pub conflict_window_minutes: i64,
    /// How far in the past a new slot may lie and still be accepted.
    pub past_tolerance_seconds: i64,
    /// Devices due within this many days are "due soon".
    pub due_soon_days: i64,
    /// Offsets (days before due date) at which reminders are sent.
    pub reminder_days: Vec<u32>,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub default_duration_minutes: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            conflict_window_minutes: 60,
            past_tolerance_seconds: 60,
            due_soon_days: 30,
            reminder_days: vec![30, 14, 7, 1],
            min_duration_minutes: 15,
            max_duration_minutes: 8 * 60,
            default_duration_minutes: 60,
        }
    }
}

/// Policy values that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyError(String);

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid scheduling policy: {}", self.0)
    }
}

impl Error for PolicyError {}

impl SchedulingPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.conflict_window_minutes <= 0 {
            return Err(PolicyError(
                "conflict_window_minutes must be positive".to_string(),
            ));
        }
        if self.past_tolerance_seconds < 0 {
            return Err(PolicyError(
                "past_tolerance_seconds must not be negative".to_string(),
            ));
        }
        self.conflict_window()?;
        self.past_tolerance()?;
        if self.due_soon_days < 0 {
            return Err(PolicyError("due_soon_days must not be negative".to_string()));
        }
        if self.reminder_days.is_empty() || self.reminder_days.contains(&0) {
            return Err(PolicyError(
                "reminder_days must list positive offsets".to_string(),
            ));
        }
        if self.min_duration_minutes == 0
            || self.min_duration_minutes > self.max_duration_minutes
            || !(self.min_duration_minutes..=self.max_duration_minutes)
                .contains(&self.default_duration_minutes)
        {
            return Err(PolicyError(format!(
                "duration bounds {}..={} must be positive and contain default {}",
                self.min_duration_minutes, self.max_duration_minutes, self.default_duration_minutes
            )));
        }
        Ok(())
    }

    /// Fails when the minutes do not fit a `Duration`.
    pub fn conflict_window(&self) -> Result<Duration, PolicyError> {
        Duration::try_minutes(self.conflict_window_minutes).ok_or_else(|| {
            PolicyError(format!(
                "conflict_window_minutes {} is out of range",
                self.conflict_window_minutes
            ))
        })
    }

    /// Fails when the seconds do not fit a `Duration`.
    pub fn past_tolerance(&self) -> Result<Duration, PolicyError> {
        Duration::try_seconds(self.past_tolerance_seconds).ok_or_else(|| {
            PolicyError(format!(
                "past_tolerance_seconds {} is out of range",
                self.past_tolerance_seconds
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SchedulingPolicy;

    #[test]
    fn defaults_are_valid() {
        let policy = SchedulingPolicy::default();
        policy.validate().unwrap();
        assert_eq!(policy.conflict_window().unwrap().num_minutes(), 60);
        assert_eq!(policy.past_tolerance().unwrap().num_seconds(), 60);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let policy: SchedulingPolicy =
            serde_json::from_str(r#"{ "due_soon_days": 14 }"#).unwrap();
        assert_eq!(policy.due_soon_days, 14);
        assert_eq!(policy.reminder_days, vec![30, 14, 7, 1]);
    }

    #[test]
    fn validate_rejects_zero_reminder_and_bad_window() {
        let mut policy = SchedulingPolicy {
            reminder_days: vec![7, 0],
            ..SchedulingPolicy::default()
        };
        assert!(policy.validate().is_err());

        policy.reminder_days = vec![7];
        policy.conflict_window_minutes = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn durations_beyond_chrono_range_are_rejected() {
        let huge_window = SchedulingPolicy {
            conflict_window_minutes: i64::MAX / 2,
            ..SchedulingPolicy::default()
        };
        assert!(huge_window.conflict_window().is_err());
        assert!(huge_window.validate().is_err());

        let huge_tolerance = SchedulingPolicy {
            past_tolerance_seconds: i64::MAX,
            ..SchedulingPolicy::default()
        };
        assert!(huge_tolerance.past_tolerance().is_err());
        assert!(huge_tolerance.validate().is_err());
    }
}
