//! Service request entity and its lifecycle state machine.
//!
//! # Responsibility
//! - Hold the mutable ticket that tracks a desired or scheduled visit.
//! - Apply status transitions and reject the ones the lifecycle forbids.
//!
//! # Invariants
//! - `open` requests are client-created and unassigned.
//! - `start` is only legal from `scheduled` or `delayed`.
//! - Nothing leaves `done` or `cancelled`.
//!
//! Transition methods mutate in memory only; persistence happens in the
//! service layer inside one transaction.

use super::device::DeviceId;
use super::record::ServiceType;
use super::user::UserId;
use super::UnknownVariant;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub type RequestId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Client-initiated, not yet assigned.
    Open,
    /// Assigned to a technician with a time slot.
    Scheduled,
    InProgress,
    /// Postponed; may be started again.
    Delayed,
    Done,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        Self::Open,
        Self::Scheduled,
        Self::InProgress,
        Self::Delayed,
        Self::Done,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Delayed => "delayed",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Targets accepted by the administrative status override.
    pub fn is_override_target(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownVariant::new("request status", value))
    }
}

/// Rejected lifecycle move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The state machine has no edge from `from` to `to`.
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    /// Completion attempted on a request that is already `done`/`cancelled`.
    AlreadyClosed(RequestStatus),
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "request cannot move from {from} to {to}")
            }
            Self::AlreadyClosed(status) => write!(f, "request already closed ({status})"),
        }
    }
}

impl Error for TransitionError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub device_id: DeviceId,
    pub requested_by: UserId,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    pub description: Option<String>,
    /// Client hint only; never drives scheduling.
    pub preferred_date: Option<NaiveDate>,
    pub status: RequestStatus,
    pub assigned_to: Option<UserId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub delay_reason: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl ServiceRequest {
    /// Client self-service ticket: `open`, nobody assigned.
    pub fn open(
        device_id: DeviceId,
        requested_by: UserId,
        kind: ServiceType,
        description: Option<String>,
        preferred_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            requested_by,
            kind,
            description,
            preferred_date,
            status: RequestStatus::Open,
            assigned_to: None,
            scheduled_at: None,
            started_at: None,
            finished_at: None,
            delay_reason: None,
            created_at: 0,
        }
    }

    /// Administrator ticket created directly in `scheduled`.
    pub fn pre_assigned(
        device_id: DeviceId,
        requested_by: UserId,
        kind: ServiceType,
        technician_id: UserId,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let mut request = Self::open(device_id, requested_by, kind, None, None);
        request.status = RequestStatus::Scheduled;
        request.assigned_to = Some(technician_id);
        request.scheduled_at = Some(scheduled_at);
        request
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Assigns a technician and slot; legal from any non-terminal state.
    pub fn assign(
        &mut self,
        technician_id: UserId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_not_terminal(RequestStatus::Scheduled)?;
        self.assigned_to = Some(technician_id);
        self.scheduled_at = Some(scheduled_at);
        self.status = RequestStatus::Scheduled;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !matches!(
            self.status,
            RequestStatus::Scheduled | RequestStatus::Delayed
        ) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: RequestStatus::InProgress,
            });
        }
        self.status = RequestStatus::InProgress;
        self.started_at = Some(now);
        Ok(())
    }

    /// Postpones the visit. Keeps the previous slot when `new_slot` is `None`.
    pub fn delay(
        &mut self,
        new_slot: Option<DateTime<Utc>>,
        reason: Option<String>,
    ) -> Result<(), TransitionError> {
        self.ensure_not_terminal(RequestStatus::Delayed)?;
        self.status = RequestStatus::Delayed;
        if let Some(slot) = new_slot {
            self.scheduled_at = Some(slot);
        }
        self.delay_reason = reason;
        Ok(())
    }

    /// Marks the visit completed. Only the guided finish/convert paths call
    /// this; they also write the service record.
    pub fn complete(&mut self, finished_at: Option<DateTime<Utc>>) -> Result<(), TransitionError> {
        if self.is_closed() {
            return Err(TransitionError::AlreadyClosed(self.status));
        }
        self.status = RequestStatus::Done;
        if finished_at.is_some() {
            self.finished_at = finished_at;
        }
        Ok(())
    }

    /// Raw status override. No timestamps or records are touched.
    pub fn override_status(&mut self, target: RequestStatus) -> Result<(), TransitionError> {
        if !target.is_override_target() {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.ensure_not_terminal(target)?;
        self.status = target;
        Ok(())
    }

    fn ensure_not_terminal(&self, to: RequestStatus) -> Result<(), TransitionError> {
        if self.is_closed() {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestStatus, ServiceRequest, TransitionError};
    use crate::model::record::ServiceType;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn open_request() -> ServiceRequest {
        ServiceRequest::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ServiceType::Routine,
            None,
            None,
        )
    }

    #[test]
    fn status_text_round_trips_and_rejects_unknown() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("finished".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn start_requires_scheduled_or_delayed() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let mut request = open_request();
        assert_eq!(
            request.start(now),
            Err(TransitionError::InvalidTransition {
                from: RequestStatus::Open,
                to: RequestStatus::InProgress,
            })
        );

        request.assign(Uuid::new_v4(), now).unwrap();
        request.delay(None, Some("parts".to_string())).unwrap();
        request.start(now).unwrap();
        assert_eq!(request.status, RequestStatus::InProgress);
        assert_eq!(request.started_at, Some(now));
    }

    #[test]
    fn delay_keeps_previous_slot_without_new_date() {
        let slot = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let mut request = open_request();
        request.assign(Uuid::new_v4(), slot).unwrap();
        request.delay(None, None).unwrap();
        assert_eq!(request.scheduled_at, Some(slot));

        let later = Utc.with_ymd_and_hms(2024, 7, 3, 9, 0, 0).unwrap();
        request.delay(Some(later), Some("site closed".to_string())).unwrap();
        assert_eq!(request.scheduled_at, Some(later));
        assert_eq!(request.delay_reason.as_deref(), Some("site closed"));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut request = open_request();
        request.complete(None).unwrap();
        assert_eq!(
            request.complete(None),
            Err(TransitionError::AlreadyClosed(RequestStatus::Done))
        );
        assert!(matches!(
            request.override_status(RequestStatus::Cancelled),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert!(request.delay(None, None).is_err());
        assert!(request.assign(Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn override_rejects_open_target() {
        let mut request = open_request();
        assert!(request.override_status(RequestStatus::Open).is_err());
        request.override_status(RequestStatus::Cancelled).unwrap();
        assert_eq!(request.status, RequestStatus::Cancelled);
    }
}
