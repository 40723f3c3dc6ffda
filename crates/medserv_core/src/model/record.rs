//! Completed service visits.
//!
//! # Invariants
//! - A record is written exactly once per completed visit and never edited.
//! - `next_service_date` is the projection computed when the record was made.

use super::device::DeviceId;
use super::user::UserId;
use super::UnknownVariant;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub type ServiceRecordId = Uuid;

/// Kind of maintenance visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Periodic visit driven by the device interval.
    Routine,
    /// Ad-hoc visit (fault, incident).
    Irregular,
    /// Multi-year overhaul.
    Major,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Irregular => "irregular",
            Self::Major => "major",
        }
    }
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "routine" => Ok(Self::Routine),
            "irregular" => Ok(Self::Irregular),
            "major" => Ok(Self::Major),
            other => Err(UnknownVariant::new("service type", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: ServiceRecordId,
    pub device_id: DeviceId,
    /// Attribution only; the record belongs to the device.
    pub technician_id: UserId,
    pub service_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    pub notes: Option<String>,
    pub next_service_date: Option<NaiveDate>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl ServiceRecord {
    /// Builds a fresh record with a generated id.
    pub fn new(
        device_id: DeviceId,
        technician_id: UserId,
        service_date: NaiveDate,
        kind: ServiceType,
        notes: Option<String>,
        next_service_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            technician_id,
            service_date,
            kind,
            notes,
            next_service_date: Some(next_service_date),
            created_at: 0,
        }
    }
}
