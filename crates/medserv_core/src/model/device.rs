//! Serviced medical devices.
//!
//! # Invariants
//! - `service_interval_months` and `major_service_years` are at least 1.
//! - `next_service_date` tracks `last_service_date + interval` and is only
//!   moved by recording a completed service (or an explicit admin edit).

use super::client::ClientId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DeviceId = Uuid;

pub const DEFAULT_SERVICE_INTERVAL_MONTHS: u32 = 6;
pub const DEFAULT_MAJOR_SERVICE_YEARS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub client_id: ClientId,
    pub name: String,
    pub serial_number: String,
    pub install_date: Option<NaiveDate>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_date: Option<NaiveDate>,
    pub service_interval_months: u32,
    pub major_service_years: u32,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Editable device attributes shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDraft {
    pub client_id: ClientId,
    pub name: String,
    pub serial_number: String,
    pub install_date: Option<NaiveDate>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_date: Option<NaiveDate>,
    pub service_interval_months: u32,
    pub major_service_years: u32,
}

impl DeviceDraft {
    /// Draft with default intervals and no service history.
    pub fn new(
        client_id: ClientId,
        name: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            name: name.into(),
            serial_number: serial_number.into(),
            install_date: None,
            last_service_date: None,
            next_service_date: None,
            service_interval_months: DEFAULT_SERVICE_INTERVAL_MONTHS,
            major_service_years: DEFAULT_MAJOR_SERVICE_YEARS,
        }
    }
}
