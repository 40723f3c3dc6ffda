//! Completed-visit recording.
//!
//! # Responsibility
//! - Write the immutable service record and advance the device's
//!   last/next service dates as one unit.
//! - Serve device service history with tenant visibility.
//!
//! # Invariants
//! - The next service date is always projected from the recorded service
//!   date and the device's interval at recording time.

use super::error::{ServiceError, ServiceResult};
use super::guard::{assert_client_owns_device, assert_role};
use super::input::RecordInput;
use super::{begin_immediate, traced};
use crate::model::device::{Device, DeviceId};
use crate::model::record::{ServiceRecord, ServiceType};
use crate::model::user::{Actor, Role, UserId};
use crate::repo::client_repo::SqliteClientRepository;
use crate::repo::device_repo::{DeviceRepository, SqliteDeviceRepository};
use crate::repo::record_repo::{ServiceRecordRepository, SqliteServiceRecordRepository};
use crate::schedule::project_next_date;
use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::Connection;
use serde::Serialize;

/// Result of recording a visit: the new history row and the updated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub record: ServiceRecord,
    pub device: Device,
}

/// Inserts the record and moves the device dates forward. Callers own the
/// transaction.
pub(crate) fn apply_completion(
    conn: &Connection,
    device_id: DeviceId,
    technician_id: UserId,
    service_date: NaiveDate,
    kind: ServiceType,
    notes: Option<String>,
) -> ServiceResult<CompletionOutcome> {
    let devices = SqliteDeviceRepository::new(conn);
    let records = SqliteServiceRecordRepository::new(conn);

    let mut device = devices.get_device(device_id)?.ok_or(ServiceError::NotFound {
        entity: "device",
        id: device_id,
    })?;
    let next_service_date = project_next_date(service_date, device.service_interval_months)?;

    let record = ServiceRecord::new(
        device_id,
        technician_id,
        service_date,
        kind,
        notes,
        next_service_date,
    );
    let record_id = records.insert_record(&record)?;
    devices.set_service_dates(device_id, service_date, next_service_date)?;

    device.last_service_date = Some(service_date);
    device.next_service_date = Some(next_service_date);
    let record = records.get_record(record_id)?.ok_or(ServiceError::NotFound {
        entity: "service record",
        id: record_id,
    })?;

    debug!(
        "event=service_recorded module=service status=ok device_id={} record_id={} next_service_date={}",
        device_id, record_id, next_service_date
    );
    Ok(CompletionOutcome { record, device })
}

/// Direct visit entry and device history.
pub struct RecordService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> RecordService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Records a visit that did not go through a request. Admin or technician.
    pub fn record_service(
        &mut self,
        actor: Option<&Actor>,
        input: RecordInput,
    ) -> ServiceResult<CompletionOutcome> {
        traced("record_service", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &[Role::Admin, Role::Technician])?;

            let tx = begin_immediate(self.conn)?;
            let outcome = apply_completion(
                &tx,
                input.device_id,
                actor.user_id,
                input.service_date,
                input.kind,
                input.notes,
            )?;
            tx.commit()?;
            info!(
                "event=record_service module=service status=ok device_id={} record_id={}",
                outcome.device.id, outcome.record.id
            );
            Ok(outcome)
        })
    }

    /// Newest visit first. Clients only see devices of their tenancies.
    pub fn list_service_records(
        &self,
        actor: Option<&Actor>,
        device_id: DeviceId,
    ) -> ServiceResult<Vec<ServiceRecord>> {
        traced("record_list", || {
            let actor = assert_role(actor, &[Role::Admin, Role::Technician, Role::Client])?;
            let conn: &Connection = &*self.conn;

            let device = SqliteDeviceRepository::new(conn).get_device(device_id)?;
            let device = match (device, actor.role) {
                (Some(device), _) => device,
                (None, Role::Client) => return Err(ServiceError::Forbidden),
                (None, _) => {
                    return Err(ServiceError::NotFound {
                        entity: "device",
                        id: device_id,
                    })
                }
            };
            assert_client_owns_device(&actor, &device, &SqliteClientRepository::new(conn))?;

            Ok(SqliteServiceRecordRepository::new(conn).list_records_for_device(device_id)?)
        })
    }
}
