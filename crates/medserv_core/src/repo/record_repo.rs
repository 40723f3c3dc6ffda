//! Append-only service history.

use super::{
    date_to_db, opt_date_to_db, parse_date, parse_enum, parse_opt_date, parse_uuid, RepoResult,
};
use crate::model::device::DeviceId;
use crate::model::record::{ServiceRecord, ServiceRecordId};
use rusqlite::{params, Connection, Row};

const RECORD_SELECT_SQL: &str = "SELECT
        id,
        device_id,
        technician_id,
        service_date,
        type,
        notes,
        next_service_date,
        created_at
     FROM service_records";

pub trait ServiceRecordRepository {
    fn insert_record(&self, record: &ServiceRecord) -> RepoResult<ServiceRecordId>;
    fn get_record(&self, id: ServiceRecordId) -> RepoResult<Option<ServiceRecord>>;
    /// Newest visit first.
    fn list_records_for_device(&self, device_id: DeviceId) -> RepoResult<Vec<ServiceRecord>>;
}

pub struct SqliteServiceRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteServiceRecordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ServiceRecordRepository for SqliteServiceRecordRepository<'_> {
    fn insert_record(&self, record: &ServiceRecord) -> RepoResult<ServiceRecordId> {
        self.conn.execute(
            "INSERT INTO service_records (
                id,
                device_id,
                technician_id,
                service_date,
                type,
                notes,
                next_service_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                record.id.to_string(),
                record.device_id.to_string(),
                record.technician_id.to_string(),
                date_to_db(record.service_date),
                record.kind.as_str(),
                record.notes.as_deref(),
                opt_date_to_db(record.next_service_date),
            ],
        )?;
        Ok(record.id)
    }

    fn get_record(&self, id: ServiceRecordId) -> RepoResult<Option<ServiceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECORD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_record_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_records_for_device(&self, device_id: DeviceId) -> RepoResult<Vec<ServiceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE device_id = ?1
             ORDER BY service_date DESC, created_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([device_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<ServiceRecord> {
    let id_text: String = row.get("id")?;
    let device_text: String = row.get("device_id")?;
    let technician_text: String = row.get("technician_id")?;
    let service_date_text: String = row.get("service_date")?;
    let type_text: String = row.get("type")?;
    Ok(ServiceRecord {
        id: parse_uuid(&id_text, "service_records.id")?,
        device_id: parse_uuid(&device_text, "service_records.device_id")?,
        technician_id: parse_uuid(&technician_text, "service_records.technician_id")?,
        service_date: parse_date(&service_date_text, "service_records.service_date")?,
        kind: parse_enum(&type_text, "service_records.type")?,
        notes: row.get("notes")?,
        next_service_date: parse_opt_date(
            row.get("next_service_date")?,
            "service_records.next_service_date",
        )?,
        created_at: row.get("created_at")?,
    })
}
