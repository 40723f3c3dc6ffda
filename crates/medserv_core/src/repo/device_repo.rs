//! Device persistence, due-date queries and service-date updates.

use super::{
    date_to_db, interval_from_db, opt_date_to_db, parse_opt_date, parse_uuid, RepoError,
    RepoResult,
};
use crate::model::client::ClientId;
use crate::model::device::{Device, DeviceId};
use crate::model::user::UserId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const DEVICE_COLUMNS: &str = "d.id AS id,
    d.client_id AS client_id,
    d.name AS name,
    d.serial_number AS serial_number,
    d.install_date AS install_date,
    d.last_service_date AS last_service_date,
    d.next_service_date AS next_service_date,
    d.service_interval_months AS service_interval_months,
    d.major_service_years AS major_service_years,
    d.created_at AS created_at";

/// Listing filters; all set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceListQuery {
    pub client_id: Option<ClientId>,
    /// Restrict to devices of tenancies this user belongs to.
    pub member_user_id: Option<UserId>,
}

/// Device joined with its owning client's name, for reminder text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueDevice {
    pub device: Device,
    pub client_name: String,
}

pub trait DeviceRepository {
    fn create_device(&self, device: &Device) -> RepoResult<DeviceId>;
    fn update_device(&self, device: &Device) -> RepoResult<()>;
    fn delete_device(&self, id: DeviceId) -> RepoResult<()>;
    fn get_device(&self, id: DeviceId) -> RepoResult<Option<Device>>;
    /// Ordered by next service date (unscheduled last), then name.
    fn list_devices(&self, query: &DeviceListQuery) -> RepoResult<Vec<Device>>;
    /// Moves the service dates after a completed visit.
    fn set_service_dates(
        &self,
        id: DeviceId,
        last_service_date: NaiveDate,
        next_service_date: NaiveDate,
    ) -> RepoResult<()>;
    /// Devices whose next service date is exactly one of `dates`.
    fn devices_due_on(&self, dates: &[NaiveDate]) -> RepoResult<Vec<DueDevice>>;
}

pub struct SqliteDeviceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeviceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DeviceRepository for SqliteDeviceRepository<'_> {
    fn create_device(&self, device: &Device) -> RepoResult<DeviceId> {
        self.conn.execute(
            "INSERT INTO devices (
                id,
                client_id,
                name,
                serial_number,
                install_date,
                last_service_date,
                next_service_date,
                service_interval_months,
                major_service_years
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                device.id.to_string(),
                device.client_id.to_string(),
                device.name.as_str(),
                device.serial_number.as_str(),
                opt_date_to_db(device.install_date),
                opt_date_to_db(device.last_service_date),
                opt_date_to_db(device.next_service_date),
                device.service_interval_months,
                device.major_service_years,
            ],
        )?;
        Ok(device.id)
    }

    fn update_device(&self, device: &Device) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE devices
             SET
                client_id = ?2,
                name = ?3,
                serial_number = ?4,
                install_date = ?5,
                last_service_date = ?6,
                next_service_date = ?7,
                service_interval_months = ?8,
                major_service_years = ?9
             WHERE id = ?1;",
            params![
                device.id.to_string(),
                device.client_id.to_string(),
                device.name.as_str(),
                device.serial_number.as_str(),
                opt_date_to_db(device.install_date),
                opt_date_to_db(device.last_service_date),
                opt_date_to_db(device.next_service_date),
                device.service_interval_months,
                device.major_service_years,
            ],
        )?;
        ensure_changed(changed, device.id)
    }

    fn delete_device(&self, id: DeviceId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM devices WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }

    fn get_device(&self, id: DeviceId) -> RepoResult<Option<Device>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DEVICE_COLUMNS} FROM devices d WHERE d.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_device_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_devices(&self, query: &DeviceListQuery) -> RepoResult<Vec<Device>> {
        let mut sql = format!("SELECT {DEVICE_COLUMNS} FROM devices d WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(client_id) = query.client_id {
            sql.push_str(" AND d.client_id = ?");
            bind_values.push(Value::Text(client_id.to_string()));
        }
        if let Some(user_id) = query.member_user_id {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1 FROM client_members cm
                    WHERE cm.client_id = d.client_id AND cm.user_id = ?
                )",
            );
            bind_values.push(Value::Text(user_id.to_string()));
        }

        sql.push_str(
            " ORDER BY d.next_service_date IS NULL ASC, d.next_service_date ASC,
                d.name COLLATE NOCASE ASC, d.id ASC",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut devices = Vec::new();
        while let Some(row) = rows.next()? {
            devices.push(parse_device_row(row)?);
        }
        Ok(devices)
    }

    fn set_service_dates(
        &self,
        id: DeviceId,
        last_service_date: NaiveDate,
        next_service_date: NaiveDate,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE devices SET last_service_date = ?2, next_service_date = ?3 WHERE id = ?1;",
            params![
                id.to_string(),
                date_to_db(last_service_date),
                date_to_db(next_service_date),
            ],
        )?;
        ensure_changed(changed, id)
    }

    fn devices_due_on(&self, dates: &[NaiveDate]) -> RepoResult<Vec<DueDevice>> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; dates.len()].join(", ");
        let sql = format!(
            "SELECT {DEVICE_COLUMNS}, c.name AS client_name
             FROM devices d
             INNER JOIN clients c ON c.id = d.client_id
             WHERE d.next_service_date IN ({placeholders})
             ORDER BY d.next_service_date ASC, d.id ASC;"
        );
        let bind_values = dates.iter().map(|date| Value::Text(date_to_db(*date)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut due = Vec::new();
        while let Some(row) = rows.next()? {
            due.push(DueDevice {
                device: parse_device_row(row)?,
                client_name: row.get("client_name")?,
            });
        }
        Ok(due)
    }
}

fn parse_device_row(row: &Row<'_>) -> RepoResult<Device> {
    let id_text: String = row.get("id")?;
    let client_text: String = row.get("client_id")?;
    Ok(Device {
        id: parse_uuid(&id_text, "devices.id")?,
        client_id: parse_uuid(&client_text, "devices.client_id")?,
        name: row.get("name")?,
        serial_number: row.get("serial_number")?,
        install_date: parse_opt_date(row.get("install_date")?, "devices.install_date")?,
        last_service_date: parse_opt_date(
            row.get("last_service_date")?,
            "devices.last_service_date",
        )?,
        next_service_date: parse_opt_date(
            row.get("next_service_date")?,
            "devices.next_service_date",
        )?,
        service_interval_months: interval_from_db(
            row.get("service_interval_months")?,
            "devices.service_interval_months",
        )?,
        major_service_years: interval_from_db(
            row.get("major_service_years")?,
            "devices.major_service_years",
        )?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_changed(changed: usize, id: DeviceId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "device",
            id,
        });
    }
    Ok(())
}
