//! Service request persistence.
//!
//! # Invariants
//! - `update_request` writes every mutable lifecycle column at once, so a
//!   transition is persisted as a single row write.
//! - Slot queries compare epoch milliseconds with inclusive bounds.

use super::{
    opt_date_to_db, opt_ts_to_db, parse_enum, parse_opt_date, parse_opt_ts, parse_opt_uuid,
    parse_uuid, ts_to_db, RepoError, RepoResult,
};
use crate::model::request::{RequestId, RequestStatus, ServiceRequest};
use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;

const REQUEST_COLUMNS: &str = "r.id AS id,
    r.device_id AS device_id,
    r.requested_by AS requested_by,
    r.type AS type,
    r.description AS description,
    r.preferred_date AS preferred_date,
    r.status AS status,
    r.assigned_to AS assigned_to,
    r.scheduled_at AS scheduled_at,
    r.started_at AS started_at,
    r.finished_at AS finished_at,
    r.delay_reason AS delay_reason,
    r.created_at AS created_at";

/// Visibility and status filters for request listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
    pub assigned_to: Option<UserId>,
    /// Restrict to devices of tenancies this user belongs to.
    pub member_user_id: Option<UserId>,
}

pub trait RequestRepository {
    fn insert_request(&self, request: &ServiceRequest) -> RepoResult<RequestId>;
    fn update_request(&self, request: &ServiceRequest) -> RepoResult<()>;
    fn get_request(&self, id: RequestId) -> RepoResult<Option<ServiceRequest>>;
    /// Ordered by slot (unscheduled last), then creation time.
    fn list_requests(&self, query: &RequestListQuery) -> RepoResult<Vec<ServiceRequest>>;
    /// Requests assigned to `technician_id` with `from <= scheduled_at <= to`.
    fn count_assigned_between(
        &self,
        technician_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<RequestId>,
    ) -> RepoResult<u64>;
    /// Per-status counts under the same visibility filters as listings.
    fn count_by_status(&self, query: &RequestListQuery)
        -> RepoResult<BTreeMap<RequestStatus, u64>>;
}

pub struct SqliteRequestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRequestRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RequestRepository for SqliteRequestRepository<'_> {
    fn insert_request(&self, request: &ServiceRequest) -> RepoResult<RequestId> {
        self.conn.execute(
            "INSERT INTO service_requests (
                id,
                device_id,
                requested_by,
                type,
                description,
                preferred_date,
                status,
                assigned_to,
                scheduled_at,
                started_at,
                finished_at,
                delay_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                request.id.to_string(),
                request.device_id.to_string(),
                request.requested_by.to_string(),
                request.kind.as_str(),
                request.description.as_deref(),
                opt_date_to_db(request.preferred_date),
                request.status.as_str(),
                request.assigned_to.map(|id| id.to_string()),
                opt_ts_to_db(request.scheduled_at),
                opt_ts_to_db(request.started_at),
                opt_ts_to_db(request.finished_at),
                request.delay_reason.as_deref(),
            ],
        )?;
        Ok(request.id)
    }

    fn update_request(&self, request: &ServiceRequest) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE service_requests
             SET
                status = ?2,
                assigned_to = ?3,
                scheduled_at = ?4,
                started_at = ?5,
                finished_at = ?6,
                delay_reason = ?7
             WHERE id = ?1;",
            params![
                request.id.to_string(),
                request.status.as_str(),
                request.assigned_to.map(|id| id.to_string()),
                opt_ts_to_db(request.scheduled_at),
                opt_ts_to_db(request.started_at),
                opt_ts_to_db(request.finished_at),
                request.delay_reason.as_deref(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "service request",
                id: request.id,
            });
        }
        Ok(())
    }

    fn get_request(&self, id: RequestId) -> RepoResult<Option<ServiceRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests r WHERE r.id = ?1;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_request_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_requests(&self, query: &RequestListQuery) -> RepoResult<Vec<ServiceRequest>> {
        let (filter, bind_values) = build_filter(query);
        let sql = format!(
            "SELECT {REQUEST_COLUMNS}
             FROM service_requests r
             WHERE 1 = 1{filter}
             ORDER BY r.scheduled_at IS NULL ASC, r.scheduled_at ASC, r.created_at DESC, r.id ASC;"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_request_row(row)?);
        }
        Ok(requests)
    }

    fn count_assigned_between(
        &self,
        technician_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<RequestId>,
    ) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM service_requests
             WHERE assigned_to = ?1
               AND scheduled_at IS NOT NULL
               AND scheduled_at >= ?2
               AND scheduled_at <= ?3
               AND (?4 IS NULL OR id <> ?4);",
            params![
                technician_id.to_string(),
                ts_to_db(from),
                ts_to_db(to),
                exclude.map(|id| id.to_string()),
            ],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative conflict count {count}")))
    }

    fn count_by_status(
        &self,
        query: &RequestListQuery,
    ) -> RepoResult<BTreeMap<RequestStatus, u64>> {
        let (filter, bind_values) = build_filter(query);
        let sql = format!(
            "SELECT r.status AS status, COUNT(*) AS total
             FROM service_requests r
             WHERE 1 = 1{filter}
             GROUP BY r.status;"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let status_text: String = row.get("status")?;
            let total: i64 = row.get("total")?;
            let status: RequestStatus = parse_enum(&status_text, "service_requests.status")?;
            counts.insert(status, u64::try_from(total).unwrap_or_default());
        }
        Ok(counts)
    }
}

fn build_filter(query: &RequestListQuery) -> (String, Vec<Value>) {
    let mut filter = String::new();
    let mut bind_values = Vec::new();

    if let Some(status) = query.status {
        filter.push_str(" AND r.status = ?");
        bind_values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(technician_id) = query.assigned_to {
        filter.push_str(" AND r.assigned_to = ?");
        bind_values.push(Value::Text(technician_id.to_string()));
    }
    if let Some(user_id) = query.member_user_id {
        filter.push_str(
            " AND EXISTS (
                SELECT 1
                FROM devices d
                INNER JOIN client_members cm ON cm.client_id = d.client_id
                WHERE d.id = r.device_id AND cm.user_id = ?
            )",
        );
        bind_values.push(Value::Text(user_id.to_string()));
    }

    (filter, bind_values)
}

fn parse_request_row(row: &Row<'_>) -> RepoResult<ServiceRequest> {
    let id_text: String = row.get("id")?;
    let device_text: String = row.get("device_id")?;
    let requested_by_text: String = row.get("requested_by")?;
    let type_text: String = row.get("type")?;
    let status_text: String = row.get("status")?;
    Ok(ServiceRequest {
        id: parse_uuid(&id_text, "service_requests.id")?,
        device_id: parse_uuid(&device_text, "service_requests.device_id")?,
        requested_by: parse_uuid(&requested_by_text, "service_requests.requested_by")?,
        kind: parse_enum(&type_text, "service_requests.type")?,
        description: row.get("description")?,
        preferred_date: parse_opt_date(
            row.get("preferred_date")?,
            "service_requests.preferred_date",
        )?,
        status: parse_enum(&status_text, "service_requests.status")?,
        assigned_to: parse_opt_uuid(row.get("assigned_to")?, "service_requests.assigned_to")?,
        scheduled_at: parse_opt_ts(row.get("scheduled_at")?, "service_requests.scheduled_at")?,
        started_at: parse_opt_ts(row.get("started_at")?, "service_requests.started_at")?,
        finished_at: parse_opt_ts(row.get("finished_at")?, "service_requests.finished_at")?,
        delay_reason: row.get("delay_reason")?,
        created_at: row.get("created_at")?,
    })
}
