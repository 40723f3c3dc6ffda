//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define per-aggregate data access traits used by services.
//! - Keep SQL text and column encoding inside this module.
//!
//! # Invariants
//! - Ids are stored as UUID text, calendar dates as `YYYY-MM-DD` text and
//!   timestamps as UTC epoch milliseconds.
//! - Read paths reject invalid persisted values instead of masking them.
//! - Repositories never open transactions; callers pass a connection that
//!   may be a `Transaction` and decide commit/rollback.

use crate::db::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub mod client_repo;
pub mod device_repo;
pub mod notification_repo;
pub mod profile_repo;
pub mod record_repo;
pub mod request_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Update/delete matched no row.
    NotFound { entity: &'static str, id: Uuid },
    /// Persisted value cannot be decoded into the domain model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn date_to_db(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub(crate) fn opt_date_to_db(value: Option<NaiveDate>) -> Option<String> {
    value.map(date_to_db)
}

pub(crate) fn parse_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

pub(crate) fn parse_opt_date(value: Option<String>, column: &str) -> RepoResult<Option<NaiveDate>> {
    value.map(|text| parse_date(&text, column)).transpose()
}

pub(crate) fn ts_to_db(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn opt_ts_to_db(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(ts_to_db)
}

pub(crate) fn parse_opt_ts(value: Option<i64>, column: &str) -> RepoResult<Option<DateTime<Utc>>> {
    value
        .map(|millis| {
            DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid timestamp `{millis}` in {column}"))
            })
        })
        .transpose()
}

pub(crate) fn parse_enum<T: FromStr>(value: &str, column: &str) -> RepoResult<T> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

pub(crate) fn interval_from_db(value: i64, column: &str) -> RepoResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|months| *months >= 1)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid interval `{value}` in {column}")))
}
