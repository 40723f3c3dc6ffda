//! Use-case services.
//!
//! # Responsibility
//! - Validate payloads, authorize the explicit caller, then mutate storage.
//! - Run every operation inside one immediate SQLite transaction.
//!
//! # Invariants
//! - Order of checks: payload validation, role guard, resource lookups and
//!   ownership guards, state-machine rules, writes.
//! - Any error drops the transaction uncommitted, leaving no partial writes.

use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{Connection, Transaction, TransactionBehavior};

pub mod admin_service;
pub mod dashboard_service;
pub mod error;
pub mod guard;
pub mod input;
pub mod notification_service;
pub mod profile_service;
pub mod record_service;
pub mod request_service;

use error::ServiceError;

/// Source of "now" for timestamps and past-slot checks.
pub type Clock = fn() -> DateTime<Utc>;

pub fn system_clock() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn begin_immediate(conn: &mut Connection) -> Result<Transaction<'_>, ServiceError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Runs one operation and logs its failure kind. Operations log their own
/// success line with the ids they touched.
pub(crate) fn traced<T>(
    event: &'static str,
    operation: impl FnOnce() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let result = operation();
    if let Err(err) = &result {
        warn!(
            "event={event} module=service status=error error_code={}",
            err.code()
        );
    }
    result
}
