//! Ordered schema steps for the scheduling store.
//!
//! # Invariants
//! - Step versions start at 1 and increase by one.
//! - Pending steps run in a single transaction; `PRAGMA user_version` is
//!   bumped after each step inside that transaction.
//! - A migrated store has no dangling tenant, device or user references.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenancy_devices",
        sql: include_str!("0001_tenancy_devices.sql"),
    },
    Migration {
        version: 2,
        name: "service_requests",
        sql: include_str!("0002_service_requests.sql"),
    },
    Migration {
        version: 3,
        name: "notifications",
        sql: include_str!("0003_notifications.sql"),
    },
    Migration {
        version: 4,
        name: "client_profiles",
        sql: include_str!("0004_client_profiles.sql"),
    },
];

/// Schema version this build migrates to.
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Version recorded in the store, `0` for a fresh file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings the store up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }
    if from == latest {
        debug!("event=db_migrate module=db status=skip version={from}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in MIGRATIONS.iter().filter(|step| step.version > from) {
        run_step(&tx, step)?;
    }
    check_references(&tx)?;
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from} to_version={latest}");
    Ok(())
}

fn run_step(tx: &Transaction<'_>, step: &Migration) -> DbResult<()> {
    let wrap = |source| DbError::Migration {
        version: step.version,
        name: step.name,
        source,
    };
    tx.execute_batch(step.sql).map_err(wrap)?;
    tx.pragma_update(None, "user_version", step.version)
        .map_err(wrap)?;
    debug!(
        "event=db_migrate_step module=db status=ok version={} name={}",
        step.version, step.name
    );
    Ok(())
}

// Catches rows written while foreign keys were off.
fn check_references(tx: &Transaction<'_>) -> DbResult<()> {
    let mut stmt = tx.prepare("PRAGMA foreign_key_check;")?;
    let mut rows = stmt.query([])?;
    if let Some(row) = rows.next()? {
        return Err(DbError::DanglingReference {
            table: row.get(0)?,
            parent: row.get(2)?,
        });
    }
    Ok(())
}
