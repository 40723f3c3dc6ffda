//! Self-maintained profile rows: client organization details and
//! technician contact details.

use super::{parse_uuid, RepoResult};
use crate::model::client::{ClientId, ClientProfile};
use crate::model::user::{TechnicianProfile, UserId};
use rusqlite::{params, Connection, Row};

pub trait ProfileRepository {
    fn get_client_profile(&self, client_id: ClientId) -> RepoResult<Option<ClientProfile>>;
    /// Inserts or replaces the profile; `created_at` of an existing row is kept.
    fn upsert_client_profile(&self, profile: &ClientProfile) -> RepoResult<()>;
    fn get_technician_profile(&self, user_id: UserId) -> RepoResult<Option<TechnicianProfile>>;
    /// Tenancies of `user_id`, ordered by client name.
    fn client_ids_of(&self, user_id: UserId) -> RepoResult<Vec<ClientId>>;
}

pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn get_client_profile(&self, client_id: ClientId) -> RepoResult<Option<ClientProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT client_id, organization_name, address, contact_email, created_at
             FROM client_profiles WHERE client_id = ?1;",
        )?;
        let mut rows = stmt.query([client_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_client_profile_row(row)?)),
            None => Ok(None),
        }
    }

    fn upsert_client_profile(&self, profile: &ClientProfile) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO client_profiles (client_id, organization_name, address, contact_email)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(client_id) DO UPDATE SET
                organization_name = excluded.organization_name,
                address = excluded.address,
                contact_email = excluded.contact_email;",
            params![
                profile.client_id.to_string(),
                profile.organization_name.as_str(),
                profile.address.as_deref(),
                profile.contact_email.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_technician_profile(&self, user_id: UserId) -> RepoResult<Option<TechnicianProfile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT phone, region FROM technician_profiles WHERE user_id = ?1;")?;
        let mut rows = stmt.query([user_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(TechnicianProfile {
                phone: row.get("phone")?,
                region: row.get("region")?,
            })),
            None => Ok(None),
        }
    }

    fn client_ids_of(&self, user_id: UserId) -> RepoResult<Vec<ClientId>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.client_id
             FROM client_members m
             JOIN clients c ON c.id = m.client_id
             WHERE m.user_id = ?1
             ORDER BY c.name COLLATE NOCASE ASC, c.id ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, "client_members.client_id")?);
        }
        Ok(ids)
    }
}

fn parse_client_profile_row(row: &Row<'_>) -> RepoResult<ClientProfile> {
    let client_id: String = row.get("client_id")?;
    Ok(ClientProfile {
        client_id: parse_uuid(&client_id, "client_profiles.client_id")?,
        organization_name: row.get("organization_name")?,
        address: row.get("address")?,
        contact_email: row.get("contact_email")?,
        created_at: row.get("created_at")?,
    })
}
