//! Client tenancies and membership links.
//!
//! # Invariants
//! - Deleting a client cascades to devices, their requests/records, and
//!   memberships (enforced by foreign keys).
//! - A `(client_id, user_id)` membership exists at most once.

use super::{parse_uuid, RepoError, RepoResult};
use crate::model::client::{Client, ClientId, ClientMember};
use crate::model::user::UserId;
use rusqlite::{params, Connection, Row};

const CLIENT_SELECT_SQL: &str = "SELECT id, name, address, contact_email, created_at FROM clients";

pub trait ClientRepository {
    fn create_client(&self, client: &Client) -> RepoResult<ClientId>;
    fn update_client(&self, client: &Client) -> RepoResult<()>;
    fn delete_client(&self, id: ClientId) -> RepoResult<()>;
    fn get_client(&self, id: ClientId) -> RepoResult<Option<Client>>;
    fn list_clients(&self) -> RepoResult<Vec<Client>>;
    /// Returns `false` when the membership already existed.
    fn add_member(&self, member: &ClientMember) -> RepoResult<bool>;
    /// Returns `false` when there was nothing to remove.
    fn remove_member(&self, client_id: ClientId, user_id: UserId) -> RepoResult<bool>;
    fn is_member(&self, client_id: ClientId, user_id: UserId) -> RepoResult<bool>;
    fn member_user_ids(&self, client_id: ClientId) -> RepoResult<Vec<UserId>>;
}

pub struct SqliteClientRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClientRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn create_client(&self, client: &Client) -> RepoResult<ClientId> {
        self.conn.execute(
            "INSERT INTO clients (id, name, address, contact_email) VALUES (?1, ?2, ?3, ?4);",
            params![
                client.id.to_string(),
                client.name.as_str(),
                client.address.as_deref(),
                client.contact_email.as_deref(),
            ],
        )?;
        Ok(client.id)
    }

    fn update_client(&self, client: &Client) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE clients SET name = ?2, address = ?3, contact_email = ?4 WHERE id = ?1;",
            params![
                client.id.to_string(),
                client.name.as_str(),
                client.address.as_deref(),
                client.contact_email.as_deref(),
            ],
        )?;
        ensure_changed(changed, client.id)
    }

    fn delete_client(&self, id: ClientId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM clients WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }

    fn get_client(&self, id: ClientId) -> RepoResult<Option<Client>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CLIENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_client_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_clients(&self) -> RepoResult<Vec<Client>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLIENT_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next()? {
            clients.push(parse_client_row(row)?);
        }
        Ok(clients)
    }

    fn add_member(&self, member: &ClientMember) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO client_members (client_id, user_id, role_in_client)
             VALUES (?1, ?2, ?3);",
            params![
                member.client_id.to_string(),
                member.user_id.to_string(),
                member.role_in_client.as_str(),
            ],
        )?;
        Ok(inserted == 1)
    }

    fn remove_member(&self, client_id: ClientId, user_id: UserId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM client_members WHERE client_id = ?1 AND user_id = ?2;",
            params![client_id.to_string(), user_id.to_string()],
        )?;
        Ok(removed == 1)
    }

    fn is_member(&self, client_id: ClientId, user_id: UserId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM client_members WHERE client_id = ?1 AND user_id = ?2
            );",
            params![client_id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn member_user_ids(&self, client_id: ClientId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM client_members WHERE client_id = ?1 ORDER BY user_id ASC;",
        )?;
        let mut rows = stmt.query([client_id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, "client_members.user_id")?);
        }
        Ok(ids)
    }
}

fn parse_client_row(row: &Row<'_>) -> RepoResult<Client> {
    let id_text: String = row.get("id")?;
    Ok(Client {
        id: parse_uuid(&id_text, "clients.id")?,
        name: row.get("name")?,
        address: row.get("address")?,
        contact_email: row.get("contact_email")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_changed(changed: usize, id: ClientId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "client",
            id,
        });
    }
    Ok(())
}
