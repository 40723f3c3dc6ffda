//! User accounts and technician profiles.

use super::{parse_enum, parse_uuid, RepoError, RepoResult};
use crate::model::user::{Role, Technician, TechnicianProfile, User, UserId};
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT id, name, email, role, created_at FROM users";

pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn update_user_name(&self, id: UserId, name: &str) -> RepoResult<()>;
    fn set_role(&self, id: UserId, role: Role) -> RepoResult<()>;
    fn list_users_by_role(&self, role: Role) -> RepoResult<Vec<User>>;
    /// Inserts or replaces the technician profile for `id`.
    fn upsert_technician_profile(&self, id: UserId, profile: &TechnicianProfile)
        -> RepoResult<()>;
    fn list_technicians(&self) -> RepoResult<Vec<Technician>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, role) VALUES (?1, ?2, ?3, ?4);",
            params![
                user.id.to_string(),
                user.name.as_str(),
                user.email.as_str(),
                user.role.as_str(),
            ],
        )?;
        Ok(user.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_user_name(&self, id: UserId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET name = ?2 WHERE id = ?1;",
            params![id.to_string(), name],
        )?;
        ensure_changed(changed, id)
    }

    fn set_role(&self, id: UserId, role: Role) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET role = ?2 WHERE id = ?1;",
            params![id.to_string(), role.as_str()],
        )?;
        ensure_changed(changed, id)
    }

    fn list_users_by_role(&self, role: Role) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL} WHERE role = ?1 ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([role.as_str()])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn upsert_technician_profile(
        &self,
        id: UserId,
        profile: &TechnicianProfile,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO technician_profiles (user_id, phone, region)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                phone = excluded.phone,
                region = excluded.region;",
            params![
                id.to_string(),
                profile.phone.as_deref(),
                profile.region.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn list_technicians(&self) -> RepoResult<Vec<Technician>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                u.id AS id,
                u.name AS name,
                u.email AS email,
                u.role AS role,
                u.created_at AS created_at,
                p.phone AS phone,
                p.region AS region
             FROM users u
             LEFT JOIN technician_profiles p ON p.user_id = u.id
             WHERE u.role = 'technician'
             ORDER BY u.name COLLATE NOCASE ASC, u.id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut technicians = Vec::new();
        while let Some(row) = rows.next()? {
            technicians.push(Technician {
                user: parse_user_row(row)?,
                profile: TechnicianProfile {
                    phone: row.get("phone")?,
                    region: row.get("region")?,
                },
            });
        }
        Ok(technicians)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    Ok(User {
        id: parse_uuid(&id_text, "users.id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: parse_enum(&role_text, "users.role")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_changed(changed: usize, id: UserId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "user", id });
    }
    Ok(())
}
