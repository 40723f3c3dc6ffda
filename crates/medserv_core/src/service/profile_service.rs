//! Self-service account and profile edits.
//!
//! # Invariants
//! - Callers only ever touch their own user row, their own technician
//!   profile, or the profile of a tenancy they belong to.
//! - A client profile keeps its first-save `created_at` across edits.

use super::error::{ServiceError, ServiceResult};
use super::guard::assert_role;
use super::input::{AccountInput, ClientProfileInput, TechnicianProfileInput};
use super::{begin_immediate, traced};
use crate::model::client::ClientProfile;
use crate::model::user::{Actor, Role, TechnicianProfile, User};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use log::info;
use rusqlite::Connection;
use serde::Serialize;

const ALL_ROLES: [Role; 3] = [Role::Admin, Role::Technician, Role::Client];

/// What the profile page shows for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub user: User,
    /// Present for technicians once a profile was saved.
    pub technician: Option<TechnicianProfile>,
    /// Saved organization profiles of the caller's tenancies.
    pub organizations: Vec<ClientProfile>,
}

pub struct ProfileService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> ProfileService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub fn my_profile(&self, actor: Option<&Actor>) -> ServiceResult<Profile> {
        traced("profile_get", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let conn: &Connection = &*self.conn;
            let user = load_self(&SqliteUserRepository::new(conn), &actor)?;

            let profiles = SqliteProfileRepository::new(conn);
            let technician = match actor.role {
                Role::Technician => profiles.get_technician_profile(actor.user_id)?,
                _ => None,
            };
            let mut organizations = Vec::new();
            for client_id in profiles.client_ids_of(actor.user_id)? {
                if let Some(profile) = profiles.get_client_profile(client_id)? {
                    organizations.push(profile);
                }
            }

            Ok(Profile {
                user,
                technician,
                organizations,
            })
        })
    }

    /// Renames the caller.
    pub fn update_account(
        &mut self,
        actor: Option<&Actor>,
        input: AccountInput,
    ) -> ServiceResult<User> {
        traced("account_update", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &ALL_ROLES)?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            users.update_user_name(actor.user_id, &input.name)?;
            let updated = load_self(&users, &actor)?;
            tx.commit()?;

            info!(
                "event=account_update module=service status=ok user_id={}",
                actor.user_id
            );
            Ok(updated)
        })
    }

    /// Creates or replaces the organization profile of one of the caller's
    /// tenancies.
    pub fn update_client_profile(
        &mut self,
        actor: Option<&Actor>,
        input: ClientProfileInput,
    ) -> ServiceResult<ClientProfile> {
        traced("client_profile_update", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &[Role::Client])?;

            let tx = begin_immediate(self.conn)?;
            let profiles = SqliteProfileRepository::new(&tx);
            let tenancies = profiles.client_ids_of(actor.user_id)?;
            let client_id = match input.client_id {
                Some(requested) if tenancies.contains(&requested) => requested,
                Some(_) => return Err(ServiceError::Forbidden),
                None => *tenancies.first().ok_or(ServiceError::Forbidden)?,
            };

            profiles.upsert_client_profile(&ClientProfile {
                client_id,
                organization_name: input.organization_name,
                address: input.address,
                contact_email: input.contact_email,
                created_at: 0,
            })?;
            let saved = profiles
                .get_client_profile(client_id)?
                .ok_or(ServiceError::NotFound {
                    entity: "client profile",
                    id: client_id,
                })?;
            tx.commit()?;

            info!(
                "event=client_profile_update module=service status=ok client_id={} user_id={}",
                client_id, actor.user_id
            );
            Ok(saved)
        })
    }

    /// Replaces the caller's phone and region.
    pub fn update_technician_profile(
        &mut self,
        actor: Option<&Actor>,
        input: TechnicianProfileInput,
    ) -> ServiceResult<TechnicianProfile> {
        traced("technician_profile_update", || {
            let input = input.normalized();
            let actor = assert_role(actor, &[Role::Technician])?;

            let tx = begin_immediate(self.conn)?;
            let profile = TechnicianProfile {
                phone: input.phone,
                region: input.region,
            };
            SqliteUserRepository::new(&tx).upsert_technician_profile(actor.user_id, &profile)?;
            tx.commit()?;

            info!(
                "event=technician_profile_update module=service status=ok user_id={}",
                actor.user_id
            );
            Ok(profile)
        })
    }
}

fn load_self<R: UserRepository + ?Sized>(repo: &R, actor: &Actor) -> ServiceResult<User> {
    repo.get_user(actor.user_id)?.ok_or(ServiceError::NotFound {
        entity: "user",
        id: actor.user_id,
    })
}
