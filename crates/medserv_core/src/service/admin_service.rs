//! Tenant, device and account administration.
//!
//! # Responsibility
//! - Client and device CRUD, user and technician management, and the
//!   membership links that scope client users to tenants.
//! - Role-scoped device reads shared by every role.
//!
//! # Invariants
//! - Mutations are admin-only and run in one immediate transaction.
//! - Deleting a client or device cascades through foreign keys.
//! - Linking a user to a client always leaves the user with role `client`.

use super::error::{ServiceError, ServiceResult};
use super::guard::{assert_client_owns_device, assert_role};
use super::input::{
    require_positive, require_text, ClientInput, NewTechnicianInput, NewUserInput,
    TechnicianInput, MIN_NAME_CHARS,
};
use super::{begin_immediate, traced};
use crate::db::DbError;
use crate::model::client::{Client, ClientId, ClientMember, DEFAULT_MEMBER_ROLE};
use crate::model::device::{Device, DeviceDraft, DeviceId};
use crate::model::user::{Actor, Role, Technician, TechnicianProfile, User, UserId};
use crate::repo::client_repo::{ClientRepository, SqliteClientRepository};
use crate::repo::device_repo::{DeviceListQuery, DeviceRepository, SqliteDeviceRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use log::info;
use rusqlite::{Connection, ErrorCode};
use uuid::Uuid;

const ALL_ROLES: [Role; 3] = [Role::Admin, Role::Technician, Role::Client];

pub struct AdminService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> AdminService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub fn create_client(
        &mut self,
        actor: Option<&Actor>,
        input: ClientInput,
    ) -> ServiceResult<Client> {
        traced("client_create", || {
            let input = input.normalized()?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let clients = SqliteClientRepository::new(&tx);
            let client_id = clients.create_client(&Client {
                id: Uuid::new_v4(),
                name: input.name,
                address: input.address,
                contact_email: input.contact_email,
                created_at: 0,
            })?;
            let created = load_client(&clients, client_id)?;
            tx.commit()?;

            info!(
                "event=client_create module=service status=ok client_id={}",
                created.id
            );
            Ok(created)
        })
    }

    pub fn update_client(
        &mut self,
        actor: Option<&Actor>,
        client_id: ClientId,
        input: ClientInput,
    ) -> ServiceResult<Client> {
        traced("client_update", || {
            let input = input.normalized()?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let clients = SqliteClientRepository::new(&tx);
            let existing = load_client(&clients, client_id)?;
            let updated = Client {
                name: input.name,
                address: input.address,
                contact_email: input.contact_email,
                ..existing
            };
            clients.update_client(&updated)?;
            tx.commit()?;

            info!(
                "event=client_update module=service status=ok client_id={}",
                updated.id
            );
            Ok(updated)
        })
    }

    /// Removes the client with its devices, history, requests and
    /// memberships.
    pub fn delete_client(&mut self, actor: Option<&Actor>, client_id: ClientId) -> ServiceResult<()> {
        traced("client_delete", || {
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            SqliteClientRepository::new(&tx).delete_client(client_id)?;
            tx.commit()?;

            info!(
                "event=client_delete module=service status=ok client_id={}",
                client_id
            );
            Ok(())
        })
    }

    pub fn list_clients(&self, actor: Option<&Actor>) -> ServiceResult<Vec<Client>> {
        traced("client_list", || {
            assert_role(actor, &[Role::Admin])?;
            Ok(SqliteClientRepository::new(&*self.conn).list_clients()?)
        })
    }

    pub fn create_device(
        &mut self,
        actor: Option<&Actor>,
        draft: DeviceDraft,
    ) -> ServiceResult<Device> {
        traced("device_create", || {
            let draft = validated_draft(draft)?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            load_client(&SqliteClientRepository::new(&tx), draft.client_id)?;
            let devices = SqliteDeviceRepository::new(&tx);
            let device_id = devices.create_device(&device_from_draft(Uuid::new_v4(), draft, 0))?;
            let created = load_device(&devices, device_id)?;
            tx.commit()?;

            info!(
                "event=device_create module=service status=ok device_id={} client_id={}",
                created.id, created.client_id
            );
            Ok(created)
        })
    }

    /// Replaces every editable device field, service dates included.
    pub fn update_device(
        &mut self,
        actor: Option<&Actor>,
        device_id: DeviceId,
        draft: DeviceDraft,
    ) -> ServiceResult<Device> {
        traced("device_update", || {
            let draft = validated_draft(draft)?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let devices = SqliteDeviceRepository::new(&tx);
            let existing = load_device(&devices, device_id)?;
            if existing.client_id != draft.client_id {
                load_client(&SqliteClientRepository::new(&tx), draft.client_id)?;
            }
            let updated = device_from_draft(existing.id, draft, existing.created_at);
            devices.update_device(&updated)?;
            tx.commit()?;

            info!(
                "event=device_update module=service status=ok device_id={}",
                updated.id
            );
            Ok(updated)
        })
    }

    pub fn delete_device(&mut self, actor: Option<&Actor>, device_id: DeviceId) -> ServiceResult<()> {
        traced("device_delete", || {
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            SqliteDeviceRepository::new(&tx).delete_device(device_id)?;
            tx.commit()?;

            info!(
                "event=device_delete module=service status=ok device_id={}",
                device_id
            );
            Ok(())
        })
    }

    /// Clients may only read devices of their tenancies.
    pub fn get_device(&self, actor: Option<&Actor>, device_id: DeviceId) -> ServiceResult<Device> {
        traced("device_get", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let conn: &Connection = &*self.conn;

            let device = match SqliteDeviceRepository::new(conn).get_device(device_id)? {
                Some(device) => device,
                None if actor.role == Role::Client => return Err(ServiceError::Forbidden),
                None => {
                    return Err(ServiceError::NotFound {
                        entity: "device",
                        id: device_id,
                    })
                }
            };
            assert_client_owns_device(&actor, &device, &SqliteClientRepository::new(conn))?;
            Ok(device)
        })
    }

    /// Staff see every device (optionally one client's); client users see
    /// devices of their tenancies only.
    pub fn list_devices(
        &self,
        actor: Option<&Actor>,
        client_id: Option<ClientId>,
    ) -> ServiceResult<Vec<Device>> {
        traced("device_list", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let query = visible_devices(&actor, client_id);
            Ok(SqliteDeviceRepository::new(&*self.conn).list_devices(&query)?)
        })
    }

    /// Creates an account row with the given role.
    pub fn register_user(
        &mut self,
        actor: Option<&Actor>,
        input: NewUserInput,
    ) -> ServiceResult<User> {
        traced("user_register", || {
            let input = input.normalized()?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            let user_id = users
                .create_user(&User {
                    id: Uuid::new_v4(),
                    name: input.name,
                    email: input.email,
                    role: input.role,
                    created_at: 0,
                })
                .map_err(duplicate_email)?;
            let created = load_user(&users, user_id)?;
            tx.commit()?;

            info!(
                "event=user_register module=service status=ok user_id={} role={}",
                created.id, created.role
            );
            Ok(created)
        })
    }

    /// Creates the first administrator. Refused once any admin exists.
    pub fn bootstrap_admin(&mut self, name: &str, email: &str) -> ServiceResult<User> {
        traced("user_bootstrap_admin", || {
            let input = NewUserInput {
                name: name.to_string(),
                email: email.to_string(),
                role: Role::Admin,
            }
            .normalized()?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            if !users.list_users_by_role(Role::Admin)?.is_empty() {
                return Err(ServiceError::Unauthorized);
            }
            let user_id = users
                .create_user(&User {
                    id: Uuid::new_v4(),
                    name: input.name,
                    email: input.email,
                    role: Role::Admin,
                    created_at: 0,
                })
                .map_err(duplicate_email)?;
            let created = load_user(&users, user_id)?;
            tx.commit()?;

            info!(
                "event=user_bootstrap_admin module=service status=ok user_id={}",
                created.id
            );
            Ok(created)
        })
    }

    /// Looks up the account behind a session id. Unknown ids yield `None`.
    pub fn resolve_actor(&self, user_id: UserId) -> ServiceResult<Option<Actor>> {
        Ok(SqliteUserRepository::new(&*self.conn)
            .get_user(user_id)?
            .map(|user| user.actor()))
    }

    pub fn set_user_role(
        &mut self,
        actor: Option<&Actor>,
        user_id: UserId,
        role: Role,
    ) -> ServiceResult<User> {
        traced("user_set_role", || {
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            users.set_role(user_id, role)?;
            let updated = load_user(&users, user_id)?;
            tx.commit()?;

            info!(
                "event=user_set_role module=service status=ok user_id={} role={}",
                updated.id, updated.role
            );
            Ok(updated)
        })
    }

    pub fn list_users(&self, actor: Option<&Actor>, role: Role) -> ServiceResult<Vec<User>> {
        traced("user_list", || {
            assert_role(actor, &[Role::Admin])?;
            Ok(SqliteUserRepository::new(&*self.conn).list_users_by_role(role)?)
        })
    }

    /// Creates a technician account together with its profile.
    pub fn create_technician(
        &mut self,
        actor: Option<&Actor>,
        input: NewTechnicianInput,
    ) -> ServiceResult<Technician> {
        traced("technician_create", || {
            let input = input.normalized()?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            let user_id = users
                .create_user(&User {
                    id: Uuid::new_v4(),
                    name: input.name,
                    email: input.email,
                    role: Role::Technician,
                    created_at: 0,
                })
                .map_err(duplicate_email)?;
            let profile = TechnicianProfile {
                phone: input.phone,
                region: input.region,
            };
            users.upsert_technician_profile(user_id, &profile)?;
            let user = load_user(&users, user_id)?;
            tx.commit()?;

            info!(
                "event=technician_create module=service status=ok user_id={}",
                user.id
            );
            Ok(Technician { user, profile })
        })
    }

    /// Renames a technician and replaces their profile.
    pub fn update_technician(
        &mut self,
        actor: Option<&Actor>,
        user_id: UserId,
        input: TechnicianInput,
    ) -> ServiceResult<Technician> {
        traced("technician_update", || {
            let input = input.normalized()?;
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            let existing = load_user(&users, user_id)?;
            if existing.role != Role::Technician {
                return Err(ServiceError::validation("user is not a technician"));
            }
            users.update_user_name(user_id, &input.name)?;
            let profile = TechnicianProfile {
                phone: input.phone,
                region: input.region,
            };
            users.upsert_technician_profile(user_id, &profile)?;
            tx.commit()?;

            info!(
                "event=technician_update module=service status=ok user_id={}",
                user_id
            );
            Ok(Technician {
                user: User {
                    name: input.name,
                    ..existing
                },
                profile,
            })
        })
    }

    /// Demotes a technician to `client`. Profile and history are kept.
    pub fn deactivate_technician(
        &mut self,
        actor: Option<&Actor>,
        user_id: UserId,
    ) -> ServiceResult<User> {
        traced("technician_deactivate", || {
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            let existing = load_user(&users, user_id)?;
            if existing.role != Role::Technician {
                return Err(ServiceError::validation("user is not a technician"));
            }
            users.set_role(user_id, Role::Client)?;
            let updated = load_user(&users, user_id)?;
            tx.commit()?;

            info!(
                "event=technician_deactivate module=service status=ok user_id={}",
                user_id
            );
            Ok(updated)
        })
    }

    pub fn list_technicians(&self, actor: Option<&Actor>) -> ServiceResult<Vec<Technician>> {
        traced("technician_list", || {
            assert_role(actor, &[Role::Admin])?;
            Ok(SqliteUserRepository::new(&*self.conn).list_technicians()?)
        })
    }

    /// Adds the user to the client's members. Returns `false` when the link
    /// already existed.
    pub fn link_user_to_client(
        &mut self,
        actor: Option<&Actor>,
        user_id: UserId,
        client_id: ClientId,
    ) -> ServiceResult<bool> {
        traced("membership_link", || {
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let users = SqliteUserRepository::new(&tx);
            let clients = SqliteClientRepository::new(&tx);
            let user = load_user(&users, user_id)?;
            load_client(&clients, client_id)?;
            if user.role != Role::Client {
                users.set_role(user_id, Role::Client)?;
            }
            let linked = clients.add_member(&ClientMember {
                client_id,
                user_id,
                role_in_client: DEFAULT_MEMBER_ROLE.to_string(),
            })?;
            tx.commit()?;

            info!(
                "event=membership_link module=service status=ok user_id={} client_id={} created={}",
                user_id, client_id, linked
            );
            Ok(linked)
        })
    }

    /// Returns `false` when no such link existed.
    pub fn unlink_user_from_client(
        &mut self,
        actor: Option<&Actor>,
        user_id: UserId,
        client_id: ClientId,
    ) -> ServiceResult<bool> {
        traced("membership_unlink", || {
            assert_role(actor, &[Role::Admin])?;

            let tx = begin_immediate(self.conn)?;
            let removed = SqliteClientRepository::new(&tx).remove_member(client_id, user_id)?;
            tx.commit()?;

            info!(
                "event=membership_unlink module=service status=ok user_id={} client_id={} removed={}",
                user_id, client_id, removed
            );
            Ok(removed)
        })
    }
}

/// Device listing filter that limits rows to what `actor` may see.
pub(crate) fn visible_devices(actor: &Actor, client_id: Option<ClientId>) -> DeviceListQuery {
    DeviceListQuery {
        client_id,
        member_user_id: (actor.role == Role::Client).then_some(actor.user_id),
    }
}

fn validated_draft(draft: DeviceDraft) -> ServiceResult<DeviceDraft> {
    Ok(DeviceDraft {
        name: require_text(&draft.name, "device name", MIN_NAME_CHARS)?,
        serial_number: require_text(&draft.serial_number, "serial number", 1)?,
        service_interval_months: require_positive(
            draft.service_interval_months,
            "service interval months",
        )?,
        major_service_years: require_positive(draft.major_service_years, "major service years")?,
        ..draft
    })
}

fn device_from_draft(id: DeviceId, draft: DeviceDraft, created_at: i64) -> Device {
    Device {
        id,
        client_id: draft.client_id,
        name: draft.name,
        serial_number: draft.serial_number,
        install_date: draft.install_date,
        last_service_date: draft.last_service_date,
        next_service_date: draft.next_service_date,
        service_interval_months: draft.service_interval_months,
        major_service_years: draft.major_service_years,
        created_at,
    }
}

fn load_client<R: ClientRepository + ?Sized>(repo: &R, id: ClientId) -> ServiceResult<Client> {
    repo.get_client(id)?.ok_or(ServiceError::NotFound {
        entity: "client",
        id,
    })
}

fn load_device<R: DeviceRepository + ?Sized>(repo: &R, id: DeviceId) -> ServiceResult<Device> {
    repo.get_device(id)?.ok_or(ServiceError::NotFound {
        entity: "device",
        id,
    })
}

fn load_user<R: UserRepository + ?Sized>(repo: &R, id: UserId) -> ServiceResult<User> {
    repo.get_user(id)?
        .ok_or(ServiceError::NotFound { entity: "user", id })
}

fn duplicate_email(err: RepoError) -> ServiceError {
    let duplicate = matches!(
        &err,
        RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)))
            if failure.code == ErrorCode::ConstraintViolation
    );
    if duplicate {
        return ServiceError::validation("email is already registered");
    }
    ServiceError::from(err)
}
