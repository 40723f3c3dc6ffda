//! Role and ownership checks.
//!
//! Guards only read. They run after payload validation and before any write.

use super::error::{ServiceError, ServiceResult};
use crate::model::device::Device;
use crate::model::request::ServiceRequest;
use crate::model::user::{Actor, Role};
use crate::repo::client_repo::ClientRepository;

/// Returns the actor when present and holding one of `allowed`.
pub fn assert_role(actor: Option<&Actor>, allowed: &[Role]) -> ServiceResult<Actor> {
    match actor {
        Some(actor) if allowed.contains(&actor.role) => Ok(*actor),
        _ => Err(ServiceError::Unauthorized),
    }
}

/// Technicians may only act on requests assigned to them. Other roles pass.
pub fn assert_owns_request(actor: &Actor, request: &ServiceRequest) -> ServiceResult<()> {
    if actor.role == Role::Technician && request.assigned_to != Some(actor.user_id) {
        return Err(ServiceError::Forbidden);
    }
    Ok(())
}

/// Client actors must be members of the device's tenant. Other roles pass.
pub fn assert_client_owns_device<R: ClientRepository + ?Sized>(
    actor: &Actor,
    device: &Device,
    membership: &R,
) -> ServiceResult<()> {
    if actor.role == Role::Client && !membership.is_member(device.client_id, actor.user_id)? {
        return Err(ServiceError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{assert_client_owns_device, assert_owns_request, assert_role};
    use crate::model::client::{Client, ClientId, ClientMember};
    use crate::model::device::{Device, DeviceDraft};
    use crate::model::record::ServiceType;
    use crate::model::request::ServiceRequest;
    use crate::model::user::{Actor, Role, UserId};
    use crate::repo::client_repo::ClientRepository;
    use crate::repo::RepoResult;
    use crate::service::error::ServiceError;
    use chrono::Utc;
    use uuid::Uuid;

    struct FixedMembership {
        client_id: ClientId,
        user_id: UserId,
    }

    impl ClientRepository for FixedMembership {
        fn create_client(&self, client: &Client) -> RepoResult<ClientId> {
            Ok(client.id)
        }
        fn update_client(&self, _client: &Client) -> RepoResult<()> {
            Ok(())
        }
        fn delete_client(&self, _id: ClientId) -> RepoResult<()> {
            Ok(())
        }
        fn get_client(&self, _id: ClientId) -> RepoResult<Option<Client>> {
            Ok(None)
        }
        fn list_clients(&self) -> RepoResult<Vec<Client>> {
            Ok(Vec::new())
        }
        fn add_member(&self, _member: &ClientMember) -> RepoResult<bool> {
            Ok(false)
        }
        fn remove_member(&self, _client_id: ClientId, _user_id: UserId) -> RepoResult<bool> {
            Ok(false)
        }
        fn is_member(&self, client_id: ClientId, user_id: UserId) -> RepoResult<bool> {
            Ok(client_id == self.client_id && user_id == self.user_id)
        }
        fn member_user_ids(&self, _client_id: ClientId) -> RepoResult<Vec<UserId>> {
            Ok(vec![self.user_id])
        }
    }

    fn device_for(client_id: ClientId) -> Device {
        let draft = DeviceDraft::new(client_id, "Infusion pump", "SN-1");
        Device {
            id: Uuid::new_v4(),
            client_id: draft.client_id,
            name: draft.name,
            serial_number: draft.serial_number,
            install_date: None,
            last_service_date: None,
            next_service_date: None,
            service_interval_months: draft.service_interval_months,
            major_service_years: draft.major_service_years,
            created_at: 0,
        }
    }

    #[test]
    fn assert_role_requires_actor_with_allowed_role() {
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        assert_eq!(
            assert_role(Some(&admin), &[Role::Admin]).unwrap(),
            admin
        );
        assert!(matches!(
            assert_role(None, &[Role::Admin]),
            Err(ServiceError::Unauthorized)
        ));
        assert!(matches!(
            assert_role(Some(&admin), &[Role::Technician]),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn technician_must_be_assignee() {
        let tech = Actor::new(Uuid::new_v4(), Role::Technician);
        let other = Actor::new(Uuid::new_v4(), Role::Technician);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let request = ServiceRequest::pre_assigned(
            Uuid::new_v4(),
            admin.user_id,
            ServiceType::Routine,
            tech.user_id,
            Utc::now(),
        );

        assert!(assert_owns_request(&tech, &request).is_ok());
        assert!(assert_owns_request(&admin, &request).is_ok());
        assert!(matches!(
            assert_owns_request(&other, &request),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn client_must_belong_to_device_tenant() {
        let client_user = Uuid::new_v4();
        let own_client = Uuid::new_v4();
        let membership = FixedMembership {
            client_id: own_client,
            user_id: client_user,
        };
        let actor = Actor::new(client_user, Role::Client);

        assert!(assert_client_owns_device(&actor, &device_for(own_client), &membership).is_ok());
        assert!(matches!(
            assert_client_owns_device(&actor, &device_for(Uuid::new_v4()), &membership),
            Err(ServiceError::Forbidden)
        ));

        let tech = Actor::new(Uuid::new_v4(), Role::Technician);
        assert!(assert_client_owns_device(&tech, &device_for(Uuid::new_v4()), &membership).is_ok());
    }
}
