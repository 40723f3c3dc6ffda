mod common;

use common::{count_rows, seed};
use medserv_core::{
    AccountInput, AdminService, ClientProfileInput, NewUserInput, ProfileService, Role,
    ServiceError, TechnicianProfileInput,
};

fn organization(name: &str) -> ClientProfileInput {
    ClientProfileInput {
        client_id: None,
        organization_name: name.to_string(),
        address: Some("  1 Main St ".to_string()),
        contact_email: Some("desk@clinic.test".to_string()),
    }
}

#[test]
fn account_rename_trims_and_requires_a_caller() {
    let mut fixture = seed();
    let client_user = fixture.client_user;
    let mut profiles = ProfileService::new(&mut fixture.conn);

    let renamed = profiles
        .update_account(
            Some(&client_user),
            AccountInput {
                name: "  Cora Clinician ".to_string(),
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Cora Clinician");
    assert_eq!(renamed.role, Role::Client);

    let err = profiles
        .update_account(
            Some(&client_user),
            AccountInput {
                name: " C ".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = profiles
        .update_account(
            None,
            AccountInput {
                name: "Nobody Here".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized));

    let me = profiles.my_profile(Some(&client_user)).unwrap();
    assert_eq!(me.user.name, "Cora Clinician");
}

#[test]
fn client_profile_targets_own_tenancy_and_keeps_created_at() {
    let mut fixture = seed();
    let client_user = fixture.client_user;
    let client_id = fixture.client_id;
    let mut profiles = ProfileService::new(&mut fixture.conn);

    let first = profiles
        .update_client_profile(Some(&client_user), organization("City Clinic GmbH"))
        .unwrap();
    assert_eq!(first.client_id, client_id);
    assert_eq!(first.address.as_deref(), Some("1 Main St"));

    let second = profiles
        .update_client_profile(
            Some(&client_user),
            ClientProfileInput {
                client_id: Some(client_id),
                address: None,
                ..organization("City Clinic AG")
            },
        )
        .unwrap();
    assert_eq!(second.organization_name, "City Clinic AG");
    assert_eq!(second.address, None);
    assert_eq!(second.created_at, first.created_at);

    let me = profiles.my_profile(Some(&client_user)).unwrap();
    assert_eq!(me.technician, None);
    assert_eq!(me.organizations, vec![second]);
}

#[test]
fn client_profile_rejects_foreign_tenancies_and_other_roles() {
    let mut fixture = seed();
    let client_user = fixture.client_user;
    let technician = fixture.technician;
    let other_client_id = fixture.other_client_id;
    let mut profiles = ProfileService::new(&mut fixture.conn);

    let err = profiles
        .update_client_profile(
            Some(&client_user),
            ClientProfileInput {
                client_id: Some(other_client_id),
                ..organization("Harbor Hospital")
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden));

    let err = profiles
        .update_client_profile(Some(&technician), organization("City Clinic"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized));

    let err = profiles
        .update_client_profile(
            Some(&client_user),
            ClientProfileInput {
                contact_email: Some("not-an-email".to_string()),
                ..organization("City Clinic")
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert_eq!(count_rows(&fixture.conn, "client_profiles"), 0);
}

#[test]
fn client_without_tenancy_cannot_save_an_organization() {
    let mut fixture = seed();
    let admin = fixture.admin;
    let loner = AdminService::new(&mut fixture.conn)
        .register_user(
            Some(&admin),
            NewUserInput {
                name: "Lena Loner".to_string(),
                email: "lena@nowhere.test".to_string(),
                role: Role::Client,
            },
        )
        .unwrap()
        .actor();

    let mut profiles = ProfileService::new(&mut fixture.conn);
    let err = profiles
        .update_client_profile(Some(&loner), organization("Lena Care"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden));
    assert!(profiles.my_profile(Some(&loner)).unwrap().organizations.is_empty());
}

#[test]
fn technician_profile_is_self_service_only() {
    let mut fixture = seed();
    let technician = fixture.technician;
    let client_user = fixture.client_user;
    let mut profiles = ProfileService::new(&mut fixture.conn);

    let saved = profiles
        .update_technician_profile(
            Some(&technician),
            TechnicianProfileInput {
                phone: Some(" +49 30 1234 ".to_string()),
                region: Some("   ".to_string()),
            },
        )
        .unwrap();
    assert_eq!(saved.phone.as_deref(), Some("+49 30 1234"));
    assert_eq!(saved.region, None);

    let me = profiles.my_profile(Some(&technician)).unwrap();
    assert_eq!(me.technician, Some(saved));
    assert!(me.organizations.is_empty());

    let err = profiles
        .update_technician_profile(Some(&client_user), TechnicianProfileInput::default())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized));
}

#[test]
fn deleting_a_client_drops_its_profile() {
    let mut fixture = seed();
    let admin = fixture.admin;
    let client_user = fixture.client_user;
    let client_id = fixture.client_id;

    ProfileService::new(&mut fixture.conn)
        .update_client_profile(Some(&client_user), organization("City Clinic"))
        .unwrap();
    assert_eq!(count_rows(&fixture.conn, "client_profiles"), 1);

    AdminService::new(&mut fixture.conn)
        .delete_client(Some(&admin), client_id)
        .unwrap();
    assert_eq!(count_rows(&fixture.conn, "client_profiles"), 0);
}
