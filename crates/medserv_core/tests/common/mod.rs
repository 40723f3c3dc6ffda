#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use medserv_core::db::open_db_in_memory;
use medserv_core::{
    Actor, AdminService, ClientId, ClientInput, DeviceDraft, DeviceId, NewTechnicianInput,
    NewUserInput, Role,
};
use rusqlite::{params, Connection};

/// Two tenants with one device each, two technicians and one client user
/// linked to the first tenant.
pub struct Fixture {
    pub conn: Connection,
    pub admin: Actor,
    pub technician: Actor,
    pub other_technician: Actor,
    pub client_user: Actor,
    pub client_id: ClientId,
    pub device_id: DeviceId,
    pub other_client_id: ClientId,
    pub other_device_id: DeviceId,
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

/// Clock pinned to 2024-06-30T09:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    at(2024, 6, 30, 9, 0)
}

pub fn seed() -> Fixture {
    let mut conn = open_db_in_memory().unwrap();
    let mut admin_service = AdminService::new(&mut conn);

    let admin = admin_service
        .bootstrap_admin("Ada Admin", "admin@medserv.test")
        .unwrap()
        .actor();

    let technician = admin_service
        .create_technician(
            Some(&admin),
            NewTechnicianInput {
                name: "Tom Tech".to_string(),
                email: "tom@medserv.test".to_string(),
                phone: None,
                region: Some("North".to_string()),
            },
        )
        .unwrap()
        .user
        .actor();
    let other_technician = admin_service
        .create_technician(
            Some(&admin),
            NewTechnicianInput {
                name: "Tia Tech".to_string(),
                email: "tia@medserv.test".to_string(),
                phone: None,
                region: None,
            },
        )
        .unwrap()
        .user
        .actor();

    let client_id = admin_service
        .create_client(Some(&admin), client_input("City Clinic"))
        .unwrap()
        .id;
    let other_client_id = admin_service
        .create_client(Some(&admin), client_input("Harbor Hospital"))
        .unwrap()
        .id;

    let device_id = admin_service
        .create_device(
            Some(&admin),
            DeviceDraft::new(client_id, "Infusion pump", "IP-100"),
        )
        .unwrap()
        .id;
    let other_device_id = admin_service
        .create_device(
            Some(&admin),
            DeviceDraft::new(other_client_id, "Ventilator", "VT-200"),
        )
        .unwrap()
        .id;

    let client_user = admin_service
        .register_user(
            Some(&admin),
            NewUserInput {
                name: "Cora Client".to_string(),
                email: "cora@clinic.test".to_string(),
                role: Role::Client,
            },
        )
        .unwrap()
        .actor();
    admin_service
        .link_user_to_client(Some(&admin), client_user.user_id, client_id)
        .unwrap();

    Fixture {
        conn,
        admin,
        technician,
        other_technician,
        client_user,
        client_id,
        device_id,
        other_client_id,
        other_device_id,
    }
}

pub fn client_input(name: &str) -> ClientInput {
    ClientInput {
        name: name.to_string(),
        address: None,
        contact_email: None,
    }
}

pub fn set_next_service_date(conn: &Connection, device_id: DeviceId, next: Option<NaiveDate>) {
    conn.execute(
        "UPDATE devices SET next_service_date = ?2 WHERE id = ?1;",
        params![device_id.to_string(), next.map(|value| value.to_string())],
    )
    .unwrap();
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
