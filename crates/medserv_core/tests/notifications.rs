mod common;

use common::{count_rows, date, fixed_now, seed, set_next_service_date};
use medserv_core::{NotificationService, SchedulingPolicy, ServiceError};
use rusqlite::params;

#[test]
fn sweep_notifies_members_and_admins_at_reminder_offsets() {
    let mut fixture = seed();
    let today = date(2024, 6, 30);
    set_next_service_date(&fixture.conn, fixture.device_id, Some(date(2024, 7, 7)));
    set_next_service_date(&fixture.conn, fixture.other_device_id, Some(date(2024, 7, 3)));
    // An admin who is also a tenant member is notified once per device.
    fixture
        .conn
        .execute(
            "INSERT INTO client_members (client_id, user_id) VALUES (?1, ?2);",
            params![
                fixture.client_id.to_string(),
                fixture.admin.user_id.to_string()
            ],
        )
        .unwrap();

    let created = NotificationService::new(&mut fixture.conn, SchedulingPolicy::default())
        .notify_upcoming_services(today)
        .unwrap();
    assert_eq!(created, 2);

    let client_user = fixture.client_user;
    let inbox = NotificationService::new(&mut fixture.conn, SchedulingPolicy::default())
        .list_notifications(Some(&client_user), false)
        .unwrap();
    assert_eq!(inbox.len(), 1);
    let reminder = &inbox[0];
    assert_eq!(reminder.title, "Upcoming service in 7 days");
    assert_eq!(
        reminder.body.as_deref(),
        Some("Infusion pump @ City Clinic is due on 2024-07-07.")
    );
    assert_eq!(
        reminder.link,
        Some(format!("/devices?clientId={}&upcoming=1", fixture.client_id))
    );
    assert!(reminder.is_unread());
}

#[test]
fn sweep_uses_policy_offsets_and_skips_other_dates() {
    let mut fixture = seed();
    let today = date(2024, 6, 30);
    set_next_service_date(&fixture.conn, fixture.device_id, Some(date(2024, 7, 7)));
    set_next_service_date(&fixture.conn, fixture.other_device_id, Some(date(2024, 7, 3)));

    let policy = SchedulingPolicy {
        reminder_days: vec![3],
        ..SchedulingPolicy::default()
    };
    let created = NotificationService::new(&mut fixture.conn, policy)
        .notify_upcoming_services(today)
        .unwrap();

    // Harbor Hospital has no members, so only the admin hears about it.
    assert_eq!(created, 1);
    let admin = fixture.admin;
    let inbox = NotificationService::new(&mut fixture.conn, SchedulingPolicy::default())
        .list_notifications(Some(&admin), true)
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Upcoming service in 3 days");
}

#[test]
fn sweep_without_due_devices_writes_nothing() {
    let mut fixture = seed();
    let created = NotificationService::new(&mut fixture.conn, SchedulingPolicy::default())
        .notify_upcoming_services(date(2024, 6, 30))
        .unwrap();
    assert_eq!(created, 0);
    assert_eq!(count_rows(&fixture.conn, "notifications"), 0);
}

#[test]
fn users_only_mark_their_own_notifications() {
    let mut fixture = seed();
    set_next_service_date(&fixture.conn, fixture.device_id, Some(date(2024, 7, 30)));
    set_next_service_date(&fixture.conn, fixture.other_device_id, Some(date(2024, 7, 14)));
    let client_user = fixture.client_user;
    let admin = fixture.admin;
    let technician = fixture.technician;

    let mut service = NotificationService::new(&mut fixture.conn, SchedulingPolicy::default())
        .with_clock(fixed_now);
    assert_eq!(service.notify_upcoming_services(date(2024, 6, 30)).unwrap(), 3);

    let own = service.list_notifications(Some(&client_user), true).unwrap();
    assert_eq!(own.len(), 1);
    let id = own[0].id;

    assert!(!service.mark_notification_read(Some(&technician), id).unwrap());
    assert!(service.mark_notification_read(Some(&client_user), id).unwrap());
    assert!(!service.mark_notification_read(Some(&client_user), id).unwrap());

    assert!(service
        .list_notifications(Some(&client_user), true)
        .unwrap()
        .is_empty());
    let all = service.list_notifications(Some(&client_user), false).unwrap();
    assert_eq!(all[0].read_at, Some(fixed_now().timestamp_millis()));

    assert_eq!(service.mark_all_notifications_read(Some(&admin)).unwrap(), 2);
    assert_eq!(service.mark_all_notifications_read(Some(&admin)).unwrap(), 0);
    assert!(matches!(
        service.mark_all_notifications_read(None),
        Err(ServiceError::Unauthorized)
    ));
}
