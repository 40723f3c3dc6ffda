mod common;

use common::{at, date, fixed_now, seed, set_next_service_date};
use medserv_core::{
    AdminRequestInput, AdminService, ClientRequestInput, DashboardService, DeviceDraft,
    DueClassification, RequestService, SchedulingPolicy, ServiceError, ServiceType,
};

#[test]
fn summary_counts_due_bands_and_active_requests_per_role() {
    let mut fixture = seed();
    let admin = fixture.admin;
    let client_user = fixture.client_user;
    let technician = fixture.technician;
    let other_technician = fixture.other_technician;
    let client_id = fixture.client_id;
    let today = date(2024, 6, 30);

    set_next_service_date(&fixture.conn, fixture.device_id, Some(date(2024, 6, 29)));
    set_next_service_date(&fixture.conn, fixture.other_device_id, Some(date(2024, 7, 20)));
    AdminService::new(&mut fixture.conn)
        .create_device(Some(&admin), DeviceDraft::new(client_id, "Monitor", "MN-1"))
        .unwrap();

    let device_id = fixture.device_id;
    let mut requests = RequestService::new(&mut fixture.conn, SchedulingPolicy::default())
        .with_clock(fixed_now);
    requests
        .create_client_request(
            Some(&client_user),
            ClientRequestInput {
                device_id,
                kind: ServiceType::Routine,
                description: None,
                preferred_date: None,
            },
        )
        .unwrap();
    requests
        .create_admin_request(
            Some(&admin),
            AdminRequestInput {
                client_id,
                device_id,
                technician_id: technician.user_id,
                kind: ServiceType::Routine,
                scheduled_at: at(2024, 7, 1, 9, 0),
                description: None,
                preferred_date: None,
            },
        )
        .unwrap();

    let dashboard = DashboardService::new(&fixture.conn, SchedulingPolicy::default());

    let overall = dashboard.dashboard_summary(Some(&admin), today).unwrap();
    assert_eq!(overall.devices, 3);
    assert_eq!(overall.overdue, 1);
    assert_eq!(overall.due_soon, 1);
    assert_eq!(overall.unscheduled, 1);
    assert_eq!(overall.open_requests, 1);
    assert_eq!(overall.scheduled_requests, 1);

    let tenant = dashboard.dashboard_summary(Some(&client_user), today).unwrap();
    assert_eq!(tenant.devices, 2);
    assert_eq!(tenant.overdue, 1);
    assert_eq!(tenant.due_soon, 0);
    assert_eq!(tenant.open_requests, 1);
    assert_eq!(tenant.scheduled_requests, 1);

    let assigned = dashboard.dashboard_summary(Some(&technician), today).unwrap();
    assert_eq!(assigned.devices, 3);
    assert_eq!(assigned.open_requests, 0);
    assert_eq!(assigned.scheduled_requests, 1);

    let idle = dashboard
        .dashboard_summary(Some(&other_technician), today)
        .unwrap();
    assert_eq!(idle.scheduled_requests, 0);

    assert!(matches!(
        dashboard.dashboard_summary(None, today),
        Err(ServiceError::Unauthorized)
    ));
}

#[test]
fn upcoming_devices_lists_overdue_and_due_soon_in_date_order() {
    let mut fixture = seed();
    let admin = fixture.admin;
    let client_user = fixture.client_user;
    let today = date(2024, 6, 30);

    set_next_service_date(&fixture.conn, fixture.device_id, Some(date(2024, 7, 10)));
    set_next_service_date(&fixture.conn, fixture.other_device_id, Some(date(2024, 6, 1)));

    let dashboard = DashboardService::new(&fixture.conn, SchedulingPolicy::default());
    let upcoming = dashboard.upcoming_devices(Some(&admin), today, 30).unwrap();
    assert_eq!(
        upcoming
            .iter()
            .map(|entry| entry.device.id)
            .collect::<Vec<_>>(),
        vec![fixture.other_device_id, fixture.device_id]
    );
    assert_eq!(
        upcoming[0].due,
        DueClassification::Overdue { days_overdue: 29 }
    );
    assert_eq!(upcoming[1].due, DueClassification::Due { days_left: 10 });

    let narrow = dashboard.upcoming_devices(Some(&admin), today, 5).unwrap();
    assert_eq!(narrow.len(), 1);

    let tenant = dashboard
        .upcoming_devices(Some(&client_user), today, 30)
        .unwrap();
    assert_eq!(tenant.len(), 1);
    assert_eq!(tenant[0].device.id, fixture.device_id);
}
