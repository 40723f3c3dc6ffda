//! Role-scoped overview read models.

use super::admin_service::visible_devices;
use super::error::ServiceResult;
use super::guard::assert_role;
use super::request_service::visible_requests;
use super::traced;
use crate::config::SchedulingPolicy;
use crate::model::device::Device;
use crate::model::request::RequestStatus;
use crate::model::user::{Actor, Role};
use crate::repo::device_repo::{DeviceRepository, SqliteDeviceRepository};
use crate::repo::request_repo::{RequestRepository, SqliteRequestRepository};
use crate::schedule::{classify_due_date, DueBand, DueClassification};
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;
use serde::Serialize;

const ALL_ROLES: [Role; 3] = [Role::Admin, Role::Technician, Role::Client];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub devices: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub unscheduled: usize,
    pub open_requests: u64,
    pub scheduled_requests: u64,
    pub in_progress_requests: u64,
    pub delayed_requests: u64,
}

/// A device that needs attention, with its due position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingDevice {
    pub device: Device,
    pub due: DueClassification,
}

pub struct DashboardService<'conn> {
    conn: &'conn Connection,
    policy: SchedulingPolicy,
}

impl<'conn> DashboardService<'conn> {
    pub fn new(conn: &'conn Connection, policy: SchedulingPolicy) -> Self {
        Self { conn, policy }
    }

    /// Device due bands and active request counts visible to the actor.
    pub fn dashboard_summary(
        &self,
        actor: Option<&Actor>,
        today: NaiveDate,
    ) -> ServiceResult<DashboardSummary> {
        traced("dashboard_summary", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let devices = SqliteDeviceRepository::new(self.conn)
                .list_devices(&visible_devices(&actor, None))?;
            let by_status = SqliteRequestRepository::new(self.conn)
                .count_by_status(&visible_requests(&actor, None))?;
            let count = |status: RequestStatus| by_status.get(&status).copied().unwrap_or(0);

            let mut summary = DashboardSummary {
                devices: devices.len(),
                open_requests: count(RequestStatus::Open),
                scheduled_requests: count(RequestStatus::Scheduled),
                in_progress_requests: count(RequestStatus::InProgress),
                delayed_requests: count(RequestStatus::Delayed),
                ..DashboardSummary::default()
            };
            for device in &devices {
                match classify_due_date(device.next_service_date, today)
                    .band(self.policy.due_soon_days)
                {
                    DueBand::Overdue => summary.overdue += 1,
                    DueBand::DueSoon(_) => summary.due_soon += 1,
                    DueBand::Unscheduled => summary.unscheduled += 1,
                    DueBand::Scheduled(_) => {}
                }
            }

            info!(
                "event=dashboard_summary module=service status=ok role={} devices={} overdue={} due_soon={}",
                actor.role, summary.devices, summary.overdue, summary.due_soon
            );
            Ok(summary)
        })
    }

    /// Overdue devices and those due within `within_days`, soonest first.
    pub fn upcoming_devices(
        &self,
        actor: Option<&Actor>,
        today: NaiveDate,
        within_days: i64,
    ) -> ServiceResult<Vec<UpcomingDevice>> {
        traced("dashboard_upcoming", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let devices = SqliteDeviceRepository::new(self.conn)
                .list_devices(&visible_devices(&actor, None))?;

            let mut upcoming: Vec<UpcomingDevice> = devices
                .into_iter()
                .filter_map(|device| {
                    let due = classify_due_date(device.next_service_date, today);
                    match due.band(within_days) {
                        DueBand::Overdue | DueBand::DueSoon(_) => Some(UpcomingDevice { device, due }),
                        DueBand::Scheduled(_) | DueBand::Unscheduled => None,
                    }
                })
                .collect();
            upcoming.sort_by_key(|entry| (entry.device.next_service_date, entry.device.id));

            info!(
                "event=dashboard_upcoming module=service status=ok role={} within_days={} devices={}",
                actor.role,
                within_days,
                upcoming.len()
            );
            Ok(upcoming)
        })
    }
}
