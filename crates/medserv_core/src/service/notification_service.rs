//! Due-date reminders and the per-user inbox.
//!
//! # Invariants
//! - One sweep writes at most one notification per user per device.
//! - Users can only read or mark their own notifications.

use super::error::{ServiceError, ServiceResult};
use super::guard::assert_role;
use super::{begin_immediate, system_clock, traced, Clock};
use crate::config::SchedulingPolicy;
use crate::model::notification::{Notification, NotificationId};
use crate::model::user::{Actor, Role, UserId};
use crate::repo::client_repo::{ClientRepository, SqliteClientRepository};
use crate::repo::device_repo::{DeviceRepository, SqliteDeviceRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use chrono::{Days, NaiveDate};
use log::info;
use rusqlite::Connection;
use std::collections::BTreeSet;
use uuid::Uuid;

const ALL_ROLES: [Role; 3] = [Role::Admin, Role::Technician, Role::Client];

pub struct NotificationService<'conn> {
    conn: &'conn mut Connection,
    policy: SchedulingPolicy,
    clock: Clock,
}

impl<'conn> NotificationService<'conn> {
    pub fn new(conn: &'conn mut Connection, policy: SchedulingPolicy) -> Self {
        Self {
            conn,
            policy,
            clock: system_clock,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Daily sweep: notifies tenant members and every admin about devices
    /// due exactly at one of the reminder offsets from `today`.
    ///
    /// Returns the number of notifications written.
    pub fn notify_upcoming_services(&mut self, today: NaiveDate) -> ServiceResult<usize> {
        traced("notify_upcoming", || {
            let offsets: BTreeSet<u32> = self.policy.reminder_days.iter().copied().collect();
            let mut targets = Vec::with_capacity(offsets.len());
            for offset in &offsets {
                let date = today
                    .checked_add_days(Days::new(u64::from(*offset)))
                    .ok_or_else(|| {
                        ServiceError::InvalidDate(format!("{today} + {offset} days"))
                    })?;
                targets.push(date);
            }

            let tx = begin_immediate(self.conn)?;
            let due = SqliteDeviceRepository::new(&tx).devices_due_on(&targets)?;
            let clients = SqliteClientRepository::new(&tx);
            let admins: Vec<UserId> = SqliteUserRepository::new(&tx)
                .list_users_by_role(Role::Admin)?
                .into_iter()
                .map(|user| user.id)
                .collect();
            let notifications = SqliteNotificationRepository::new(&tx);

            let mut created = 0usize;
            for entry in &due {
                let device = &entry.device;
                let Some(due_date) = device.next_service_date else {
                    continue;
                };
                let days_left = (due_date - today).num_days();

                let mut recipients: BTreeSet<UserId> =
                    clients.member_user_ids(device.client_id)?.into_iter().collect();
                recipients.extend(admins.iter().copied());

                for user_id in recipients {
                    notifications.insert_notification(&Notification {
                        id: Uuid::new_v4(),
                        user_id,
                        title: format!("Upcoming service in {days_left} days"),
                        body: Some(format!(
                            "{} @ {} is due on {}.",
                            device.name, entry.client_name, due_date
                        )),
                        link: Some(format!("/devices?clientId={}&upcoming=1", device.client_id)),
                        read_at: None,
                        created_at: 0,
                    })?;
                    created += 1;
                }
            }
            tx.commit()?;

            info!(
                "event=notify_upcoming module=service status=ok today={} devices={} created={}",
                today,
                due.len(),
                created
            );
            Ok(created)
        })
    }

    /// Newest first.
    pub fn list_notifications(
        &self,
        actor: Option<&Actor>,
        unread_only: bool,
    ) -> ServiceResult<Vec<Notification>> {
        traced("notification_list", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            Ok(SqliteNotificationRepository::new(&*self.conn)
                .list_for_user(actor.user_id, unread_only)?)
        })
    }

    /// Returns `false` when the notification is not the caller's or was
    /// already read.
    pub fn mark_notification_read(
        &mut self,
        actor: Option<&Actor>,
        notification_id: NotificationId,
    ) -> ServiceResult<bool> {
        traced("notification_mark_read", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let read_at = (self.clock)().timestamp_millis();

            let tx = begin_immediate(self.conn)?;
            let marked = SqliteNotificationRepository::new(&tx).mark_read(
                notification_id,
                actor.user_id,
                read_at,
            )?;
            tx.commit()?;

            info!(
                "event=notification_mark_read module=service status=ok notification_id={} marked={}",
                notification_id, marked
            );
            Ok(marked)
        })
    }

    pub fn mark_all_notifications_read(&mut self, actor: Option<&Actor>) -> ServiceResult<usize> {
        traced("notification_mark_all_read", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let read_at = (self.clock)().timestamp_millis();

            let tx = begin_immediate(self.conn)?;
            let marked =
                SqliteNotificationRepository::new(&tx).mark_all_read(actor.user_id, read_at)?;
            tx.commit()?;

            info!(
                "event=notification_mark_all_read module=service status=ok user_id={} marked={}",
                actor.user_id, marked
            );
            Ok(marked)
        })
    }
}
