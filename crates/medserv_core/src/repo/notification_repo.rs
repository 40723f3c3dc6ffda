//! Notification rows: batch insert by the sweep, read/ack by recipients.

use super::{parse_uuid, RepoResult};
use crate::model::notification::{Notification, NotificationId};
use crate::model::user::UserId;
use rusqlite::{params, Connection, Row};

pub trait NotificationRepository {
    fn insert_notification(&self, notification: &Notification) -> RepoResult<NotificationId>;
    /// Newest first.
    fn list_for_user(&self, user_id: UserId, unread_only: bool) -> RepoResult<Vec<Notification>>;
    /// Marks one unread notification owned by `user_id`; `false` if none matched.
    fn mark_read(&self, id: NotificationId, user_id: UserId, read_at: i64) -> RepoResult<bool>;
    /// Returns the number of notifications marked.
    fn mark_all_read(&self, user_id: UserId, read_at: i64) -> RepoResult<usize>;
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn insert_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        self.conn.execute(
            "INSERT INTO notifications (id, user_id, title, body, link, read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.title.as_str(),
                notification.body.as_deref(),
                notification.link.as_deref(),
                notification.read_at,
            ],
        )?;
        Ok(notification.id)
    }

    fn list_for_user(&self, user_id: UserId, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, body, link, read_at, created_at
             FROM notifications
             WHERE user_id = ?1
               AND (?2 = 0 OR read_at IS NULL)
             ORDER BY created_at DESC, id ASC;",
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), i64::from(unread_only)])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn mark_read(&self, id: NotificationId, user_id: UserId, read_at: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET read_at = ?3
             WHERE id = ?1 AND user_id = ?2 AND read_at IS NULL;",
            params![id.to_string(), user_id.to_string(), read_at],
        )?;
        Ok(changed == 1)
    }

    fn mark_all_read(&self, user_id: UserId, read_at: i64) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET read_at = ?2 WHERE user_id = ?1 AND read_at IS NULL;",
            params![user_id.to_string(), read_at],
        )?;
        Ok(changed)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    Ok(Notification {
        id: parse_uuid(&id_text, "notifications.id")?,
        user_id: parse_uuid(&user_text, "notifications.user_id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        link: row.get("link")?,
        read_at: row.get("read_at")?,
        created_at: row.get("created_at")?,
    })
}
