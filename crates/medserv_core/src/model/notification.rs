//! In-app notifications produced by the daily due-date sweep.

use super::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub body: Option<String>,
    pub link: Option<String>,
    /// Epoch milliseconds; `None` while unread.
    pub read_at: Option<i64>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}
