//! Tenant organizations and their user memberships.

use super::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ClientId = Uuid;

pub const DEFAULT_MEMBER_ROLE: &str = "member";

/// A hospital or other organization owning devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub address: Option<String>,
    pub contact_email: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Link between a user account and a client tenancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMember {
    pub client_id: ClientId,
    pub user_id: UserId,
    pub role_in_client: String,
}

/// Organization details a client member maintains for their own tenancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub client_id: ClientId,
    pub organization_name: String,
    pub address: Option<String>,
    pub contact_email: Option<String>,
    /// Epoch milliseconds of the first save.
    pub created_at: i64,
}
