//! Domain model for tenants, devices and the service-request lifecycle.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Own the request state machine so every caller applies the same rules.
//!
//! # Invariants
//! - Identifiers are stable UUIDs and never reused.
//! - Closed enums (`Role`, `RequestStatus`, `ServiceType`) reject unknown text.
//! - `done` and `cancelled` requests never change status again.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod client;
pub mod device;
pub mod notification;
pub mod record;
pub mod request;
pub mod user;

/// Raised when boundary text does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl Display for UnknownVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl Error for UnknownVariant {}
