//! Core scheduling logic for medical-device maintenance.
//! Request lifecycle, service-date projection, conflict estimates and
//! permission checks live here; binaries only parse input and print output.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use config::{PolicyError, SchedulingPolicy};
pub use db::{latest_version, open_db, open_db_in_memory, schema_version, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::client::{Client, ClientId, ClientMember, ClientProfile};
pub use model::device::{Device, DeviceDraft, DeviceId};
pub use model::notification::{Notification, NotificationId};
pub use model::record::{ServiceRecord, ServiceRecordId, ServiceType};
pub use model::request::{RequestId, RequestStatus, ServiceRequest, TransitionError};
pub use model::user::{Actor, Role, Technician, TechnicianProfile, User, UserId};
pub use repo::{RepoError, RepoResult};
pub use schedule::{
    classify_due_date, estimate_conflicts, parse_calendar_date, project_next_date, ConflictError,
    DueBand, DueClassification, ScheduleError,
};
pub use service::admin_service::AdminService;
pub use service::dashboard_service::{DashboardService, DashboardSummary, UpcomingDevice};
pub use service::error::{ServiceError, ServiceResult};
pub use service::guard::{assert_client_owns_device, assert_owns_request, assert_role};
pub use service::input::{
    parse_date, parse_id, parse_status, parse_timestamp, AccountInput, AdminRequestInput,
    ClientInput, ClientProfileInput, ClientRequestInput, CompletionInput, DelayInput,
    NewTechnicianInput, NewUserInput, RecordInput, ScheduleInput, TechnicianInput,
    TechnicianProfileInput,
};
pub use service::notification_service::NotificationService;
pub use service::profile_service::{Profile, ProfileService};
pub use service::record_service::{CompletionOutcome, RecordService};
pub use service::request_service::{RequestCompletion, RequestService, ScheduleOutcome};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
