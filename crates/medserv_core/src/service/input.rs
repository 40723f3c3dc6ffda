//! Command payloads and boundary parsing.
//!
//! # Responsibility
//! - Decode caller-supplied text into typed values with `ServiceError` kinds.
//! - Normalize payloads (trimmed text, blank optionals dropped) before guards
//!   run.

use super::error::{ServiceError, ServiceResult};
use crate::model::client::ClientId;
use crate::model::device::DeviceId;
use crate::model::record::ServiceType;
use crate::model::request::{RequestId, RequestStatus};
use crate::model::user::{Role, UserId};
use crate::schedule::parse_calendar_date;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const MIN_NAME_CHARS: usize = 2;

/// Parses an RFC 3339 timestamp, or a zone-less `YYYY-MM-DDTHH:MM[:SS]`
/// value read as UTC.
pub fn parse_timestamp(value: &str) -> ServiceResult<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc());
        }
    }
    Err(ServiceError::InvalidDate(format!(
        "`{trimmed}` is not a timestamp"
    )))
}

pub fn parse_date(value: &str) -> ServiceResult<NaiveDate> {
    Ok(parse_calendar_date(value.trim())?)
}

pub fn parse_status(value: &str) -> ServiceResult<RequestStatus> {
    Ok(value.trim().parse::<RequestStatus>()?)
}

pub fn parse_id(value: &str, field: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ServiceError::validation(format!("{field} must be a valid id")))
}

/// Serde adapters routing payload timestamps through [`parse_timestamp`].
mod boundary_timestamp {
    use super::parse_timestamp;
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse_timestamp(&text).map_err(D::Error::custom)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|text| parse_timestamp(&text).map_err(D::Error::custom))
            .transpose()
    }
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub(crate) fn require_text(value: &str, field: &str, min_chars: usize) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min_chars.max(1) {
        return Err(ServiceError::validation(format!(
            "{field} must have at least {} characters",
            min_chars.max(1)
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn require_email(value: &str, field: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if !EMAIL_RE.is_match(trimmed) {
        return Err(ServiceError::validation(format!(
            "{field} must be a valid email address"
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}

pub(crate) fn optional_email(value: Option<String>, field: &str) -> ServiceResult<Option<String>> {
    normalize_optional(value)
        .map(|email| require_email(&email, field))
        .transpose()
}

pub(crate) fn require_positive(value: u32, field: &str) -> ServiceResult<u32> {
    if value < 1 {
        return Err(ServiceError::validation(format!("{field} must be at least 1")));
    }
    Ok(value)
}

/// Client self-service ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequestInput {
    pub device_id: DeviceId,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preferred_date: Option<NaiveDate>,
}

impl ClientRequestInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            description: normalize_optional(self.description),
            ..self
        })
    }
}

/// Administrator ticket created already assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRequestInput {
    pub client_id: ClientId,
    pub device_id: DeviceId,
    pub technician_id: UserId,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    #[serde(deserialize_with = "boundary_timestamp::deserialize")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preferred_date: Option<NaiveDate>,
}

impl AdminRequestInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            description: normalize_optional(self.description),
            ..self
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub request_id: RequestId,
    pub technician_id: UserId,
    #[serde(deserialize_with = "boundary_timestamp::deserialize")]
    pub scheduled_at: DateTime<Utc>,
    /// Defaults to the policy duration. Validated, not used for conflicts.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayInput {
    pub request_id: RequestId,
    #[serde(default, deserialize_with = "boundary_timestamp::deserialize_option")]
    pub new_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DelayInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            reason: normalize_optional(self.reason),
            ..self
        })
    }
}

/// Completion of a request, either by the technician or converted by staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionInput {
    pub request_id: RequestId,
    pub service_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CompletionInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            notes: normalize_optional(self.notes),
            ..self
        })
    }
}

/// Visit recorded directly against a device, without a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInput {
    pub device_id: DeviceId,
    pub service_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecordInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            notes: normalize_optional(self.notes),
            ..self
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl ClientInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            name: require_text(&self.name, "client name", MIN_NAME_CHARS)?,
            address: normalize_optional(self.address),
            contact_email: optional_email(self.contact_email, "contact email")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserInput {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl NewUserInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            name: require_text(&self.name, "name", MIN_NAME_CHARS)?,
            email: require_email(&self.email, "email")?,
            role: self.role,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTechnicianInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl NewTechnicianInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            name: require_text(&self.name, "name", MIN_NAME_CHARS)?,
            email: require_email(&self.email, "email")?,
            phone: normalize_optional(self.phone),
            region: normalize_optional(self.region),
        })
    }
}

/// Profile edit for an existing technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianInput {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl TechnicianInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            name: require_text(&self.name, "name", MIN_NAME_CHARS)?,
            phone: normalize_optional(self.phone),
            region: normalize_optional(self.region),
        })
    }
}

/// Self-service rename, open to every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInput {
    pub name: String,
}

impl AccountInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            name: require_text(&self.name, "name", MIN_NAME_CHARS)?,
        })
    }
}

/// Organization details edited by a client member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfileInput {
    /// Tenancy to edit; the member's first tenancy by name when absent.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    pub organization_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl ClientProfileInput {
    pub(crate) fn normalized(self) -> ServiceResult<Self> {
        Ok(Self {
            client_id: self.client_id,
            organization_name: require_text(
                &self.organization_name,
                "organization name",
                MIN_NAME_CHARS,
            )?,
            address: normalize_optional(self.address),
            contact_email: optional_email(self.contact_email, "contact email")?,
        })
    }
}

/// Contact details a technician edits for themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianProfileInput {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl TechnicianProfileInput {
    pub(crate) fn normalized(self) -> Self {
        Self {
            phone: normalize_optional(self.phone),
            region: normalize_optional(self.region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_optional, parse_date, parse_id, parse_status, parse_timestamp, require_email,
        require_text, AdminRequestInput, ClientInput, DelayInput, ScheduleInput,
    };
    use crate::model::request::RequestStatus;
    use crate::service::error::ServiceError;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn timestamps_accept_rfc3339_and_local_form() {
        let expected = Utc.with_ymd_and_hms(2024, 7, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-07-01T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-07-01T12:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-07-01T10:30").unwrap(), expected);
        assert!(matches!(
            parse_timestamp("tomorrow"),
            Err(ServiceError::InvalidDate(_))
        ));
    }

    #[test]
    fn payload_timestamps_use_the_boundary_parser() {
        let expected = Utc.with_ymd_and_hms(2024, 7, 1, 10, 30, 0).unwrap();
        let request_id = Uuid::new_v4();
        let technician_id = Uuid::new_v4();

        let schedule: ScheduleInput = serde_json::from_value(serde_json::json!({
            "request_id": request_id,
            "technician_id": technician_id,
            "scheduled_at": "2024-07-01T10:30",
        }))
        .unwrap();
        assert_eq!(schedule.scheduled_at, expected);
        assert_eq!(schedule.duration_minutes, None);

        let admin: AdminRequestInput = serde_json::from_value(serde_json::json!({
            "client_id": Uuid::new_v4(),
            "device_id": Uuid::new_v4(),
            "technician_id": technician_id,
            "type": "routine",
            "scheduled_at": "2024-07-01T12:30:00+02:00",
        }))
        .unwrap();
        assert_eq!(admin.scheduled_at, expected);

        let delay: DelayInput = serde_json::from_value(serde_json::json!({
            "request_id": request_id,
            "new_date": "2024-07-01T10:30:00",
        }))
        .unwrap();
        assert_eq!(delay.new_date, Some(expected));
        let undated: DelayInput =
            serde_json::from_value(serde_json::json!({ "request_id": request_id })).unwrap();
        assert_eq!(undated.new_date, None);

        let round_trip: ScheduleInput =
            serde_json::from_str(&serde_json::to_string(&schedule).unwrap()).unwrap();
        assert_eq!(round_trip, schedule);

        let bad = serde_json::from_value::<ScheduleInput>(serde_json::json!({
            "request_id": request_id,
            "technician_id": technician_id,
            "scheduled_at": "next tuesday",
        }))
        .unwrap_err();
        assert!(bad.to_string().contains("not a timestamp"));
    }

    #[test]
    fn boundary_parsers_trim_and_classify_errors() {
        assert_eq!(parse_status(" in_progress ").unwrap(), RequestStatus::InProgress);
        assert_eq!(
            parse_date(" 2024-06-15 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert!(matches!(
            parse_date("15/06/2024"),
            Err(ServiceError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_status("closed"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            parse_id("not-an-id", "device"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn text_helpers_trim_and_enforce_minimums() {
        assert_eq!(normalize_optional(Some("   ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" note ".to_string())).as_deref(),
            Some("note")
        );
        assert!(require_text(" a ", "name", 2).is_err());
        assert_eq!(require_text(" ab ", "name", 2).unwrap(), "ab");
        assert_eq!(
            require_email(" Ops@Clinic.example ", "email").unwrap(),
            "ops@clinic.example"
        );
        assert!(require_email("ops@", "email").is_err());
    }

    #[test]
    fn client_input_rejects_bad_contact_email() {
        let input = ClientInput {
            name: "City Clinic".to_string(),
            address: Some(" ".to_string()),
            contact_email: Some("nope".to_string()),
        };
        assert!(matches!(input.normalized(), Err(ServiceError::Validation(_))));
    }
}
