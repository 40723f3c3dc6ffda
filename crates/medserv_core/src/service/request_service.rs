//! Request lifecycle use-cases.
//!
//! # Responsibility
//! - Create, schedule and progress service requests through the six-state
//!   machine in `model::request`.
//! - Complete requests together with their service record and device dates.
//! - Serve role-scoped request listings.
//!
//! # Invariants
//! - Each mutating call is one immediate transaction; a second concurrent
//!   `finish` observes `done` and fails with `AlreadyClosed`.
//! - Conflict counts are advisory and never block scheduling.
//! - Client lookups of missing resources report `Forbidden`, never `NotFound`.

use super::error::{ServiceError, ServiceResult};
use super::guard::{assert_client_owns_device, assert_owns_request, assert_role};
use super::input::{
    AdminRequestInput, ClientRequestInput, CompletionInput, DelayInput, ScheduleInput,
};
use super::record_service::apply_completion;
use super::{begin_immediate, system_clock, traced, Clock};
use crate::config::SchedulingPolicy;
use crate::model::device::Device;
use crate::model::record::ServiceRecord;
use crate::model::request::{RequestId, RequestStatus, ServiceRequest};
use crate::model::user::{Actor, Role, UserId};
use crate::repo::client_repo::SqliteClientRepository;
use crate::repo::device_repo::{DeviceRepository, SqliteDeviceRepository};
use crate::repo::request_repo::{RequestListQuery, RequestRepository, SqliteRequestRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::schedule::estimate_conflicts;
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::Connection;
use serde::Serialize;

const ALL_ROLES: [Role; 3] = [Role::Admin, Role::Technician, Role::Client];
const STAFF_ROLES: [Role; 2] = [Role::Admin, Role::Technician];

/// A scheduled request and the number of nearby assignments of the same
/// technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleOutcome {
    pub request: ServiceRequest,
    pub conflicts: u64,
}

/// A closed request with the history row and device dates it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestCompletion {
    pub request: ServiceRequest,
    pub record: ServiceRecord,
    pub device: Device,
}

pub struct RequestService<'conn> {
    conn: &'conn mut Connection,
    policy: SchedulingPolicy,
    clock: Clock,
}

impl<'conn> RequestService<'conn> {
    pub fn new(conn: &'conn mut Connection, policy: SchedulingPolicy) -> Self {
        Self {
            conn,
            policy,
            clock: system_clock,
        }
    }

    /// Replaces the time source used for timestamps and past-slot checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Client self-service: new `open` request on a device of the caller's
    /// tenancy.
    pub fn create_client_request(
        &mut self,
        actor: Option<&Actor>,
        input: ClientRequestInput,
    ) -> ServiceResult<ServiceRequest> {
        traced("request_create_client", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &[Role::Client])?;

            let tx = begin_immediate(self.conn)?;
            let device = SqliteDeviceRepository::new(&tx)
                .get_device(input.device_id)?
                .ok_or(ServiceError::Forbidden)?;
            assert_client_owns_device(&actor, &device, &SqliteClientRepository::new(&tx))?;

            let requests = SqliteRequestRepository::new(&tx);
            let request = ServiceRequest::open(
                device.id,
                actor.user_id,
                input.kind,
                input.description,
                input.preferred_date,
            );
            let request_id = requests.insert_request(&request)?;
            let created = load_request(&requests, request_id)?;
            tx.commit()?;

            info!(
                "event=request_create_client module=service status=ok request_id={} device_id={}",
                created.id, created.device_id
            );
            Ok(created)
        })
    }

    /// Administrator request created directly in `scheduled`.
    pub fn create_admin_request(
        &mut self,
        actor: Option<&Actor>,
        input: AdminRequestInput,
    ) -> ServiceResult<ScheduleOutcome> {
        traced("request_create_admin", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &[Role::Admin])?;
            let window = self.policy.conflict_window()?;

            let tx = begin_immediate(self.conn)?;
            let device = SqliteDeviceRepository::new(&tx)
                .get_device(input.device_id)?
                .ok_or(ServiceError::NotFound {
                    entity: "device",
                    id: input.device_id,
                })?;
            if device.client_id != input.client_id {
                return Err(ServiceError::validation(
                    "device does not belong to the selected client",
                ));
            }
            ensure_technician(&SqliteUserRepository::new(&tx), input.technician_id)?;

            let requests = SqliteRequestRepository::new(&tx);
            let conflicts = estimate_conflicts(
                &requests,
                input.technician_id,
                input.scheduled_at,
                window,
                None,
            )?;
            let mut request = ServiceRequest::pre_assigned(
                device.id,
                actor.user_id,
                input.kind,
                input.technician_id,
                input.scheduled_at,
            );
            request.description = input.description;
            request.preferred_date = input.preferred_date;
            let request_id = requests.insert_request(&request)?;
            let created = load_request(&requests, request_id)?;
            tx.commit()?;

            info!(
                "event=request_create_admin module=service status=ok request_id={} technician_id={} conflicts={}",
                created.id, input.technician_id, conflicts
            );
            Ok(ScheduleOutcome {
                request: created,
                conflicts,
            })
        })
    }

    /// Assigns a technician and slot. The slot may not lie further in the
    /// past than the policy tolerance.
    pub fn assign_and_schedule(
        &mut self,
        actor: Option<&Actor>,
        input: ScheduleInput,
    ) -> ServiceResult<ScheduleOutcome> {
        traced("request_schedule", || {
            let now = self.now();
            let duration = input
                .duration_minutes
                .unwrap_or(self.policy.default_duration_minutes);
            if !(self.policy.min_duration_minutes..=self.policy.max_duration_minutes)
                .contains(&duration)
            {
                return Err(ServiceError::validation(format!(
                    "duration must be between {} and {} minutes",
                    self.policy.min_duration_minutes, self.policy.max_duration_minutes
                )));
            }
            let earliest = now
                .checked_sub_signed(self.policy.past_tolerance()?)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            if input.scheduled_at < earliest {
                return Err(ServiceError::validation("scheduled time is in the past"));
            }
            let _actor = assert_role(actor, &STAFF_ROLES)?;
            let window = self.policy.conflict_window()?;

            let tx = begin_immediate(self.conn)?;
            let requests = SqliteRequestRepository::new(&tx);
            let mut request = load_request(&requests, input.request_id)?;
            ensure_technician(&SqliteUserRepository::new(&tx), input.technician_id)?;

            request.assign(input.technician_id, input.scheduled_at)?;
            let conflicts = estimate_conflicts(
                &requests,
                input.technician_id,
                input.scheduled_at,
                window,
                Some(request.id),
            )?;
            requests.update_request(&request)?;
            tx.commit()?;

            info!(
                "event=request_schedule module=service status=ok request_id={} technician_id={} duration_minutes={} conflicts={}",
                request.id, input.technician_id, duration, conflicts
            );
            Ok(ScheduleOutcome { request, conflicts })
        })
    }

    /// Raw status override. Writes no service record, even for `done`.
    pub fn update_status(
        &mut self,
        actor: Option<&Actor>,
        request_id: RequestId,
        status: RequestStatus,
    ) -> ServiceResult<ServiceRequest> {
        traced("request_update_status", || {
            if !status.is_override_target() {
                return Err(ServiceError::validation(format!(
                    "status `{status}` cannot be set directly"
                )));
            }
            let actor = assert_role(actor, &STAFF_ROLES)?;

            let tx = begin_immediate(self.conn)?;
            let requests = SqliteRequestRepository::new(&tx);
            let mut request = load_request(&requests, request_id)?;
            assert_owns_request(&actor, &request)?;
            let previous = request.status;
            request.override_status(status)?;
            requests.update_request(&request)?;
            tx.commit()?;

            info!(
                "event=request_update_status module=service status=ok request_id={} from={} to={}",
                request.id, previous, request.status
            );
            Ok(request)
        })
    }

    /// Cancels a non-terminal request.
    pub fn cancel(
        &mut self,
        actor: Option<&Actor>,
        request_id: RequestId,
    ) -> ServiceResult<ServiceRequest> {
        self.update_status(actor, request_id, RequestStatus::Cancelled)
    }

    pub fn start(
        &mut self,
        actor: Option<&Actor>,
        request_id: RequestId,
    ) -> ServiceResult<ServiceRequest> {
        traced("request_start", || {
            let actor = assert_role(actor, &[Role::Technician])?;
            let now = self.now();

            let tx = begin_immediate(self.conn)?;
            let requests = SqliteRequestRepository::new(&tx);
            let mut request = load_request(&requests, request_id)?;
            assert_owns_request(&actor, &request)?;
            request.start(now)?;
            requests.update_request(&request)?;
            tx.commit()?;

            info!(
                "event=request_start module=service status=ok request_id={} technician_id={}",
                request.id, actor.user_id
            );
            Ok(request)
        })
    }

    /// Postpones a visit, optionally to a new slot.
    pub fn delay(
        &mut self,
        actor: Option<&Actor>,
        input: DelayInput,
    ) -> ServiceResult<ServiceRequest> {
        traced("request_delay", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &[Role::Technician])?;

            let tx = begin_immediate(self.conn)?;
            let requests = SqliteRequestRepository::new(&tx);
            let mut request = load_request(&requests, input.request_id)?;
            assert_owns_request(&actor, &request)?;
            request.delay(input.new_date, input.reason)?;
            requests.update_request(&request)?;
            tx.commit()?;

            info!(
                "event=request_delay module=service status=ok request_id={} rescheduled={}",
                request.id,
                input.new_date.is_some()
            );
            Ok(request)
        })
    }

    /// Technician closes their own visit; stamps `finished_at`.
    pub fn finish(
        &mut self,
        actor: Option<&Actor>,
        input: CompletionInput,
    ) -> ServiceResult<RequestCompletion> {
        traced("request_finish", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &[Role::Technician])?;
            let now = self.now();
            self.complete(actor, input, Some(now))
        })
    }

    /// Staff closes a request into a service record without stamping
    /// `finished_at`.
    pub fn convert_to_record(
        &mut self,
        actor: Option<&Actor>,
        input: CompletionInput,
    ) -> ServiceResult<RequestCompletion> {
        traced("request_convert", || {
            let input = input.normalized()?;
            let actor = assert_role(actor, &STAFF_ROLES)?;
            self.complete(actor, input, None)
        })
    }

    fn complete(
        &mut self,
        actor: Actor,
        input: CompletionInput,
        finished_at: Option<DateTime<Utc>>,
    ) -> ServiceResult<RequestCompletion> {
        let tx = begin_immediate(self.conn)?;
        let requests = SqliteRequestRepository::new(&tx);
        let mut request = load_request(&requests, input.request_id)?;
        assert_owns_request(&actor, &request)?;
        request.complete(finished_at)?;

        let outcome = apply_completion(
            &tx,
            request.device_id,
            actor.user_id,
            input.service_date,
            input.kind,
            input.notes,
        )?;
        requests.update_request(&request)?;
        tx.commit()?;

        info!(
            "event=request_complete module=service status=ok request_id={} record_id={} next_service_date={}",
            request.id,
            outcome.record.id,
            outcome
                .device
                .next_service_date
                .map(|date| date.to_string())
                .unwrap_or_default()
        );
        Ok(RequestCompletion {
            request,
            record: outcome.record,
            device: outcome.device,
        })
    }

    /// Requests visible to the actor, optionally filtered by status.
    pub fn list_requests(
        &self,
        actor: Option<&Actor>,
        status: Option<RequestStatus>,
    ) -> ServiceResult<Vec<ServiceRequest>> {
        traced("request_list", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let query = visible_requests(&actor, status);
            Ok(SqliteRequestRepository::new(&*self.conn).list_requests(&query)?)
        })
    }

    pub fn get_request(
        &self,
        actor: Option<&Actor>,
        request_id: RequestId,
    ) -> ServiceResult<ServiceRequest> {
        traced("request_get", || {
            let actor = assert_role(actor, &ALL_ROLES)?;
            let conn: &Connection = &*self.conn;
            let found = SqliteRequestRepository::new(conn).get_request(request_id)?;

            if actor.role == Role::Client {
                let request = found.ok_or(ServiceError::Forbidden)?;
                let device = SqliteDeviceRepository::new(conn)
                    .get_device(request.device_id)?
                    .ok_or(ServiceError::Forbidden)?;
                assert_client_owns_device(&actor, &device, &SqliteClientRepository::new(conn))?;
                return Ok(request);
            }

            let request = found.ok_or(ServiceError::NotFound {
                entity: "service request",
                id: request_id,
            })?;
            assert_owns_request(&actor, &request)?;
            Ok(request)
        })
    }
}

/// Listing filter that limits rows to what `actor` may see.
pub(crate) fn visible_requests(actor: &Actor, status: Option<RequestStatus>) -> RequestListQuery {
    let mut query = RequestListQuery {
        status,
        ..RequestListQuery::default()
    };
    match actor.role {
        Role::Admin => {}
        Role::Technician => query.assigned_to = Some(actor.user_id),
        Role::Client => query.member_user_id = Some(actor.user_id),
    }
    query
}

fn load_request<R: RequestRepository + ?Sized>(
    repo: &R,
    request_id: RequestId,
) -> ServiceResult<ServiceRequest> {
    repo.get_request(request_id)?
        .ok_or(ServiceError::NotFound {
            entity: "service request",
            id: request_id,
        })
}

fn ensure_technician<R: UserRepository + ?Sized>(repo: &R, user_id: UserId) -> ServiceResult<()> {
    match repo.get_user(user_id)? {
        Some(user) if user.role == Role::Technician => Ok(()),
        _ => Err(ServiceError::validation("assignee must be a technician")),
    }
}
