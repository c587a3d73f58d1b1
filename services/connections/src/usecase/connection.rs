use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use swasthya_domain::contact::{emails_match, normalize_email};
use swasthya_domain::role::AccountRole;

use crate::domain::otp::{OtpChallenge, OtpError};
use crate::domain::repository::{
    AccountRepository, ConnectionRequestRepository, NotificationRepository, OtpTransport,
    RelationshipRepository,
};
use crate::domain::types::{
    Account, Caller, ConnectionMethod, ConnectionRequest, NotificationKind, OtpDelivery, Party,
    PartyLookup, Permissions, Priority, Relationship, RelationshipStatus, RequestStatus,
    StatusChange,
};
use crate::error::ConnectionsServiceError;
use crate::usecase::expiry::expire_request;
use crate::usecase::notification::{NewNotification, NotificationEmitter};
use crate::usecase::resolve::IdentityResolver;

/// Load the acting account and check any contact it claims against the record.
///
/// A caller without an account, or claiming someone else's email, is unauthorized.
pub(crate) async fn caller_account<A: AccountRepository>(
    accounts: &A,
    caller_id: Uuid,
    claimed_email: Option<&str>,
) -> Result<Account, ConnectionsServiceError> {
    let account = accounts
        .find_by_id(caller_id)
        .await?
        .ok_or(ConnectionsServiceError::Unauthorized)?;
    if let Some(claimed) = claimed_email.and_then(normalize_email) {
        let matches = account
            .email
            .as_deref()
            .is_some_and(|own| emails_match(own, &claimed));
        if !matches {
            return Err(ConnectionsServiceError::Unauthorized);
        }
    }
    Ok(account)
}

/// Hand a code to the transport. Failures are logged; the code stays valid.
async fn deliver_otp<T: OtpTransport>(
    transport: &T,
    request: &ConnectionRequest,
    otp: &OtpChallenge,
) {
    let Some(delivery) = OtpDelivery::for_request(request, otp) else {
        tracing::warn!(request_id = %request.id, "no channel to deliver otp");
        return;
    };
    if let Err(e) = transport.deliver(&delivery).await {
        tracing::warn!(
            error = %e,
            request_id = %request.id,
            channel = ?delivery.channel,
            "failed to deliver otp"
        );
    }
}

// ── CreateConnectionRequest ──────────────────────────────────────────────────

pub struct CreateConnectionRequestInput {
    pub patient_id: Option<Uuid>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub method: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRequest {
    pub request_id: Uuid,
    pub otp_expires_at: Option<DateTime<Utc>>,
}

pub struct CreateConnectionRequestUseCase<A, C, R, N, T>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    R: RelationshipRepository,
    N: NotificationRepository,
    T: OtpTransport,
{
    pub resolver: IdentityResolver<A>,
    pub requests: C,
    pub relationships: R,
    pub notifier: NotificationEmitter<N>,
    pub transport: T,
}

impl<A, C, R, N, T> CreateConnectionRequestUseCase<A, C, R, N, T>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    R: RelationshipRepository,
    N: NotificationRepository,
    T: OtpTransport,
{
    pub async fn execute(
        &self,
        doctor_id: Uuid,
        input: CreateConnectionRequestInput,
    ) -> Result<CreatedRequest, ConnectionsServiceError> {
        let method = ConnectionMethod::parse(input.method.trim())
            .ok_or(ConnectionsServiceError::UnsupportedConnectionMethod)?;
        let lookup = PartyLookup {
            id: input.patient_id,
            email: input.patient_email,
            phone: input.patient_phone,
        }
        .normalized();
        if lookup.is_empty() {
            return Err(ConnectionsServiceError::MissingIdentifier);
        }

        // 1. Initiator must be a registered doctor
        let doctor = self
            .resolver
            .resolve_registered(AccountRole::Doctor, &PartyLookup::by_id(doctor_id))
            .await?;

        // 2. Resolve the target; unregistered emails get a placeholder
        let party = self.resolver.resolve(AccountRole::Patient, &lookup).await?;

        // 3. An active relationship blocks a new request
        if let Some(patient_id) = party.account_id() {
            if self
                .relationships
                .find_active(patient_id, doctor.id)
                .await?
                .is_some()
            {
                return Err(ConnectionsServiceError::ConnectionAlreadyExists);
            }
        }

        // 4. A registered target is bound by id and reached on its own contacts,
        //    never on what the doctor typed
        let (patient_id, patient_email, patient_phone) = match &party {
            Party::Registered(account) => (
                Some(account.id),
                account.email.clone(),
                account.phone.clone(),
            ),
            Party::Unregistered { email } => (None, Some(email.clone()), lookup.phone.clone()),
        };
        let target = PartyLookup {
            id: patient_id,
            email: patient_email.clone(),
            phone: patient_phone.clone(),
        };

        // 5. Supersede whatever is still pending for this pair
        let superseded: Vec<Uuid> = self
            .requests
            .list_pending_for_target(doctor.id, &target)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let now = Utc::now();
        let request = ConnectionRequest {
            id: Uuid::now_v7(),
            doctor_id: doctor.id,
            patient_id,
            patient_email,
            patient_phone,
            method,
            message: input
                .message
                .map(|m| m.trim().to_owned())
                .filter(|m| !m.is_empty()),
            status: RequestStatus::Pending,
            reason: None,
            otp: method.requires_otp().then(|| OtpChallenge::issue(now)),
            created_at: now,
            updated_at: now,
        };
        self.requests
            .create_superseding(&request, &superseded)
            .await?;
        tracing::info!(
            request_id = %request.id,
            doctor_id = %doctor.id,
            method = method.as_str(),
            superseded = superseded.len(),
            "connection request created"
        );

        // 6. Side channels, both best-effort
        if let Some(otp) = &request.otp {
            deliver_otp(&self.transport, &request, otp).await;
        }
        if let Some(patient_id) = request.patient_id {
            self.notifier
                .emit(NewNotification {
                    recipient_id: patient_id,
                    kind: NotificationKind::ConnectionRequest,
                    title: "New connection request".to_owned(),
                    message: format!("Dr. {} wants to connect with you", doctor.display_name),
                    data: json!({
                        "request_id": request.id,
                        "doctor_id": doctor.id,
                        "connection_method": method.as_str(),
                    }),
                    priority: Priority::High,
                })
                .await;
        }

        Ok(CreatedRequest {
            request_id: request.id,
            otp_expires_at: request.otp.as_ref().map(|otp| otp.expires_at),
        })
    }
}

// ── GetPendingRequests ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request: ConnectionRequest,
    pub doctor: Option<Account>,
}

pub struct GetPendingRequestsUseCase<A, C>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
{
    pub accounts: A,
    pub requests: C,
}

impl<A, C> GetPendingRequestsUseCase<A, C>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
{
    /// Pending requests addressed to the caller. Lapsed ones are expired on the
    /// way out and left out of the result.
    pub async fn execute(
        &self,
        caller_id: Uuid,
        claimed_email: Option<&str>,
    ) -> Result<Vec<PendingRequest>, ConnectionsServiceError> {
        let account = caller_account(&self.accounts, caller_id, claimed_email).await?;
        let lookup = PartyLookup {
            id: Some(account.id),
            email: account.email.clone(),
            phone: account.phone.clone(),
        };

        let caller = Caller::from(&account);

        let now = Utc::now();
        let mut pending = Vec::new();
        for request in self.requests.list_pending_for_patient(&lookup).await? {
            if !request.is_addressed_to(&caller) {
                continue;
            }
            if request.is_lapsed(now) {
                expire_request(&self.requests, &request, now).await?;
                continue;
            }
            let doctor = self.accounts.find_by_id(request.doctor_id).await?;
            pending.push(PendingRequest { request, doctor });
        }
        Ok(pending)
    }
}

// ── AcceptRequest ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AcceptRequestInput {
    pub otp: Option<String>,
    pub patient_email: Option<String>,
}

pub struct AcceptRequestUseCase<A, C, R, N>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    R: RelationshipRepository,
    N: NotificationRepository,
{
    pub accounts: A,
    pub requests: C,
    pub relationships: R,
    pub notifier: NotificationEmitter<N>,
}

impl<A, C, R, N> AcceptRequestUseCase<A, C, R, N>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    R: RelationshipRepository,
    N: NotificationRepository,
{
    /// Returns the id of the new relationship.
    pub async fn execute(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
        input: AcceptRequestInput,
    ) -> Result<Uuid, ConnectionsServiceError> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or(ConnectionsServiceError::RequestNotFound)?;

        // 1. Ownership
        let patient =
            caller_account(&self.accounts, caller_id, input.patient_email.as_deref()).await?;
        if patient.role != AccountRole::Patient || !request.is_addressed_to(&Caller::from(&patient))
        {
            return Err(ConnectionsServiceError::Unauthorized);
        }

        // 2. State
        if request.status != RequestStatus::Pending {
            return Err(ConnectionsServiceError::RequestNoLongerPending);
        }
        let now = Utc::now();
        if request.is_lapsed(now) {
            expire_request(&self.requests, &request, now).await?;
            return Err(ConnectionsServiceError::OtpExpired);
        }
        if self
            .relationships
            .find_active(patient.id, request.doctor_id)
            .await?
            .is_some()
        {
            return Err(ConnectionsServiceError::ConnectionAlreadyExists);
        }

        // 3. OTP, unless the request is direct
        if request.method.requires_otp() {
            self.verify_otp(&request, input.otp.as_deref(), now).await?;
        }

        // 4. Conditional pending -> accepted, together with the relationship
        let relationship = Relationship {
            id: Uuid::now_v7(),
            patient_id: patient.id,
            doctor_id: request.doctor_id,
            request_id: Some(request.id),
            status: RelationshipStatus::Active,
            permissions: Permissions::default(),
            created_at: now,
            updated_at: now,
        };
        let change = StatusChange {
            patient_id: Some(patient.id),
            reason: None,
            at: now,
        };
        if !self
            .requests
            .accept(request.id, &change, &relationship)
            .await?
        {
            return Err(ConnectionsServiceError::RequestNoLongerPending);
        }
        tracing::info!(
            request_id = %request.id,
            relationship_id = %relationship.id,
            "connection request accepted"
        );

        self.notifier
            .emit(NewNotification {
                recipient_id: request.doctor_id,
                kind: NotificationKind::ConnectionAccepted,
                title: "Connection accepted".to_owned(),
                message: format!("{} accepted your connection request", patient.display_name),
                data: json!({
                    "request_id": request.id,
                    "relationship_id": relationship.id,
                    "patient_id": patient.id,
                }),
                priority: Priority::High,
            })
            .await;

        Ok(relationship.id)
    }

    async fn verify_otp(
        &self,
        request: &ConnectionRequest,
        supplied: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ConnectionsServiceError> {
        let supplied = supplied
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConnectionsServiceError::OtpRequired)?;
        let mut current = stored_otp(request)?;

        for _ in 0..OTP_WRITE_ROUNDS {
            let mut next = current.clone();
            let outcome = next.verify(supplied, now);
            // A terminal challenge is left as is; nothing to write.
            if next == current || self.requests.update_otp(request.id, &current, &next).await? {
                return match outcome {
                    Ok(()) => Ok(()),
                    // Another accept consumed the code and is about to flip the status.
                    Err(OtpError::AlreadyUsed) => {
                        Err(ConnectionsServiceError::RequestNoLongerPending)
                    }
                    Err(e) => Err(e.into()),
                };
            }

            // Another attempt or a resend got there first. Check again against
            // what is stored now.
            let fresh = self
                .requests
                .find_by_id(request.id)
                .await?
                .ok_or(ConnectionsServiceError::RequestNotFound)?;
            if fresh.status != RequestStatus::Pending {
                return Err(ConnectionsServiceError::RequestNoLongerPending);
            }
            current = stored_otp(&fresh)?;
        }
        tracing::warn!(request_id = %request.id, "gave up on contended otp update");
        Err(ConnectionsServiceError::RequestNoLongerPending)
    }
}

/// Compare-and-swap rounds allowed for one OTP write before giving up.
const OTP_WRITE_ROUNDS: usize = 8;

fn stored_otp(request: &ConnectionRequest) -> Result<OtpChallenge, ConnectionsServiceError> {
    Ok(request
        .otp
        .clone()
        .ok_or_else(|| anyhow::anyhow!("request {} has no otp challenge", request.id))?)
}

// ── RejectRequest ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RejectRequestInput {
    pub reason: Option<String>,
    pub patient_email: Option<String>,
}

pub struct RejectRequestUseCase<A, C, N>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    N: NotificationRepository,
{
    pub accounts: A,
    pub requests: C,
    pub notifier: NotificationEmitter<N>,
}

impl<A, C, N> RejectRequestUseCase<A, C, N>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    N: NotificationRepository,
{
    /// Rejection needs no OTP and is allowed after the code has lapsed.
    pub async fn execute(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
        input: RejectRequestInput,
    ) -> Result<(), ConnectionsServiceError> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or(ConnectionsServiceError::RequestNotFound)?;
        let patient =
            caller_account(&self.accounts, caller_id, input.patient_email.as_deref()).await?;
        if patient.role != AccountRole::Patient || !request.is_addressed_to(&Caller::from(&patient))
        {
            return Err(ConnectionsServiceError::Unauthorized);
        }
        if request.status != RequestStatus::Pending {
            return Err(ConnectionsServiceError::RequestNoLongerPending);
        }

        let reason = input
            .reason
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());
        let change = StatusChange {
            patient_id: None,
            reason: reason.clone(),
            at: Utc::now(),
        };
        if !self
            .requests
            .transition(
                request.id,
                RequestStatus::Pending,
                RequestStatus::Rejected,
                &change,
            )
            .await?
        {
            return Err(ConnectionsServiceError::RequestNoLongerPending);
        }
        tracing::info!(request_id = %request.id, "connection request rejected");

        self.notifier
            .emit(NewNotification {
                recipient_id: request.doctor_id,
                kind: NotificationKind::ConnectionRejected,
                title: "Connection declined".to_owned(),
                message: format!("{} declined your connection request", patient.display_name),
                data: json!({
                    "request_id": request.id,
                    "reason": reason,
                }),
                priority: Priority::Normal,
            })
            .await;
        Ok(())
    }
}

// ── ResendOtp ────────────────────────────────────────────────────────────────

pub struct ResendOtpUseCase<A, C, T>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    T: OtpTransport,
{
    pub accounts: A,
    pub requests: C,
    pub transport: T,
}

impl<A, C, T> ResendOtpUseCase<A, C, T>
where
    A: AccountRepository,
    C: ConnectionRequestRepository,
    T: OtpTransport,
{
    /// Regenerates the code with a fresh window. Returns the new expiry.
    pub async fn execute(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<DateTime<Utc>, ConnectionsServiceError> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or(ConnectionsServiceError::RequestNotFound)?;

        if request.doctor_id != caller_id {
            let account = caller_account(&self.accounts, caller_id, None).await?;
            if !request.is_addressed_to(&Caller::from(&account)) {
                return Err(ConnectionsServiceError::Unauthorized);
            }
        }
        if request.status != RequestStatus::Pending {
            return Err(ConnectionsServiceError::RequestNoLongerPending);
        }
        if !request.method.requires_otp() {
            return Err(ConnectionsServiceError::OtpNotApplicable);
        }

        let now = Utc::now();
        let mut current = stored_otp(&request)?;
        let mut rounds = 0;
        let otp = loop {
            let mut next = current.clone();
            next.reissue(now)?;
            if self.requests.update_otp(request.id, &current, &next).await? {
                break next;
            }
            rounds += 1;
            let fresh = self
                .requests
                .find_by_id(request.id)
                .await?
                .ok_or(ConnectionsServiceError::RequestNotFound)?;
            if fresh.status != RequestStatus::Pending || rounds >= OTP_WRITE_ROUNDS {
                return Err(ConnectionsServiceError::RequestNoLongerPending);
            }
            current = stored_otp(&fresh)?;
        };
        tracing::info!(request_id = %request.id, "otp resent");

        deliver_otp(&self.transport, &request, &otp).await;
        Ok(otp.expires_at)
    }
}
