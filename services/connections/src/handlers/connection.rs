use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use swasthya_auth_types::identity::CallerIdentity;
use swasthya_core::envelope::Envelope;
use swasthya_domain::role::AccountRole;

use crate::domain::types::{ConnectionMethod, RequestStatus};
use crate::error::ConnectionsServiceError;
use crate::state::AppState;
use crate::usecase::connection::{
    AcceptRequestInput, AcceptRequestUseCase, CreateConnectionRequestInput,
    CreateConnectionRequestUseCase, GetPendingRequestsUseCase, PendingRequest,
    RejectRequestInput, RejectRequestUseCase, ResendOtpUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CreatedRequestBody {
    pub request_id: Uuid,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms_opt")]
    pub otp_expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub display_name: String,
    pub specialization: Option<String>,
}

/// A pending request as the patient sees it. The code itself is never sent.
#[derive(Serialize)]
pub struct PendingRequestResponse {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor: Option<DoctorSummary>,
    pub connection_method: ConnectionMethod,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub otp_required: bool,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms_opt")]
    pub otp_expires_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<PendingRequest> for PendingRequestResponse {
    fn from(PendingRequest { request, doctor }: PendingRequest) -> Self {
        Self {
            id: request.id,
            doctor_id: request.doctor_id,
            doctor: doctor.map(|d| DoctorSummary {
                id: d.id,
                display_name: d.display_name,
                specialization: d.specialization,
            }),
            connection_method: request.method,
            message: request.message,
            status: request.status,
            otp_required: request.method.requires_otp(),
            otp_expires_at: request.otp.map(|otp| otp.expires_at),
            created_at: request.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct PendingRequestsBody {
    pub requests: Vec<PendingRequestResponse>,
}

#[derive(Serialize)]
pub struct AcceptedBody {
    pub relationship_id: Uuid,
}

#[derive(Serialize)]
pub struct OtpResentBody {
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms")]
    pub otp_expires_at: DateTime<Utc>,
}

// ── POST /connections/requests ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub patient_id: Option<Uuid>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub connection_method: String,
    pub message: Option<String>,
}

pub async fn create_request(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Envelope<CreatedRequestBody>), ConnectionsServiceError> {
    if !identity.is(AccountRole::Doctor) {
        return Err(ConnectionsServiceError::Unauthorized);
    }
    let usecase = CreateConnectionRequestUseCase {
        resolver: state.resolver(),
        requests: state.request_repo(),
        relationships: state.relationship_repo(),
        notifier: state.notifier(),
        transport: state.otp_transport(),
    };
    let created = usecase
        .execute(
            identity.account_id,
            CreateConnectionRequestInput {
                patient_id: body.patient_id,
                patient_email: body.patient_email,
                patient_phone: body.patient_phone,
                method: body.connection_method,
                message: body.message,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Envelope::ok(CreatedRequestBody {
            request_id: created.request_id,
            otp_expires_at: created.otp_expires_at,
        }),
    ))
}

// ── GET /connections/requests/pending ────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct PendingQuery {
    pub email: Option<String>,
}

pub async fn pending_requests(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Envelope<PendingRequestsBody>, ConnectionsServiceError> {
    let usecase = GetPendingRequestsUseCase {
        accounts: state.account_repo(),
        requests: state.request_repo(),
    };
    let pending = usecase
        .execute(identity.account_id, query.email.as_deref())
        .await?;
    Ok(Envelope::ok(PendingRequestsBody {
        requests: pending.into_iter().map(Into::into).collect(),
    }))
}

// ── POST /connections/requests/{id}/accept ───────────────────────────────────

#[derive(Deserialize, Default)]
pub struct AcceptBody {
    pub otp: Option<String>,
    pub patient_email: Option<String>,
}

pub async fn accept_request(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<AcceptBody>>,
) -> Result<Envelope<AcceptedBody>, ConnectionsServiceError> {
    let Json(body) = body.unwrap_or_default();
    let usecase = AcceptRequestUseCase {
        accounts: state.account_repo(),
        requests: state.request_repo(),
        relationships: state.relationship_repo(),
        notifier: state.notifier(),
    };
    let relationship_id = usecase
        .execute(
            request_id,
            identity.account_id,
            AcceptRequestInput {
                otp: body.otp,
                patient_email: body.patient_email,
            },
        )
        .await?;
    Ok(Envelope::ok(AcceptedBody { relationship_id }))
}

// ── POST /connections/requests/{id}/reject ───────────────────────────────────

#[derive(Deserialize, Default)]
pub struct RejectBody {
    pub reason: Option<String>,
    pub patient_email: Option<String>,
}

pub async fn reject_request(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Result<Envelope<Map<String, Value>>, ConnectionsServiceError> {
    let Json(body) = body.unwrap_or_default();
    let usecase = RejectRequestUseCase {
        accounts: state.account_repo(),
        requests: state.request_repo(),
        notifier: state.notifier(),
    };
    usecase
        .execute(
            request_id,
            identity.account_id,
            RejectRequestInput {
                reason: body.reason,
                patient_email: body.patient_email,
            },
        )
        .await?;
    Ok(Envelope::ack())
}

// ── POST /connections/requests/{id}/otp ──────────────────────────────────────

pub async fn resend_otp(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Envelope<OtpResentBody>, ConnectionsServiceError> {
    let usecase = ResendOtpUseCase {
        accounts: state.account_repo(),
        requests: state.request_repo(),
        transport: state.otp_transport(),
    };
    let otp_expires_at = usecase.execute(request_id, identity.account_id).await?;
    Ok(Envelope::ok(OtpResentBody { otp_expires_at }))
}
