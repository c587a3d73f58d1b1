use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use swasthya_auth_types::identity::CallerIdentity;
use swasthya_core::envelope::Envelope;

use crate::domain::types::{Connection, Permissions, PermissionsPatch};
use crate::error::ConnectionsServiceError;
use crate::handlers::account::AccountResponse;
use crate::state::AppState;
use crate::usecase::relationship::{
    GetConnectedDoctorsUseCase, GetConnectedPatientsUseCase, TerminateRelationshipUseCase,
    UpdatePermissionsUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ConnectionResponse {
    pub relationship_id: Uuid,
    pub peer: AccountResponse,
    pub permissions: Permissions,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms")]
    pub connected_at: DateTime<Utc>,
}

impl From<Connection> for ConnectionResponse {
    fn from(connection: Connection) -> Self {
        Self {
            relationship_id: connection.relationship_id,
            peer: connection.peer.into(),
            permissions: connection.permissions,
            connected_at: connection.connected_at,
        }
    }
}

#[derive(Serialize)]
pub struct DoctorsBody {
    pub doctors: Vec<ConnectionResponse>,
}

#[derive(Serialize)]
pub struct PatientsBody {
    pub patients: Vec<ConnectionResponse>,
}

#[derive(Serialize)]
pub struct PermissionsBody {
    pub permissions: Permissions,
}

#[derive(Deserialize, Default)]
pub struct OwnerQuery {
    pub email: Option<String>,
}

// ── GET /connections/doctors ─────────────────────────────────────────────────

pub async fn connected_doctors(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Envelope<DoctorsBody>, ConnectionsServiceError> {
    let usecase = GetConnectedDoctorsUseCase {
        accounts: state.account_repo(),
        relationships: state.relationship_repo(),
    };
    let doctors = usecase
        .execute(identity.account_id, query.email.as_deref())
        .await?;
    Ok(Envelope::ok(DoctorsBody {
        doctors: doctors.into_iter().map(Into::into).collect(),
    }))
}

// ── GET /connections/patients ────────────────────────────────────────────────

pub async fn connected_patients(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Envelope<PatientsBody>, ConnectionsServiceError> {
    let usecase = GetConnectedPatientsUseCase {
        accounts: state.account_repo(),
        relationships: state.relationship_repo(),
    };
    let patients = usecase
        .execute(identity.account_id, query.email.as_deref())
        .await?;
    Ok(Envelope::ok(PatientsBody {
        patients: patients.into_iter().map(Into::into).collect(),
    }))
}

// ── PATCH /connections/relationships/{id}/permissions ────────────────────────

#[derive(Deserialize)]
pub struct PermissionsPatchBody {
    pub prescriptions: Option<bool>,
    pub records: Option<bool>,
    pub emergency: Option<bool>,
}

pub async fn update_permissions(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(relationship_id): Path<Uuid>,
    Json(body): Json<PermissionsPatchBody>,
) -> Result<Envelope<PermissionsBody>, ConnectionsServiceError> {
    let usecase = UpdatePermissionsUseCase {
        relationships: state.relationship_repo(),
        notifier: state.notifier(),
    };
    let permissions = usecase
        .execute(
            relationship_id,
            identity.account_id,
            PermissionsPatch {
                prescriptions: body.prescriptions,
                records: body.records,
                emergency: body.emergency,
            },
        )
        .await?;
    Ok(Envelope::ok(PermissionsBody { permissions }))
}

// ── DELETE /connections/relationships/{id} ───────────────────────────────────

pub async fn terminate_relationship(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(relationship_id): Path<Uuid>,
) -> Result<Envelope<Map<String, Value>>, ConnectionsServiceError> {
    let usecase = TerminateRelationshipUseCase {
        relationships: state.relationship_repo(),
        notifier: state.notifier(),
    };
    usecase.execute(relationship_id, identity.account_id).await?;
    Ok(Envelope::ack())
}
