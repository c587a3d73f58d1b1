use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use swasthya_domain::role::AccountRole;

use crate::domain::repository::{AccountRepository, NotificationRepository, RelationshipRepository};
use crate::domain::types::{
    Connection, NotificationKind, Permissions, PermissionsPatch, Priority, Relationship,
    RelationshipStatus,
};
use crate::error::ConnectionsServiceError;
use crate::usecase::connection::caller_account;
use crate::usecase::notification::{NewNotification, NotificationEmitter};

/// Join relationships with the account on the other end. Relationships whose
/// peer account has vanished are skipped.
async fn with_peers<A: AccountRepository>(
    accounts: &A,
    owner_id: Uuid,
    relationships: Vec<Relationship>,
) -> Result<Vec<Connection>, ConnectionsServiceError> {
    let mut connections = Vec::with_capacity(relationships.len());
    for relationship in relationships {
        let peer_id = relationship.peer_of(owner_id);
        let Some(peer) = accounts.find_by_id(peer_id).await? else {
            tracing::warn!(
                relationship_id = %relationship.id,
                peer_id = %peer_id,
                "relationship peer account missing"
            );
            continue;
        };
        connections.push(Connection {
            relationship_id: relationship.id,
            peer,
            permissions: relationship.permissions,
            connected_at: relationship.created_at,
        });
    }
    Ok(connections)
}

// ── GetConnectedDoctors ──────────────────────────────────────────────────────

pub struct GetConnectedDoctorsUseCase<A, R>
where
    A: AccountRepository,
    R: RelationshipRepository,
{
    pub accounts: A,
    pub relationships: R,
}

impl<A, R> GetConnectedDoctorsUseCase<A, R>
where
    A: AccountRepository,
    R: RelationshipRepository,
{
    pub async fn execute(
        &self,
        patient_id: Uuid,
        claimed_email: Option<&str>,
    ) -> Result<Vec<Connection>, ConnectionsServiceError> {
        let patient = caller_account(&self.accounts, patient_id, claimed_email).await?;
        if patient.role != AccountRole::Patient {
            return Err(ConnectionsServiceError::Unauthorized);
        }
        let relationships = self.relationships.list_active_for_patient(patient.id).await?;
        with_peers(&self.accounts, patient.id, relationships).await
    }
}

// ── GetConnectedPatients ─────────────────────────────────────────────────────

pub struct GetConnectedPatientsUseCase<A, R>
where
    A: AccountRepository,
    R: RelationshipRepository,
{
    pub accounts: A,
    pub relationships: R,
}

impl<A, R> GetConnectedPatientsUseCase<A, R>
where
    A: AccountRepository,
    R: RelationshipRepository,
{
    pub async fn execute(
        &self,
        doctor_id: Uuid,
        claimed_email: Option<&str>,
    ) -> Result<Vec<Connection>, ConnectionsServiceError> {
        let doctor = caller_account(&self.accounts, doctor_id, claimed_email).await?;
        if doctor.role != AccountRole::Doctor {
            return Err(ConnectionsServiceError::Unauthorized);
        }
        let relationships = self.relationships.list_active_for_doctor(doctor.id).await?;
        with_peers(&self.accounts, doctor.id, relationships).await
    }
}

// ── UpdateRelationshipPermissions ────────────────────────────────────────────

pub struct UpdatePermissionsUseCase<R, N>
where
    R: RelationshipRepository,
    N: NotificationRepository,
{
    pub relationships: R,
    pub notifier: NotificationEmitter<N>,
}

impl<R, N> UpdatePermissionsUseCase<R, N>
where
    R: RelationshipRepository,
    N: NotificationRepository,
{
    /// Only the patient may change what a doctor can see.
    pub async fn execute(
        &self,
        relationship_id: Uuid,
        caller_id: Uuid,
        patch: PermissionsPatch,
    ) -> Result<Permissions, ConnectionsServiceError> {
        if patch.is_empty() {
            return Err(ConnectionsServiceError::Validation(
                "at least one permission flag is required",
            ));
        }
        let relationship = self
            .relationships
            .find_by_id(relationship_id)
            .await?
            .ok_or(ConnectionsServiceError::RelationshipNotFound)?;
        if relationship.patient_id != caller_id {
            return Err(ConnectionsServiceError::Unauthorized);
        }
        if relationship.status != RelationshipStatus::Active {
            return Err(ConnectionsServiceError::RelationshipNotActive);
        }

        let permissions = patch.apply(relationship.permissions);
        if !self
            .relationships
            .update_permissions(relationship.id, permissions, Utc::now())
            .await?
        {
            return Err(ConnectionsServiceError::RelationshipNotActive);
        }
        tracing::info!(relationship_id = %relationship.id, "relationship permissions updated");

        self.notifier
            .emit(NewNotification {
                recipient_id: relationship.doctor_id,
                kind: NotificationKind::PermissionsUpdated,
                title: "Permissions updated".to_owned(),
                message: "A patient changed the access you have to their data".to_owned(),
                data: json!({
                    "relationship_id": relationship.id,
                    "patient_id": relationship.patient_id,
                    "permissions": permissions,
                }),
                priority: Priority::Normal,
            })
            .await;
        Ok(permissions)
    }
}

// ── TerminateRelationship ────────────────────────────────────────────────────

pub struct TerminateRelationshipUseCase<R, N>
where
    R: RelationshipRepository,
    N: NotificationRepository,
{
    pub relationships: R,
    pub notifier: NotificationEmitter<N>,
}

impl<R, N> TerminateRelationshipUseCase<R, N>
where
    R: RelationshipRepository,
    N: NotificationRepository,
{
    pub async fn execute(
        &self,
        relationship_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(), ConnectionsServiceError> {
        let relationship = self
            .relationships
            .find_by_id(relationship_id)
            .await?
            .ok_or(ConnectionsServiceError::RelationshipNotFound)?;
        if !relationship.involves(caller_id) {
            return Err(ConnectionsServiceError::Unauthorized);
        }
        if !self
            .relationships
            .terminate(relationship.id, Utc::now())
            .await?
        {
            return Err(ConnectionsServiceError::RelationshipNotActive);
        }
        tracing::info!(relationship_id = %relationship.id, "relationship terminated");

        self.notifier
            .emit(NewNotification {
                recipient_id: relationship.peer_of(caller_id),
                kind: NotificationKind::ConnectionTerminated,
                title: "Connection ended".to_owned(),
                message: "A connection was ended by the other party".to_owned(),
                data: json!({
                    "relationship_id": relationship.id,
                    "terminated_by": caller_id,
                }),
                priority: Priority::Normal,
            })
            .await;
        Ok(())
    }
}
