use std::future::Future;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    SqlErr, TransactionError, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use swasthya_connections_schema::{
    accounts, connection_requests, notifications, relationships,
};
use swasthya_domain::pagination::{PageRequest, Sort};
use swasthya_domain::role::AccountRole;

use crate::domain::otp::{OtpChallenge, OtpState};
use crate::domain::repository::{
    AccountRepository, ConnectionRequestRepository, NotificationRepository,
    RelationshipRepository,
};
use crate::domain::types::{
    Account, ConnectionMethod, ConnectionRequest, Notification, NotificationKind,
    NotificationSortBy, PartyLookup, Permissions, Priority, Relationship, RelationshipStatus,
    RequestStatus, StatusChange,
};
use crate::error::ConnectionsServiceError;

// ── Bounded store calls ──────────────────────────────────────────────────────

/// Await `fut` for at most `limit`. Only the timeout is mapped here; the inner
/// database result is left for the caller to classify.
pub(crate) async fn within<T, F>(
    limit: Duration,
    op: &'static str,
    fut: F,
) -> Result<Result<T, DbErr>, ConnectionsServiceError>
where
    F: Future<Output = Result<T, DbErr>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(op, timeout_ms = limit.as_millis() as u64, "store call timed out");
        ConnectionsServiceError::Unavailable
    })
}

/// [`within`] plus the default mapping of database errors to `Internal`.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    op: &'static str,
    fut: F,
) -> Result<T, ConnectionsServiceError>
where
    F: Future<Output = Result<T, DbErr>>,
{
    Ok(within(limit, op, fut).await?.context(op)?)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn flatten(err: TransactionError<DbErr>) -> DbErr {
    match err {
        TransactionError::Connection(e) | TransactionError::Transaction(e) => e,
    }
}

// ── Account repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAccountRepository {
    pub db: DatabaseConnection,
    pub timeout: Duration,
}

impl AccountRepository for DbAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find account by id",
            accounts::Entity::find_by_id(id).one(&self.db),
        )
        .await?;
        Ok(model.map(account_from_model).transpose()?)
    }

    async fn find_by_email(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Result<Option<Account>, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find account by email",
            accounts::Entity::find()
                .filter(accounts::Column::Role.eq(role.as_str()))
                .filter(accounts::Column::Email.eq(email))
                .one(&self.db),
        )
        .await?;
        Ok(model.map(account_from_model).transpose()?)
    }

    async fn find_by_phone(
        &self,
        role: AccountRole,
        phone: &str,
    ) -> Result<Option<Account>, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find account by phone",
            accounts::Entity::find()
                .filter(accounts::Column::Role.eq(role.as_str()))
                .filter(accounts::Column::Phone.eq(phone))
                .order_by_asc(accounts::Column::CreatedAt)
                .one(&self.db),
        )
        .await?;
        Ok(model.map(account_from_model).transpose()?)
    }

    async fn create(&self, account: &Account) -> Result<(), ConnectionsServiceError> {
        let insert = accounts::ActiveModel {
            id: Set(account.id),
            role: Set(account.role.as_str().to_owned()),
            email: Set(account.email.clone()),
            phone: Set(account.phone.clone()),
            display_name: Set(account.display_name.clone()),
            specialization: Set(account.specialization.clone()),
            created_at: Set(account.created_at),
            updated_at: Set(account.updated_at),
        }
        .insert(&self.db);
        match within(self.timeout, "create account", insert).await? {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ConnectionsServiceError::AccountAlreadyExists),
            Err(e) => Err(anyhow::Error::new(e).context("create account").into()),
        }
    }
}

fn account_from_model(model: accounts::Model) -> anyhow::Result<Account> {
    let role = model
        .role
        .parse::<AccountRole>()
        .with_context(|| format!("account {}", model.id))?;
    Ok(Account {
        id: model.id,
        role,
        email: model.email,
        phone: model.phone,
        display_name: model.display_name,
        specialization: model.specialization,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Connection request repository ────────────────────────────────────────────

#[derive(Clone)]
pub struct DbConnectionRequestRepository {
    pub db: DatabaseConnection,
    pub timeout: Duration,
}

/// Any-of match on the patient columns. `None` when `target` carries nothing.
fn target_condition(target: &PartyLookup) -> Option<Condition> {
    let mut any = Condition::any();
    if let Some(id) = target.id {
        any = any.add(connection_requests::Column::PatientId.eq(id));
    }
    if let Some(email) = &target.email {
        any = any.add(connection_requests::Column::PatientEmail.eq(email.as_str()));
    }
    if let Some(phone) = &target.phone {
        any = any.add(connection_requests::Column::PatientPhone.eq(phone.as_str()));
    }
    (!any.is_empty()).then_some(any)
}

fn status_update(
    to: RequestStatus,
    change: &StatusChange,
) -> sea_orm::UpdateMany<connection_requests::Entity> {
    let mut update = connection_requests::Entity::update_many()
        .col_expr(connection_requests::Column::Status, Expr::value(to.as_str()))
        .col_expr(connection_requests::Column::UpdatedAt, Expr::value(change.at));
    if let Some(patient_id) = change.patient_id {
        update = update.col_expr(connection_requests::Column::PatientId, Expr::value(patient_id));
    }
    if let Some(reason) = &change.reason {
        update = update.col_expr(
            connection_requests::Column::Reason,
            Expr::value(reason.clone()),
        );
    }
    update
}

/// Matches a row whose stored challenge is still `current`. Every verify or
/// reissue changes the attempts, the state or the code.
fn otp_unchanged(current: &OtpChallenge) -> Condition {
    Condition::all()
        .add(connection_requests::Column::OtpCode.eq(current.code.clone()))
        .add(connection_requests::Column::OtpAttempts.eq(current.attempts as i32))
        .add(connection_requests::Column::OtpState.eq(current.state.as_str()))
}

impl ConnectionRequestRepository for DbConnectionRequestRepository {
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<ConnectionRequest>, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find connection request by id",
            connection_requests::Entity::find_by_id(id).one(&self.db),
        )
        .await?;
        Ok(model.map(request_from_model).transpose()?)
    }

    async fn list_pending_for_target(
        &self,
        doctor_id: Uuid,
        target: &PartyLookup,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError> {
        let Some(condition) = target_condition(target) else {
            return Ok(vec![]);
        };
        let models = bounded(
            self.timeout,
            "list pending requests for target",
            connection_requests::Entity::find()
                .filter(connection_requests::Column::DoctorId.eq(doctor_id))
                .filter(connection_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .filter(condition)
                .all(&self.db),
        )
        .await?;
        Ok(models
            .into_iter()
            .map(request_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn list_pending_for_patient(
        &self,
        patient: &PartyLookup,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError> {
        let Some(condition) = target_condition(patient) else {
            return Ok(vec![]);
        };
        let models = bounded(
            self.timeout,
            "list pending requests for patient",
            connection_requests::Entity::find()
                .filter(connection_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .filter(condition)
                .order_by_desc(connection_requests::Column::CreatedAt)
                .all(&self.db),
        )
        .await?;
        Ok(models
            .into_iter()
            .map(request_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn create_superseding(
        &self,
        request: &ConnectionRequest,
        supersede: &[Uuid],
    ) -> Result<(), ConnectionsServiceError> {
        let txn = self.db.transaction::<_, (), DbErr>(|txn| {
            let request = request.clone();
            let supersede = supersede.to_vec();
            Box::pin(async move {
                if !supersede.is_empty() {
                    connection_requests::Entity::update_many()
                        .col_expr(
                            connection_requests::Column::Status,
                            Expr::value(RequestStatus::Cancelled.as_str()),
                        )
                        .col_expr(
                            connection_requests::Column::UpdatedAt,
                            Expr::value(request.created_at),
                        )
                        .filter(connection_requests::Column::Id.is_in(supersede))
                        .filter(
                            connection_requests::Column::Status
                                .eq(RequestStatus::Pending.as_str()),
                        )
                        .exec(txn)
                        .await?;
                }
                insert_request(txn, &request).await
            })
        });
        match within(self.timeout, "create superseding request", async {
            txn.await.map_err(flatten)
        })
        .await?
        {
            Ok(()) => Ok(()),
            // Another create for the same pair won the race.
            Err(e) if is_unique_violation(&e) => {
                Err(ConnectionsServiceError::ConnectionAlreadyExists)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("create superseding request")
                .into()),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        change: &StatusChange,
    ) -> Result<bool, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "transition connection request",
            status_update(to, change)
                .filter(connection_requests::Column::Id.eq(id))
                .filter(connection_requests::Column::Status.eq(from.as_str()))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected == 1)
    }

    async fn accept(
        &self,
        id: Uuid,
        change: &StatusChange,
        relationship: &Relationship,
    ) -> Result<bool, ConnectionsServiceError> {
        let txn = self.db.transaction::<_, bool, DbErr>(|txn| {
            let change = change.clone();
            let relationship = relationship.clone();
            Box::pin(async move {
                let flipped = status_update(RequestStatus::Accepted, &change)
                    .filter(connection_requests::Column::Id.eq(id))
                    .filter(
                        connection_requests::Column::Status.eq(RequestStatus::Pending.as_str()),
                    )
                    .exec(txn)
                    .await?;
                if flipped.rows_affected != 1 {
                    return Ok(false);
                }
                insert_relationship(txn, &relationship).await?;
                Ok(true)
            })
        });
        match within(self.timeout, "accept connection request", async {
            txn.await.map_err(flatten)
        })
        .await?
        {
            Ok(accepted) => Ok(accepted),
            Err(e) if is_unique_violation(&e) => {
                Err(ConnectionsServiceError::ConnectionAlreadyExists)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("accept connection request")
                .into()),
        }
    }

    async fn update_otp(
        &self,
        id: Uuid,
        current: &OtpChallenge,
        next: &OtpChallenge,
    ) -> Result<bool, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "update otp",
            connection_requests::Entity::update_many()
                .col_expr(
                    connection_requests::Column::OtpCode,
                    Expr::value(next.code.clone()),
                )
                .col_expr(
                    connection_requests::Column::OtpExpiresAt,
                    Expr::value(next.expires_at),
                )
                .col_expr(
                    connection_requests::Column::OtpAttempts,
                    Expr::value(next.attempts as i32),
                )
                .col_expr(
                    connection_requests::Column::OtpMaxAttempts,
                    Expr::value(next.max_attempts as i32),
                )
                .col_expr(
                    connection_requests::Column::OtpState,
                    Expr::value(next.state.as_str()),
                )
                .col_expr(connection_requests::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(connection_requests::Column::Id.eq(id))
                .filter(connection_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .filter(otp_unchanged(current))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected == 1)
    }

    async fn expire_lapsed(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "expire lapsed request",
            status_update(RequestStatus::Expired, &StatusChange::at(now))
                .filter(connection_requests::Column::Id.eq(id))
                .filter(connection_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .filter(connection_requests::Column::OtpExpiresAt.is_not_null())
                .filter(connection_requests::Column::OtpExpiresAt.lt(now))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected == 1)
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError> {
        let models = bounded(
            self.timeout,
            "list expired pending requests",
            connection_requests::Entity::find()
                .filter(connection_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .filter(connection_requests::Column::OtpExpiresAt.is_not_null())
                .filter(connection_requests::Column::OtpExpiresAt.lt(now))
                .all(&self.db),
        )
        .await?;
        Ok(models
            .into_iter()
            .map(request_from_model)
            .collect::<anyhow::Result<_>>()?)
    }
}

async fn insert_request(
    txn: &DatabaseTransaction,
    request: &ConnectionRequest,
) -> Result<(), DbErr> {
    let otp = request.otp.as_ref();
    connection_requests::ActiveModel {
        id: Set(request.id),
        doctor_id: Set(request.doctor_id),
        patient_id: Set(request.patient_id),
        patient_email: Set(request.patient_email.clone()),
        patient_phone: Set(request.patient_phone.clone()),
        connection_method: Set(request.method.as_str().to_owned()),
        message: Set(request.message.clone()),
        status: Set(request.status.as_str().to_owned()),
        reason: Set(request.reason.clone()),
        otp_code: Set(otp.map(|o| o.code.clone())),
        otp_expires_at: Set(otp.map(|o| o.expires_at)),
        otp_attempts: Set(otp.map_or(0, |o| o.attempts as i32)),
        otp_max_attempts: Set(otp.map_or(0, |o| o.max_attempts as i32)),
        otp_state: Set(otp.map(|o| o.state.as_str().to_owned())),
        created_at: Set(request.created_at),
        updated_at: Set(request.updated_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn request_from_model(model: connection_requests::Model) -> anyhow::Result<ConnectionRequest> {
    let method = ConnectionMethod::parse(&model.connection_method).with_context(|| {
        format!(
            "request {}: unknown connection method {:?}",
            model.id, model.connection_method
        )
    })?;
    let status = RequestStatus::parse(&model.status)
        .with_context(|| format!("request {}: unknown status {:?}", model.id, model.status))?;
    let otp = match (model.otp_code, model.otp_expires_at) {
        (Some(code), Some(expires_at)) => Some(OtpChallenge {
            code,
            expires_at,
            attempts: u32::try_from(model.otp_attempts).unwrap_or(0),
            max_attempts: u32::try_from(model.otp_max_attempts).unwrap_or(0),
            state: model
                .otp_state
                .as_deref()
                .and_then(OtpState::parse)
                .unwrap_or(OtpState::Active),
        }),
        _ => None,
    };
    Ok(ConnectionRequest {
        id: model.id,
        doctor_id: model.doctor_id,
        patient_id: model.patient_id,
        patient_email: model.patient_email,
        patient_phone: model.patient_phone,
        method,
        message: model.message,
        status,
        reason: model.reason,
        otp,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Relationship repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRelationshipRepository {
    pub db: DatabaseConnection,
    pub timeout: Duration,
}

impl RelationshipRepository for DbRelationshipRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Relationship>, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find relationship by id",
            relationships::Entity::find_by_id(id).one(&self.db),
        )
        .await?;
        Ok(model.map(relationship_from_model).transpose()?)
    }

    async fn find_active(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Relationship>, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find active relationship",
            relationships::Entity::find()
                .filter(relationships::Column::PatientId.eq(patient_id))
                .filter(relationships::Column::DoctorId.eq(doctor_id))
                .filter(relationships::Column::Status.eq(RelationshipStatus::Active.as_str()))
                .one(&self.db),
        )
        .await?;
        Ok(model.map(relationship_from_model).transpose()?)
    }

    async fn list_active_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Relationship>, ConnectionsServiceError> {
        let models = bounded(
            self.timeout,
            "list active relationships for patient",
            relationships::Entity::find()
                .filter(relationships::Column::PatientId.eq(patient_id))
                .filter(relationships::Column::Status.eq(RelationshipStatus::Active.as_str()))
                .order_by_desc(relationships::Column::CreatedAt)
                .all(&self.db),
        )
        .await?;
        Ok(models
            .into_iter()
            .map(relationship_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn list_active_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Relationship>, ConnectionsServiceError> {
        let models = bounded(
            self.timeout,
            "list active relationships for doctor",
            relationships::Entity::find()
                .filter(relationships::Column::DoctorId.eq(doctor_id))
                .filter(relationships::Column::Status.eq(RelationshipStatus::Active.as_str()))
                .order_by_desc(relationships::Column::CreatedAt)
                .all(&self.db),
        )
        .await?;
        Ok(models
            .into_iter()
            .map(relationship_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn update_permissions(
        &self,
        id: Uuid,
        permissions: Permissions,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "update relationship permissions",
            relationships::Entity::update_many()
                .col_expr(
                    relationships::Column::Prescriptions,
                    Expr::value(permissions.prescriptions),
                )
                .col_expr(relationships::Column::Records, Expr::value(permissions.records))
                .col_expr(
                    relationships::Column::Emergency,
                    Expr::value(permissions.emergency),
                )
                .col_expr(relationships::Column::UpdatedAt, Expr::value(at))
                .filter(relationships::Column::Id.eq(id))
                .filter(relationships::Column::Status.eq(RelationshipStatus::Active.as_str()))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected == 1)
    }

    async fn terminate(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "terminate relationship",
            relationships::Entity::update_many()
                .col_expr(
                    relationships::Column::Status,
                    Expr::value(RelationshipStatus::Terminated.as_str()),
                )
                .col_expr(relationships::Column::UpdatedAt, Expr::value(at))
                .filter(relationships::Column::Id.eq(id))
                .filter(relationships::Column::Status.eq(RelationshipStatus::Active.as_str()))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected == 1)
    }
}

async fn insert_relationship(
    txn: &DatabaseTransaction,
    relationship: &Relationship,
) -> Result<(), DbErr> {
    relationships::ActiveModel {
        id: Set(relationship.id),
        patient_id: Set(relationship.patient_id),
        doctor_id: Set(relationship.doctor_id),
        request_id: Set(relationship.request_id),
        status: Set(relationship.status.as_str().to_owned()),
        prescriptions: Set(relationship.permissions.prescriptions),
        records: Set(relationship.permissions.records),
        emergency: Set(relationship.permissions.emergency),
        created_at: Set(relationship.created_at),
        updated_at: Set(relationship.updated_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn relationship_from_model(model: relationships::Model) -> anyhow::Result<Relationship> {
    let status = RelationshipStatus::parse(&model.status).with_context(|| {
        format!(
            "relationship {}: unknown status {:?}",
            model.id, model.status
        )
    })?;
    Ok(Relationship {
        id: model.id,
        patient_id: model.patient_id,
        doctor_id: model.doctor_id,
        request_id: model.request_id,
        status,
        permissions: Permissions {
            prescriptions: model.prescriptions,
            records: model.records,
            emergency: model.emergency,
        },
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Notification repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbNotificationRepository {
    pub db: DatabaseConnection,
    pub timeout: Duration,
}

impl NotificationRepository for DbNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), ConnectionsServiceError> {
        bounded(
            self.timeout,
            "create notification",
            notifications::ActiveModel {
                id: Set(notification.id),
                recipient_id: Set(notification.recipient_id),
                kind: Set(notification.kind.as_str().to_owned()),
                title: Set(notification.title.clone()),
                message: Set(notification.message.clone()),
                data: Set(notification.data.clone()),
                priority: Set(notification.priority.as_str().to_owned()),
                read_at: Set(notification.read_at),
                disabled_at: Set(notification.disabled_at),
                created_at: Set(notification.created_at),
            }
            .insert(&self.db),
        )
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        recipient_id: Uuid,
        include_read: bool,
        sort_by: NotificationSortBy,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ConnectionsServiceError> {
        let mut query = notifications::Entity::find()
            .filter(notifications::Column::RecipientId.eq(recipient_id))
            .filter(notifications::Column::DisabledAt.is_null());
        if !include_read {
            query = query.filter(notifications::Column::ReadAt.is_null());
        }
        query = match sort_by {
            NotificationSortBy::CreatedAt(Sort::Desc) => {
                query.order_by_desc(notifications::Column::CreatedAt)
            }
            NotificationSortBy::CreatedAt(Sort::Asc) => {
                query.order_by_asc(notifications::Column::CreatedAt)
            }
        };
        let models = bounded(
            self.timeout,
            "list notifications",
            query.offset(page.offset()).limit(page.limit()).all(&self.db),
        )
        .await?;
        Ok(models
            .into_iter()
            .map(notification_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, ConnectionsServiceError> {
        bounded(
            self.timeout,
            "count unread notifications",
            notifications::Entity::find()
                .filter(notifications::Column::RecipientId.eq(recipient_id))
                .filter(notifications::Column::DisabledAt.is_null())
                .filter(notifications::Column::ReadAt.is_null())
                .count(&self.db),
        )
        .await
    }

    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        let model = bounded(
            self.timeout,
            "find notification",
            notifications::Entity::find_by_id(id)
                .filter(notifications::Column::RecipientId.eq(recipient_id))
                .filter(notifications::Column::DisabledAt.is_null())
                .one(&self.db),
        )
        .await?;
        let Some(model) = model else {
            return Ok(false);
        };
        if model.read_at.is_none() {
            bounded(
                self.timeout,
                "mark notification read",
                notifications::Entity::update_many()
                    .col_expr(notifications::Column::ReadAt, Expr::value(at))
                    .filter(notifications::Column::Id.eq(id))
                    .filter(notifications::Column::ReadAt.is_null())
                    .exec(&self.db),
            )
            .await?;
        }
        Ok(true)
    }

    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "mark all notifications read",
            notifications::Entity::update_many()
                .col_expr(notifications::Column::ReadAt, Expr::value(at))
                .filter(notifications::Column::RecipientId.eq(recipient_id))
                .filter(notifications::Column::DisabledAt.is_null())
                .filter(notifications::Column::ReadAt.is_null())
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected)
    }

    async fn disable(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        let result = bounded(
            self.timeout,
            "disable notification",
            notifications::Entity::update_many()
                .col_expr(notifications::Column::DisabledAt, Expr::value(at))
                .filter(notifications::Column::Id.eq(id))
                .filter(notifications::Column::RecipientId.eq(recipient_id))
                .filter(notifications::Column::DisabledAt.is_null())
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected > 0)
    }
}

fn notification_from_model(model: notifications::Model) -> anyhow::Result<Notification> {
    let kind = NotificationKind::parse(&model.kind).with_context(|| {
        format!("notification {}: unknown kind {:?}", model.id, model.kind)
    })?;
    Ok(Notification {
        id: model.id,
        recipient_id: model.recipient_id,
        kind,
        title: model.title,
        message: model.message,
        data: model.data,
        priority: Priority::parse(&model.priority).unwrap_or_default(),
        read_at: model.read_at,
        disabled_at: model.disabled_at,
        created_at: model.created_at,
    })
}
