use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use swasthya_auth_types::identity::CallerIdentity;
use swasthya_core::envelope::Envelope;
use swasthya_domain::pagination::PageRequest;

use crate::domain::types::{Notification, NotificationKind, NotificationSortBy, Priority};
use crate::error::ConnectionsServiceError;
use crate::state::AppState;
use crate::usecase::notification::{
    DisableNotificationUseCase, ListNotificationsUseCase, MarkAllNotificationsReadUseCase,
    MarkNotificationReadUseCase, UnreadCountUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Value,
    pub priority: Priority,
    pub read: bool,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms_opt")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            data: notification.data,
            priority: notification.priority,
            read: notification.read_at.is_some(),
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct NotificationsBody {
    pub notifications: Vec<NotificationResponse>,
}

#[derive(Serialize)]
pub struct UnreadCountBody {
    pub count: u64,
}

#[derive(Serialize)]
pub struct MarkedReadBody {
    pub updated: u64,
}

// ── Query params ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationListQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub include_read: Option<bool>,
    pub sort_by: Option<String>,
}

// ── GET /notifications ───────────────────────────────────────────────────────

pub async fn list_notifications(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Envelope<NotificationsBody>, ConnectionsServiceError> {
    let sort_by = match query.sort_by.as_deref() {
        None => NotificationSortBy::default(),
        Some(s) => NotificationSortBy::from_kebab_case(s)
            .ok_or(ConnectionsServiceError::Validation("unknown sort-by"))?,
    };
    let default_page = PageRequest::default();
    let page = PageRequest {
        per_page: query.per_page.unwrap_or(default_page.per_page),
        page: query.page.unwrap_or(default_page.page),
    };

    let usecase = ListNotificationsUseCase {
        repo: state.notification_repo(),
    };
    let notifications = usecase
        .execute(
            identity.account_id,
            query.include_read.unwrap_or(true),
            sort_by,
            page,
        )
        .await?;
    Ok(Envelope::ok(NotificationsBody {
        notifications: notifications.into_iter().map(Into::into).collect(),
    }))
}

// ── GET /notifications/unread-count ──────────────────────────────────────────

pub async fn unread_count(
    identity: CallerIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<UnreadCountBody>, ConnectionsServiceError> {
    let usecase = UnreadCountUseCase {
        repo: state.notification_repo(),
    };
    let count = usecase.execute(identity.account_id).await?;
    Ok(Envelope::ok(UnreadCountBody { count }))
}

// ── PATCH /notifications/{id}/read ───────────────────────────────────────────

pub async fn mark_read(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<Map<String, Value>>, ConnectionsServiceError> {
    let usecase = MarkNotificationReadUseCase {
        repo: state.notification_repo(),
    };
    usecase.execute(id, identity.account_id).await?;
    Ok(Envelope::ack())
}

// ── POST /notifications/read-all ─────────────────────────────────────────────

pub async fn mark_all_read(
    identity: CallerIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<MarkedReadBody>, ConnectionsServiceError> {
    let usecase = MarkAllNotificationsReadUseCase {
        repo: state.notification_repo(),
    };
    let updated = usecase.execute(identity.account_id).await?;
    Ok(Envelope::ok(MarkedReadBody { updated }))
}

// ── DELETE /notifications/{id} ───────────────────────────────────────────────

pub async fn disable_notification(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<Map<String, Value>>, ConnectionsServiceError> {
    let usecase = DisableNotificationUseCase {
        repo: state.notification_repo(),
    };
    usecase.execute(id, identity.account_id).await?;
    Ok(Envelope::ack())
}
