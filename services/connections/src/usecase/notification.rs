use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use swasthya_domain::pagination::PageRequest;

use crate::domain::repository::NotificationRepository;
use crate::domain::types::{Notification, NotificationKind, NotificationSortBy, Priority};
use crate::error::ConnectionsServiceError;

// ── Emitter ──────────────────────────────────────────────────────────────────

pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Value,
    pub priority: Priority,
}

/// Fire-and-forget append to a recipient's feed.
///
/// A failed write is logged and dropped; it never fails the workflow step
/// that triggered it.
pub struct NotificationEmitter<N: NotificationRepository> {
    pub repo: N,
}

impl<N: NotificationRepository> NotificationEmitter<N> {
    pub async fn emit(&self, new: NewNotification) {
        let notification = Notification {
            id: Uuid::now_v7(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            data: new.data,
            priority: new.priority,
            read_at: None,
            disabled_at: None,
            created_at: Utc::now(),
        };
        if let Err(e) = self.repo.create(&notification).await {
            tracing::warn!(
                error = %e,
                recipient_id = %notification.recipient_id,
                kind = notification.kind.as_str(),
                "failed to emit notification"
            );
        }
    }
}

// ── ListNotifications ────────────────────────────────────────────────────────

pub struct ListNotificationsUseCase<N: NotificationRepository> {
    pub repo: N,
}

impl<N: NotificationRepository> ListNotificationsUseCase<N> {
    pub async fn execute(
        &self,
        recipient_id: Uuid,
        include_read: bool,
        sort_by: NotificationSortBy,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ConnectionsServiceError> {
        self.repo
            .list(recipient_id, include_read, sort_by, page.clamped())
            .await
    }
}

// ── UnreadCount ──────────────────────────────────────────────────────────────

pub struct UnreadCountUseCase<N: NotificationRepository> {
    pub repo: N,
}

impl<N: NotificationRepository> UnreadCountUseCase<N> {
    pub async fn execute(&self, recipient_id: Uuid) -> Result<u64, ConnectionsServiceError> {
        self.repo.unread_count(recipient_id).await
    }
}

// ── MarkRead ─────────────────────────────────────────────────────────────────

pub struct MarkNotificationReadUseCase<N: NotificationRepository> {
    pub repo: N,
}

impl<N: NotificationRepository> MarkNotificationReadUseCase<N> {
    pub async fn execute(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<(), ConnectionsServiceError> {
        let found = self.repo.mark_read(id, recipient_id, Utc::now()).await?;
        if !found {
            return Err(ConnectionsServiceError::NotificationNotFound);
        }
        Ok(())
    }
}

// ── MarkAllRead ──────────────────────────────────────────────────────────────

pub struct MarkAllNotificationsReadUseCase<N: NotificationRepository> {
    pub repo: N,
}

impl<N: NotificationRepository> MarkAllNotificationsReadUseCase<N> {
    pub async fn execute(&self, recipient_id: Uuid) -> Result<u64, ConnectionsServiceError> {
        self.repo.mark_all_read(recipient_id, Utc::now()).await
    }
}

// ── Disable ──────────────────────────────────────────────────────────────────

pub struct DisableNotificationUseCase<N: NotificationRepository> {
    pub repo: N,
}

impl<N: NotificationRepository> DisableNotificationUseCase<N> {
    pub async fn execute(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<(), ConnectionsServiceError> {
        let found = self.repo.disable(id, recipient_id, Utc::now()).await?;
        if !found {
            return Err(ConnectionsServiceError::NotificationNotFound);
        }
        Ok(())
    }
}
