use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::infra::db::{
    DbAccountRepository, DbConnectionRequestRepository, DbNotificationRepository,
    DbRelationshipRepository,
};
use crate::infra::outbox::OutboxOtpTransport;
use crate::usecase::notification::NotificationEmitter;
use crate::usecase::resolve::IdentityResolver;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Upper bound on every individual store call.
    pub store_timeout: Duration,
}

impl AppState {
    pub fn account_repo(&self) -> DbAccountRepository {
        DbAccountRepository {
            db: self.db.clone(),
            timeout: self.store_timeout,
        }
    }

    pub fn request_repo(&self) -> DbConnectionRequestRepository {
        DbConnectionRequestRepository {
            db: self.db.clone(),
            timeout: self.store_timeout,
        }
    }

    pub fn relationship_repo(&self) -> DbRelationshipRepository {
        DbRelationshipRepository {
            db: self.db.clone(),
            timeout: self.store_timeout,
        }
    }

    pub fn notification_repo(&self) -> DbNotificationRepository {
        DbNotificationRepository {
            db: self.db.clone(),
            timeout: self.store_timeout,
        }
    }

    pub fn otp_transport(&self) -> OutboxOtpTransport {
        OutboxOtpTransport {
            db: self.db.clone(),
            timeout: self.store_timeout,
        }
    }

    pub fn resolver(&self) -> IdentityResolver<DbAccountRepository> {
        IdentityResolver {
            accounts: self.account_repo(),
        }
    }

    pub fn notifier(&self) -> NotificationEmitter<DbNotificationRepository> {
        NotificationEmitter {
            repo: self.notification_repo(),
        }
    }
}
