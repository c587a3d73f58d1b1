use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use serde_json::json;
use uuid::Uuid;

use swasthya_connections_schema::outbox_events;

use crate::domain::otp::OTP_TTL_SECS;
use crate::domain::repository::OtpTransport;
use crate::domain::types::OtpDelivery;
use crate::error::ConnectionsServiceError;
use crate::infra::db::bounded;

pub const OTP_ISSUED_EVENT: &str = "otp_issued";

/// Stable per issue: a resend gets a new key, a retried write of the same
/// issue does not.
pub fn otp_idempotency_key(delivery: &OtpDelivery) -> String {
    let issued_at = delivery.expires_at - chrono::Duration::seconds(OTP_TTL_SECS);
    format!(
        "{OTP_ISSUED_EVENT}:{}:{}",
        delivery.request_id,
        issued_at.timestamp_millis()
    )
}

/// Queues codes in the outbox table; a relay process sends the email/SMS.
#[derive(Clone)]
pub struct OutboxOtpTransport {
    pub db: DatabaseConnection,
    pub timeout: Duration,
}

impl OtpTransport for OutboxOtpTransport {
    async fn deliver(&self, delivery: &OtpDelivery) -> Result<(), ConnectionsServiceError> {
        let now = Utc::now();
        bounded(
            self.timeout,
            "insert otp outbox event",
            outbox_events::ActiveModel {
                id: Set(Uuid::now_v7()),
                kind: Set(OTP_ISSUED_EVENT.to_owned()),
                payload: Set(json!({
                    "purpose": delivery.purpose,
                    "request_id": delivery.request_id,
                    "channel": delivery.channel,
                    "recipient": delivery.recipient,
                    "code": delivery.code,
                    "expires_at": delivery.expires_at.to_rfc3339(),
                })),
                idempotency_key: Set(otp_idempotency_key(delivery)),
                attempts: Set(0),
                last_error: Set(None),
                created_at: Set(now),
                next_attempt_at: Set(now),
                processed_at: Set(None),
                failed_at: Set(None),
            }
            .insert(&self.db),
        )
        .await?;
        tracing::debug!(
            request_id = %delivery.request_id,
            channel = ?delivery.channel,
            "otp queued for delivery"
        );
        Ok(())
    }
}
