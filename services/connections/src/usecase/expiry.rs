use chrono::{DateTime, Utc};

use crate::domain::repository::ConnectionRequestRepository;
use crate::domain::types::ConnectionRequest;
use crate::error::ConnectionsServiceError;

/// Move a lapsed pending request to `expired`.
///
/// The store re-checks the OTP window, so a `request` snapshot taken before a
/// resend cannot expire the fresh code. Returns `true` if this call made the
/// transition. Losing the race to another writer is not an error.
pub async fn expire_request<C: ConnectionRequestRepository>(
    requests: &C,
    request: &ConnectionRequest,
    now: DateTime<Utc>,
) -> Result<bool, ConnectionsServiceError> {
    let expired = requests.expire_lapsed(request.id, now).await?;
    if expired {
        tracing::info!(request_id = %request.id, "connection request expired");
    }
    Ok(expired)
}

// ── ExpireLapsedRequests (sweep) ─────────────────────────────────────────────

pub struct ExpireLapsedRequestsUseCase<C: ConnectionRequestRepository> {
    pub requests: C,
}

impl<C: ConnectionRequestRepository> ExpireLapsedRequestsUseCase<C> {
    /// One sweep pass. Returns how many requests this pass expired.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<usize, ConnectionsServiceError> {
        let lapsed = self.requests.list_expired_pending(now).await?;
        let mut expired = 0;
        for request in &lapsed {
            match expire_request(&self.requests, request, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, request_id = %request.id, "failed to expire request");
                }
            }
        }
        Ok(expired)
    }
}
