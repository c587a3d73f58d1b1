//! Gateway-injected identity headers extractor.

use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;
use uuid::Uuid;

use swasthya_domain::role::AccountRole;

pub const ACCOUNT_ID_HEADER: &str = "x-swasthya-account-id";
pub const ACCOUNT_ROLE_HEADER: &str = "x-swasthya-account-role";

/// Caller identity injected by the gateway after it has authenticated the session.
///
/// Returns 401 if either header is absent or unparseable.
/// Ownership checks (403) are done by use cases after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: Uuid,
    pub role: AccountRole,
}

impl CallerIdentity {
    pub fn is(&self, role: AccountRole) -> bool {
        self.role == role
    }
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    // Header values are read synchronously so the returned future does not
    // borrow `parts`.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let account_id = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Uuid>().ok());

        let role = parts
            .headers
            .get(ACCOUNT_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<AccountRole>().ok());

        async move {
            let account_id = account_id.ok_or(StatusCode::UNAUTHORIZED)?;
            let role = role.ok_or(StatusCode::UNAUTHORIZED)?;
            Ok(Self { account_id, role })
        }
    }
}
