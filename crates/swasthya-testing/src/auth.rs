//! Mock identity helpers for router tests.
//!
//! Services behind the gateway receive `x-swasthya-account-id` +
//! `x-swasthya-account-role` headers. `MockAuth` produces them directly so no real
//! gateway or session is needed.

use http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use swasthya_auth_types::identity::{ACCOUNT_ID_HEADER, ACCOUNT_ROLE_HEADER};
use swasthya_domain::role::AccountRole;

/// Configurable identity injected into test requests.
pub struct MockAuth {
    pub account_id: Uuid,
    pub role: AccountRole,
}

impl MockAuth {
    pub fn new(account_id: Uuid, role: AccountRole) -> Self {
        Self { account_id, role }
    }

    pub fn doctor() -> Self {
        Self::new(Uuid::now_v7(), AccountRole::Doctor)
    }

    pub fn patient() -> Self {
        Self::new(Uuid::now_v7(), AccountRole::Patient)
    }

    /// Return headers as if the gateway injected them.
    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(ACCOUNT_ID_HEADER),
            HeaderValue::from_str(&self.account_id.to_string()).unwrap(),
        );
        map.insert(
            HeaderName::from_static(ACCOUNT_ROLE_HEADER),
            HeaderValue::from_static(self.role.as_str()),
        );
        map
    }
}
