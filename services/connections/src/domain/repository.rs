#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use swasthya_domain::pagination::PageRequest;
use swasthya_domain::role::AccountRole;

use crate::domain::otp::OtpChallenge;
use crate::domain::types::{
    Account, ConnectionRequest, Notification, NotificationSortBy, OtpDelivery, PartyLookup,
    Permissions, Relationship, RequestStatus, StatusChange,
};
use crate::error::ConnectionsServiceError;

/// Registered patients and doctors.
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, ConnectionsServiceError>;

    /// `email` must already be normalised.
    async fn find_by_email(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Result<Option<Account>, ConnectionsServiceError>;

    async fn find_by_phone(
        &self,
        role: AccountRole,
        phone: &str,
    ) -> Result<Option<Account>, ConnectionsServiceError>;

    /// Fails with `AccountAlreadyExists` when the (role, email) pair is taken.
    async fn create(&self, account: &Account) -> Result<(), ConnectionsServiceError>;
}

/// Connection requests with their embedded OTP challenge.
pub trait ConnectionRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<ConnectionRequest>, ConnectionsServiceError>;

    /// Pending requests from `doctor_id` whose target matches any field of `target`.
    async fn list_pending_for_target(
        &self,
        doctor_id: Uuid,
        target: &PartyLookup,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError>;

    /// Pending requests addressed to `patient` by id, email or phone, newest first.
    async fn list_pending_for_patient(
        &self,
        patient: &PartyLookup,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError>;

    /// Cancel every id in `supersede` that is still pending and insert `request`,
    /// all or nothing.
    async fn create_superseding(
        &self,
        request: &ConnectionRequest,
        supersede: &[Uuid],
    ) -> Result<(), ConnectionsServiceError>;

    /// Move `id` from `from` to `to` only if it is still in `from`.
    /// Returns `true` if this call performed the transition.
    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        change: &StatusChange,
    ) -> Result<bool, ConnectionsServiceError>;

    /// Accept a pending request and create its relationship, all or nothing.
    ///
    /// Returns `false` (and writes nothing) if the request is no longer pending.
    /// Fails with `ConnectionAlreadyExists` when the pair already has an active
    /// relationship.
    async fn accept(
        &self,
        id: Uuid,
        change: &StatusChange,
        relationship: &Relationship,
    ) -> Result<bool, ConnectionsServiceError>;

    /// Replace the OTP bookkeeping (attempts, state, code, expiry) with `next`
    /// only if the request is still pending and its stored challenge still equals
    /// `current`. Returns `false` if either no longer holds.
    async fn update_otp(
        &self,
        id: Uuid,
        current: &OtpChallenge,
        next: &OtpChallenge,
    ) -> Result<bool, ConnectionsServiceError>;

    /// Move `id` to `expired` only if it is still pending and its stored OTP
    /// window closed before `now`. Returns `true` if this call expired it.
    async fn expire_lapsed(&self, id: Uuid, now: DateTime<Utc>)
    -> Result<bool, ConnectionsServiceError>;

    /// Pending requests whose OTP window closed before `now`.
    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError>;
}

/// Doctor/patient relationships.
pub trait RelationshipRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Relationship>, ConnectionsServiceError>;

    async fn find_active(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Relationship>, ConnectionsServiceError>;

    async fn list_active_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Relationship>, ConnectionsServiceError>;

    async fn list_active_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Relationship>, ConnectionsServiceError>;

    /// Returns `true` if an active relationship was updated.
    async fn update_permissions(
        &self,
        id: Uuid,
        permissions: Permissions,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError>;

    /// Conditional `active -> terminated`. Returns `true` if this call terminated it.
    async fn terminate(&self, id: Uuid, at: DateTime<Utc>)
    -> Result<bool, ConnectionsServiceError>;
}

/// Per-recipient notification feed.
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), ConnectionsServiceError>;

    /// Disabled notifications are never returned.
    async fn list(
        &self,
        recipient_id: Uuid,
        include_read: bool,
        sort_by: NotificationSortBy,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ConnectionsServiceError>;

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, ConnectionsServiceError>;

    /// Returns `true` if a notification owned by `recipient_id` was found.
    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError>;

    /// Returns the number of notifications newly marked read.
    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ConnectionsServiceError>;

    /// Soft delete. Returns `true` if a notification owned by `recipient_id` was found.
    async fn disable(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError>;
}

/// Out-of-band delivery of OTP codes (email, SMS, in-app).
pub trait OtpTransport: Send + Sync {
    async fn deliver(&self, delivery: &OtpDelivery) -> Result<(), ConnectionsServiceError>;
}
