use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use swasthya_domain::contact::{emails_match, normalize_email, normalize_phone};
use swasthya_domain::pagination::Sort;
use swasthya_domain::role::AccountRole;

use crate::domain::otp::OtpChallenge;

// ── Accounts ─────────────────────────────────────────────────────────────────

/// A registered party. Email (if any) is stored normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub role: AccountRole,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    pub specialization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial identity used to look a party up: any subset of id, email, phone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyLookup {
    pub id: Option<Uuid>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PartyLookup {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Normalise contact fields, dropping blanks.
    pub fn normalized(self) -> Self {
        Self {
            id: self.id,
            email: self.email.as_deref().and_then(normalize_email),
            phone: self.phone.as_deref().and_then(normalize_phone),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

/// Outcome of identity resolution.
///
/// `Unregistered` is a placeholder for an email nobody has signed up with yet.
/// It is never a confirmed identity and must not pass an ownership check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Party {
    Registered(Account),
    Unregistered { email: String },
}

impl Party {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Registered(account) => Some(account),
            Self::Unregistered { .. } => None,
        }
    }

    pub fn account_id(&self) -> Option<Uuid> {
        self.account().map(|a| a.id)
    }
}

// ── Connection requests ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMethod {
    Direct,
    Email,
    Otp,
    Qr,
}

impl ConnectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Email => "email",
            Self::Otp => "otp",
            Self::Qr => "qr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "email" => Some(Self::Email),
            "otp" => Some(Self::Otp),
            "qr" => Some(Self::Qr),
            _ => None,
        }
    }

    pub fn requires_otp(self) -> bool {
        self != Self::Direct
    }
}

/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Contact points of whoever is acting on a request, taken from their account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&Account> for Caller {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            phone: account.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub method: ConnectionMethod,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub reason: Option<String>,
    pub otp: Option<OtpChallenge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRequest {
    /// The one ownership rule for the patient side of a request. A request bound
    /// to an account belongs to that account alone; an unbound one matches the
    /// caller by case-insensitive email or by phone.
    pub fn is_addressed_to(&self, caller: &Caller) -> bool {
        if let Some(patient_id) = self.patient_id {
            return patient_id == caller.id;
        }
        if let (Some(ours), Some(theirs)) = (&self.patient_email, &caller.email) {
            if emails_match(ours, theirs) {
                return true;
            }
        }
        matches!(
            (&self.patient_phone, &caller.phone),
            (Some(ours), Some(theirs)) if ours == theirs
        )
    }

    /// Whether this request targets the party described by `target`.
    pub fn targets(&self, target: &PartyLookup) -> bool {
        let by_id = target.id.is_some() && self.patient_id == target.id;
        let by_email = match (&self.patient_email, &target.email) {
            (Some(ours), Some(theirs)) => emails_match(ours, theirs),
            _ => false,
        };
        let by_phone = target.phone.is_some() && self.patient_phone == target.phone;
        by_id || by_email || by_phone
    }

    /// A pending request whose OTP window has elapsed at `now`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Pending
            && self.otp.as_ref().is_some_and(|otp| otp.is_elapsed(now))
    }
}

/// Extra columns written together with a conditional status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub patient_id: Option<Uuid>,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            patient_id: None,
            reason: None,
            at,
        }
    }
}

// ── Relationships ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Active,
    Terminated,
}

impl RelationshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub prescriptions: bool,
    pub records: bool,
    pub emergency: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            prescriptions: true,
            records: false,
            emergency: false,
        }
    }
}

/// Partial permission update; `None` leaves a flag unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionsPatch {
    pub prescriptions: Option<bool>,
    pub records: Option<bool>,
    pub emergency: Option<bool>,
}

impl PermissionsPatch {
    pub fn is_empty(&self) -> bool {
        self.prescriptions.is_none() && self.records.is_none() && self.emergency.is_none()
    }

    pub fn apply(self, current: Permissions) -> Permissions {
        Permissions {
            prescriptions: self.prescriptions.unwrap_or(current.prescriptions),
            records: self.records.unwrap_or(current.records),
            emergency: self.emergency.unwrap_or(current.emergency),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub request_id: Option<Uuid>,
    pub status: RelationshipStatus,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.patient_id == account_id || self.doctor_id == account_id
    }

    /// The other party from `account_id`'s point of view.
    pub fn peer_of(&self, account_id: Uuid) -> Uuid {
        if self.patient_id == account_id {
            self.doctor_id
        } else {
            self.patient_id
        }
    }
}

/// A relationship joined with the account on the other end.
#[derive(Debug, Clone)]
pub struct Connection {
    pub relationship_id: Uuid,
    pub peer: Account,
    pub permissions: Permissions,
    pub connected_at: DateTime<Utc>,
}

// ── Notifications ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ConnectionRequest,
    ConnectionAccepted,
    ConnectionRejected,
    ConnectionTerminated,
    PermissionsUpdated,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRequest => "connection_request",
            Self::ConnectionAccepted => "connection_accepted",
            Self::ConnectionRejected => "connection_rejected",
            Self::ConnectionTerminated => "connection_terminated",
            Self::PermissionsUpdated => "permissions_updated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connection_request" => Some(Self::ConnectionRequest),
            "connection_accepted" => Some(Self::ConnectionAccepted),
            "connection_rejected" => Some(Self::ConnectionRejected),
            "connection_terminated" => Some(Self::ConnectionTerminated),
            "permissions_updated" => Some(Self::PermissionsUpdated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub priority: Priority,
    pub read_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Sort options for notification list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSortBy {
    CreatedAt(Sort),
}

impl Default for NotificationSortBy {
    fn default() -> Self {
        Self::CreatedAt(Sort::Desc)
    }
}

impl NotificationSortBy {
    pub fn from_kebab_case(s: &str) -> Option<Self> {
        match s {
            "created-at-desc" => Some(Self::CreatedAt(Sort::Desc)),
            "created-at-asc" => Some(Self::CreatedAt(Sort::Asc)),
            _ => None,
        }
    }
}

// ── OTP delivery ─────────────────────────────────────────────────────────────

pub const OTP_PURPOSE_CONNECTION_REQUEST: &str = "connection_request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Email,
    Sms,
    InApp,
}

/// A code to hand to the transport. Carries the code itself, so it must never
/// be logged or returned over the API.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpDelivery {
    pub purpose: &'static str,
    pub request_id: Uuid,
    pub channel: OtpChannel,
    pub recipient: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpDelivery {
    /// Pick the channel from the request's contact points: email, then phone,
    /// then the registered patient's in-app feed.
    pub fn for_request(request: &ConnectionRequest, otp: &OtpChallenge) -> Option<Self> {
        let (channel, recipient) = if let Some(email) = &request.patient_email {
            (OtpChannel::Email, email.clone())
        } else if let Some(phone) = &request.patient_phone {
            (OtpChannel::Sms, phone.clone())
        } else {
            (OtpChannel::InApp, request.patient_id?.to_string())
        };
        Some(Self {
            purpose: OTP_PURPOSE_CONNECTION_REQUEST,
            request_id: request.id,
            channel,
            recipient,
            code: otp.code.clone(),
            expires_at: otp.expires_at,
        })
    }
}

impl std::fmt::Debug for OtpDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpDelivery")
            .field("purpose", &self.purpose)
            .field("request_id", &self.request_id)
            .field("channel", &self.channel)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
