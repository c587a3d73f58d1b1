use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use swasthya_connections::domain::otp::OtpChallenge;
use swasthya_connections::domain::repository::{
    AccountRepository, ConnectionRequestRepository, NotificationRepository, OtpTransport,
    RelationshipRepository,
};
use swasthya_connections::domain::types::{
    Account, ConnectionRequest, Notification, NotificationSortBy, OtpDelivery, PartyLookup,
    Permissions, Relationship, RelationshipStatus, RequestStatus, StatusChange,
};
use swasthya_connections::error::ConnectionsServiceError;
use swasthya_connections::usecase::connection::{
    AcceptRequestInput, AcceptRequestUseCase, CreateConnectionRequestInput,
    CreateConnectionRequestUseCase, GetPendingRequestsUseCase, RejectRequestUseCase,
    ResendOtpUseCase,
};
use swasthya_connections::usecase::notification::NotificationEmitter;
use swasthya_connections::usecase::relationship::{
    GetConnectedDoctorsUseCase, TerminateRelationshipUseCase,
};
use swasthya_connections::usecase::resolve::IdentityResolver;
use swasthya_domain::pagination::{PageRequest, Sort};
use swasthya_domain::role::AccountRole;

// ── MemoryStore ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Tables {
    pub accounts: Vec<Account>,
    pub requests: Vec<ConnectionRequest>,
    pub relationships: Vec<Relationship>,
    pub notifications: Vec<Notification>,
    pub deliveries: Vec<OtpDelivery>,
}

/// In-memory implementation of every store port, with the same conditional
/// write rules as the database (status preconditions and uniqueness).
///
/// Each call yields once before touching the tables so concurrent use cases
/// driven by `tokio::join!` interleave.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_notifications: bool,
    fail_transport: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same tables, but every notification write fails.
    pub fn failing_notifications(&self) -> Self {
        Self {
            fail_notifications: true,
            ..self.clone()
        }
    }

    /// Same tables, but every OTP delivery fails.
    pub fn failing_transport(&self) -> Self {
        Self {
            fail_transport: true,
            ..self.clone()
        }
    }

    pub fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn seed_account(
        &self,
        role: AccountRole,
        email: Option<&str>,
        phone: Option<&str>,
        display_name: &str,
    ) -> Account {
        let now = Utc::now();
        let account = Account {
            id: Uuid::now_v7(),
            role,
            email: email.map(|e| e.trim().to_lowercase()),
            phone: phone.map(str::to_owned),
            display_name: display_name.to_owned(),
            specialization: (role == AccountRole::Doctor).then(|| "General Medicine".to_owned()),
            created_at: now,
            updated_at: now,
        };
        self.tables().accounts.push(account.clone());
        account
    }

    pub fn request(&self, id: Uuid) -> ConnectionRequest {
        self.tables()
            .requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap()
    }

    /// The code most recently issued for `id`.
    pub fn code_for(&self, id: Uuid) -> String {
        self.request(id).otp.unwrap().code
    }

    /// Push the request's OTP window into the past.
    pub fn lapse_otp(&self, id: Uuid) {
        let mut tables = self.tables();
        let request = tables.requests.iter_mut().find(|r| r.id == id).unwrap();
        if let Some(otp) = request.otp.as_mut() {
            otp.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub fn relationships_between(&self, patient_id: Uuid, doctor_id: Uuid) -> Vec<Relationship> {
        self.tables()
            .relationships
            .iter()
            .filter(|r| r.patient_id == patient_id && r.doctor_id == doctor_id)
            .cloned()
            .collect()
    }

    pub fn notifications_for(&self, recipient_id: Uuid) -> Vec<Notification> {
        self.tables()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn deliveries(&self) -> Vec<OtpDelivery> {
        self.tables().deliveries.clone()
    }
}

async fn tick() {
    tokio::task::yield_now().await;
}

fn matches_target(request: &ConnectionRequest, target: &PartyLookup) -> bool {
    request.targets(target)
}

impl AccountRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, ConnectionsServiceError> {
        tick().await;
        Ok(self.tables().accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_email(
        &self,
        role: AccountRole,
        email: &str,
    ) -> Result<Option<Account>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .accounts
            .iter()
            .find(|a| a.role == role && a.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_phone(
        &self,
        role: AccountRole,
        phone: &str,
    ) -> Result<Option<Account>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .accounts
            .iter()
            .find(|a| a.role == role && a.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn create(&self, account: &Account) -> Result<(), ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let taken = account.email.is_some()
            && tables
                .accounts
                .iter()
                .any(|a| a.role == account.role && a.email == account.email);
        if taken {
            return Err(ConnectionsServiceError::AccountAlreadyExists);
        }
        tables.accounts.push(account.clone());
        Ok(())
    }
}

impl ConnectionRequestRepository for MemoryStore {
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<ConnectionRequest>, ConnectionsServiceError> {
        tick().await;
        Ok(self.tables().requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_pending_for_target(
        &self,
        doctor_id: Uuid,
        target: &PartyLookup,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .requests
            .iter()
            .filter(|r| {
                r.doctor_id == doctor_id
                    && r.status == RequestStatus::Pending
                    && matches_target(r, target)
            })
            .cloned()
            .collect())
    }

    async fn list_pending_for_patient(
        &self,
        patient: &PartyLookup,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError> {
        tick().await;
        let mut pending: Vec<_> = self
            .tables()
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending && matches_target(r, patient))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn create_superseding(
        &self,
        request: &ConnectionRequest,
        supersede: &[Uuid],
    ) -> Result<(), ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let still_pending = |r: &ConnectionRequest| {
            r.status == RequestStatus::Pending && !supersede.contains(&r.id)
        };
        let duplicate = request.patient_id.is_some()
            && tables.requests.iter().any(|r| {
                still_pending(r)
                    && r.doctor_id == request.doctor_id
                    && r.patient_id == request.patient_id
            });
        if duplicate {
            return Err(ConnectionsServiceError::ConnectionAlreadyExists);
        }
        for r in tables.requests.iter_mut() {
            if supersede.contains(&r.id) && r.status == RequestStatus::Pending {
                r.status = RequestStatus::Cancelled;
                r.updated_at = request.created_at;
            }
        }
        tables.requests.push(request.clone());
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        change: &StatusChange,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(request) = tables
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.status == from)
        else {
            return Ok(false);
        };
        apply_change(request, to, change);
        Ok(true)
    }

    async fn accept(
        &self,
        id: Uuid,
        change: &StatusChange,
        relationship: &Relationship,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let pending = tables
            .requests
            .iter()
            .any(|r| r.id == id && r.status == RequestStatus::Pending);
        if !pending {
            return Ok(false);
        }
        let duplicate = tables.relationships.iter().any(|r| {
            r.status == RelationshipStatus::Active
                && r.patient_id == relationship.patient_id
                && r.doctor_id == relationship.doctor_id
        });
        if duplicate {
            return Err(ConnectionsServiceError::ConnectionAlreadyExists);
        }
        if let Some(request) = tables.requests.iter_mut().find(|r| r.id == id) {
            apply_change(request, RequestStatus::Accepted, change);
        }
        tables.relationships.push(relationship.clone());
        Ok(true)
    }

    async fn update_otp(
        &self,
        id: Uuid,
        current: &OtpChallenge,
        next: &OtpChallenge,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(request) = tables.requests.iter_mut().find(|r| {
            r.id == id && r.status == RequestStatus::Pending && r.otp.as_ref() == Some(current)
        }) else {
            return Ok(false);
        };
        request.otp = Some(next.clone());
        request.updated_at = Utc::now();
        Ok(true)
    }

    async fn expire_lapsed(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(request) = tables.requests.iter_mut().find(|r| {
            r.id == id
                && r.status == RequestStatus::Pending
                && r.otp.as_ref().is_some_and(|otp| otp.expires_at < now)
        }) else {
            return Ok(false);
        };
        apply_change(request, RequestStatus::Expired, &StatusChange::at(now));
        Ok(true)
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionRequest>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .requests
            .iter()
            .filter(|r| {
                r.status == RequestStatus::Pending
                    && r.otp.as_ref().is_some_and(|otp| otp.expires_at < now)
            })
            .cloned()
            .collect())
    }
}

fn apply_change(request: &mut ConnectionRequest, to: RequestStatus, change: &StatusChange) {
    request.status = to;
    request.updated_at = change.at;
    if change.patient_id.is_some() {
        request.patient_id = change.patient_id;
    }
    if change.reason.is_some() {
        request.reason = change.reason.clone();
    }
}

impl RelationshipRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Relationship>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .relationships
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_active(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Relationship>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .relationships
            .iter()
            .find(|r| {
                r.patient_id == patient_id
                    && r.doctor_id == doctor_id
                    && r.status == RelationshipStatus::Active
            })
            .cloned())
    }

    async fn list_active_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Relationship>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .relationships
            .iter()
            .filter(|r| r.patient_id == patient_id && r.status == RelationshipStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_active_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Relationship>, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .relationships
            .iter()
            .filter(|r| r.doctor_id == doctor_id && r.status == RelationshipStatus::Active)
            .cloned()
            .collect())
    }

    async fn update_permissions(
        &self,
        id: Uuid,
        permissions: Permissions,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(relationship) = tables
            .relationships
            .iter_mut()
            .find(|r| r.id == id && r.status == RelationshipStatus::Active)
        else {
            return Ok(false);
        };
        relationship.permissions = permissions;
        relationship.updated_at = at;
        Ok(true)
    }

    async fn terminate(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(relationship) = tables
            .relationships
            .iter_mut()
            .find(|r| r.id == id && r.status == RelationshipStatus::Active)
        else {
            return Ok(false);
        };
        relationship.status = RelationshipStatus::Terminated;
        relationship.updated_at = at;
        Ok(true)
    }
}

impl NotificationRepository for MemoryStore {
    async fn create(&self, notification: &Notification) -> Result<(), ConnectionsServiceError> {
        tick().await;
        if self.fail_notifications {
            return Err(ConnectionsServiceError::Unavailable);
        }
        self.tables().notifications.push(notification.clone());
        Ok(())
    }

    async fn list(
        &self,
        recipient_id: Uuid,
        include_read: bool,
        sort_by: NotificationSortBy,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ConnectionsServiceError> {
        tick().await;
        let mut feed: Vec<_> = self
            .tables()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && n.disabled_at.is_none())
            .filter(|n| include_read || n.read_at.is_none())
            .cloned()
            .collect();
        match sort_by {
            NotificationSortBy::CreatedAt(Sort::Desc) => {
                feed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
            NotificationSortBy::CreatedAt(Sort::Asc) => {
                feed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            }
        }
        Ok(feed
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, ConnectionsServiceError> {
        tick().await;
        Ok(self
            .tables()
            .notifications
            .iter()
            .filter(|n| {
                n.recipient_id == recipient_id && n.disabled_at.is_none() && n.read_at.is_none()
            })
            .count() as u64)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(notification) = tables.notifications.iter_mut().find(|n| {
            n.id == id && n.recipient_id == recipient_id && n.disabled_at.is_none()
        }) else {
            return Ok(false);
        };
        notification.read_at.get_or_insert(at);
        Ok(true)
    }

    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ConnectionsServiceError> {
        tick().await;
        let mut updated = 0;
        for n in self.tables().notifications.iter_mut() {
            if n.recipient_id == recipient_id && n.disabled_at.is_none() && n.read_at.is_none() {
                n.read_at = Some(at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn disable(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConnectionsServiceError> {
        tick().await;
        let mut tables = self.tables();
        let Some(notification) = tables.notifications.iter_mut().find(|n| {
            n.id == id && n.recipient_id == recipient_id && n.disabled_at.is_none()
        }) else {
            return Ok(false);
        };
        notification.disabled_at = Some(at);
        Ok(true)
    }
}

impl OtpTransport for MemoryStore {
    async fn deliver(&self, delivery: &OtpDelivery) -> Result<(), ConnectionsServiceError> {
        tick().await;
        if self.fail_transport {
            return Err(ConnectionsServiceError::Unavailable);
        }
        self.tables().deliveries.push(delivery.clone());
        Ok(())
    }
}

// ── Use case wiring ──────────────────────────────────────────────────────────

pub type CreateUseCase =
    CreateConnectionRequestUseCase<MemoryStore, MemoryStore, MemoryStore, MemoryStore, MemoryStore>;

pub fn create_usecase(store: &MemoryStore) -> CreateUseCase {
    CreateConnectionRequestUseCase {
        resolver: IdentityResolver {
            accounts: store.clone(),
        },
        requests: store.clone(),
        relationships: store.clone(),
        notifier: NotificationEmitter {
            repo: store.clone(),
        },
        transport: store.clone(),
    }
}

pub fn accept_usecase(
    store: &MemoryStore,
) -> AcceptRequestUseCase<MemoryStore, MemoryStore, MemoryStore, MemoryStore> {
    AcceptRequestUseCase {
        accounts: store.clone(),
        requests: store.clone(),
        relationships: store.clone(),
        notifier: NotificationEmitter {
            repo: store.clone(),
        },
    }
}

pub fn reject_usecase(
    store: &MemoryStore,
) -> RejectRequestUseCase<MemoryStore, MemoryStore, MemoryStore> {
    RejectRequestUseCase {
        accounts: store.clone(),
        requests: store.clone(),
        notifier: NotificationEmitter {
            repo: store.clone(),
        },
    }
}

pub fn resend_usecase(store: &MemoryStore) -> ResendOtpUseCase<MemoryStore, MemoryStore, MemoryStore> {
    ResendOtpUseCase {
        accounts: store.clone(),
        requests: store.clone(),
        transport: store.clone(),
    }
}

pub fn pending_usecase(store: &MemoryStore) -> GetPendingRequestsUseCase<MemoryStore, MemoryStore> {
    GetPendingRequestsUseCase {
        accounts: store.clone(),
        requests: store.clone(),
    }
}

pub fn doctors_usecase(store: &MemoryStore) -> GetConnectedDoctorsUseCase<MemoryStore, MemoryStore> {
    GetConnectedDoctorsUseCase {
        accounts: store.clone(),
        relationships: store.clone(),
    }
}

pub fn terminate_usecase(
    store: &MemoryStore,
) -> TerminateRelationshipUseCase<MemoryStore, MemoryStore> {
    TerminateRelationshipUseCase {
        relationships: store.clone(),
        notifier: NotificationEmitter {
            repo: store.clone(),
        },
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub struct Cast {
    pub store: MemoryStore,
    pub doctor: Account,
    pub patient: Account,
}

/// A registered doctor and a registered patient with email and phone on file.
pub fn cast() -> Cast {
    let store = MemoryStore::new();
    let doctor = store.seed_account(
        AccountRole::Doctor,
        Some("dr.mehta@clinic.example"),
        None,
        "Mehta",
    );
    let patient = store.seed_account(
        AccountRole::Patient,
        Some("asha@example.com"),
        Some("+919845012345"),
        "Asha Rao",
    );
    Cast {
        store,
        doctor,
        patient,
    }
}

pub fn to_patient_id(patient_id: Uuid, method: &str) -> CreateConnectionRequestInput {
    CreateConnectionRequestInput {
        patient_id: Some(patient_id),
        patient_email: None,
        patient_phone: None,
        method: method.to_owned(),
        message: None,
    }
}

pub fn to_email(email: &str, method: &str) -> CreateConnectionRequestInput {
    CreateConnectionRequestInput {
        patient_id: None,
        patient_email: Some(email.to_owned()),
        patient_phone: None,
        method: method.to_owned(),
        message: Some("Please connect so I can send your prescriptions".to_owned()),
    }
}

pub fn with_otp(code: &str) -> AcceptRequestInput {
    AcceptRequestInput {
        otp: Some(code.to_owned()),
        patient_email: None,
    }
}

/// A code guaranteed not to match `code`.
pub fn wrong_code(code: &str) -> String {
    if code == "100000" {
        "100001".to_owned()
    } else {
        "100000".to_owned()
    }
}
