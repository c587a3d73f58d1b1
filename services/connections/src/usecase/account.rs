use chrono::Utc;
use uuid::Uuid;

use swasthya_domain::contact::{normalize_email, normalize_phone};
use swasthya_domain::role::AccountRole;

use crate::domain::repository::AccountRepository;
use crate::domain::types::Account;
use crate::error::ConnectionsServiceError;

const MAX_DISPLAY_NAME_LEN: usize = 120;

// ── RegisterAccount ──────────────────────────────────────────────────────────

pub struct RegisterAccountInput {
    pub role: AccountRole,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    pub specialization: Option<String>,
}

pub struct RegisterAccountUseCase<A: AccountRepository> {
    pub accounts: A,
}

impl<A: AccountRepository> RegisterAccountUseCase<A> {
    pub async fn execute(
        &self,
        input: RegisterAccountInput,
    ) -> Result<Account, ConnectionsServiceError> {
        let email = input.email.as_deref().and_then(normalize_email);
        let phone = input.phone.as_deref().and_then(normalize_phone);
        if email.is_none() && phone.is_none() {
            return Err(ConnectionsServiceError::MissingIdentifier);
        }

        let display_name = input.display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(ConnectionsServiceError::Validation(
                "display_name must be 1-120 characters",
            ));
        }

        let specialization = input
            .specialization
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        if specialization.is_some() && input.role != AccountRole::Doctor {
            return Err(ConnectionsServiceError::Validation(
                "specialization is only valid for doctors",
            ));
        }

        if let Some(email) = &email {
            if self
                .accounts
                .find_by_email(input.role, email)
                .await?
                .is_some()
            {
                return Err(ConnectionsServiceError::AccountAlreadyExists);
            }
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::now_v7(),
            role: input.role,
            email,
            phone,
            display_name: display_name.to_owned(),
            specialization,
            created_at: now,
            updated_at: now,
        };
        self.accounts.create(&account).await?;
        tracing::info!(account_id = %account.id, role = account.role.as_str(), "account registered");
        Ok(account)
    }
}

// ── GetAccount ───────────────────────────────────────────────────────────────

pub struct GetAccountUseCase<A: AccountRepository> {
    pub accounts: A,
}

impl<A: AccountRepository> GetAccountUseCase<A> {
    pub async fn execute(&self, id: Uuid) -> Result<Account, ConnectionsServiceError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(ConnectionsServiceError::AccountNotFound)
    }
}
