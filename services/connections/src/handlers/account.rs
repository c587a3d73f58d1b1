use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use swasthya_core::envelope::Envelope;
use swasthya_domain::role::AccountRole;

use crate::domain::types::Account;
use crate::error::ConnectionsServiceError;
use crate::state::AppState;
use crate::usecase::account::{GetAccountUseCase, RegisterAccountInput, RegisterAccountUseCase};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub role: AccountRole,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(serialize_with = "swasthya_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            role: account.role,
            email: account.email,
            phone: account.phone,
            display_name: account.display_name,
            specialization: account.specialization,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct AccountBody {
    pub account: AccountResponse,
}

// ── POST /accounts ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterAccountRequest {
    pub role: AccountRole,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    pub specialization: Option<String>,
}

pub async fn register_account(
    State(state): State<AppState>,
    Json(body): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Envelope<AccountBody>), ConnectionsServiceError> {
    let usecase = RegisterAccountUseCase {
        accounts: state.account_repo(),
    };
    let account = usecase
        .execute(RegisterAccountInput {
            role: body.role,
            email: body.email,
            phone: body.phone,
            display_name: body.display_name,
            specialization: body.specialization,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Envelope::ok(AccountBody {
            account: account.into(),
        }),
    ))
}

// ── GET /accounts/{id} ───────────────────────────────────────────────────────

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<AccountBody>, ConnectionsServiceError> {
    let usecase = GetAccountUseCase {
        accounts: state.account_repo(),
    };
    let account = usecase.execute(id).await?;
    Ok(Envelope::ok(AccountBody {
        account: account.into(),
    }))
}
