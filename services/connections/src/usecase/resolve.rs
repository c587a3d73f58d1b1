use swasthya_domain::role::AccountRole;

use crate::domain::repository::AccountRepository;
use crate::domain::types::{Account, Party, PartyLookup};
use crate::error::ConnectionsServiceError;

/// Turns a partial identity into a registered account or an email placeholder.
///
/// Lookups are role-scoped and tried in order: id, email, phone. A miss on an
/// id falls through to the contact fields. A placeholder is only produced when
/// the caller supplied no id at all.
pub struct IdentityResolver<A: AccountRepository> {
    pub accounts: A,
}

impl<A: AccountRepository> IdentityResolver<A> {
    pub async fn resolve(
        &self,
        role: AccountRole,
        lookup: &PartyLookup,
    ) -> Result<Party, ConnectionsServiceError> {
        if lookup.is_empty() {
            return Err(ConnectionsServiceError::MissingIdentifier);
        }
        if let Some(account) = self.find_registered(role, lookup).await? {
            return Ok(Party::Registered(account));
        }
        match (lookup.id, &lookup.email) {
            (None, Some(email)) => Ok(Party::Unregistered {
                email: email.clone(),
            }),
            _ => Err(ConnectionsServiceError::AccountNotFound),
        }
    }

    /// Like [`resolve`](Self::resolve) but never yields a placeholder.
    pub async fn resolve_registered(
        &self,
        role: AccountRole,
        lookup: &PartyLookup,
    ) -> Result<Account, ConnectionsServiceError> {
        if lookup.is_empty() {
            return Err(ConnectionsServiceError::MissingIdentifier);
        }
        self.find_registered(role, lookup)
            .await?
            .ok_or(ConnectionsServiceError::AccountNotFound)
    }

    async fn find_registered(
        &self,
        role: AccountRole,
        lookup: &PartyLookup,
    ) -> Result<Option<Account>, ConnectionsServiceError> {
        if let Some(id) = lookup.id {
            if let Some(account) = self.accounts.find_by_id(id).await? {
                if account.role == role {
                    return Ok(Some(account));
                }
            }
        }
        if let Some(email) = &lookup.email {
            if let Some(account) = self.accounts.find_by_email(role, email).await? {
                return Ok(Some(account));
            }
        }
        if let Some(phone) = &lookup.phone {
            if let Some(account) = self.accounts.find_by_phone(role, phone).await? {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }
}
