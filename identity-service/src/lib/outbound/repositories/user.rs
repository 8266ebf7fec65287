use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::FederatedLink;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChange;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserRecord;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::UserError;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserRecord>,
    /// Unique index: normalized email -> id
    emails: HashMap<EmailAddress, UserId>,
    /// Provider subject -> link
    links: HashMap<String, FederatedLink>,
}

/// User repository backed by process memory.
///
/// One lock guards the record table and both indexes, so registration and
/// every field change are atomic.
#[derive(Default)]
pub struct InMemoryUserRepository {
    tables: RwLock<Tables>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, record: UserRecord) -> Result<UserRecord, UserError> {
        let mut tables = self.tables.write().await;

        if tables.emails.contains_key(&record.user.email) {
            return Err(UserError::EmailAlreadyExists(
                record.user.email.to_string(),
            ));
        }

        tables
            .emails
            .insert(record.user.email.clone(), record.user.id);
        tables.users.insert(record.user.id, record.clone());

        Ok(record)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, UserError> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, UserError> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn apply(&self, id: &UserId, change: UserChange) -> Result<Option<User>, UserError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.users.get_mut(id) else {
            return Ok(None);
        };

        match change {
            UserChange::MfaEnabled(enabled) => record.user.mfa_enabled = enabled,
            UserChange::Status(status) => record.user.status = status,
        }

        Ok(Some(record.user.clone()))
    }

    async fn create_link(&self, link: FederatedLink) -> Result<(), UserError> {
        self.tables
            .write()
            .await
            .links
            .insert(link.subject.clone(), link);
        Ok(())
    }

    async fn find_link(&self, subject: &str) -> Result<Option<FederatedLink>, UserError> {
        Ok(self.tables.read().await.links.get(subject).cloned())
    }
}
