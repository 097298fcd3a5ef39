use std::sync::Arc;

use taskdesk_core::user::{CreateUser, LoginInput, RegisterInput, User};
use taskdesk_core::ValidationErrors;
use taskdesk_db::{Database, DbError};
use tracing::info;

use crate::password::{hash_password, verify_password};
use crate::{ServiceError, UNAUTHORIZED};

const EMAIL_TAKEN: &str = "The email has already been taken.";

/// Registration, credential checks and identity lookup.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<dyn Database>,
}

impl AccountService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<User, ServiceError> {
        let account = input.validate()?;
        if self.db.find_user_by_email(&account.email).await?.is_some() {
            return Err(ValidationErrors::single("email", EMAIL_TAKEN).into());
        }

        let password = account.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))??;

        let user = self
            .db
            .create_user(&CreateUser {
                name: account.name,
                email: account.email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent registration
                DbError::Conflict(_) => ValidationErrors::single("email", EMAIL_TAKEN).into(),
                other => ServiceError::from(other),
            })?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check an email/password pair. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, input: &LoginInput) -> Result<User, ServiceError> {
        let login = input.validate()?;
        let Some(creds) = self.db.find_user_by_email(&login.email).await? else {
            return Err(ServiceError::Unauthenticated(UNAUTHORIZED.into()));
        };

        let hash = creds.password_hash;
        let password = login.password;
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))??;
        if !matches {
            return Err(ServiceError::Unauthenticated(UNAUTHORIZED.into()));
        }
        Ok(creds.user)
    }

    pub async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        match self.db.get_user(id).await {
            Ok(user) => Ok(user),
            Err(DbError::NotFound(_)) => Err(ServiceError::NotFound("User not found".into())),
            Err(e) => Err(e.into()),
        }
    }
}
