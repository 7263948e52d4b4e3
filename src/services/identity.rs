use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, TokenKeys};
use crate::domain::{Account, Amount, NewAccount};
use crate::dto::{LoginRequest, RegisterRequest};
use crate::error::{AppError, Result};
use crate::storage::Storage;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_USERNAME_LENGTH: usize = 32;

/// A freshly issued token and the account it belongs to.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub account: Account,
}

pub struct IdentityService {
    storage: Arc<dyn Storage>,
    tokens: Arc<TokenKeys>,
    starting_balance: Amount,
}

impl IdentityService {
    pub fn new(storage: Arc<dyn Storage>, tokens: Arc<TokenKeys>, starting_balance: Amount) -> Self {
        Self {
            storage,
            tokens,
            starting_balance,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_lowercase();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(AppError::validation(format!(
                "username must be 1 to {MAX_USERNAME_LENGTH} characters"
            )));
        }
        if !EMAIL.is_match(&email) {
            return Err(AppError::validation("email is not valid"));
        }
        if req.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let password_hash = hash_blocking(req.password).await?;
        let account = self
            .storage
            .create_account(NewAccount::new(
                username,
                email,
                password_hash,
                self.starting_balance,
            ))
            .await?;
        info!(account_id = %account.id, username = %account.username, "Account registered");

        let token = self.tokens.issue(account.id)?;
        Ok(AuthSession { token, account })
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession> {
        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

        let Some(account) = self
            .storage
            .get_account_by_email(req.email.trim())
            .await?
        else {
            warn!("Login attempt for unknown email");
            return Err(invalid());
        };

        let stored = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || auth::verify_password(&req.password, &stored))
            .await
            .map_err(|e| AppError::Internal(format!("password check panicked: {e}")))?;
        if !matches {
            warn!(account_id = %account.id, "Login attempt with wrong password");
            return Err(invalid());
        }

        let token = self.tokens.issue(account.id)?;
        Ok(AuthSession { token, account })
    }

    pub async fn me(&self, account_id: Uuid) -> Result<Account> {
        self.storage
            .get_account_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("Account"))
    }
}

// Argon2 hashing blocks; run it on the blocking pool.
async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn service() -> IdentityService {
        IdentityService::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(TokenKeys::new("identity-test-secret-0123456789abcdef", 1)),
            500,
        )
    }

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn test_register_grants_starting_balance() {
        let identity = service();
        let session = identity
            .register(register("ann", "Ann@Example.com"))
            .await
            .unwrap();
        assert_eq!(session.account.wallet, 500);
        assert_eq!(session.account.email, "ann@example.com");
        assert_ne!(session.account.password_hash, "hunter22");
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let identity = service();
        identity.register(register("ann", "ann@example.com")).await.unwrap();

        let same_name = identity
            .register(register("ANN", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(same_name, AppError::Conflict(_)));
        let same_email = identity
            .register(register("bob", "ann@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(same_email, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let identity = service();
        assert!(matches!(
            identity.register(register(" ", "ann@example.com")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            identity.register(register("ann", "not-an-email")).await,
            Err(AppError::Validation(_))
        ));
        let mut short = register("ann", "ann@example.com");
        short.password = "123".into();
        assert!(matches!(
            identity.register(short).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login() {
        let identity = service();
        let registered = identity
            .register(register("ann", "ann@example.com"))
            .await
            .unwrap();

        let session = identity
            .login(LoginRequest {
                email: "ann@example.com".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.account.id, registered.account.id);

        for (email, password) in [("ann@example.com", "wrong!!"), ("nobody@example.com", "hunter22")] {
            let err = identity
                .login(LoginRequest {
                    email: email.into(),
                    password: password.into(),
                })
                .await
                .unwrap_err();
            match err {
                AppError::Unauthorized(msg) => assert_eq!(msg, "Invalid credentials"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_me_unknown_account() {
        let identity = service();
        assert!(matches!(
            identity.me(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
