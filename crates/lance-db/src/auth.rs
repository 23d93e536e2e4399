use async_trait::async_trait;

use crate::error::DbError;

/// Account as known by the auth provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub email_confirmed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Accounts and sessions. Profiles live in the `usuarios` table; this trait
/// only deals with credentials.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account with the e-mail already confirmed.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, DbError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), DbError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, DbError>;

    async fn refresh(&self, refresh_token: &str) -> Result<Session, DbError>;

    /// Resolve a bearer token to its account.
    async fn verify(&self, access_token: &str) -> Result<AuthUser, DbError>;
}
