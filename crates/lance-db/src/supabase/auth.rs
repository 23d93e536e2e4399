use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::{SupabaseClient, send, send_json};
use crate::auth::{AuthProvider, AuthUser, Session};
use crate::error::DbError;

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    email_confirmed_at: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(u: GoTrueUser) -> Self {
        Self {
            id: u.id,
            email: u.email,
            email_confirmed_at: u.email_confirmed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: String,
    user: GoTrueUser,
}

impl From<GoTrueSession> for Session {
    fn from(s: GoTrueSession) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            user: s.user.into(),
        }
    }
}

/// Credential failures (4xx) become `Auth` so callers can answer 401.
fn as_auth_error(e: DbError) -> DbError {
    match e {
        DbError::Backend { status, message } if (400..500).contains(&status) => DbError::Auth(message),
        other => other,
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, DbError> {
        let req = self.admin(Method::POST, "/auth/v1/admin/users").json(&json!({
            "email": email,
            "password": password,
            "email_confirm": true,
            "user_metadata": { "nome": display_name },
        }));
        let user: GoTrueUser = send_json(req).await.map_err(as_auth_error)?;
        Ok(user.into())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), DbError> {
        let req = self.admin(Method::DELETE, &format!("/auth/v1/admin/users/{user_id}"));
        send(req).await?;
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, DbError> {
        let req = self
            .public(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let session: GoTrueSession = send_json(req).await.map_err(as_auth_error)?;
        Ok(session.into())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, DbError> {
        let req = self
            .public(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let session: GoTrueSession = send_json(req).await.map_err(as_auth_error)?;
        Ok(session.into())
    }

    async fn verify(&self, access_token: &str) -> Result<AuthUser, DbError> {
        let req = self.public(Method::GET, "/auth/v1/user", Some(access_token));
        let user: GoTrueUser = send_json(req).await.map_err(as_auth_error)?;
        Ok(user.into())
    }
}
