use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{AuthProvider, AuthUser, Session};
use crate::error::DbError;
use crate::sqlite::Database;

const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
    exp: usize,
}

/// Accounts kept in the local SQLite database (`auth_users`), with HS256
/// access tokens and rotating opaque refresh tokens.
#[derive(Clone)]
pub struct LocalAuth {
    db: Database,
    jwt_secret: String,
}

impl LocalAuth {
    pub fn new(db: Database, jwt_secret: impl Into<String>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
        }
    }

    fn access_token(&self, user: &AuthUser) -> Result<String, DbError> {
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: (chrono::Utc::now() + chrono::Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp()
                as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| DbError::Internal(format!("token encode failed: {e}")))
    }

    async fn issue_session(&self, user: AuthUser) -> Result<Session, DbError> {
        let access_token = self.access_token(&user)?;
        let refresh_token = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());

        let token = refresh_token.clone();
        let user_id = user.id.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO auth_refresh_tokens (token, user_id) VALUES (?1, ?2)",
                    rusqlite::params![token, user_id],
                )?;
                Ok(())
            })
            .await?;

        Ok(Session {
            access_token,
            refresh_token,
            user,
        })
    }

    async fn find_user(&self, user_id: String) -> Result<Option<AuthUser>, DbError> {
        self.db
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, email, email_confirmed_at FROM auth_users WHERE id = ?1",
                        [user_id],
                        |r| {
                            Ok(AuthUser {
                                id: r.get(0)?,
                                email: r.get(1)?,
                                email_confirmed_at: r.get(2)?,
                            })
                        },
                    )
                    .optional()?)
            })
            .await
    }
}

fn invalid_credentials() -> DbError {
    DbError::Auth("Invalid login credentials".into())
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, DbError> {
        if password.len() < 6 {
            return Err(DbError::Auth(
                "Password should be at least 6 characters".into(),
            ));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| DbError::Internal(format!("password hash failed: {e}")))
        })
        .await??;

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.trim().to_lowercase()),
            email_confirmed_at: Some(chrono::Utc::now().to_rfc3339()),
        };

        let row = user.clone();
        let display_name = display_name.to_string();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO auth_users (id, email, password_hash, display_name, email_confirmed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![row.id, row.email, password_hash, display_name, row.email_confirmed_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => {
                    DbError::Auth("A user with this email address has already been registered".into())
                }
                other => other,
            })?;

        debug!("Created auth user {}", user.id);
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), DbError> {
        let user_id = user_id.to_string();
        self.db
            .with_conn(move |conn| {
                conn.execute("DELETE FROM auth_users WHERE id = ?1", [user_id])?;
                Ok(())
            })
            .await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, DbError> {
        let email = email.trim().to_lowercase();
        let found = self
            .db
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, email, email_confirmed_at, password_hash FROM auth_users WHERE email = ?1",
                        [email],
                        |r| {
                            Ok((
                                AuthUser {
                                    id: r.get(0)?,
                                    email: r.get(1)?,
                                    email_confirmed_at: r.get(2)?,
                                },
                                r.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()?)
            })
            .await?;

        let (user, stored_hash) = found.ok_or_else(invalid_credentials)?;

        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || {
            PasswordHash::new(&stored_hash)
                .map(|parsed| {
                    Argon2::default()
                        .verify_password(password.as_bytes(), &parsed)
                        .is_ok()
                })
                .unwrap_or(false)
        })
        .await?;

        if !verified {
            return Err(invalid_credentials());
        }

        self.issue_session(user).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, DbError> {
        let token = refresh_token.to_string();
        // Refresh tokens are single use.
        let user_id = self
            .db
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let user_id: Option<String> = tx
                    .query_row(
                        "SELECT user_id FROM auth_refresh_tokens WHERE token = ?1",
                        [&token],
                        |r| r.get(0),
                    )
                    .optional()?;
                if user_id.is_some() {
                    tx.execute("DELETE FROM auth_refresh_tokens WHERE token = ?1", [&token])?;
                }
                tx.commit()?;
                Ok(user_id)
            })
            .await?
            .ok_or_else(|| DbError::Auth("Invalid Refresh Token".into()))?;

        let user = self
            .find_user(user_id)
            .await?
            .ok_or_else(|| DbError::Auth("User not found".into()))?;

        self.issue_session(user).await
    }

    async fn verify(&self, access_token: &str) -> Result<AuthUser, DbError> {
        let claims = decode::<Claims>(
            access_token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            warn!("Rejected access token: {}", e);
            DbError::Auth("invalid JWT".into())
        })?
        .claims;

        // Deleted accounts lose access even with an unexpired token.
        self.find_user(claims.sub)
            .await?
            .ok_or_else(|| DbError::Auth("User not found".into()))
    }
}
