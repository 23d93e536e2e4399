use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lance_db::{DbError, Query, Session};
use lance_types::api::{
    LoginRequest, LoginResponse, MeResponse, MessageResponse, RefreshRequest, RegisterRequest,
    RegisterResponse, SessionUser,
};
use lance_types::models::table;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::{ACCESS_TOKEN_COOKIE, CurrentUser, REFRESH_TOKEN_COOKIE};
use crate::rows::{digits_only, str_field};
use crate::state::AppState;
use crate::worker_profile::{current_user_profile, upsert_worker_profile};

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let nome = trimmed(req.nome);
    let email = trimmed(req.email);
    let password = trimmed(req.password);
    if nome.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Campos obrigatórios: nome, email, password"));
    }

    let user = state
        .auth()
        .create_user(&email, &password, &nome)
        .await
        .map_err(|e| ApiError::bad_request(format!("Falha ao criar usuário no Auth: {e}")))?;

    let cpf = req
        .cpf
        .as_deref()
        .map(digits_only)
        .filter(|c| !c.is_empty());
    let is_worker = req.is_worker.unwrap_or(false);

    let profile = json!({
        "id": user.id,
        "nome": nome,
        "email": email,
        "cpf": cpf,
        "is_worker": is_worker,
        "email_verificado": user.email_confirmed_at.is_some(),
        "preferencias": req.preferencias.unwrap_or_else(|| json!({})),
    });
    let Value::Object(profile) = profile else {
        return Err(ApiError::internal("Falha ao criar perfil", "payload is not an object"));
    };

    let inserted = match state.store().insert_one(table::USUARIOS, profile).await {
        Ok(row) => row,
        Err(e) => {
            // The account is useless without a profile.
            if let Err(del) = state.auth().delete_user(&user.id).await {
                error!("Failed to roll back auth user {}: {}", user.id, del);
            }
            return Err(ApiError::bad_request(format!("Falha ao criar perfil: {e}")));
        }
    };

    if is_worker
        && let Some(worker) = req.perfil_worker.as_ref().filter(|w| !w.is_empty())
        && let Err(e) = upsert_worker_profile(&state, &user.id, worker).await
    {
        warn!("Worker profile of {} not saved: {}", user.id, e);
    }

    let full = match current_user_profile(state.store(), &user.id).await {
        Ok(Some(p)) => p,
        _ => inserted,
    };

    info!("Registered user {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: SessionUser {
                id: user.id,
                email: Some(email),
            },
            profile: Some(full),
        }),
    ))
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Tokens go back both in the body and as httpOnly cookies.
async fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: Session,
) -> (CookieJar, Json<LoginResponse>) {
    let profile = current_user_profile(state.store(), &session.user.id)
        .await
        .unwrap_or_else(|e| {
            warn!("Profile lookup for {} failed: {}", session.user.id, e);
            None
        });

    let jar = jar
        .add(session_cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            state.secure_cookies,
        ))
        .add(session_cookie(
            REFRESH_TOKEN_COOKIE,
            session.refresh_token.clone(),
            state.secure_cookies,
        ));

    (
        jar,
        Json(LoginResponse {
            user: SessionUser {
                id: session.user.id,
                email: session.user.email,
            },
            profile,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        }),
    )
}

/// POST /api/auth/login. `email` may also be a CPF.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let login = trimmed(req.email);
    let password = trimmed(req.password);
    if login.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Campos obrigatórios: email, password"));
    }

    let email = if login.contains('@') {
        login
    } else {
        let cpf = digits_only(&login);
        if cpf.is_empty() {
            return Err(ApiError::bad_request("CPF inválido"));
        }
        let row = state
            .store()
            .select_one(&Query::table(table::USUARIOS).select("email").eq("cpf", cpf))
            .await
            .map_err(|e| ApiError::internal("Falha ao buscar CPF", e))?;
        row.as_ref()
            .and_then(|r| str_field(r, "email"))
            .map(str::to_string)
            .ok_or_else(|| ApiError::Unauthorized("CPF não encontrado".into()))?
    };

    let session = state
        .auth()
        .sign_in(&email, &password)
        .await
        .map_err(|e| match e {
            DbError::Auth(msg) => ApiError::Unauthorized(format!("Falha no login: {msg}")),
            other => ApiError::internal("Falha no login", other),
        })?;

    Ok(session_response(&state, jar, session).await)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<MeResponse>> {
    let profile = current_user_profile(state.store(), &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Perfil não encontrado"))?;

    Ok(Json(MeResponse {
        user_id: user.id,
        profile,
    }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let refresh_token = trimmed(req.refresh_token);
    if refresh_token.is_empty() {
        return Err(ApiError::bad_request("Campo obrigatório: refresh_token"));
    }

    let session = state.auth().refresh(&refresh_token).await.map_err(|e| match e {
        DbError::Auth(msg) => ApiError::Unauthorized(format!("Falha no refresh: {msg}")),
        other => ApiError::internal("Falha no refresh", other),
    })?;

    Ok(session_response(&state, jar, session).await)
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"));

    (
        jar,
        Json(MessageResponse {
            message: "Logout realizado com sucesso".into(),
        }),
    )
}
