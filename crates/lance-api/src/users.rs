use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
};
use lance_db::{ObjectStore, Query};
use lance_types::Row;
use lance_types::api::{FotoResponse, OnboardingRequest, ProfileResponse, WorkerProfileInput};
use lance_types::models::{bucket, table};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::CurrentUser;
use crate::rows::{digits_only, pick, str_field};
use crate::state::AppState;
use crate::uploads::{self, owned_object_path, profile_photo_path, read_image, store_object};
use crate::worker_profile::{attach_worker_profile, current_user_profile, upsert_worker_profile};

const PUBLIC_COLUMNS: &str = "id, nome, foto_url, apelido, is_worker";

const EDITABLE_FIELDS: &[&str] = &[
    "nome",
    "apelido",
    "foto_url",
    "telefone_ddd",
    "telefone_numero",
    "endereco_cep",
    "endereco_logradouro",
    "endereco_numero",
    "endereco_bairro",
    "endereco_cidade",
    "endereco_estado",
    "endereco_complemento",
    "is_worker",
    "preferencias",
];

/// GET /api/users/{user_id}, public subset of the profile.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Row>> {
    let user = state
        .store()
        .select_one(&Query::table(table::USUARIOS).select(PUBLIC_COLUMNS).eq("id", user_id.as_str()))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar usuário", e))?
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado"))?;

    Ok(Json(user))
}

/// GET /api/users/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Row>> {
    let profile = current_user_profile(state.store(), &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Perfil não encontrado"))?;
    Ok(Json(profile))
}

/// Best effort removal of a replaced profile photo. Photos hosted elsewhere,
/// or uploaded by someone else, are left alone.
async fn delete_old_photo(storage: &dyn ObjectStore, user_id: &str, old_url: &str) {
    let Some(path) = owned_object_path(old_url, bucket::PROFILE_PHOTOS, user_id) else {
        debug!("Old photo {} is not one of {}'s uploads, keeping it", old_url, user_id);
        return;
    };

    match storage.remove(bucket::PROFILE_PHOTOS, &[path.clone()]).await {
        Ok(()) => debug!("Removed old profile photo {}", path),
        Err(e) => warn!("Could not remove old profile photo {}: {}", path, e),
    }
}

/// PATCH|PUT /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody<Row>,
) -> ApiResult<Json<Row>> {
    let patch = pick(&body, EDITABLE_FIELDS);
    let store = state.store();

    let old_photo = if patch.contains_key("foto_url") {
        match store
            .select_one(&Query::table(table::USUARIOS).select("foto_url").eq("id", user.id.as_str()))
            .await
        {
            Ok(row) => row.as_ref().and_then(|r| str_field(r, "foto_url")).map(str::to_string),
            Err(e) => {
                debug!("Could not read previous photo of {}: {}", user.id, e);
                None
            }
        }
    } else {
        None
    };

    if let Some(worker) = body.get("perfil_worker").filter(|v| !v.is_null()) {
        let input: WorkerProfileInput = serde_json::from_value(worker.clone())
            .map_err(|e| ApiError::bad_request(format!("perfil_worker inválido: {e}")))?;
        upsert_worker_profile(&state, &user.id, &input)
            .await
            .map_err(|e| ApiError::rejected("Falha ao atualizar perfil", e))?;
    }

    let mut profile = if patch.is_empty() {
        store
            .select_one(&Query::table(table::USUARIOS).eq("id", user.id.as_str()))
            .await?
    } else {
        let mut patch = patch;
        patch.insert("atualizado_em".into(), json!(chrono::Utc::now().to_rfc3339()));
        store
            .update(&Query::table(table::USUARIOS).eq("id", user.id.as_str()), patch)
            .await
            .map_err(|e| ApiError::rejected("Falha ao atualizar perfil", e))?
            .into_iter()
            .next()
    }
    .ok_or_else(|| ApiError::not_found("Perfil não encontrado"))?;

    attach_worker_profile(store, &mut profile).await;

    let new_photo = body.get("foto_url").and_then(Value::as_str);
    if let Some(old) = old_photo.as_deref()
        && new_photo != Some(old)
    {
        delete_old_photo(state.storage(), &user.id, old).await;
    }

    Ok(Json(profile))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Map the onboarding form onto `usuarios` columns, skipping invalid values.
fn onboarding_patch(req: OnboardingRequest) -> Row {
    let mut patch = Row::new();

    let phone = digits_only(req.phone.as_deref().unwrap_or_default());
    if phone.len() >= 2 {
        patch.insert("telefone_ddd".into(), json!(&phone[..2]));
        if phone.len() > 2 {
            patch.insert("telefone_numero".into(), json!(&phone[2..]));
        }
    }

    let cep = digits_only(&non_blank(req.zip_code).or(non_blank(req.cep)).unwrap_or_default());
    if cep.len() == 8 {
        patch.insert("endereco_cep".into(), json!(cep));
    }

    for (column, value) in [
        ("endereco_logradouro", req.address),
        ("endereco_numero", req.address_number),
        ("endereco_bairro", req.neighborhood),
        ("endereco_cidade", req.city),
    ] {
        if let Some(v) = non_blank(value) {
            patch.insert(column.into(), json!(v));
        }
    }

    if let Some(uf) = non_blank(req.state) {
        let uf: String = uf.to_uppercase().chars().take(2).collect();
        patch.insert("endereco_estado".into(), json!(uf));
    }

    match req.user_type.as_deref() {
        Some("client") => {
            patch.insert("is_worker".into(), json!(false));
        }
        Some("provider") => {
            patch.insert("is_worker".into(), json!(true));
        }
        _ => {}
    }

    patch
}

/// POST /api/users/me/onboarding
pub async fn complete_onboarding(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<OnboardingRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let patch = onboarding_patch(req);
    if patch.is_empty() {
        return Err(ApiError::bad_request("Nenhum campo válido para salvar"));
    }

    state
        .store()
        .update(&Query::table(table::USUARIOS).eq("id", user.id.as_str()), patch)
        .await
        .map_err(|e| ApiError::rejected("Falha ao salvar onboarding", e))?;

    let profile = current_user_profile(state.store(), &user.id).await?;
    info!("Onboarding saved for {}", user.id);
    Ok(Json(ProfileResponse { profile }))
}

/// POST /api/users/me/foto (multipart `file`). Only uploads; the profile is
/// updated when the client saves `foto_url`.
pub async fn upload_foto(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<FotoResponse>> {
    let multipart = multipart.map_err(|_| ApiError::bad_request("Arquivo 'file' é obrigatório"))?;
    let image = read_image(multipart).await?;

    let path = profile_photo_path(&user.id, &image.filename, uploads::unix_now());
    let foto_url = store_object(
        state.storage(),
        bucket::PROFILE_PHOTOS,
        &path,
        image.bytes,
        &image.content_type,
    )
    .await
    .map_err(|e| ApiError::bad_request(format!("Falha ao enviar foto: {e}")))?;

    Ok(Json(FotoResponse { foto_url }))
}
