use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query as QueryString, State},
    http::StatusCode,
    response::IntoResponse,
};
use lance_db::{Query, Store};
use lance_types::Row;
use lance_types::api::{CreatePropostaRequest, DeletedResponse, Items, ListPropostasQuery};
use lance_types::models::table;
use serde_json::{Value, json};
use tracing::info;

use crate::anuncios::{fetch_anuncio, parse_id};
use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::CurrentUser;
use crate::rows::{attach, collect_ids, fetch_by_ids, id_key, pick, str_field, without};
use crate::state::AppState;

const EDITABLE_FIELDS: &[&str] = &["valor_proposto", "mensagem", "status"];

const DUPLICATE_MESSAGE: &str = "Você já enviou uma proposta para este serviço. \
     Você pode editar sua proposta existente na página 'Meus Serviços'.";

fn not_found() -> ApiError {
    ApiError::not_found("Proposta não encontrada")
}

fn truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "sim")
    )
}

/// Attach the worker (`usuarios`) and the listing (`anuncios`, with its
/// `categorias`) to each proposal.
async fn with_joins(store: &dyn Store, mut rows: Vec<Row>) -> ApiResult<Vec<Row>> {
    let usuarios = fetch_by_ids(
        store,
        table::USUARIOS,
        "id, nome, email, foto_url",
        collect_ids(&rows, "usuario_id_worker"),
    )
    .await
    .map_err(|e| ApiError::internal("Falha ao buscar profissionais", e))?;

    let anuncios = fetch_by_ids(
        store,
        table::ANUNCIOS,
        "id, titulo, categoria_id, localizacao, prazo",
        collect_ids(&rows, "anuncio_id"),
    )
    .await
    .map_err(|e| ApiError::internal("Falha ao buscar anúncios", e))?;

    let mut listing_rows: Vec<Row> = anuncios.into_values().collect();
    let categorias = fetch_by_ids(
        store,
        table::CATEGORIAS,
        "id, nome, icone",
        collect_ids(&listing_rows, "categoria_id"),
    )
    .await
    .map_err(|e| ApiError::internal("Falha ao buscar categorias", e))?;
    attach(&mut listing_rows, "categoria_id", "categorias", &without(categorias, "id"));
    let anuncios: HashMap<String, Row> = listing_rows
        .into_iter()
        .filter_map(|r| Some((id_key(r.get("id")?)?, r)))
        .collect();

    attach(&mut rows, "usuario_id_worker", "usuarios", &without(usuarios, "id"));
    attach(&mut rows, "anuncio_id", "anuncios", &anuncios);
    Ok(rows)
}

async fn fetch_proposta(store: &dyn Store, raw_id: &str) -> ApiResult<Row> {
    let id = parse_id(raw_id).ok_or_else(not_found)?;
    store
        .select_one(&Query::table(table::PROPOSTAS).eq("id", id))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar proposta", e))?
        .ok_or_else(not_found)
}

/// Proposal sent by `user_id`, or 404 / 403.
async fn own_proposta(store: &dyn Store, raw_id: &str, user_id: &str) -> ApiResult<Row> {
    let proposta = fetch_proposta(store, raw_id).await?;
    if str_field(&proposta, "usuario_id_worker") != Some(user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(proposta)
}

/// POST /api/propostas
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<CreatePropostaRequest>,
) -> ApiResult<impl IntoResponse> {
    let anuncio_id = req
        .anuncio_id
        .ok_or_else(|| ApiError::bad_request("anuncio_id é obrigatório"))?;

    let anuncio = fetch_anuncio(state.store(), anuncio_id).await?;
    if str_field(&anuncio, "usuario_id") == Some(user.id.as_str()) {
        return Err(ApiError::bad_request("Você não pode propor no seu próprio anúncio"));
    }

    let mut row = Row::new();
    row.insert("anuncio_id".into(), json!(anuncio_id));
    row.insert("usuario_id_worker".into(), json!(user.id));
    row.insert("valor_proposto".into(), json!(req.valor_proposto));
    row.insert("mensagem".into(), json!(req.mensagem));

    let created = state
        .store()
        .insert_one(table::PROPOSTAS, row)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Conflict(DUPLICATE_MESSAGE.into())
            } else {
                ApiError::rejected("Falha ao criar proposta", e)
            }
        })?;

    info!("User {} proposed on listing {}", user.id, anuncio_id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Proposals on the caller's listings plus those on listings directed at the
/// caller.
async fn received(store: &dyn Store, user_id: &str) -> ApiResult<Vec<Row>> {
    let own = store
        .select(&Query::table(table::ANUNCIOS).select("id").eq("usuario_id", user_id))
        .await
        .map_err(|e| ApiError::internal("Falha ao listar propostas", e))?;
    let directed = store
        .select(
            &Query::table(table::ANUNCIOS)
                .select("id")
                .eq("profissional_direcionado_id", user_id),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao listar propostas", e))?;

    let mut listings = own;
    listings.extend(directed);
    let ids = collect_ids(&listings, "id");

    store
        .select(
            &Query::table(table::PROPOSTAS)
                .in_("anuncio_id", ids)
                .order("criada_em", true)
                .order("id", true),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao listar propostas", e))
}

/// GET /api/propostas
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    QueryString(params): QueryString<ListPropostasQuery>,
) -> ApiResult<Json<Items<Row>>> {
    let store = state.store();

    // A non-numeric `anuncio_id` is ignored like any other bad filter.
    let rows = if let Some(id) = params.anuncio_id.as_deref().and_then(parse_id) {
        let anuncio = fetch_anuncio(store, id).await?;
        if str_field(&anuncio, "usuario_id") != Some(user.id.as_str()) {
            return Err(ApiError::forbidden());
        }
        store
            .select(
                &Query::table(table::PROPOSTAS)
                    .eq("anuncio_id", id)
                    .order("criada_em", true)
                    .order("id", true),
            )
            .await
            .map_err(|e| ApiError::internal("Falha ao listar propostas", e))?
    } else if truthy(params.recebidas.as_deref()) {
        received(store, &user.id).await?
    } else {
        store
            .select(
                &Query::table(table::PROPOSTAS)
                    .eq("usuario_id_worker", user.id.as_str())
                    .order("criada_em", true)
                    .order("id", true),
            )
            .await
            .map_err(|e| ApiError::internal("Falha ao listar propostas", e))?
    };

    Ok(Json(Items::new(with_joins(store, rows).await?)))
}

/// PATCH /api/propostas/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Row>,
) -> ApiResult<Json<Row>> {
    let proposta = own_proposta(state.store(), &id, &user.id).await?;

    let patch = pick(&body, EDITABLE_FIELDS);
    if patch.is_empty() {
        return Err(ApiError::bad_request("Nenhum campo válido para atualizar"));
    }

    let id = proposta.get("id").cloned().unwrap_or(Value::Null);
    let updated = state
        .store()
        .update(&Query::table(table::PROPOSTAS).eq("id", id), patch)
        .await
        .map_err(|e| ApiError::rejected("Falha ao atualizar proposta", e))?
        .into_iter()
        .next()
        .ok_or_else(not_found)?;

    Ok(Json(updated))
}

/// DELETE /api/propostas/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let proposta = own_proposta(state.store(), &id, &user.id).await?;

    let proposta_id = proposta.get("id").cloned().unwrap_or(Value::Null);
    state
        .store()
        .delete(&Query::table(table::PROPOSTAS).eq("id", proposta_id))
        .await
        .map_err(|e| ApiError::rejected("Falha ao deletar proposta", e))?;

    Ok(Json(DeletedResponse { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recebidas_flag() {
        assert!(truthy(Some("true")));
        assert!(truthy(Some(" 1 ")));
        assert!(truthy(Some("TRUE")));
        assert!(!truthy(Some("false")));
        assert!(!truthy(None));
    }
}
