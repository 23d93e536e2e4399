use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use lance_db::{DbError, Query, Store};
use lance_types::Row;
use lance_types::api::{
    CreateContratacaoRequest, Items, ProfissionalRef, SolicitarDiretaRequest,
    SolicitarDiretaResponse,
};
use lance_types::models::{AnuncioStatus, AnuncioTipo, PROPOSTA_ENVIADA, Urgencia, table};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::anuncios::{fetch_anuncio, parse_id};
use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::CurrentUser;
use crate::rows::{bool_field, collect_ids, i64_field, id_key, pick, str_field};
use crate::state::AppState;

const EDITABLE_FIELDS: &[&str] = &["status", "valor_acordado"];

fn not_found() -> ApiError {
    ApiError::not_found("Contratação não encontrada")
}

fn object(value: Value) -> ApiResult<Row> {
    match value {
        Value::Object(row) => Ok(row),
        _ => Err(ApiError::internal("Falha ao montar registro", "payload is not an object")),
    }
}

/// POST /api/contratacoes
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<CreateContratacaoRequest>,
) -> ApiResult<impl IntoResponse> {
    let anuncio_id = req
        .anuncio_id
        .ok_or_else(|| ApiError::bad_request("anuncio_id é obrigatório"))?;
    let store = state.store();

    let anuncio = fetch_anuncio(store, anuncio_id).await?;
    if str_field(&anuncio, "usuario_id") != Some(user.id.as_str()) {
        return Err(ApiError::Forbidden("Somente o dono do anúncio pode contratar".into()));
    }

    let mut contratado = Value::Null;
    let mut valor = req.valor_acordado.map(Value::from).unwrap_or(Value::Null);
    if let Some(proposta_id) = req.proposta_id {
        let proposta = store
            .select_one(&Query::table(table::PROPOSTAS).eq("id", proposta_id))
            .await
            .map_err(|e| ApiError::internal("Falha ao buscar proposta", e))?
            .ok_or_else(|| ApiError::not_found("Proposta não encontrada"))?;
        if i64_field(&proposta, "anuncio_id") != Some(anuncio_id) {
            return Err(ApiError::bad_request("Proposta não pertence a este anúncio"));
        }
        contratado = proposta.get("usuario_id_worker").cloned().unwrap_or(Value::Null);
        if valor.is_null() {
            valor = proposta.get("valor_proposto").cloned().unwrap_or(Value::Null);
        }
    }

    let payload = object(json!({
        "anuncio_id": anuncio_id,
        "proposta_id": req.proposta_id,
        "usuario_id_contratado": contratado,
        "valor_acordado": valor,
    }))?;
    let created = store
        .insert_one(table::CONTRATACOES, payload)
        .await
        .map_err(|e| ApiError::rejected("Falha ao criar contratação", e))?;

    info!("User {} hired on listing {}", user.id, anuncio_id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Merge two result sets keeping the first row seen per id.
fn merge_by_id(first: Vec<Row>, second: Vec<Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|row| row.get("id").and_then(id_key).is_some_and(|id| seen.insert(id)))
        .collect()
}

/// GET /api/contratacoes/minhas
pub async fn minhas(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Items<Row>>> {
    let store = state.store();
    let failed = |e: DbError| ApiError::internal("Falha ao listar contratações", e);

    let as_worker = store
        .select(
            &Query::table(table::CONTRATACOES)
                .eq("usuario_id_contratado", user.id.as_str())
                .order("criada_em", true)
                .order("id", true),
        )
        .await
        .map_err(failed)?;

    let meus_anuncios = store
        .select(&Query::table(table::ANUNCIOS).select("id").eq("usuario_id", user.id.as_str()))
        .await
        .map_err(failed)?;
    let as_owner = store
        .select(
            &Query::table(table::CONTRATACOES)
                .in_("anuncio_id", collect_ids(&meus_anuncios, "id"))
                .order("criada_em", true)
                .order("id", true),
        )
        .await
        .map_err(failed)?;

    Ok(Json(Items::new(merge_by_id(as_worker, as_owner))))
}

fn required(value: Option<String>, msg: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(msg))
}

fn direct_message(cliente: &str, mensagem: Option<&str>) -> String {
    match mensagem.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => format!("{cliente} te enviou uma proposta de trabalho: {m}"),
        None => format!("{cliente} te enviou uma proposta de trabalho"),
    }
}

async fn client_name(store: &dyn Store, user_id: &str) -> String {
    match store
        .select_one(&Query::table(table::USUARIOS).select("nome").eq("id", user_id))
        .await
    {
        Ok(Some(row)) => str_field(&row, "nome")
            .filter(|n| !n.is_empty())
            .unwrap_or("Usuário")
            .to_string(),
        Ok(None) => "Usuário".into(),
        Err(e) => {
            debug!("Client name lookup for {} failed: {}", user_id, e);
            "Usuário".into()
        }
    }
}

/// POST /api/contratacoes/solicitar-direta
///
/// Hires a professional straight from their profile: a private
/// `oportunidade` listing directed at them plus a proposal on their behalf.
pub async fn solicitar_direta(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<SolicitarDiretaRequest>,
) -> ApiResult<impl IntoResponse> {
    let profissional_id = required(req.profissional_id, "profissional_id é obrigatório")?;
    let categoria_id = req
        .categoria_id
        .ok_or_else(|| ApiError::bad_request("categoria_id é obrigatório"))?;
    let titulo = required(req.titulo, "titulo é obrigatório")?;
    let descricao = required(req.descricao, "descricao é obrigatória")?;
    let store = state.store();

    let profissional = store
        .select_one(
            &Query::table(table::USUARIOS)
                .select("id, nome, is_worker")
                .eq("id", profissional_id.as_str()),
        )
        .await
        .map_err(|e| ApiError::bad_request(format!("Erro ao verificar profissional: {e}")))?
        .ok_or_else(|| ApiError::not_found("Profissional não encontrado"))?;
    if !bool_field(&profissional, "is_worker") {
        return Err(ApiError::bad_request("O usuário selecionado não é um profissional"));
    }

    let urgencia = req
        .urgencia
        .as_deref()
        .and_then(Urgencia::parse)
        .unwrap_or_default();

    let anuncio = object(json!({
        "usuario_id": user.id,
        "tipo": AnuncioTipo::Oportunidade.as_str(),
        "categoria_id": categoria_id,
        "titulo": titulo,
        "descricao": descricao,
        "localizacao": req.localizacao,
        "preco_min": req.preco_min,
        "preco_max": req.preco_max,
        "prazo": req.prazo,
        "urgencia": urgencia.as_str(),
        "status": AnuncioStatus::Disponivel.as_str(),
        "imagens": req.imagens.unwrap_or_default(),
        "requisitos": req.requisitos.unwrap_or_default(),
        "profissional_direcionado_id": profissional_id,
    }))?;
    let failed = |e| ApiError::rejected("Falha ao criar solicitação de contratação", e);
    let anuncio = store.insert_one(table::ANUNCIOS, anuncio).await.map_err(failed)?;

    let cliente = client_name(store, &user.id).await;
    let proposta = object(json!({
        "anuncio_id": anuncio.get("id"),
        "usuario_id_worker": profissional_id,
        "valor_proposto": req.valor_proposto,
        "mensagem": direct_message(&cliente, req.mensagem.as_deref()),
        "status": PROPOSTA_ENVIADA,
    }))?;
    let proposta = store.insert_one(table::PROPOSTAS, proposta).await.map_err(failed)?;

    info!("User {} sent a direct hiring request to {}", user.id, profissional_id);
    Ok((
        StatusCode::CREATED,
        Json(SolicitarDiretaResponse {
            anuncio,
            proposta,
            profissional: ProfissionalRef {
                id: profissional_id,
                nome: str_field(&profissional, "nome").map(str::to_string),
            },
        }),
    ))
}

/// PATCH /api/contratacoes/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Row>,
) -> ApiResult<Json<Row>> {
    let store = state.store();
    let id = parse_id(&id).ok_or_else(not_found)?;

    let contratacao = store
        .select_one(&Query::table(table::CONTRATACOES).eq("id", id))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar contratação", e))?
        .ok_or_else(not_found)?;

    let anuncio_id = i64_field(&contratacao, "anuncio_id")
        .ok_or_else(|| ApiError::not_found("Anúncio não encontrado"))?;
    let anuncio = fetch_anuncio(store, anuncio_id).await?;

    let me = Some(user.id.as_str());
    if str_field(&contratacao, "usuario_id_contratado") != me
        && str_field(&anuncio, "usuario_id") != me
    {
        return Err(ApiError::forbidden());
    }

    let patch = pick(&body, EDITABLE_FIELDS);
    if patch.is_empty() {
        return Err(ApiError::bad_request("Nenhum campo válido para atualizar"));
    }

    let updated = store
        .update(&Query::table(table::CONTRATACOES).eq("id", id), patch)
        .await
        .map_err(|e| ApiError::rejected("Falha ao atualizar contratação", e))?
        .into_iter()
        .next()
        .ok_or_else(not_found)?;

    Ok(Json(updated))
}
