use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, Query as QueryString, State},
    http::StatusCode,
    response::IntoResponse,
};
use lance_db::{DbError, Query, Store, with_retry};
use lance_types::Row;
use lance_types::api::{CreateAvaliacaoRequest, Items, ListAvaliacoesQuery, RatingSummary};
use lance_types::models::table;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::CurrentUser;
use crate::rows::{collect_ids, i64_field, parse_num, str_field};
use crate::state::AppState;

const SUMMARY_ATTEMPTS: u32 = 2;
const SUMMARY_RETRY_DELAY: Duration = Duration::from_millis(300);

/// POST /api/avaliacoes
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<CreateAvaliacaoRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(contratacao_id), Some(nota)) = (req.contratacao_id, req.nota) else {
        return Err(ApiError::bad_request("contratacao_id e nota são obrigatórios"));
    };
    if !(1..=5).contains(&nota) {
        return Err(ApiError::bad_request("nota deve ser 1..5"));
    }
    let store = state.store();

    let contratacao = store
        .select_one(&Query::table(table::CONTRATACOES).eq("id", contratacao_id))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar contratação", e))?
        .ok_or_else(|| ApiError::not_found("Contratação não encontrada"))?;

    let anuncio = match i64_field(&contratacao, "anuncio_id") {
        Some(id) => store
            .select_one(&Query::table(table::ANUNCIOS).select("usuario_id").eq("id", id))
            .await
            .map_err(|e| ApiError::internal("Falha ao buscar anúncio", e))?,
        None => None,
    }
    .ok_or_else(|| ApiError::not_found("Anúncio não encontrado"))?;

    let me = Some(user.id.as_str());
    if str_field(&contratacao, "usuario_id_contratado") != me && str_field(&anuncio, "usuario_id") != me {
        return Err(ApiError::forbidden());
    }

    let mut row = Row::new();
    row.insert("contratacao_id".into(), json!(contratacao_id));
    row.insert("avaliador_id".into(), json!(user.id));
    row.insert("nota".into(), json!(nota));
    row.insert("comentario".into(), json!(req.comentario));

    let created = store
        .insert_one(table::AVALIACOES, row)
        .await
        .map_err(|e| ApiError::rejected("Falha ao criar avaliação", e))?;

    info!("User {} rated hiring {} with {}", user.id, contratacao_id, nota);
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/avaliacoes
pub async fn list(
    State(state): State<AppState>,
    QueryString(params): QueryString<ListAvaliacoesQuery>,
) -> ApiResult<Json<Items<Row>>> {
    let mut query = Query::table(table::AVALIACOES);
    if let Some(id) = parse_num(params.contratacao_id.as_deref()) {
        query = query.eq("contratacao_id", id);
    }

    let items = state
        .store()
        .select(&query.order("criado_em", true).order("id", true))
        .await
        .map_err(|e| ApiError::internal("Falha ao listar avaliações", e))?;

    Ok(Json(Items::new(items)))
}

/// Average of the notas, rounded to 2 decimals; 0 with no notas.
fn media(items: &[Row]) -> (f64, usize) {
    let notas: Vec<f64> = items
        .iter()
        .filter_map(|r| r.get("nota").and_then(serde_json::Value::as_f64))
        .collect();
    if notas.is_empty() {
        return (0.0, 0);
    }
    let avg = notas.iter().sum::<f64>() / notas.len() as f64;
    ((avg * 100.0).round() / 100.0, notas.len())
}

async fn summary(store: &dyn Store, usuario_id: &str) -> Result<RatingSummary, DbError> {
    let contratacoes_query = Query::table(table::CONTRATACOES)
        .select("id")
        .eq("usuario_id_contratado", usuario_id);
    let contratacoes = with_retry(SUMMARY_ATTEMPTS, SUMMARY_RETRY_DELAY, || {
        store.select(&contratacoes_query)
    })
    .await?;

    let ids = collect_ids(&contratacoes, "id");
    if ids.is_empty() {
        return Ok(RatingSummary::empty());
    }

    let avaliacoes_query = Query::table(table::AVALIACOES)
        .in_("contratacao_id", ids)
        .order("criado_em", true)
        .order("id", true);
    let items = with_retry(SUMMARY_ATTEMPTS, SUMMARY_RETRY_DELAY, || {
        store.select(&avaliacoes_query)
    })
    .await?;

    let (media, total) = media(&items);
    Ok(RatingSummary { items, media, total })
}

/// GET /api/avaliacoes/por-contratado/{usuario_id}
///
/// Feeds profile cards, so it never fails: errors give an empty summary.
pub async fn por_contratado(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
) -> Json<RatingSummary> {
    match summary(state.store(), &usuario_id).await {
        Ok(s) => Json(s),
        Err(e) => {
            warn!("Rating summary for {} unavailable: {}", usuario_id, e);
            Json(RatingSummary::empty())
        }
    }
}
