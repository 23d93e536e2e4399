use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use lance_db::{Query, with_retry};
use lance_types::Row;
use lance_types::api::{CreateCategoriaRequest, Items};
use lance_types::models::table;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::state::AppState;

/// GET /api/categorias
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Items<Row>>> {
    let query = Query::table(table::CATEGORIAS).order("id", false);
    let items = with_retry(3, Duration::from_millis(300), || state.store().select(&query))
        .await
        .map_err(|e| ApiError::internal("Falha ao listar categorias", e))?;

    Ok(Json(Items::new(items)))
}

/// POST /api/categorias
pub async fn create(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateCategoriaRequest>,
) -> ApiResult<impl IntoResponse> {
    let nome = req.nome.as_deref().map(str::trim).unwrap_or_default();
    if nome.is_empty() {
        return Err(ApiError::bad_request("nome é obrigatório"));
    }

    let mut row = Row::new();
    row.insert("nome".into(), json!(nome));
    row.insert("icone".into(), json!(req.icone));

    let created = state
        .store()
        .insert_one(table::CATEGORIAS, row)
        .await
        .map_err(|e| ApiError::rejected("Falha ao criar categoria", e))?;

    Ok((StatusCode::CREATED, Json(created)))
}
