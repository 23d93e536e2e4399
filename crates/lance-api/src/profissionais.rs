use axum::{
    Json,
    extract::{Path, Query as QueryString, State},
};
use lance_db::{Query, Store};
use lance_types::Row;
use lance_types::api::{EstatisticasResponse, ProfissionaisPage, ProfissionaisQuery};
use lance_types::models::{CONTRATACAO_CONCLUIDA, WorkerProfile, table};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::rows::{Page, parse_num, str_field};
use crate::state::AppState;
use crate::worker_profile::build_worker_profiles;

const PUBLIC_COLUMNS: &str = "id, nome, apelido, foto_url, is_worker, email_verificado, \
     endereco_cidade, endereco_estado, criado_em";

/// Normalized search filters; empty strings mean "no filter".
#[derive(Debug, Default)]
struct Filters {
    busca: String,
    categoria: Option<String>,
    localizacao: String,
}

impl Filters {
    fn matches(&self, user: &Row, profile: Option<&WorkerProfile>) -> bool {
        let categorias: Vec<String> = profile
            .map(|p| p.categorias.iter().map(|c| c.to_lowercase()).collect())
            .unwrap_or_default();

        if let Some(categoria) = &self.categoria
            && !categorias.iter().any(|c| c == categoria)
        {
            return false;
        }

        if !self.busca.is_empty() {
            let nome = str_field(user, "nome").unwrap_or_default().to_lowercase();
            let descricao = profile
                .and_then(|p| p.descricao.as_deref())
                .unwrap_or_default()
                .to_lowercase();
            let hit = nome.contains(&self.busca)
                || descricao.contains(&self.busca)
                || categorias.iter().any(|c| c.contains(&self.busca));
            if !hit {
                return false;
            }
        }

        if !self.localizacao.is_empty() {
            let cidade = str_field(user, "endereco_cidade").unwrap_or_default().to_lowercase();
            if !cidade.contains(&self.localizacao) {
                return false;
            }
        }

        true
    }
}

fn lowered(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

/// A category filter may be a name or an id; ids are turned into names.
async fn categoria_filter(store: &dyn Store, raw: Option<&str>) -> ApiResult<Option<String>> {
    let Some(raw) = raw.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let Some(id) = parse_num(Some(raw)) else {
        return Ok(Some(raw.to_lowercase()));
    };

    let categoria = store
        .select_one(&Query::table(table::CATEGORIAS).select("nome").eq("id", id))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar categoria", e))?;
    // An unknown id matches nobody.
    Ok(Some(
        categoria
            .as_ref()
            .and_then(|c| str_field(c, "nome"))
            .map(str::to_lowercase)
            .unwrap_or_default(),
    ))
}

/// GET /api/profissionais
pub async fn list(
    State(state): State<AppState>,
    QueryString(params): QueryString<ProfissionaisQuery>,
) -> ApiResult<Json<ProfissionaisPage>> {
    let store = state.store();
    let filters = Filters {
        busca: lowered(params.busca.as_deref()),
        categoria: categoria_filter(store, params.categoria.as_deref()).await?,
        localizacao: lowered(params.localizacao.as_deref()),
    };
    let page = Page::parse(params.page.as_deref(), params.page_size.as_deref());

    let workers = store
        .select(
            &Query::table(table::USUARIOS)
                .select(PUBLIC_COLUMNS)
                .eq("is_worker", true)
                .order("nome", false)
                .order("id", false),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao listar profissionais", e))?;

    let ids: Vec<String> = workers
        .iter()
        .filter_map(|w| str_field(w, "id").map(str::to_string))
        .collect();
    let mut profiles = build_worker_profiles(store, &ids)
        .await
        .map_err(|e| ApiError::internal("Falha ao listar profissionais", e))?;

    let matching: Vec<Row> = workers
        .into_iter()
        .filter(|w| {
            let profile = str_field(w, "id").and_then(|id| profiles.get(id));
            filters.matches(w, profile)
        })
        .collect();
    let total = matching.len();

    let items = page
        .slice(matching)
        .into_iter()
        .map(|mut w| {
            let profile = str_field(&w, "id").and_then(|id| profiles.remove(id));
            if let Some(profile) = profile
                && let Ok(value) = serde_json::to_value(profile)
            {
                w.insert("perfil_worker".into(), value);
            }
            w
        })
        .collect();

    Ok(Json(ProfissionaisPage {
        items,
        page: page.page,
        page_size: page.size,
        total,
    }))
}

/// GET /api/profissionais/estatisticas/{usuario_id}
pub async fn estatisticas(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
) -> ApiResult<Json<EstatisticasResponse>> {
    let contratacoes = state
        .store()
        .select(
            &Query::table(table::CONTRATACOES)
                .select("id, status")
                .eq("usuario_id_contratado", usuario_id.as_str()),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar estatísticas", e))?;

    let projetos_concluidos = contratacoes
        .iter()
        .filter(|c| c.get("status").and_then(Value::as_str) == Some(CONTRATACAO_CONCLUIDA))
        .count();

    Ok(Json(EstatisticasResponse {
        projetos_concluidos,
        total_contratacoes: contratacoes.len(),
    }))
}
