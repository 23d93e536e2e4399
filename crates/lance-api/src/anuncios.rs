use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query as QueryString, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use lance_db::{Query, Store};
use lance_types::Row;
use lance_types::api::{
    AnunciosPage, CreateAnuncioRequest, DeletedResponse, Items, ListAnunciosQuery,
    UploadImagemResponse,
};
use lance_types::models::{AnuncioStatus, AnuncioTipo, Urgencia, bucket, table};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::CurrentUser;
use crate::rows::{Page, attach, collect_ids, fetch_by_ids, parse_num, pick, str_field};
use crate::state::AppState;
use crate::uploads::{self, anuncio_image_path, owned_object_path, read_image, store_object};

const EDITABLE_FIELDS: &[&str] = &[
    "categoria_id",
    "titulo",
    "descricao",
    "localizacao",
    "preco_min",
    "preco_max",
    "prazo",
    "urgencia",
    "status",
    "imagens",
    "requisitos",
];

fn not_found() -> ApiError {
    ApiError::not_found("Anúncio não encontrado")
}

pub(crate) fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Attach `categorias {nome, icone}` and `usuarios {nome, foto_url,
/// email_verificado}` to each listing.
pub(crate) async fn with_joins(store: &dyn Store, mut rows: Vec<Row>) -> Result<Vec<Row>, ApiError> {
    let categorias = fetch_by_ids(
        store,
        table::CATEGORIAS,
        "id, nome, icone",
        collect_ids(&rows, "categoria_id"),
    )
    .await
    .map_err(|e| ApiError::internal("Falha ao buscar categorias", e))?;
    let usuarios = fetch_by_ids(
        store,
        table::USUARIOS,
        "id, nome, foto_url, email_verificado",
        collect_ids(&rows, "usuario_id"),
    )
    .await
    .map_err(|e| ApiError::internal("Falha ao buscar anunciantes", e))?;

    attach(&mut rows, "categoria_id", "categorias", &crate::rows::without(categorias, "id"));
    attach(&mut rows, "usuario_id", "usuarios", &crate::rows::without(usuarios, "id"));
    Ok(rows)
}

pub(crate) async fn fetch_anuncio(store: &dyn Store, id: i64) -> ApiResult<Row> {
    store
        .select_one(&Query::table(table::ANUNCIOS).eq("id", id))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar anúncio", e))?
        .ok_or_else(not_found)
}

/// Listing owned by `user_id`, or 404 / 403.
async fn owned_anuncio(store: &dyn Store, raw_id: &str, user_id: &str) -> ApiResult<Row> {
    let id = parse_id(raw_id).ok_or_else(not_found)?;
    let anuncio = fetch_anuncio(store, id).await?;
    if str_field(&anuncio, "usuario_id") != Some(user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(anuncio)
}

/// Filters of the public listing. Values that are not valid for their
/// column are ignored.
fn public_query(params: &ListAnunciosQuery) -> Query {
    let mut query = Query::table(table::ANUNCIOS).is_null("profissional_direcionado_id");

    if let Some(tipo) = params.tipo.as_deref().and_then(AnuncioTipo::parse) {
        query = query.eq("tipo", tipo.as_str());
    }
    if let Some(categoria_id) = parse_num(params.categoria_id.as_deref()) {
        query = query.eq("categoria_id", categoria_id);
    }
    if let Some(urgencia) = params.urgencia.as_deref().and_then(Urgencia::parse) {
        query = query.eq("urgencia", urgencia.as_str());
    }
    if let Some(status) = params.status.as_deref().and_then(AnuncioStatus::parse) {
        query = query.eq("status", status.as_str());
    }
    if let Some(busca) = params.busca.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        query = query.ilike_any(&["titulo", "descricao"], busca);
    }
    query
}

fn ordered(query: Query, order: Option<&str>) -> Query {
    match order {
        Some("antigos") => query.order("publicado_em", false).order("id", false),
        Some("preco_asc") => query.order("preco_min", false).order("id", false),
        Some("preco_desc") => query.order("preco_min", true).order("id", true),
        _ => query.order("publicado_em", true).order("id", true),
    }
}

/// GET /api/anuncios
pub async fn list(
    State(state): State<AppState>,
    QueryString(params): QueryString<ListAnunciosQuery>,
) -> ApiResult<Json<AnunciosPage>> {
    let store = state.store();
    let page = Page::parse(
        params.page.as_deref(),
        params.limit.as_deref().or(params.page_size.as_deref()),
    );

    let filtered = public_query(&params);
    let total = store
        .count(&filtered)
        .await
        .map_err(|e| ApiError::internal("Falha ao listar anúncios", e))?;

    let rows = store
        .select(
            &ordered(filtered, params.order.as_deref())
                .limit(page.size)
                .offset(page.offset),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao listar anúncios", e))?;

    Ok(Json(AnunciosPage {
        items: with_joins(store, rows).await?,
        page: page.page,
        limit: page.size,
        offset: page.offset,
        total,
    }))
}

/// GET /api/anuncios/meus
pub async fn meus(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Items<Row>>> {
    let rows = state
        .store()
        .select(
            &Query::table(table::ANUNCIOS)
                .eq("usuario_id", user.id.as_str())
                .order("publicado_em", true)
                .order("id", true),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao listar seus anúncios", e))?;

    Ok(Json(Items::new(with_joins(state.store(), rows).await?)))
}

/// GET /api/anuncios/{id}
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Row>> {
    let id = parse_id(&id).ok_or_else(not_found)?;
    let anuncio = fetch_anuncio(state.store(), id).await?;

    let mut rows = with_joins(state.store(), vec![anuncio]).await?;
    rows.pop().map(Json).ok_or_else(not_found)
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn missing(campo: &str) -> ApiError {
    ApiError::bad_request(format!("Campo obrigatório: {campo}"))
}

/// Explicit `tipo`, or `oportunidade` when the body carries a deadline or an
/// urgency and `oferta` otherwise.
fn resolve_tipo(req: &CreateAnuncioRequest) -> ApiResult<AnuncioTipo> {
    let given = req.tipo.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let Some(tipo) = given else {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        return Ok(if has(&req.prazo) || has(&req.urgencia) {
            AnuncioTipo::Oportunidade
        } else {
            AnuncioTipo::Oferta
        });
    };
    AnuncioTipo::parse(&tipo.to_lowercase())
        .ok_or_else(|| ApiError::bad_request("tipo inválido (oferta|oportunidade)"))
}

/// POST /api/anuncios
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<CreateAnuncioRequest>,
) -> ApiResult<impl IntoResponse> {
    let tipo = resolve_tipo(&req)?;

    let categoria_id = req.categoria_id.filter(|&id| id != 0).ok_or_else(|| missing("categoria_id"))?;
    let titulo = required(req.titulo).ok_or_else(|| missing("titulo"))?;
    let descricao = required(req.descricao).ok_or_else(|| missing("descricao"))?;

    let urgencia = match req.urgencia.as_deref().map(str::trim) {
        None | Some("") => Urgencia::default(),
        Some(u) => Urgencia::parse(u)
            .ok_or_else(|| ApiError::bad_request("urgencia deve ser 'normal' ou 'alta'"))?,
    };
    let status = match req.status.as_deref().map(str::trim) {
        None | Some("") => AnuncioStatus::default(),
        Some(s) => AnuncioStatus::parse(s).ok_or_else(|| ApiError::bad_request("status inválido"))?,
    };

    let payload = json!({
        "usuario_id": user.id,
        "tipo": tipo.as_str(),
        "categoria_id": categoria_id,
        "titulo": titulo,
        "descricao": descricao,
        "localizacao": req.localizacao,
        "preco_min": req.preco_min,
        "preco_max": req.preco_max,
        "prazo": req.prazo,
        "urgencia": urgencia.as_str(),
        "status": status.as_str(),
        "imagens": req.imagens.unwrap_or_default(),
        "requisitos": req.requisitos.unwrap_or_default(),
    });
    let Value::Object(payload) = payload else {
        return Err(ApiError::internal("Falha ao criar anúncio", "payload is not an object"));
    };

    let created = state
        .store()
        .insert_one(table::ANUNCIOS, payload)
        .await
        .map_err(|e| ApiError::rejected("Falha ao criar anúncio", e))?;

    info!("User {} published listing {:?}", user.id, created.get("id"));
    Ok((StatusCode::CREATED, Json(created)))
}

/// Enumerated columns must keep a known value.
fn validate_patch(patch: &Row) -> ApiResult<()> {
    let check = |column: &str, valid: fn(&str) -> bool, msg: &str| match patch.get(column) {
        None => Ok(()),
        Some(Value::String(s)) if valid(s) => Ok(()),
        Some(_) => Err(ApiError::bad_request(msg)),
    };
    check("urgencia", |s| Urgencia::parse(s).is_some(), "urgencia inválida")?;
    check("status", |s| AnuncioStatus::parse(s).is_some(), "status inválido")?;
    Ok(())
}

/// PATCH /api/anuncios/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Row>,
) -> ApiResult<Json<Row>> {
    let anuncio = owned_anuncio(state.store(), &id, &user.id).await?;

    let mut patch = pick(&body, EDITABLE_FIELDS);
    if patch.is_empty() {
        return Err(ApiError::bad_request("Nenhum campo válido para atualizar"));
    }
    validate_patch(&patch)?;
    patch.insert("atualizado_em".into(), json!(chrono::Utc::now().to_rfc3339()));

    let id = anuncio.get("id").cloned().unwrap_or(Value::Null);
    let updated = state
        .store()
        .update(&Query::table(table::ANUNCIOS).eq("id", id), patch)
        .await
        .map_err(|e| ApiError::rejected("Falha ao atualizar anúncio", e))?
        .into_iter()
        .next()
        .ok_or_else(not_found)?;

    Ok(Json(updated))
}

/// DELETE /api/anuncios/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let anuncio = owned_anuncio(state.store(), &id, &user.id).await?;

    let paths: Vec<String> = anuncio
        .get("imagens")
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(Value::as_str)
                .filter_map(|url| owned_object_path(url, bucket::ANUNCIO_IMAGES, &user.id))
                .collect()
        })
        .unwrap_or_default();
    if !paths.is_empty()
        && let Err(e) = state.storage().remove(bucket::ANUNCIO_IMAGES, &paths).await
    {
        warn!("Could not remove images of listing {}: {}", id, e);
    }

    let anuncio_id = anuncio.get("id").cloned().unwrap_or(Value::Null);
    state
        .store()
        .delete(&Query::table(table::ANUNCIOS).eq("id", anuncio_id))
        .await
        .map_err(|e| ApiError::rejected("Falha ao deletar anúncio", e))?;

    info!("User {} deleted listing {}", user.id, id);
    Ok(Json(DeletedResponse { deleted: true }))
}

/// POST /api/anuncios/upload-imagem (multipart `file`, optional `anuncio_id`)
pub async fn upload_imagem(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadImagemResponse>> {
    let multipart = multipart.map_err(|_| ApiError::bad_request("Arquivo 'file' é obrigatório"))?;
    let image = read_image(multipart).await?;

    let anuncio_id = match image.field("anuncio_id").map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => {
            let anuncio = owned_anuncio(state.store(), raw, &user.id).await?;
            anuncio.get("id").and_then(Value::as_i64)
        }
        None => None,
    };

    let path = anuncio_image_path(&user.id, anuncio_id, &image, uploads::unix_now());
    let url = store_object(
        state.storage(),
        bucket::ANUNCIO_IMAGES,
        &path,
        image.bytes,
        &image.content_type,
    )
    .await
    .map_err(|e| ApiError::internal("Falha ao fazer upload da imagem", e))?;

    Ok(Json(UploadImagemResponse { url, path }))
}
