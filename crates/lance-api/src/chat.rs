use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lance_db::{DbError, Query, Store, with_retry};
use lance_types::Row;
use lance_types::api::{CreateConversaRequest, Items, SendMensagemRequest};
use lance_types::models::table;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::anuncios::parse_id;
use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::CurrentUser;
use crate::rows::{id_key, pick, str_field};
use crate::state::AppState;

/// Conversation ids per `IN (...)` lookup of latest messages.
const LAST_MESSAGE_BATCH: usize = 30;

const LIST_ATTEMPTS: u32 = 3;
const LIST_RETRY_DELAY: Duration = Duration::from_millis(300);
const LOOKUP_ATTEMPTS: u32 = 2;
const LOOKUP_RETRY_DELAY: Duration = Duration::from_millis(200);

fn conversa_not_found() -> ApiError {
    ApiError::not_found("Conversa não encontrada ou acesso negado")
}

fn participates(conversa: &Row, user_id: &str) -> bool {
    str_field(conversa, "usuario_a_id") == Some(user_id)
        || str_field(conversa, "usuario_b_id") == Some(user_id)
}

/// The pair in canonical order, smaller id first. A conversation between two
/// users is always stored this way round.
fn ordered_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x < y { (x, y) } else { (y, x) }
}

/// Conversation the caller takes part in, or 404.
async fn participant_conversa(store: &dyn Store, raw_id: &str, user_id: &str) -> ApiResult<Row> {
    let id = parse_id(raw_id).ok_or_else(conversa_not_found)?;
    let conversa = store
        .select_one(&Query::table(table::CONVERSAS).eq("id", id))
        .await
        .map_err(|e| ApiError::internal("Falha ao obter conversa", e))?
        .ok_or_else(conversa_not_found)?;
    if !participates(&conversa, user_id) {
        return Err(conversa_not_found());
    }
    Ok(conversa)
}

/// Latest `enviada_em` per conversation id. A failed batch only loses its
/// ordering hint.
async fn last_message_times(store: &dyn Store, ids: &[Value]) -> HashMap<String, String> {
    let mut latest = HashMap::new();

    for batch in ids.chunks(LAST_MESSAGE_BATCH) {
        let query = Query::table(table::MENSAGENS)
            .select("conversa_id, enviada_em")
            .in_("conversa_id", batch.to_vec())
            .order("enviada_em", true);
        let rows = match with_retry(LOOKUP_ATTEMPTS, LOOKUP_RETRY_DELAY, || store.select(&query)).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not fetch latest messages for a batch of conversations: {}", e);
                continue;
            }
        };

        // Rows are newest first, so the first time per conversation wins.
        for row in rows {
            let (Some(id), Some(at)) = (row.get("conversa_id").and_then(id_key), str_field(&row, "enviada_em"))
            else {
                continue;
            };
            latest.entry(id).or_insert_with(|| at.to_string());
        }
    }

    latest
}

/// Newest activity first: latest message time, else creation time.
fn sort_by_activity(conversas: &mut [Row], latest: &HashMap<String, String>) {
    let activity = |c: &Row| -> String {
        c.get("id")
            .and_then(id_key)
            .and_then(|id| latest.get(&id).cloned())
            .or_else(|| str_field(c, "criado_em").map(str::to_string))
            .unwrap_or_default()
    };
    conversas.sort_by_cached_key(|c| std::cmp::Reverse(activity(c)));
}

/// GET /api/conversas
pub async fn list_conversas(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Items<Row>>> {
    let store = state.store();
    let failed = |e: DbError| ApiError::internal("Falha ao listar conversas", e);

    let as_a = Query::table(table::CONVERSAS).eq("usuario_a_id", user.id.as_str());
    let as_b = Query::table(table::CONVERSAS).eq("usuario_b_id", user.id.as_str());
    let a = with_retry(LIST_ATTEMPTS, LIST_RETRY_DELAY, || store.select(&as_a))
        .await
        .map_err(failed)?;
    let b = with_retry(LIST_ATTEMPTS, LIST_RETRY_DELAY, || store.select(&as_b))
        .await
        .map_err(failed)?;

    let mut seen = std::collections::HashSet::new();
    let mut conversas: Vec<Row> = a
        .into_iter()
        .chain(b)
        .filter(|c| c.get("id").and_then(id_key).is_some_and(|id| seen.insert(id)))
        .collect();

    let ids: Vec<Value> = conversas.iter().filter_map(|c| c.get("id").cloned()).collect();
    let latest = last_message_times(store, &ids).await;
    sort_by_activity(&mut conversas, &latest);

    Ok(Json(Items::new(conversas)))
}

async fn lookup_pair(store: &dyn Store, a: &str, b: &str) -> Result<Option<Row>, DbError> {
    let query = Query::table(table::CONVERSAS)
        .eq("usuario_a_id", a)
        .eq("usuario_b_id", b);
    with_retry(LOOKUP_ATTEMPTS, LOOKUP_RETRY_DELAY, || store.select_one(&query)).await
}

/// Conversation between two users in either column order. Rows written
/// before pairs were normalized may hold the higher id first.
async fn find_pair(store: &dyn Store, low: &str, high: &str) -> Result<Option<Row>, DbError> {
    match lookup_pair(store, low, high).await? {
        Some(row) => Ok(Some(row)),
        None => lookup_pair(store, high, low).await,
    }
}

/// POST /api/conversas
///
/// Idempotent per pair of users: an existing conversation comes back with 200,
/// a new one with 201.
pub async fn create_conversa(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(req): JsonBody<CreateConversaRequest>,
) -> ApiResult<Response> {
    let outro = req
        .usuario_b_id
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("usuario_b_id é obrigatório"))?;
    if outro == user.id {
        return Err(ApiError::bad_request("Não é possível criar conversa consigo mesmo"));
    }

    let store = state.store();
    let (low, high) = ordered_pair(&user.id, &outro);

    match find_pair(store, low, high).await {
        Ok(Some(existing)) => return Ok(Json(existing).into_response()),
        Ok(None) => {}
        Err(e) => warn!("Could not check for an existing conversation: {}", e),
    }

    let mut row = Row::new();
    row.insert("usuario_a_id".into(), json!(low));
    row.insert("usuario_b_id".into(), json!(high));
    row.insert("contexto_tipo".into(), json!(req.contexto_tipo));
    row.insert("contexto_id".into(), req.contexto_id.unwrap_or(Value::Null));

    let inserted = with_retry(LOOKUP_ATTEMPTS, LOOKUP_RETRY_DELAY, || {
        store.insert_one(table::CONVERSAS, row.clone())
    })
    .await;

    match inserted {
        Ok(created) => {
            info!("Conversation {:?} opened between {} and {}", created.get("id"), low, high);
            Ok((StatusCode::CREATED, Json(created)).into_response())
        }
        // Lost a race with a concurrent create for the same pair.
        Err(e) if e.is_unique_violation() => match find_pair(store, low, high).await {
            Ok(Some(existing)) => Ok(Json(existing).into_response()),
            Ok(None) => Err(ApiError::bad_request(format!("Falha ao criar conversa: {e}"))),
            Err(lookup) => {
                debug!("Lookup after duplicate conversation failed: {}", lookup);
                Err(ApiError::bad_request(format!("Falha ao criar conversa: {e}")))
            }
        },
        Err(e) => Err(ApiError::bad_request(format!("Falha ao criar conversa: {e}"))),
    }
}

/// GET /api/conversas/{id}
pub async fn get_conversa(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Row>> {
    participant_conversa(state.store(), &id, &user.id).await.map(Json)
}

/// GET /api/conversas/{id}/mensagens
pub async fn list_mensagens(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Items<Row>>> {
    let conversa = participant_conversa(state.store(), &id, &user.id).await?;
    let conversa_id = conversa.get("id").cloned().unwrap_or(Value::Null);

    let items = state
        .store()
        .select(
            &Query::table(table::MENSAGENS)
                .eq("conversa_id", conversa_id)
                .order("enviada_em", false)
                .order("id", false),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao listar mensagens", e))?;

    Ok(Json(Items::new(items)))
}

/// POST /api/conversas/{id}/mensagens
pub async fn send_mensagem(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SendMensagemRequest>,
) -> ApiResult<impl IntoResponse> {
    let conteudo = req
        .conteudo
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("conteudo é obrigatório"))?;

    let conversa = participant_conversa(state.store(), &id, &user.id).await?;

    let mut row = Row::new();
    row.insert("conversa_id".into(), conversa.get("id").cloned().unwrap_or(Value::Null));
    row.insert("remetente_id".into(), json!(user.id));
    row.insert("conteudo".into(), json!(conteudo));

    let created = state
        .store()
        .insert_one(table::MENSAGENS, row)
        .await
        .map_err(|e| ApiError::rejected("Falha ao enviar mensagem", e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/mensagens/{id}, only `lida` can change.
pub async fn update_mensagem(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Row>,
) -> ApiResult<Json<Row>> {
    let store = state.store();
    let not_found = || ApiError::not_found("Mensagem não encontrada");
    let id = parse_id(&id).ok_or_else(not_found)?;

    let mensagem = store
        .select_one(&Query::table(table::MENSAGENS).eq("id", id))
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar mensagem", e))?
        .ok_or_else(not_found)?;

    let conversa = store
        .select_one(
            &Query::table(table::CONVERSAS)
                .eq("id", mensagem.get("conversa_id").cloned().unwrap_or(Value::Null)),
        )
        .await
        .map_err(|e| ApiError::internal("Falha ao buscar conversa", e))?;
    if !conversa.is_some_and(|c| participates(&c, &user.id)) {
        return Err(ApiError::forbidden());
    }

    let patch = pick(&body, &["lida"]);
    if patch.is_empty() {
        return Err(ApiError::bad_request("Nada para atualizar"));
    }

    let updated = store
        .update(&Query::table(table::MENSAGENS).eq("id", id), patch)
        .await
        .map_err(|e| ApiError::rejected("Falha ao atualizar mensagem", e))?
        .into_iter()
        .next()
        .ok_or_else(not_found)?;

    Ok(Json(updated))
}
