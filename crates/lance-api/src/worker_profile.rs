use std::collections::HashMap;

use lance_db::{DbError, Query, Store};
use lance_types::api::WorkerProfileInput;
use lance_types::models::{Disponibilidade, PortfolioItem, WorkerProfile, bucket, table};
use lance_types::Row;
use serde_json::{Value, json};
use tracing::warn;

use crate::rows::{bool_field, fetch_by_ids, i64_field, id_key, str_field};
use crate::state::AppStateInner;
use crate::uploads;

fn disponibilidade(base: &Row) -> Disponibilidade {
    Disponibilidade {
        segunda: bool_field(base, "disp_segunda"),
        terca: bool_field(base, "disp_terca"),
        quarta: bool_field(base, "disp_quarta"),
        quinta: bool_field(base, "disp_quinta"),
        sexta: bool_field(base, "disp_sexta"),
        sabado: bool_field(base, "disp_sabado"),
        domingo: bool_field(base, "disp_domingo"),
    }
}

/// Aggregate the normalized worker tables for several users at once.
/// Users without a `perfil_worker` row are absent from the map.
pub async fn build_worker_profiles(
    store: &dyn Store,
    user_ids: &[String],
) -> Result<HashMap<String, WorkerProfile>, DbError> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let bases = store
        .select(&Query::table(table::PERFIL_WORKER).in_("user_id", user_ids.iter().cloned()))
        .await?;
    if bases.is_empty() {
        return Ok(HashMap::new());
    }
    let with_profile: Vec<String> = bases
        .iter()
        .filter_map(|b| str_field(b, "user_id").map(str::to_string))
        .collect();

    let links = store
        .select(
            &Query::table(table::WORKER_CATEGORIAS)
                .select("user_id, categoria_id")
                .in_("user_id", with_profile.iter().cloned()),
        )
        .await?;
    let categoria_ids: Vec<Value> = links
        .iter()
        .filter_map(|l| l.get("categoria_id").cloned())
        .collect();
    let categorias = fetch_by_ids(store, table::CATEGORIAS, "id, nome", categoria_ids).await?;

    let portfolio = store
        .select(
            &Query::table(table::WORKER_PORTFOLIO)
                .select("id, user_id, url")
                .in_("user_id", with_profile.iter().cloned())
                .order("id", false),
        )
        .await?;

    let mut profiles: HashMap<String, WorkerProfile> = bases
        .iter()
        .filter_map(|base| {
            let user_id = str_field(base, "user_id")?.to_string();
            Some((
                user_id,
                WorkerProfile {
                    descricao: str_field(base, "descricao").map(str::to_string),
                    experiencia: base.get("experiencia").filter(|v| !v.is_null()).cloned(),
                    disponibilidade: disponibilidade(base),
                    categorias: Vec::new(),
                    portfolio: Vec::new(),
                },
            ))
        })
        .collect();

    for link in &links {
        let (Some(user_id), Some(cat)) = (str_field(link, "user_id"), link.get("categoria_id")) else {
            continue;
        };
        let nome = id_key(cat)
            .and_then(|id| categorias.get(&id))
            .and_then(|c| str_field(c, "nome"));
        if let (Some(profile), Some(nome)) = (profiles.get_mut(user_id), nome) {
            profile.categorias.push(nome.to_string());
        }
    }

    for item in &portfolio {
        if let Some(profile) = str_field(item, "user_id").and_then(|u| profiles.get_mut(u)) {
            profile.portfolio.push(PortfolioItem {
                id: i64_field(item, "id"),
                url: str_field(item, "url").map(str::to_string),
            });
        }
    }

    Ok(profiles)
}

pub async fn build_worker_profile(
    store: &dyn Store,
    user_id: &str,
) -> Result<Option<WorkerProfile>, DbError> {
    let mut profiles = build_worker_profiles(store, &[user_id.to_string()]).await?;
    Ok(profiles.remove(user_id))
}

/// Put `perfil_worker` on a user row when the user is a worker with a profile.
/// Failures only cost the nested object.
pub async fn attach_worker_profile(store: &dyn Store, user: &mut Row) {
    if !bool_field(user, "is_worker") {
        return;
    }
    let Some(user_id) = str_field(user, "id").map(str::to_string) else {
        return;
    };

    match build_worker_profile(store, &user_id).await {
        Ok(Some(profile)) => match serde_json::to_value(profile) {
            Ok(value) => {
                user.insert("perfil_worker".into(), value);
            }
            Err(e) => warn!("Failed to serialize worker profile for {}: {}", user_id, e),
        },
        Ok(None) => {}
        Err(e) => warn!("Failed to build worker profile for {}: {}", user_id, e),
    }
}

/// Full `usuarios` row of a user, with `perfil_worker` for workers.
pub async fn current_user_profile(store: &dyn Store, user_id: &str) -> Result<Option<Row>, DbError> {
    let Some(mut profile) = store
        .select_one(&Query::table(table::USUARIOS).eq("id", user_id))
        .await?
    else {
        return Ok(None);
    };

    attach_worker_profile(store, &mut profile).await;
    Ok(Some(profile))
}

/// Category references may be ids, numeric strings or names (case-insensitive).
/// Unknown references are dropped.
fn resolve_categorias(refs: &[Value], known: &[Row]) -> Vec<i64> {
    let by_nome: HashMap<String, i64> = known
        .iter()
        .filter_map(|c| Some((str_field(c, "nome")?.trim().to_lowercase(), i64_field(c, "id")?)))
        .collect();
    let known_ids: Vec<i64> = known.iter().filter_map(|c| i64_field(c, "id")).collect();

    let mut ids = Vec::new();
    for r in refs {
        let id = match r {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| by_nome.get(&s.to_lowercase()).copied())
            }
            _ => None,
        };
        if let Some(id) = id.filter(|id| known_ids.contains(id))
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }
    ids
}

/// Write a worker profile into the normalized tables. `categorias` and
/// `portfolio` replace the stored lists when present.
pub async fn upsert_worker_profile(
    state: &AppStateInner,
    user_id: &str,
    input: &WorkerProfileInput,
) -> Result<(), DbError> {
    let store = state.store();

    let mut base = Row::new();
    base.insert("user_id".into(), json!(user_id));
    base.insert("descricao".into(), json!(input.descricao));
    base.insert("experiencia".into(), input.experiencia.clone().unwrap_or(Value::Null));
    for (column, value) in input.disponibilidade.unwrap_or_default().columns() {
        base.insert(column.into(), json!(value));
    }
    store.upsert(table::PERFIL_WORKER, base, "user_id").await?;

    if let Some(refs) = &input.categorias {
        store
            .delete(&Query::table(table::WORKER_CATEGORIAS).eq("user_id", user_id))
            .await?;
        if !refs.is_empty() {
            let known = store
                .select(&Query::table(table::CATEGORIAS).select("id, nome"))
                .await?;
            let rows: Vec<Row> = resolve_categorias(refs, &known)
                .into_iter()
                .filter_map(|id| {
                    json!({ "user_id": user_id, "categoria_id": id })
                        .as_object()
                        .cloned()
                })
                .collect();
            store.insert(table::WORKER_CATEGORIAS, rows).await?;
        }
    }

    if let Some(items) = &input.portfolio {
        store
            .delete(&Query::table(table::WORKER_PORTFOLIO).eq("user_id", user_id))
            .await?;

        let mut rows = Vec::new();
        for item in items {
            let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            let url = if url.starts_with("data:") {
                match uploads::upload_data_url(state.storage(), bucket::PORTFOLIO, user_id, url).await {
                    Ok(public) => public,
                    Err(e) => {
                        warn!("Skipping portfolio item of {}: {}", user_id, e);
                        continue;
                    }
                }
            } else {
                url.to_string()
            };
            rows.extend(json!({ "user_id": user_id, "url": url }).as_object().cloned());
        }
        store.insert(table::WORKER_PORTFOLIO, rows).await?;
    }

    Ok(())
}
