pub mod anuncios;
pub mod auth;
pub mod avaliacoes;
pub mod categorias;
pub mod chat;
pub mod contratacoes;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod profissionais;
pub mod propostas;
pub mod rows;
pub mod state;
pub mod uploads;
pub mod users;
pub mod worker_profile;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

pub use error::{ApiError, ApiResult};
pub use state::{AppState, AppStateInner};

use crate::middleware::require_auth;
use crate::uploads::UPLOAD_BODY_LIMIT;

/// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every `/api` route. Protected routes resolve the caller through
/// [`require_auth`] and read it as `Extension<CurrentUser>`.
pub fn router(state: AppState) -> Router {
    let upload_limit = || DefaultBodyLimit::max(UPLOAD_BODY_LIMIT);

    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/users/{user_id}", get(users::get_user))
        .route("/api/categorias", get(categorias::list).post(categorias::create))
        .route("/api/anuncios", get(anuncios::list))
        .route("/api/anuncios/{id}", get(anuncios::get))
        .route("/api/avaliacoes", get(avaliacoes::list))
        .route(
            "/api/avaliacoes/por-contratado/{usuario_id}",
            get(avaliacoes::por_contratado),
        )
        .route("/api/profissionais", get(profissionais::list))
        .route(
            "/api/profissionais/estatisticas/{usuario_id}",
            get(profissionais::estatisticas),
        );

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/users/me",
            get(users::get_me).patch(users::update_me).put(users::update_me),
        )
        .route("/api/users/me/onboarding", post(users::complete_onboarding))
        .route(
            "/api/users/me/foto",
            post(users::upload_foto).layer(upload_limit()),
        )
        .route("/api/anuncios", post(anuncios::create))
        .route("/api/anuncios/meus", get(anuncios::meus))
        .route(
            "/api/anuncios/upload-imagem",
            post(anuncios::upload_imagem).layer(upload_limit()),
        )
        .route(
            "/api/anuncios/{id}",
            patch(anuncios::update).delete(anuncios::delete),
        )
        .route("/api/propostas", get(propostas::list).post(propostas::create))
        .route(
            "/api/propostas/{id}",
            patch(propostas::update).delete(propostas::delete),
        )
        .route("/api/contratacoes", post(contratacoes::create))
        .route("/api/contratacoes/minhas", get(contratacoes::minhas))
        .route(
            "/api/contratacoes/solicitar-direta",
            post(contratacoes::solicitar_direta),
        )
        .route("/api/contratacoes/{id}", patch(contratacoes::update))
        .route("/api/avaliacoes", post(avaliacoes::create))
        .route(
            "/api/conversas",
            get(chat::list_conversas).post(chat::create_conversa),
        )
        .route("/api/conversas/{id}", get(chat::get_conversa))
        .route(
            "/api/conversas/{id}/mensagens",
            get(chat::list_mensagens).post(chat::send_mensagem),
        )
        .route("/api/mensagens/{id}", patch(chat::update_mensagem))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
