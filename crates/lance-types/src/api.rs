use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Row;
use crate::models::Disponibilidade;

// Request bodies keep every field optional so that a missing field turns into
// the route's own "campo obrigatório" message instead of a decoder error.

// -- Shared envelopes --

#[derive(Debug, Serialize, Deserialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub cpf: Option<String>,
    pub is_worker: Option<bool>,
    pub perfil_worker: Option<WorkerProfileInput>,
    pub preferencias: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// Either an e-mail address or a CPF.
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: SessionUser,
    pub profile: Option<Row>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SessionUser,
    pub profile: Option<Row>,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub profile: Row,
}

// -- Users --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorkerProfileInput {
    pub descricao: Option<String>,
    pub experiencia: Option<Value>,
    pub disponibilidade: Option<Disponibilidade>,
    /// Category ids, numeric strings or category names.
    pub categorias: Option<Vec<Value>>,
    /// `None` leaves the portfolio untouched, `Some(vec![])` clears it.
    pub portfolio: Option<Vec<PortfolioInput>>,
}

impl WorkerProfileInput {
    pub fn is_empty(&self) -> bool {
        self.descricao.is_none()
            && self.experiencia.is_none()
            && self.disponibilidade.is_none()
            && self.categorias.is_none()
            && self.portfolio.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PortfolioInput {
    /// A public URL or a `data:` URL that gets uploaded first.
    pub url: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub phone: Option<String>,
    pub zip_code: Option<String>,
    pub cep: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Option<Row>,
}

#[derive(Debug, Serialize)]
pub struct FotoResponse {
    pub foto_url: String,
}

// -- Categorias --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateCategoriaRequest {
    pub nome: Option<String>,
    pub icone: Option<String>,
}

// -- Anúncios --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateAnuncioRequest {
    pub tipo: Option<String>,
    pub categoria_id: Option<i64>,
    pub titulo: Option<String>,
    pub descricao: Option<String>,
    pub localizacao: Option<String>,
    pub preco_min: Option<f64>,
    pub preco_max: Option<f64>,
    pub prazo: Option<String>,
    pub urgencia: Option<String>,
    pub status: Option<String>,
    pub imagens: Option<Vec<String>>,
    pub requisitos: Option<Vec<String>>,
}

/// Query string values stay strings: bad numbers fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListAnunciosQuery {
    pub tipo: Option<String>,
    pub categoria_id: Option<String>,
    pub busca: Option<String>,
    pub urgencia: Option<String>,
    pub status: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnunciosPage {
    pub items: Vec<Row>,
    pub page: usize,
    pub limit: usize,
    pub offset: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadImagemResponse {
    pub url: String,
    pub path: String,
}

// -- Propostas --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePropostaRequest {
    pub anuncio_id: Option<i64>,
    pub valor_proposto: Option<f64>,
    pub mensagem: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListPropostasQuery {
    pub anuncio_id: Option<String>,
    pub recebidas: Option<String>,
}

// -- Contratações --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateContratacaoRequest {
    pub anuncio_id: Option<i64>,
    pub proposta_id: Option<i64>,
    pub valor_acordado: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SolicitarDiretaRequest {
    pub profissional_id: Option<String>,
    pub categoria_id: Option<i64>,
    pub titulo: Option<String>,
    pub descricao: Option<String>,
    pub localizacao: Option<String>,
    pub preco_min: Option<f64>,
    pub preco_max: Option<f64>,
    pub prazo: Option<String>,
    pub urgencia: Option<String>,
    pub imagens: Option<Vec<String>>,
    pub requisitos: Option<Vec<String>>,
    pub valor_proposto: Option<f64>,
    pub mensagem: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfissionalRef {
    pub id: String,
    pub nome: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SolicitarDiretaResponse {
    pub anuncio: Row,
    pub proposta: Row,
    pub profissional: ProfissionalRef,
}

// -- Avaliações --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateAvaliacaoRequest {
    pub contratacao_id: Option<i64>,
    pub nota: Option<i64>,
    pub comentario: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListAvaliacoesQuery {
    pub contratacao_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingSummary {
    pub items: Vec<Row>,
    pub media: f64,
    pub total: usize,
}

impl RatingSummary {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            media: 0.0,
            total: 0,
        }
    }
}

// -- Chat --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateConversaRequest {
    pub usuario_b_id: Option<String>,
    pub contexto_tipo: Option<String>,
    pub contexto_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendMensagemRequest {
    pub conteudo: Option<String>,
}

// -- Profissionais --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfissionaisQuery {
    pub busca: Option<String>,
    pub categoria: Option<String>,
    pub localizacao: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfissionaisPage {
    pub items: Vec<Row>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct EstatisticasResponse {
    pub projetos_concluidos: usize,
    pub total_contratacoes: usize,
}
