use serde::{Deserialize, Serialize};

/// Table names on the data platform.
pub mod table {
    pub const USUARIOS: &str = "usuarios";
    pub const CATEGORIAS: &str = "categorias";
    pub const ANUNCIOS: &str = "anuncios";
    pub const PROPOSTAS: &str = "propostas";
    pub const CONTRATACOES: &str = "contratacoes";
    pub const AVALIACOES: &str = "avaliacoes";
    pub const CONVERSAS: &str = "conversas";
    pub const MENSAGENS: &str = "mensagens";
    pub const PERFIL_WORKER: &str = "perfil_worker";
    pub const WORKER_CATEGORIAS: &str = "worker_categorias";
    pub const WORKER_PORTFOLIO: &str = "worker_portfolio";
}

/// Storage buckets. The names are part of the public URLs already handed out,
/// so they stay as they are.
pub mod bucket {
    pub const PROFILE_PHOTOS: &str = "profile-photos";
    pub const ANUNCIO_IMAGES: &str = "img-anuncios";
    pub const PORTFOLIO: &str = "portifolio-fotos";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnuncioTipo {
    /// A professional offers a service.
    Oferta,
    /// A client is looking for someone.
    Oportunidade,
}

impl AnuncioTipo {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oferta" => Some(Self::Oferta),
            "oportunidade" => Some(Self::Oportunidade),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oferta => "oferta",
            Self::Oportunidade => "oportunidade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgencia {
    #[default]
    Normal,
    Alta,
}

impl Urgencia {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "alta" => Some(Self::Alta),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Alta => "alta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnuncioStatus {
    #[default]
    Disponivel,
    Fechado,
    Cancelado,
}

impl AnuncioStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disponivel" => Some(Self::Disponivel),
            "fechado" => Some(Self::Fechado),
            "cancelado" => Some(Self::Cancelado),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disponivel => "disponivel",
            Self::Fechado => "fechado",
            Self::Cancelado => "cancelado",
        }
    }
}

/// Hiring status that counts as a finished project.
pub const CONTRATACAO_CONCLUIDA: &str = "concluida";

/// Status given to the proposal created on a professional's behalf by a
/// direct hiring request.
pub const PROPOSTA_ENVIADA: &str = "enviada";

// -- Worker profile --

/// Aggregated view of the normalized worker tables
/// (`perfil_worker`, `worker_categorias`, `worker_portfolio`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub descricao: Option<String>,
    pub experiencia: Option<serde_json::Value>,
    pub disponibilidade: Disponibilidade,
    pub categorias: Vec<String>,
    pub portfolio: Vec<PortfolioItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Disponibilidade {
    pub segunda: bool,
    pub terca: bool,
    pub quarta: bool,
    pub quinta: bool,
    pub sexta: bool,
    pub sabado: bool,
    pub domingo: bool,
}

impl Disponibilidade {
    /// Column name / value pairs as stored in `perfil_worker`.
    pub fn columns(&self) -> [(&'static str, bool); 7] {
        [
            ("disp_segunda", self.segunda),
            ("disp_terca", self.terca),
            ("disp_quarta", self.quarta),
            ("disp_quinta", self.quinta),
            ("disp_sexta", self.sexta),
            ("disp_sabado", self.sabado),
            ("disp_domingo", self.domingo),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub id: Option<i64>,
    pub url: Option<String>,
}
