use rusqlite::Connection;
use tracing::info;

use crate::error::DbError;

/// Columns stored as INTEGER 0/1 in SQLite that must read back as JSON booleans.
pub(crate) const BOOL_COLUMNS: &[&str] = &[
    "is_worker",
    "email_verificado",
    "lida",
    "disp_segunda",
    "disp_terca",
    "disp_quarta",
    "disp_quinta",
    "disp_sexta",
    "disp_sabado",
    "disp_domingo",
];

/// Columns stored as JSON text that must read back as arrays / objects.
pub(crate) const JSON_COLUMNS: &[&str] = &["preferencias", "imagens", "requisitos", "experiencia"];

const NOW: &str = "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))";

/// Local mirror of the hosted schema. Constraint names and UNIQUE pairs match
/// the hosted database so duplicate handling behaves the same.
pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(&V1.replace("{now}", NOW))?;
    }

    info!("Database migrations complete");
    Ok(())
}

const V1: &str = "
    CREATE TABLE auth_users (
        id                  TEXT PRIMARY KEY,
        email               TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash       TEXT NOT NULL,
        display_name        TEXT,
        email_confirmed_at  TEXT,
        created_at          TEXT NOT NULL DEFAULT {now}
    );

    CREATE TABLE auth_refresh_tokens (
        token       TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL REFERENCES auth_users(id) ON DELETE CASCADE,
        created_at  TEXT NOT NULL DEFAULT {now}
    );

    CREATE TABLE usuarios (
        id                    TEXT PRIMARY KEY,
        nome                  TEXT NOT NULL,
        email                 TEXT,
        cpf                   TEXT UNIQUE,
        apelido               TEXT,
        foto_url              TEXT,
        telefone_ddd          TEXT,
        telefone_numero       TEXT,
        endereco_cep          TEXT,
        endereco_logradouro   TEXT,
        endereco_numero       TEXT,
        endereco_bairro       TEXT,
        endereco_cidade       TEXT,
        endereco_estado       TEXT,
        endereco_complemento  TEXT,
        is_worker             INTEGER NOT NULL DEFAULT 0,
        email_verificado      INTEGER NOT NULL DEFAULT 0,
        preferencias          TEXT,
        criado_em             TEXT NOT NULL DEFAULT {now},
        atualizado_em         TEXT NOT NULL DEFAULT {now}
    );

    CREATE TABLE categorias (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        nome        TEXT NOT NULL,
        slug        TEXT,
        icone       TEXT,
        descricao   TEXT
    );

    CREATE TABLE anuncios (
        id                           INTEGER PRIMARY KEY AUTOINCREMENT,
        usuario_id                   TEXT NOT NULL REFERENCES usuarios(id),
        tipo                         TEXT NOT NULL CHECK (tipo IN ('oferta', 'oportunidade')),
        categoria_id                 INTEGER REFERENCES categorias(id),
        titulo                       TEXT NOT NULL,
        descricao                    TEXT NOT NULL,
        localizacao                  TEXT,
        preco_min                    REAL,
        preco_max                    REAL,
        urgencia                     TEXT NOT NULL DEFAULT 'normal',
        prazo                        TEXT,
        status                       TEXT NOT NULL DEFAULT 'disponivel',
        imagens                      TEXT,
        requisitos                   TEXT,
        profissional_direcionado_id  TEXT REFERENCES usuarios(id),
        publicado_em                 TEXT NOT NULL DEFAULT {now},
        atualizado_em                TEXT NOT NULL DEFAULT {now}
    );

    CREATE INDEX idx_anuncios_usuario ON anuncios(usuario_id);

    CREATE TABLE propostas (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        anuncio_id         INTEGER NOT NULL REFERENCES anuncios(id) ON DELETE CASCADE,
        usuario_id_worker  TEXT NOT NULL REFERENCES usuarios(id),
        valor_proposto     REAL,
        mensagem           TEXT,
        status             TEXT NOT NULL DEFAULT 'pendente',
        criada_em          TEXT NOT NULL DEFAULT {now},
        CONSTRAINT idx_propostas_unique_worker UNIQUE (anuncio_id, usuario_id_worker)
    );

    CREATE TABLE contratacoes (
        id                     INTEGER PRIMARY KEY AUTOINCREMENT,
        anuncio_id             INTEGER NOT NULL REFERENCES anuncios(id) ON DELETE CASCADE,
        proposta_id            INTEGER REFERENCES propostas(id) ON DELETE SET NULL,
        usuario_id_contratado  TEXT REFERENCES usuarios(id),
        valor_acordado         REAL,
        status                 TEXT NOT NULL DEFAULT 'ativa',
        criada_em              TEXT NOT NULL DEFAULT {now}
    );

    CREATE INDEX idx_contratacoes_contratado ON contratacoes(usuario_id_contratado);

    CREATE TABLE avaliacoes (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        contratacao_id  INTEGER NOT NULL REFERENCES contratacoes(id) ON DELETE CASCADE,
        avaliador_id    TEXT NOT NULL REFERENCES usuarios(id),
        nota            INTEGER NOT NULL CHECK (nota BETWEEN 1 AND 5),
        comentario      TEXT,
        criado_em       TEXT NOT NULL DEFAULT {now},
        CONSTRAINT idx_avaliacoes_unique_avaliador UNIQUE (contratacao_id, avaliador_id)
    );

    CREATE TABLE conversas (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        usuario_a_id   TEXT NOT NULL REFERENCES usuarios(id),
        usuario_b_id   TEXT NOT NULL REFERENCES usuarios(id),
        contexto_tipo  TEXT,
        contexto_id    TEXT,
        criado_em      TEXT NOT NULL DEFAULT {now},
        CHECK (usuario_a_id <> usuario_b_id),
        CONSTRAINT idx_conversas_unique_pair UNIQUE (usuario_a_id, usuario_b_id)
    );

    CREATE TABLE mensagens (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        conversa_id   INTEGER NOT NULL REFERENCES conversas(id) ON DELETE CASCADE,
        remetente_id  TEXT NOT NULL REFERENCES usuarios(id),
        conteudo      TEXT NOT NULL,
        lida          INTEGER NOT NULL DEFAULT 0,
        enviada_em    TEXT NOT NULL DEFAULT {now}
    );

    CREATE INDEX idx_mensagens_conversa ON mensagens(conversa_id, enviada_em);

    CREATE TABLE perfil_worker (
        user_id       TEXT PRIMARY KEY REFERENCES usuarios(id) ON DELETE CASCADE,
        descricao     TEXT,
        experiencia   TEXT,
        disp_segunda  INTEGER NOT NULL DEFAULT 0,
        disp_terca    INTEGER NOT NULL DEFAULT 0,
        disp_quarta   INTEGER NOT NULL DEFAULT 0,
        disp_quinta   INTEGER NOT NULL DEFAULT 0,
        disp_sexta    INTEGER NOT NULL DEFAULT 0,
        disp_sabado   INTEGER NOT NULL DEFAULT 0,
        disp_domingo  INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE worker_categorias (
        user_id       TEXT NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
        categoria_id  INTEGER NOT NULL REFERENCES categorias(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, categoria_id)
    );

    CREATE TABLE worker_portfolio (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    TEXT NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
        url        TEXT NOT NULL,
        criado_em  TEXT NOT NULL DEFAULT {now}
    );

    INSERT INTO categorias (nome, slug, icone) VALUES
        ('Eletricista', 'eletricista', 'zap'),
        ('Encanador', 'encanador', 'droplet'),
        ('Pintor', 'pintor', 'brush'),
        ('Diarista', 'diarista', 'home'),
        ('Pedreiro', 'pedreiro', 'hammer'),
        ('Jardineiro', 'jardineiro', 'leaf');

    INSERT INTO schema_version (version) VALUES (1);
";
