mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

const JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

#[tokio::test]
async fn create_returns_the_listing_with_defaults() {
    let app = TestApp::new();
    let owner = app.client("Nina").await;

    let (status, body) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({
                "tipo": "oferta",
                "categoria_id": 3,
                "titulo": "Pintura de apartamento",
                "descricao": "Paredes e teto",
                "localizacao": "Olinda",
                "preco_min": 800.0,
                "preco_max": 1500.0,
                "requisitos": ["tinta inclusa"],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["usuario_id"], owner.id.as_str());
    assert_eq!(body["tipo"], "oferta");
    assert_eq!(body["categoria_id"], 3);
    assert_eq!(body["titulo"], "Pintura de apartamento");
    assert_eq!(body["preco_min"], 800.0);
    assert_eq!(body["urgencia"], "normal");
    assert_eq!(body["status"], "disponivel");
    assert_eq!(body["imagens"], json!([]));
    assert_eq!(body["requisitos"], json!(["tinta inclusa"]));
    assert!(body["profissional_direcionado_id"].is_null());
}

#[tokio::test]
async fn create_validates_required_fields_and_enums() {
    let app = TestApp::new();
    let owner = app.client("Otto").await;

    for (body, campo) in [
        (json!({"titulo": "x", "descricao": "y"}), "categoria_id"),
        (json!({"categoria_id": 0, "titulo": "x", "descricao": "y"}), "categoria_id"),
        (json!({"categoria_id": 1, "descricao": "sem título"}), "titulo"),
        (json!({"categoria_id": 1, "titulo": "x", "descricao": "  "}), "descricao"),
    ] {
        let (status, body) = app.post("/api/anuncios", Some(&owner.token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], format!("Campo obrigatório: {campo}"));
    }

    let (status, body) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({"tipo": "leilao", "categoria_id": 1, "titulo": "x", "descricao": "y"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "tipo inválido (oferta|oportunidade)");

    let (status, _) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({"tipo": "oferta", "categoria_id": 1, "titulo": "x", "descricao": "y", "urgencia": "ontem"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({"categoria_id": 1, "titulo": "x", "descricao": "y", "status": "aberto"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/anuncios", None, json!({"tipo": "oferta"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_infers_tipo_and_keeps_status() {
    let app = TestApp::new();
    let owner = app.client("Olga").await;

    let (status, body) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({"categoria_id": 1, "titulo": "Trocar fiação", "descricao": "Casa antiga", "prazo": "2026-12-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["tipo"], "oportunidade");
    assert_eq!(body["urgencia"], "normal");
    assert_eq!(body["status"], "disponivel");

    let (_, body) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({"categoria_id": 1, "titulo": "Urgente", "descricao": "d", "urgencia": "alta"}),
        )
        .await;
    assert_eq!(body["tipo"], "oportunidade");
    assert_eq!(body["urgencia"], "alta");

    let (status, body) = app
        .post(
            "/api/anuncios",
            Some(&owner.token),
            json!({"categoria_id": 2, "titulo": "Faço pintura", "descricao": "d", "status": "fechado"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["tipo"], "oferta");
    assert_eq!(body["status"], "fechado");
}

#[tokio::test]
async fn public_list_joins_filters_and_paginates() {
    let app = TestApp::new();
    let owner = app.client("Paula").await;
    for titulo in ["Troca de chuveiro", "Instalação de tomadas", "Quadro de luz"] {
        app.anuncio(&owner, titulo).await;
    }

    let (status, body) = app.get("/api/anuncios", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
    let first = &body["items"][0];
    assert_eq!(first["titulo"], "Quadro de luz");
    assert_eq!(first["categorias"], json!({"nome": "Eletricista", "icone": "zap"}));
    assert_eq!(first["usuarios"]["nome"], "Paula");
    assert_eq!(first["usuarios"]["email_verificado"], true);

    let (_, body) = app.get("/api/anuncios?limit=2&page=2", None).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["offset"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["titulo"], "Troca de chuveiro");

    let (_, body) = app.get("/api/anuncios?busca=TOMADA", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["titulo"], "Instalação de tomadas");

    let (_, body) = app.get("/api/anuncios?tipo=oferta", None).await;
    assert_eq!(body["total"], 0);

    let (_, body) = app.get("/api/anuncios?order=antigos&page=abc&limit=xyz", None).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["items"][0]["titulo"], "Troca de chuveiro");

    let (status, body) = app
        .get("/api/anuncios?page=9223372036854775807&limit=100", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn price_ordering() {
    let app = TestApp::new();
    let owner = app.client("Quim").await;
    for (titulo, preco) in [("Médio", 200.0), ("Barato", 50.0), ("Caro", 900.0)] {
        let (status, _) = app
            .post(
                "/api/anuncios",
                Some(&owner.token),
                json!({"tipo": "oferta", "categoria_id": 2, "titulo": titulo, "descricao": "d", "preco_min": preco}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app.get("/api/anuncios?order=preco_asc", None).await;
    let titulos: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["titulo"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titulos, vec!["Barato", "Médio", "Caro"]);

    let (_, body) = app.get("/api/anuncios?order=preco_desc", None).await;
    assert_eq!(body["items"][0]["titulo"], "Caro");
}

#[tokio::test]
async fn get_by_id_and_missing_listing() {
    let app = TestApp::new();
    let owner = app.client("Rita").await;
    let id = app.anuncio(&owner, "Conserto de pia").await;

    let (status, body) = app.get(&format!("/api/anuncios/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["titulo"], "Conserto de pia");
    assert_eq!(body["categorias"]["nome"], "Eletricista");

    let (status, body) = app.get("/api/anuncios/999999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Anúncio não encontrado");

    let (status, _) = app.get("/api/anuncios/abc", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_owner_updates_or_deletes() {
    let app = TestApp::new();
    let owner = app.client("Sara").await;
    let other = app.client("Tiago").await;
    let id = app.anuncio(&owner, "Limpeza pós-obra").await;
    let uri = format!("/api/anuncios/{id}");

    let (status, body) = app.patch(&uri, Some(&other.token), json!({"titulo": "meu"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Acesso negado");

    let (status, _) = app.delete(&uri, Some(&other.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&uri, Some(&owner.token), json!({"usuario_id": other.id, "tipo": "oferta"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Nenhum campo válido para atualizar");

    let (status, _) = app.patch(&uri, Some(&owner.token), json!({"status": "aberto"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .patch(&uri, Some(&owner.token), json!({"status": "fechado", "preco_max": 300}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "fechado");
    assert_eq!(body["preco_max"], 300.0);
    assert_eq!(body["usuario_id"], owner.id.as_str());

    let (status, body) = app.delete(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": true}));

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn meus_lists_only_the_callers_listings() {
    let app = TestApp::new();
    let a = app.client("Ulisses").await;
    let b = app.client("Vera").await;
    app.anuncio(&a, "Primeiro").await;
    app.anuncio(&a, "Segundo").await;
    app.anuncio(&b, "Da Vera").await;

    let (status, body) = app.get("/api/anuncios/meus", Some(&a.token)).await;
    assert_eq!(status, StatusCode::OK);
    let titulos: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["titulo"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titulos, vec!["Segundo", "Primeiro"]);
}

#[tokio::test]
async fn image_upload_paths_and_cleanup_on_delete() {
    let app = TestApp::new();
    let owner = app.client("Wagner").await;
    let other = app.client("Xena").await;
    let id = app.anuncio(&owner, "Reforma de banheiro").await;

    let (status, body) = app
        .upload("/api/anuncios/upload-imagem", &owner.token, "foto.jpg", "image/jpeg", JPEG, &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let temp_path = body["path"].as_str().unwrap();
    assert!(temp_path.starts_with(&format!("{}/temp/", owner.id)));

    let id_text = id.to_string();
    let (status, body) = app
        .upload(
            "/api/anuncios/upload-imagem",
            &owner.token,
            "foto.jpg",
            "image/jpeg",
            JPEG,
            &[("anuncio_id", id_text.as_str())],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let path = body["path"].as_str().unwrap().to_string();
    let url = body["url"].as_str().unwrap().to_string();
    assert!(path.starts_with(&format!("{}/anuncio_{}/", owner.id, id)));
    assert!(path.ends_with(".jpg"));
    assert!(url.ends_with(&path));

    let stored = app.storage_dir.join("img-anuncios").join(&path);
    assert!(stored.exists());

    let (status, _) = app
        .upload(
            "/api/anuncios/upload-imagem",
            &other.token,
            "foto.jpg",
            "image/jpeg",
            JPEG,
            &[("anuncio_id", id_text.as_str())],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/anuncios/{id}");
    app.patch(&uri, Some(&owner.token), json!({"imagens": [url]})).await;
    let (status, _) = app.delete(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!stored.exists());
}

#[tokio::test]
async fn oversized_image_is_refused() {
    let app = TestApp::new();
    let owner = app.client("Yuri").await;
    let big = vec![0u8; 5 * 1024 * 1024 + 1];

    let (status, body) = app
        .upload("/api/anuncios/upload-imagem", &owner.token, "big.png", "image/png", &big, &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Arquivo muito grande (máx 5MB)");
}

#[tokio::test]
async fn deleting_a_listing_leaves_other_users_images_alone() {
    let app = TestApp::new();
    let owner = app.client("Zilda").await;
    let victim = app.client("Abel").await;

    let (status, body) = app
        .upload("/api/anuncios/upload-imagem", &victim.token, "foto.jpg", "image/jpeg", JPEG, &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    let foreign_url = body["url"].as_str().unwrap().to_string();
    let foreign = app
        .storage_dir
        .join("img-anuncios")
        .join(body["path"].as_str().unwrap());

    let (_, body) = app
        .upload("/api/anuncios/upload-imagem", &owner.token, "foto.jpg", "image/jpeg", JPEG, &[])
        .await;
    let own_url = body["url"].as_str().unwrap().to_string();
    let own = app
        .storage_dir
        .join("img-anuncios")
        .join(body["path"].as_str().unwrap());

    let id = app.anuncio(&owner, "Anúncio com foto alheia").await;
    let uri = format!("/api/anuncios/{id}");
    let (status, _) = app
        .patch(&uri, Some(&owner.token), json!({"imagens": [own_url, foreign_url]}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.delete(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!own.exists());
    assert!(foreign.exists());
}
