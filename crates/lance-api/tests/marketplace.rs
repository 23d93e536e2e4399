mod common;

use axum::http::StatusCode;
use common::{TestApp, TestUser};
use serde_json::{Value, json};

async fn propor(app: &TestApp, worker: &TestUser, anuncio_id: i64, valor: f64) -> Value {
    let (status, body) = app
        .post(
            "/api/propostas",
            Some(&worker.token),
            json!({"anuncio_id": anuncio_id, "valor_proposto": valor, "mensagem": "Posso fazer"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn proposals_are_unique_per_worker_and_listing() {
    let app = TestApp::new();
    let owner = app.client("Alice").await;
    let worker = app.worker("Bruno").await;
    let anuncio_id = app.anuncio(&owner, "Trocar fiação").await;

    let proposta = propor(&app, &worker, anuncio_id, 250.0).await;
    assert_eq!(proposta["status"], "pendente");
    assert_eq!(proposta["usuario_id_worker"], worker.id.as_str());

    let (status, body) = app
        .post("/api/propostas", Some(&worker.token), json!({"anuncio_id": anuncio_id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("Você já enviou uma proposta"));

    let (status, body) = app
        .post("/api/propostas", Some(&owner.token), json!({"anuncio_id": anuncio_id}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Você não pode propor no seu próprio anúncio");

    let (status, _) = app
        .post("/api/propostas", Some(&worker.token), json!({"anuncio_id": 424242}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post("/api/propostas", Some(&worker.token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "anuncio_id é obrigatório");
}

#[tokio::test]
async fn proposal_listings_for_worker_owner_and_listing() {
    let app = TestApp::new();
    let owner = app.client("Carla").await;
    let stranger = app.client("Davi").await;
    let worker = app.worker("Elisa").await;
    let anuncio_id = app.anuncio(&owner, "Montar armário").await;
    propor(&app, &worker, anuncio_id, 180.0).await;

    let (status, body) = app.get("/api/propostas", Some(&worker.token)).await;
    assert_eq!(status, StatusCode::OK);
    let sent = &body["items"][0];
    assert_eq!(sent["usuarios"]["nome"], "Elisa");
    assert_eq!(sent["anuncios"]["titulo"], "Montar armário");
    assert_eq!(sent["anuncios"]["categorias"]["nome"], "Eletricista");

    let (_, body) = app.get("/api/propostas?recebidas=true", Some(&owner.token)).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["usuario_id_worker"], worker.id.as_str());

    let uri = format!("/api/propostas?anuncio_id={anuncio_id}");
    let (status, body) = app.get(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&uri, Some(&stranger.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Non-numeric listing id falls back to the caller's sent proposals.
    let (status, body) = app.get("/api/propostas?anuncio_id=abc", Some(&worker.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["usuario_id_worker"], worker.id.as_str());

    let (_, body) = app.get("/api/propostas?recebidas=true", Some(&stranger.token)).await;
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn only_the_sender_edits_or_withdraws_a_proposal() {
    let app = TestApp::new();
    let owner = app.client("Fábio").await;
    let worker = app.worker("Gil").await;
    let anuncio_id = app.anuncio(&owner, "Cerca elétrica").await;
    let proposta = propor(&app, &worker, anuncio_id, 90.0).await;
    let uri = format!("/api/propostas/{}", proposta["id"]);

    let (status, _) = app.patch(&uri, Some(&owner.token), json!({"status": "aceita"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&uri, Some(&worker.token), json!({"valor_proposto": 120.0, "anuncio_id": 1}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valor_proposto"], 120.0);
    assert_eq!(body["anuncio_id"], anuncio_id);

    let (status, _) = app.delete(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.delete(&uri, Some(&worker.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": true}));

    let (status, _) = app.delete(&uri, Some(&worker.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hiring_takes_worker_and_price_from_the_proposal() {
    let app = TestApp::new();
    let owner = app.client("Hugo").await;
    let worker = app.worker("Iara").await;
    let anuncio_id = app.anuncio(&owner, "Instalar ventilador").await;
    let proposta = propor(&app, &worker, anuncio_id, 150.0).await;

    let (status, body) = app
        .post(
            "/api/contratacoes",
            Some(&worker.token),
            json!({"anuncio_id": anuncio_id, "proposta_id": proposta["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Somente o dono do anúncio pode contratar");

    let (status, contratacao) = app
        .post(
            "/api/contratacoes",
            Some(&owner.token),
            json!({"anuncio_id": anuncio_id, "proposta_id": proposta["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{contratacao}");
    assert_eq!(contratacao["usuario_id_contratado"], worker.id.as_str());
    assert_eq!(contratacao["valor_acordado"], 150.0);
    assert_eq!(contratacao["status"], "ativa");

    for user in [&owner, &worker] {
        let (status, body) = app.get("/api/contratacoes/minhas", Some(&user.token)).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], contratacao["id"]);
    }

    let uri = format!("/api/contratacoes/{}", contratacao["id"]);
    let (status, body) = app
        .patch(&uri, Some(&worker.token), json!({"status": "concluida"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "concluida");

    let outsider = app.client("Jonas").await;
    let (status, _) = app
        .patch(&uri, Some(&outsider.token), json!({"status": "cancelada"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, stats) = app
        .get(&format!("/api/profissionais/estatisticas/{}", worker.id), None)
        .await;
    assert_eq!(stats, json!({"projetos_concluidos": 1, "total_contratacoes": 1}));
}

#[tokio::test]
async fn proposal_from_another_listing_is_refused() {
    let app = TestApp::new();
    let owner = app.client("Kátia").await;
    let worker = app.worker("Leo").await;
    let first = app.anuncio(&owner, "Primeiro serviço").await;
    let second = app.anuncio(&owner, "Segundo serviço").await;
    let proposta = propor(&app, &worker, first, 70.0).await;

    let (status, body) = app
        .post(
            "/api/contratacoes",
            Some(&owner.token),
            json!({"anuncio_id": second, "proposta_id": proposta["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Proposta não pertence a este anúncio");
}

#[tokio::test]
async fn direct_request_creates_a_private_listing_and_proposal() {
    let app = TestApp::new();
    let cliente = app.client("Mara").await;
    let worker = app.worker("Nilo").await;
    let not_worker = app.client("Olga").await;

    let (status, body) = app
        .post(
            "/api/contratacoes/solicitar-direta",
            Some(&cliente.token),
            json!({
                "profissional_id": worker.id,
                "categoria_id": 2,
                "titulo": "Vazamento na cozinha",
                "descricao": "Cano da pia",
                "valor_proposto": 200.0,
                "mensagem": "Pode vir sábado?",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["anuncio"]["profissional_direcionado_id"], worker.id.as_str());
    assert_eq!(body["anuncio"]["tipo"], "oportunidade");
    assert_eq!(body["proposta"]["status"], "enviada");
    assert_eq!(
        body["proposta"]["mensagem"],
        "Mara te enviou uma proposta de trabalho: Pode vir sábado?"
    );
    assert_eq!(body["profissional"]["nome"], "Nilo");

    // Directed listings stay out of the public feed but reach the worker.
    let (_, public) = app.get("/api/anuncios", None).await;
    assert_eq!(public["total"], 0);
    let (_, recebidas) = app.get("/api/propostas?recebidas=1", Some(&worker.token)).await;
    assert_eq!(recebidas["items"].as_array().unwrap().len(), 1);

    let request = |profissional_id: &str| {
        json!({
            "profissional_id": profissional_id,
            "categoria_id": 2,
            "titulo": "x",
            "descricao": "y",
        })
    };
    let (status, _) = app
        .post("/api/contratacoes/solicitar-direta", Some(&cliente.token), request(&not_worker.id))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/contratacoes/solicitar-direta", Some(&cliente.token), request("ghost"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Profissional não encontrado");

    let (status, _) = app
        .post(
            "/api/contratacoes/solicitar-direta",
            Some(&cliente.token),
            json!({"profissional_id": worker.id}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ratings_are_validated_and_summarized() {
    let app = TestApp::new();
    let owner = app.client("Paulo").await;
    let worker = app.worker("Quitéria").await;
    let outsider = app.client("Raul").await;
    let anuncio_id = app.anuncio(&owner, "Pintar muro").await;
    let proposta = propor(&app, &worker, anuncio_id, 300.0).await;
    let (_, contratacao) = app
        .post(
            "/api/contratacoes",
            Some(&owner.token),
            json!({"anuncio_id": anuncio_id, "proposta_id": proposta["id"]}),
        )
        .await;
    let contratacao_id = contratacao["id"].clone();

    let (status, body) = app
        .post("/api/avaliacoes", Some(&owner.token), json!({"contratacao_id": contratacao_id, "nota": 6}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "nota deve ser 1..5");

    let (status, body) = app
        .post("/api/avaliacoes", Some(&owner.token), json!({"contratacao_id": contratacao_id, "nota": 0}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "nota deve ser 1..5");

    for nota in [json!(4.5), json!("5")] {
        let (status, _) = app
            .post("/api/avaliacoes", Some(&owner.token), json!({"contratacao_id": contratacao_id, "nota": nota}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "nota {nota} accepted");
    }

    let (status, _) = app
        .post("/api/avaliacoes", Some(&owner.token), json!({"nota": 4}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/avaliacoes",
            Some(&outsider.token),
            json!({"contratacao_id": contratacao_id, "nota": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/avaliacoes",
            Some(&owner.token),
            json!({"contratacao_id": contratacao_id, "nota": 5, "comentario": "Ótimo"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .post(
            "/api/avaliacoes",
            Some(&owner.token),
            json!({"contratacao_id": contratacao_id, "nota": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            "/api/avaliacoes",
            Some(&worker.token),
            json!({"contratacao_id": contratacao_id, "nota": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, listed) = app
        .get(&format!("/api/avaliacoes?contratacao_id={contratacao_id}"), None)
        .await;
    assert_eq!(listed["items"].as_array().unwrap().len(), 2);

    let (status, summary) = app
        .get(&format!("/api/avaliacoes/por-contratado/{}", worker.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["media"], 3.0);

    let (_, empty) = app
        .get(&format!("/api/avaliacoes/por-contratado/{}", outsider.id), None)
        .await;
    assert_eq!(empty, json!({"items": [], "media": 0.0, "total": 0}));
}
