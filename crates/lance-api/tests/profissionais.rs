mod common;

use axum::http::StatusCode;
use common::{TestApp, TestUser};
use serde_json::{Value, json};

async fn worker_in(app: &TestApp, nome: &str, cidade: &str, descricao: &str, categorias: Value) -> TestUser {
    let worker = app.worker(nome).await;
    let (status, body) = app
        .patch(
            "/api/users/me",
            Some(&worker.token),
            json!({
                "endereco_cidade": cidade,
                "perfil_worker": {"descricao": descricao, "categorias": categorias},
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    worker
}

fn nomes(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["nome"].as_str().unwrap().to_string())
        .collect()
}

async fn seeded() -> TestApp {
    let app = TestApp::new();
    worker_in(&app, "Zeca", "Recife", "Instalações residenciais", json!(["Eletricista"])).await;
    worker_in(&app, "Ana", "Olinda", "Pintura e textura", json!(["Pintor"])).await;
    worker_in(&app, "Marta", "Recife", "Reformas em geral", json!(["Pedreiro", "Pintor"])).await;
    app.client("Cliente Comum").await;
    app
}

#[tokio::test]
async fn lists_only_workers_by_name() {
    let app = seeded().await;

    let (status, body) = app.get("/api/profissionais", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 20);
    assert_eq!(nomes(&body), vec!["Ana", "Marta", "Zeca"]);
    assert_eq!(body["items"][0]["perfil_worker"]["categorias"], json!(["Pintor"]));
    assert!(body["items"][0].get("email").is_none());
}

#[tokio::test]
async fn filters_by_text_category_and_city() {
    let app = seeded().await;

    let (_, body) = app.get("/api/profissionais?busca=PINTURA", None).await;
    assert_eq!(nomes(&body), vec!["Ana"]);

    let (_, body) = app.get("/api/profissionais?categoria=pintor", None).await;
    assert_eq!(nomes(&body), vec!["Ana", "Marta"]);

    // Category ids resolve to names; 1 is Eletricista.
    let (_, body) = app.get("/api/profissionais?categoria=1", None).await;
    assert_eq!(nomes(&body), vec!["Zeca"]);

    let (_, body) = app.get("/api/profissionais?categoria=9999", None).await;
    assert_eq!(body["total"], 0);

    let (_, body) = app.get("/api/profissionais?localizacao=recife", None).await;
    assert_eq!(nomes(&body), vec!["Marta", "Zeca"]);

    let (_, body) = app
        .get("/api/profissionais?localizacao=recife&categoria=Pintor", None)
        .await;
    assert_eq!(nomes(&body), vec!["Marta"]);
}

#[tokio::test]
async fn paginates_after_filtering() {
    let app = seeded().await;

    let (_, body) = app.get("/api/profissionais?page=2&page_size=2", None).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 2);
    assert_eq!(body["page_size"], 2);
    assert_eq!(nomes(&body), vec!["Zeca"]);

    let (_, body) = app.get("/api/profissionais?page=5&page_size=2", None).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"], json!([]));

    let (status, body) = app
        .get("/api/profissionais?page=9223372036854775807&page_size=100", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn statistics_for_unknown_worker_are_zero() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/profissionais/estatisticas/nobody", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"projetos_concluidos": 0, "total_contratacoes": 0}));
}
