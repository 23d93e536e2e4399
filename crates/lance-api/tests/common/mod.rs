#![allow(dead_code)]

//! Full router over the local backend: in-memory SQLite, local auth and a
//! throwaway storage directory.

use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use lance_api::AppStateInner;
use lance_db::{Backend, Database, LocalStorage};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "senha-forte-123";

pub struct TestApp {
    pub router: Router,
    /// Same connection the router uses, for seeding rows the API never writes.
    pub db: Database,
    pub storage_dir: PathBuf,
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let storage_dir = std::env::temp_dir().join(format!("lance-test-{}", uuid::Uuid::new_v4()));
        let db = Database::open_in_memory().unwrap();
        let storage = LocalStorage::new(storage_dir.clone(), "http://localhost:5000");
        let backend = Backend::local(db.clone(), "test-secret", storage);

        Self {
            router: lance_api::router(AppStateInner::new(backend, false)),
            db,
            storage_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Multipart upload with a single `file` part plus text fields.
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
        fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let boundary = "lance-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Register and log in; returns the session.
    pub async fn user_with(&self, nome: &str, extra: Value) -> TestUser {
        let email = format!("{}-{}@example.com", nome.to_lowercase().replace(' ', "."), uuid::Uuid::new_v4());
        let mut body = json!({"nome": nome, "email": email, "password": PASSWORD});
        if let (Some(obj), Value::Object(extra)) = (body.as_object_mut(), extra) {
            obj.extend(extra);
        }

        let (status, registered) = self.post("/api/auth/register", None, body).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {registered}");

        let (status, session) = self
            .post("/api/auth/login", None, json!({"email": email, "password": PASSWORD}))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {session}");

        TestUser {
            id: session["user"]["id"].as_str().unwrap().to_string(),
            email,
            token: session["access_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn client(&self, nome: &str) -> TestUser {
        self.user_with(nome, json!({})).await
    }

    pub async fn worker(&self, nome: &str) -> TestUser {
        self.user_with(nome, json!({"is_worker": true})).await
    }

    /// Publish a listing and return its id.
    pub async fn anuncio(&self, owner: &TestUser, titulo: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/anuncios",
                Some(&owner.token),
                json!({
                    "tipo": "oportunidade",
                    "categoria_id": 1,
                    "titulo": titulo,
                    "descricao": "Serviço de teste",
                    "preco_min": 100.0,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create listing failed: {body}");
        body["id"].as_i64().unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_dir);
    }
}
