use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{SupabaseClient, send, send_json};
use crate::error::DbError;
use crate::storage::{ObjectStore, is_safe_object_path};

#[derive(Debug, Deserialize)]
struct Bucket {
    id: String,
    #[serde(default)]
    public: bool,
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), DbError> {
        let buckets: Vec<Bucket> = send_json(self.admin(Method::GET, "/storage/v1/bucket")).await?;

        match buckets.iter().find(|b| b.id == bucket) {
            Some(b) if b.public => {}
            Some(_) => {
                let req = self
                    .admin(Method::PUT, &format!("/storage/v1/bucket/{bucket}"))
                    .json(&json!({ "id": bucket, "name": bucket, "public": true }));
                send(req).await?;
                info!("Bucket {} made public", bucket);
            }
            None => {
                let req = self
                    .admin(Method::POST, "/storage/v1/bucket")
                    .json(&json!({ "id": bucket, "name": bucket, "public": true }));
                match send(req).await {
                    // Lost a race with another request creating it.
                    Err(e) if e.is_unique_violation() => {}
                    other => {
                        other?;
                        info!("Bucket {} created", bucket);
                    }
                }
            }
        }
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DbError> {
        if !is_safe_object_path(path) {
            return Err(DbError::Rejected(format!("invalid object path {path}")));
        }
        let req = self
            .admin(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        send(req).await?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), DbError> {
        if paths.is_empty() {
            return Ok(());
        }
        let req = self
            .admin(Method::DELETE, &format!("/storage/v1/object/{bucket}"))
            .json(&json!({ "prefixes": paths }));
        send(req).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!("/storage/v1/object/public/{bucket}/{path}"))
    }
}
