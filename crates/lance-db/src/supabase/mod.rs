//! Hosted backend: PostgREST tables, GoTrue accounts and Storage buckets of a
//! Supabase project, reached over HTTP with the service role key.

mod auth;
mod rest;
mod storage;

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{DbError, classify_backend_error};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// One memoized HTTP client for every service of the project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    url: String,
    service_key: String,
    anon_key: String,
}

impl SupabaseClient {
    /// `anon_key` is used for end-user sign in; when absent the service key is
    /// used for that too.
    pub fn new(url: &str, service_key: &str, anon_key: Option<&str>) -> Result<Self, DbError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            anon_key: anon_key
                .filter(|k| !k.is_empty())
                .unwrap_or(service_key)
                .to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Request authenticated as the service role.
    fn admin(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Request carrying the public key, optionally on behalf of a user token.
    fn public(&self, method: reqwest::Method, path: &str, user_token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(user_token.unwrap_or(&self.anon_key))
    }
}

/// Send and fail on any non-2xx status with the platform's error classified.
async fn send(req: RequestBuilder) -> Result<Response, DbError> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    debug!("Backend answered {}: {}", status, body);
    Err(classify_backend_error(status.as_u16(), &body))
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, DbError> {
    let resp = send(req).await?;
    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}
