use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use lance_api::AppStateInner;
use lance_db::{Backend, Database, LocalStorage, SupabaseClient};

/// Placeholder JWT secrets that MUST NOT be used by the local backend.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lance=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = env_or("LANCE_HOST", "0.0.0.0");
    let port: u16 = env_or("LANCE_PORT", "5000")
        .parse()
        .context("LANCE_PORT must be a port number")?;
    let public_url = env_or("LANCE_PUBLIC_URL", &format!("http://localhost:{port}"));
    let secure_cookies = public_url.starts_with("https://");

    let supabase_url = env_opt("SUPABASE_URL");
    let default_backend = if supabase_url.is_some() { "supabase" } else { "local" };
    let backend_kind = env_or("LANCE_BACKEND", default_backend);

    let mut app = Router::new();
    let backend = match backend_kind.as_str() {
        "supabase" => {
            let url = supabase_url.context("SUPABASE_URL is required for the supabase backend")?;
            let service_key = env_opt("SUPABASE_SERVICE_ROLE_KEY")
                .context("SUPABASE_SERVICE_ROLE_KEY is required for the supabase backend")?;
            let anon_key = env_opt("SUPABASE_ANON_KEY");
            if anon_key.is_none() {
                warn!("SUPABASE_ANON_KEY not set, using the service key for sign-in");
            }

            let client = SupabaseClient::new(&url, &service_key, anon_key.as_deref())?;
            info!("Using Supabase backend at {}", url);
            Backend::supabase(client)
        }
        "local" => {
            let jwt_secret = env_or("LANCE_JWT_SECRET", "");
            if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
                bail!("LANCE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
            }
            let db_path = PathBuf::from(env_or("LANCE_DB_PATH", "lance.db"));
            let storage_dir = PathBuf::from(env_or("LANCE_STORAGE_DIR", "./storage"));
            tokio::fs::create_dir_all(&storage_dir)
                .await
                .with_context(|| format!("creating {}", storage_dir.display()))?;

            let db = Database::open(&db_path)?;
            let storage = LocalStorage::new(storage_dir.clone(), &public_url);

            // Same URL layout as hosted storage, so stored links keep working.
            app = app.nest_service("/storage/v1/object/public", ServeDir::new(&storage_dir));
            info!(
                "Using local backend (db {}, storage {})",
                db_path.display(),
                storage_dir.display()
            );
            Backend::local(db, &jwt_secret, storage)
        }
        other => bail!("LANCE_BACKEND must be 'supabase' or 'local', got '{other}'"),
    };

    let state = AppStateInner::new(backend, secure_cookies);
    let app = app
        .merge(lance_api::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Lance Fácil API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
