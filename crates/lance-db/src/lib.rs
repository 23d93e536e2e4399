pub mod auth;
pub mod error;
pub mod local_auth;
pub mod local_storage;
pub mod migrations;
pub mod query;
pub mod retry;
pub mod sqlite;
pub mod storage;
pub mod store;
pub mod supabase;

use std::sync::Arc;

pub use auth::{AuthProvider, AuthUser, Session};
pub use error::DbError;
pub use local_auth::LocalAuth;
pub use local_storage::LocalStorage;
pub use query::Query;
pub use retry::with_retry;
pub use sqlite::Database;
pub use storage::ObjectStore;
pub use store::Store;
pub use supabase::SupabaseClient;

/// The three platform handles every request needs.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn ObjectStore>,
}

impl Backend {
    pub fn supabase(client: SupabaseClient) -> Self {
        let client = Arc::new(client);
        Self {
            store: client.clone(),
            auth: client.clone(),
            storage: client,
        }
    }

    pub fn local(db: Database, jwt_secret: &str, storage: LocalStorage) -> Self {
        Self {
            auth: Arc::new(LocalAuth::new(db.clone(), jwt_secret)),
            store: Arc::new(db),
            storage: Arc::new(storage),
        }
    }
}
