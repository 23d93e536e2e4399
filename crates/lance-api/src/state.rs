use std::sync::Arc;

use lance_db::{AuthProvider, Backend, ObjectStore, Store};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub backend: Backend,
    /// Mark session cookies `Secure` (off for plain-HTTP development).
    pub secure_cookies: bool,
}

impl AppStateInner {
    pub fn new(backend: Backend, secure_cookies: bool) -> AppState {
        Arc::new(Self {
            backend,
            secure_cookies,
        })
    }

    pub fn store(&self) -> &dyn Store {
        self.backend.store.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthProvider {
        self.backend.auth.as_ref()
    }

    pub fn storage(&self) -> &dyn ObjectStore {
        self.backend.storage.as_ref()
    }
}
