pub mod auth;
pub mod brands;
pub mod config;
pub mod cookies;
pub mod editor;
pub mod error;
pub mod positioning;
pub mod profiles;
pub mod session;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use auth::AuthProvider;
use config::Config;
use editor::EditorConfig;
use session::SessionService;
use std::sync::Arc;
use store::RecordStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub sessions: SessionService,
    pub editor: EditorConfig,
}

impl AppState {
    pub fn new(
        config: Config,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn RecordStore>,
    ) -> Arc<Self> {
        let sessions = SessionService::new(auth, store.clone(), &config);
        let editor = EditorConfig::positioning(config.editor_max_document_bytes);
        Arc::new(Self {
            config,
            store,
            sessions,
            editor,
        })
    }
}
