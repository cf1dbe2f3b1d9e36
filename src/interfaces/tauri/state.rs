use std::sync::Arc;

use crate::application::ImportSession;

/// Managed by Tauri; the one import session of the window.
pub struct AppState {
    pub import_session: Arc<ImportSession>,
}
