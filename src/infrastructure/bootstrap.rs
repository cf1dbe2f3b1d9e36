use std::error::Error;
use std::sync::Arc;

use tauri::Manager;
use tracing::{error, info, warn};

use crate::application::ImportSession;
use crate::domain::app_config::AppConfig;
use crate::infrastructure::backend::LocalSpreadsheetBackend;
use crate::infrastructure::config::ConfigService;
use crate::infrastructure::logging::init_tracing;
use crate::interfaces::tauri::{AppState, TauriFileDialog};

pub fn setup(app: &mut tauri::App) -> Result<(), Box<dyn Error>> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to load .env: {}", err);
        }
    }

    let config_dir = app.path().app_config_dir().ok();
    let config_service = ConfigService::new(config_dir.as_deref());
    let (config, load_error) = match config_service.load() {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };

    init_tracing(&config.log_filter);
    if let Some(err) = load_error {
        error!(
            error = %err,
            config_path = ?config_service.config_path(),
            "Failed to load configuration, using defaults"
        );
    }
    if config_dir.is_none() {
        warn!("No app config dir available, configuration file is ignored");
    }

    info!(
        config_path = ?config_service.config_path(),
        palette = config.duplicate_palette_size,
        "Configuration loaded"
    );

    let backend = Arc::new(LocalSpreadsheetBackend::new(config.output_sheet_name.clone()));
    let dialog = Arc::new(TauriFileDialog::new(app.handle().clone()));
    let import_session = Arc::new(ImportSession::new(backend, dialog, config));

    app.manage(Arc::new(AppState { import_session }));

    Ok(())
}
