use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use validator::Validate;

use crate::domain::app_config::AppConfig;
use crate::domain::error::{AppError, Result};

pub const CONFIG_FILE_NAME: &str = "order-import.toml";
pub const ENV_PREFIX: &str = "ORDER_IMPORT_";

/// Layers defaults, an optional TOML file and `ORDER_IMPORT_*` variables.
pub struct ConfigService {
    config_path: Option<PathBuf>,
}

impl ConfigService {
    pub fn new(config_dir: Option<&Path>) -> Self {
        Self {
            config_path: config_dir.map(|dir| dir.join(CONFIG_FILE_NAME)),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = &self.config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        config
            .validate()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        Ok(config)
    }
}
