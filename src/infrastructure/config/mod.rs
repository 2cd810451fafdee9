use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::ApiCredential;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "medcase.toml";

const ENV_KEYS: [&str; 6] = [
    "database_url",
    "session_secret",
    "openai_api_key",
    "api_base_url",
    "bind_address",
    "port",
];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub openai_api_key: Option<String>,
    pub api_base_url: String,
    pub bind_address: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://medcase.db".to_string(),
            session_secret: "dev_secret_key".to_string(),
            openai_api_key: None,
            api_base_url: "https://api.openai.com/v1".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (if present), then process environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().only(&ENV_KEYS))
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base_url).map_err(|e| {
            AppError::ValidationError(format!("api_base_url is not a valid URL: {}", e))
        })?;
        if self.port == 0 {
            return Err(AppError::ValidationError(
                "port must be non-zero".to_string(),
            ));
        }
        if self.session_secret.trim().is_empty() {
            return Err(AppError::ValidationError(
                "session_secret must not be empty".to_string(),
            ));
        }
        if self.database_url.trim().is_empty() {
            return Err(AppError::ValidationError(
                "database_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Environment-level credential used when the session carries none.
    pub fn fallback_credential(&self) -> Option<ApiCredential> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ApiCredential::new)
    }
}
