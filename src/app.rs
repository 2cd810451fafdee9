use crate::application::use_cases::connection::{ConnectionReport, ConnectionUseCase};
use crate::application::use_cases::export::{export_case, ExportFormat};
use crate::application::CatalogUseCase;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::{sqlite, MedicalCaseRepository, TemplateRepository};
use crate::infrastructure::llm_clients::{LLMClient, OpenAIClient};
use crate::infrastructure::security::credentials::{mask_key, resolve_api_key};
use crate::interfaces::http::{start_server, HttpState};
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Loads `.env` and installs the fmt subscriber. The file is read before the
/// filter is built so a `RUST_LOG` kept there takes effect.
pub fn init_tracing() {
    let (filter, env_file) = load_env_filter();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    match env_file {
        Some(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        None => tracing::debug!("No .env file loaded"),
    }
}

fn load_env_filter() -> (EnvFilter, Option<PathBuf>) {
    let env_file = dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    (filter, env_file)
}

/// Everything the entry points share once startup succeeded.
pub struct AppContext {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl AppContext {
    pub async fn bootstrap(config_path: &Path) -> Result<Self> {
        let config = AppConfig::load_from(config_path)?;
        let pool = sqlite::connect(&config.database_url).await?;
        let llm_client: Arc<dyn LLMClient + Send + Sync> =
            Arc::new(OpenAIClient::new(&config.api_base_url));

        tracing::info!(
            api_base_url = %config.api_base_url,
            env_credential = config.fallback_credential().is_some(),
            "Application context ready"
        );
        Ok(Self {
            config,
            pool,
            llm_client,
        })
    }

    pub async fn serve(self) -> Result<()> {
        let state = HttpState::new(
            self.pool.clone(),
            self.llm_client.clone(),
            self.config.fallback_credential(),
            &self.config.session_secret,
        );
        let server = start_server(state, &self.config.bind_address, self.config.port)?;
        server.await?;
        self.pool.close().await;
        Ok(())
    }

    /// Uses the environment credential; there is no session on the CLI.
    pub async fn check_connection(&self) -> Result<ConnectionReport> {
        let env_credential = self.config.fallback_credential();
        let credential = resolve_api_key(None, env_credential.as_ref()).ok_or_else(|| {
            AppError::CredentialError("OPENAI_API_KEY environment variable not found".to_string())
        })?;

        tracing::info!(key = %mask_key(&credential), "Checking upstream connection");
        let report = ConnectionUseCase::new(self.llm_client.clone())
            .check(&credential)
            .await;
        Ok(report)
    }

    /// `out` may be a file or a directory that receives the generated
    /// filename. Without it the rendered content is handed back.
    pub async fn export(
        &self,
        case_id: i64,
        format: ExportFormat,
        out: Option<PathBuf>,
    ) -> Result<ExportOutput> {
        let catalog = CatalogUseCase::new(
            MedicalCaseRepository::new(self.pool.clone()),
            TemplateRepository::new(self.pool.clone()),
        );
        let detail = catalog.get_case(case_id).await?;
        let document = export_case(&detail, format)?;

        match out {
            Some(path) => {
                let path = if path.is_dir() {
                    path.join(&document.filename)
                } else {
                    path
                };
                tokio::fs::write(&path, document.content.as_bytes()).await?;
                tracing::info!(case_id, path = %path.display(), "Case exported");
                Ok(ExportOutput::Written(path))
            }
            None => Ok(ExportOutput::Rendered(document.content)),
        }
    }
}

pub enum ExportOutput {
    Written(PathBuf),
    Rendered(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_env_file_sets_log_filter() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(".env", "RUST_LOG=medcase_lib=trace\n")?;

            let (filter, env_file) = load_env_filter();
            assert!(env_file.is_some());
            assert_eq!(filter.to_string(), "medcase_lib=trace");
            // Set by the file rather than the jail, so the jail won't undo it.
            std::env::remove_var("RUST_LOG");
            Ok(())
        });
    }
}
