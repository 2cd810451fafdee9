mod medical;
pub mod session;

use crate::application::{
    CaseGenerationUseCase, CatalogUseCase, ConnectionUseCase, PromptTestUseCase,
    QuestionnaireUseCase,
};
use crate::domain::error::AppError;
use crate::domain::llm_config::ApiCredential;
use crate::infrastructure::db::{
    MedicalCaseRepository, QuestionnaireRepository, TemplateRepository, TestCaseRepository,
};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::security::credentials::{mask_key, resolve_api_key};
use actix_cors::Cors;
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

pub struct HttpState {
    pub prompt_tests: PromptTestUseCase,
    pub case_generation: CaseGenerationUseCase,
    pub questionnaire: QuestionnaireUseCase,
    pub catalog: CatalogUseCase,
    pub connection: ConnectionUseCase,
    pub env_credential: Option<ApiCredential>,
    pub session_key: Key,
}

impl HttpState {
    pub fn new(
        pool: SqlitePool,
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        env_credential: Option<ApiCredential>,
        session_secret: &str,
    ) -> Self {
        let test_cases = TestCaseRepository::new(pool.clone());
        let cases = MedicalCaseRepository::new(pool.clone());
        let templates = TemplateRepository::new(pool.clone());
        let items = QuestionnaireRepository::new(pool);

        Self {
            prompt_tests: PromptTestUseCase::new(llm_client.clone(), test_cases),
            case_generation: CaseGenerationUseCase::new(
                llm_client.clone(),
                cases.clone(),
                templates.clone(),
            ),
            questionnaire: QuestionnaireUseCase::new(llm_client.clone(), cases.clone(), items),
            catalog: CatalogUseCase::new(cases, templates),
            connection: ConnectionUseCase::new(llm_client),
            env_credential,
            session_key: session::session_key(session_secret),
        }
    }

    /// Session key first, then the environment fallback.
    pub fn credential(&self, req: &HttpRequest) -> Option<ApiCredential> {
        let stored = session::stored_api_key(req, &self.session_key);
        resolve_api_key(stored.as_deref(), self.env_credential.as_ref())
    }

    pub fn require_credential(&self, req: &HttpRequest) -> Result<ApiCredential, AppError> {
        self.credential(req).ok_or_else(|| {
            AppError::CredentialError(
                "API key is required. Please connect your OpenAI account first.".to_string(),
            )
        })
    }
}

fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AppError::CredentialError(_) => StatusCode::UNAUTHORIZED,
        AppError::LLMError(_) => StatusCode::BAD_GATEWAY,
        AppError::ParseError(_)
        | AppError::DatabaseError(_)
        | AppError::IoError(_)
        | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Every failure leaves the surface as `{ "success": false, "message": .. }`.
pub(crate) fn error_response(error: AppError) -> HttpResponse {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    } else {
        tracing::warn!(error = %error, "Request rejected");
    }
    HttpResponse::build(status).json(json!({
        "success": false,
        "message": error.to_string(),
    }))
}

pub(crate) fn respond<T: Serialize>(result: Result<T, AppError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ConnectRequest {
    pub api_key: String,
}

#[derive(Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub source: Option<&'static str>,
    pub masked_key: Option<String>,
}

#[post("/connect")]
async fn connect(data: web::Data<HttpState>, body: web::Json<ConnectRequest>) -> impl Responder {
    let credential = ApiCredential::new(body.api_key.trim());
    let check = data.connection.validate(&credential).await;
    if !check.valid {
        tracing::warn!(message = %check.message, "API key rejected");
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": check.message,
        }));
    }

    match session::session_cookie(credential.expose(), &data.session_key) {
        Some(cookie) => {
            tracing::info!(key = %mask_key(&credential), "API key stored in session");
            HttpResponse::Ok().cookie(cookie).json(json!({
                "success": true,
                "message": check.message,
            }))
        }
        None => error_response(AppError::Internal(
            "Failed to create session cookie".to_string(),
        )),
    }
}

#[post("/disconnect")]
async fn disconnect() -> impl Responder {
    HttpResponse::Ok()
        .cookie(session::removal_cookie())
        .json(json!({ "success": true, "message": "Disconnected" }))
}

#[get("/status")]
async fn connection_status(req: HttpRequest, data: web::Data<HttpState>) -> impl Responder {
    let from_session = session::stored_api_key(&req, &data.session_key)
        .filter(|key| !key.trim().is_empty())
        .is_some();
    let credential = data.credential(&req);

    let source = match (&credential, from_session) {
        (None, _) => None,
        (Some(_), true) => Some("session"),
        (Some(_), false) => Some("environment"),
    };
    HttpResponse::Ok().json(ConnectionStatus {
        connected: credential.is_some(),
        source,
        masked_key: credential.as_ref().map(mask_key),
    })
}

#[get("/models")]
async fn list_models(req: HttpRequest, data: web::Data<HttpState>) -> impl Responder {
    match data.require_credential(&req) {
        Ok(credential) => HttpResponse::Ok().json(data.connection.available_models(&credential).await),
        Err(e) => error_response(e),
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": format!("Invalid request body: {}", err),
        }));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .service(connect)
            .service(disconnect)
            .service(connection_status)
            .service(list_models)
            .configure(prompt_tests::configure)
            .configure(medical::configure),
    );
}

pub fn start_server(state: HttpState, bind_address: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Local tool, any origin

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_address, port))?
    .run();

    tracing::info!(bind_address, port, "HTTP server listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::ScriptedClient;
    use crate::domain::medical_case::NewMedicalCase;
    use crate::infrastructure::db::sqlite::memory_pool;
    use actix_web::http::header;
    use actix_web::test;
    use serde_json::Value;

    async fn state(env_key: Option<&str>) -> (web::Data<HttpState>, SqlitePool) {
        let pool = memory_pool().await;
        let client = ScriptedClient::new(vec![ScriptedClient::success("Hello!")]);
        let state = HttpState::new(
            pool.clone(),
            client,
            env_key.map(ApiCredential::new),
            "test_secret",
        );
        (web::Data::new(state), pool)
    }

    #[actix_web::test]
    async fn test_status_reports_environment_fallback() {
        let (data, _) = state(Some("sk-env-12345678")).await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["connected"], true);
        assert_eq!(body["source"], "environment");
        assert_eq!(body["masked_key"], "sk-...5678");
    }

    #[actix_web::test]
    async fn test_connect_sets_session_cookie() {
        let (data, _) = state(None).await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/connect")
            .set_json(json!({ "api_key": "sk-session-abcdef" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == session::SESSION_COOKIE)
            .map(|c| c.into_owned())
            .unwrap();

        let req = test::TestRequest::get()
            .uri("/api/status")
            .cookie(cookie)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["source"], "session");
    }

    #[actix_web::test]
    async fn test_missing_credential_is_json_error() {
        let (data, _) = state(None).await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/models").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("API key is required"));
    }

    #[actix_web::test]
    async fn test_export_is_an_attachment() {
        let (data, pool) = state(None).await;
        let case_id = MedicalCaseRepository::new(pool)
            .save_case(
                &NewMedicalCase {
                    title: "Dizziness".to_string(),
                    ..NewMedicalCase::default()
                },
                &["Benign paroxysmal positional vertigo".to_string()],
            )
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/medical/cases/{case_id}/export?format=json"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains(&format!("medical_case_{case_id}_")));

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["title"], "Dizziness");
    }

    #[actix_web::test]
    async fn test_unknown_case_is_404_json() {
        let (data, _) = state(None).await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/medical/cases/999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }
}
