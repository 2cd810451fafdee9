use super::{error_response, respond, HttpState};
use crate::application::use_cases::export::{export_case, ExportFormat};
use crate::domain::error::AppError;
use crate::domain::generation::CaseGenerationOptions;
use crate::domain::medical_case::{NewCaseTemplate, NewSpecialty};
use crate::domain::questionnaire::QuestionnaireSelection;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

#[derive(Deserialize)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub options: CaseGenerationOptions,
    #[serde(default)]
    pub save: bool,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[post("/medical/generate")]
async fn generate_case(
    req: HttpRequest,
    data: web::Data<HttpState>,
    body: web::Json<GenerateRequest>,
) -> impl Responder {
    let credential = match data.require_credential(&req) {
        Ok(credential) => credential,
        Err(e) => return error_response(e),
    };
    respond(
        data.case_generation
            .generate(&credential, &body.options, body.save)
            .await,
    )
}

#[get("/medical/cases")]
async fn list_cases(data: web::Data<HttpState>) -> impl Responder {
    respond(data.catalog.list_cases().await)
}

#[get("/medical/cases/recent")]
async fn recent_cases(data: web::Data<HttpState>) -> impl Responder {
    respond(data.catalog.recent_cases().await)
}

#[get("/medical/cases/{id}")]
async fn get_case(data: web::Data<HttpState>, path: web::Path<i64>) -> impl Responder {
    match data.catalog.get_case(path.into_inner()).await {
        Ok(detail) => HttpResponse::Ok().json(detail.record()),
        Err(e) => error_response(e),
    }
}

#[delete("/medical/cases/{id}")]
async fn delete_case(data: web::Data<HttpState>, path: web::Path<i64>) -> impl Responder {
    match data.catalog.delete_case(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => error_response(e),
    }
}

#[get("/medical/cases/{id}/export")]
async fn export(
    data: web::Data<HttpState>,
    path: web::Path<i64>,
    query: web::Query<ExportQuery>,
) -> impl Responder {
    let format = match ExportFormat::from_str(query.format.as_deref().unwrap_or("txt")) {
        Ok(format) => format,
        Err(e) => return error_response(e),
    };
    let document = match data.catalog.get_case(path.into_inner()).await {
        Ok(detail) => export_case(&detail, format),
        Err(e) => Err(e),
    };

    match document {
        Ok(document) => HttpResponse::Ok()
            .content_type(document.media_type)
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(document.filename)],
            })
            .body(document.content),
        Err(e) => error_response(e),
    }
}

#[get("/medical/cases/{id}/questionnaire")]
async fn get_questionnaire(
    req: HttpRequest,
    data: web::Data<HttpState>,
    path: web::Path<i64>,
) -> impl Responder {
    let credential = data.credential(&req);
    respond(
        data.questionnaire
            .get_questionnaire(credential.as_ref(), path.into_inner())
            .await,
    )
}

#[post("/medical/cases/{id}/questionnaire/regenerate")]
async fn regenerate_questionnaire(
    req: HttpRequest,
    data: web::Data<HttpState>,
    path: web::Path<i64>,
) -> impl Responder {
    let credential = match data.require_credential(&req) {
        Ok(credential) => credential,
        Err(e) => return error_response(e),
    };
    respond(data.questionnaire.regenerate(&credential, path.into_inner()).await)
}

#[get("/medical/cases/{id}/questionnaire/items")]
async fn questionnaire_items(data: web::Data<HttpState>, path: web::Path<i64>) -> impl Responder {
    respond(data.questionnaire.list_items(path.into_inner()).await)
}

#[post("/medical/questionnaire/selection")]
async fn save_selection(
    data: web::Data<HttpState>,
    body: web::Json<QuestionnaireSelection>,
) -> impl Responder {
    if data.questionnaire.save_selection(&body).await {
        HttpResponse::Ok().json(json!({ "success": true }))
    } else {
        error_response(AppError::DatabaseError(
            "Failed to save questionnaire selection".to_string(),
        ))
    }
}

#[get("/medical/specialties")]
async fn list_specialties(data: web::Data<HttpState>) -> impl Responder {
    respond(data.catalog.list_specialties().await)
}

#[post("/medical/specialties")]
async fn add_specialty(data: web::Data<HttpState>, body: web::Json<NewSpecialty>) -> impl Responder {
    respond(data.catalog.add_specialty(&body).await)
}

#[get("/medical/templates")]
async fn list_templates(data: web::Data<HttpState>) -> impl Responder {
    respond(data.catalog.list_templates().await)
}

#[post("/medical/templates")]
async fn add_template(data: web::Data<HttpState>, body: web::Json<NewCaseTemplate>) -> impl Responder {
    respond(data.catalog.add_template(&body).await)
}

#[get("/medical/templates/{id}")]
async fn get_template(data: web::Data<HttpState>, path: web::Path<i64>) -> impl Responder {
    respond(data.catalog.get_template(path.into_inner()).await)
}

#[delete("/medical/templates/{id}")]
async fn delete_template(data: web::Data<HttpState>, path: web::Path<i64>) -> impl Responder {
    match data.catalog.delete_template(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => error_response(e),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // `recent` must be registered ahead of the `{id}` routes.
    cfg.service(generate_case)
        .service(recent_cases)
        .service(list_cases)
        .service(get_case)
        .service(delete_case)
        .service(export)
        .service(get_questionnaire)
        .service(regenerate_questionnaire)
        .service(questionnaire_items)
        .service(save_selection)
        .service(list_specialties)
        .service(add_specialty)
        .service(list_templates)
        .service(add_template)
        .service(get_template)
        .service(delete_template);
}
