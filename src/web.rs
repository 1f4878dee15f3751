use actix_cors::Cors;
use actix_files::NamedFile;
use actix_multipart::{Field, Multipart};
use actix_web::{
    get, http::StatusCode, middleware::Logger, post, web, App, HttpRequest, HttpResponse,
    HttpServer, Responder, Result,
};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::JobError;
use crate::models::Upload;
use crate::processor::Orchestrator;
use crate::validation::ValidationError;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub max_upload_size: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct NotFoundResponse {
    error: &'static str,
}

#[get("/health")]
async fn health() -> impl Responder {
    web::Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[post("/process")]
async fn process(
    data: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, JobError> {
    let multipart = Multipart::new(req.headers(), payload);
    let upload = read_upload(multipart, data.max_upload_size).await?;

    info!(filename = %upload.filename, size = upload.bytes.len(), "upload received");

    let files = data.orchestrator.process(upload).await?;

    Ok(HttpResponse::build(StatusCode::OK).json(files))
}

/// Pulls the `file` field out of the form; every other field is drained.
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Upload, JobError> {
    let mut upload = None;

    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|err| {
            debug!("malformed multipart body: {}", err);
            ValidationError::MissingFile
        })?;

        let disposition = field.content_disposition();
        let is_file = disposition.get_name() == Some("file");
        let filename = disposition.get_filename().unwrap_or_default().to_owned();

        if is_file && upload.is_none() {
            let bytes = read_field(&mut field, limit).await?;
            upload = Some(Upload { filename, bytes });
        } else {
            drain_field(&mut field).await?;
        }
    }

    upload.ok_or_else(|| ValidationError::MissingFile.into())
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, JobError> {
    let mut bytes = Vec::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|_| ValidationError::MissingFile)?;

        if bytes.len() + chunk.len() > limit {
            return Err(JobError::PayloadTooLarge { limit });
        }

        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

async fn drain_field(field: &mut Field) -> Result<(), JobError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|_| ValidationError::MissingFile)?;
    }

    Ok(())
}

fn not_found() -> HttpResponse {
    HttpResponse::build(StatusCode::NOT_FOUND).json(NotFoundResponse { error: "Not found" })
}

#[get("/results/{path:.*}")]
async fn results(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let Some(file) = data.orchestrator.storage().resolve_result(&path) else {
        debug!(path = %path, "result not found");
        return not_found();
    };

    match NamedFile::open_async(&file).await {
        Ok(file) => file.into_response(&req),
        Err(_) => not_found(),
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(process).service(results);
}

pub async fn start_web_server(config: &Config, orchestrator: Orchestrator) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState {
        orchestrator,
        max_upload_size: config.max_upload_size,
    });

    info!("Starting web server at {}:{}...", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
