// src/handlers.rs
use crate::errors::CampaignError;
use crate::models::*;
use crate::pipeline::CommandOutcome;
use crate::services::ImageProcessor;
use crate::sessions::{Session, SessionRegistry};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub image_processor: Arc<ImageProcessor>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .route("/sessions", web::post().to(create_session))
            .route("/sessions", web::get().to(list_sessions))
            .route("/sessions/{id}", web::get().to(get_session))
            .route("/sessions/{id}", web::delete().to(delete_session))
            .route("/sessions/{id}/submit", web::post().to(submit_brief))
            .route("/sessions/{id}/select/{slot}", web::post().to(select_image))
            .route("/sessions/{id}/preview", web::post().to(request_preview))
            .route("/sessions/{id}/final", web::post().to(confirm_final))
            .route("/sessions/{id}/discard", web::post().to(discard_preview))
            .route("/sessions/{id}/reset", web::post().to(reset_session))
            .route("/sessions/{id}/error", web::delete().to(dismiss_error))
            .route("/sessions/{id}/credential", web::post().to(provide_credential))
            .route("/sessions/{id}/credential", web::delete().to(cancel_credential))
            .route("/media/{handle}", web::get().to(get_media)),
    );
}

fn command_response(session: &Session, outcome: CommandOutcome) -> HttpResponse {
    let snapshot = session.pipeline.snapshot();
    match outcome {
        CommandOutcome::Applied => HttpResponse::Accepted().json(snapshot),
        CommandOutcome::Ignored(reason) => HttpResponse::Conflict().json(serde_json::json!({
            "error": "Command ignored",
            "message": reason,
            "snapshot": snapshot
        })),
    }
}

fn field_text(name: &str, bytes: Vec<u8>) -> Result<String, CampaignError> {
    String::from_utf8(bytes)
        .map_err(|_| CampaignError::Validation(format!("Field {} is not valid UTF-8", name)))
}

pub async fn create_session(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let session = data.sessions.create().await;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "session_id": session.id,
        "snapshot": session.pipeline.snapshot()
    })))
}

pub async fn list_sessions(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let sessions = data.sessions.list().await;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions
    })))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session.pipeline.snapshot()))
}

pub async fn delete_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    data.sessions.remove(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn submit_brief(
    path: web::Path<Uuid>,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;

    let mut description = String::new();
    let mut style_set = StyleSetId::default();
    let mut aspect_ratio = AspectRatio::default();
    let mut camera_movement = CameraMovement::default();
    let mut image: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let content_type = field.content_type().map(|ct| ct.essence_str().to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "description" => description = field_text(&name, bytes)?,
            "filter" => style_set = field_text(&name, bytes)?.parse()?,
            "aspect_ratio" => aspect_ratio = field_text(&name, bytes)?.parse()?,
            "camera_movement" => camera_movement = field_text(&name, bytes)?.parse()?,
            "image" => image = Some((content_type, bytes)),
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    let source_image = match image {
        Some((content_type, bytes)) if !bytes.is_empty() => {
            // Browsers often send a generic type; trust the bytes then.
            let mime_type = match content_type {
                Some(ct) if SUPPORTED_MEDIA_TYPES.contains(&ct.as_str()) => ct,
                _ => data.image_processor.detect_media_type(&bytes)?.to_string(),
            };
            data.image_processor
                .prepare_source(ImageData::new(mime_type, bytes))?
        }
        _ => ImageData::new("application/octet-stream", Vec::new()),
    };

    let brief = CampaignBrief::new(
        description,
        source_image,
        style_set,
        aspect_ratio,
        camera_movement,
    );
    let outcome = session.pipeline.submit(brief).await?;
    Ok(command_response(&session, outcome))
}

pub async fn select_image(
    path: web::Path<(Uuid, usize)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (id, slot) = path.into_inner();
    let session = data.sessions.get(&id).await?;
    let outcome = session.pipeline.select_image(SlotId(slot)).await?;
    Ok(command_response(&session, outcome))
}

pub async fn request_preview(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let outcome = session.pipeline.request_preview().await?;
    Ok(command_response(&session, outcome))
}

pub async fn confirm_final(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let outcome = session.pipeline.confirm_final().await?;
    Ok(command_response(&session, outcome))
}

pub async fn discard_preview(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let outcome = session.pipeline.discard_preview().await?;
    Ok(command_response(&session, outcome))
}

pub async fn reset_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    session.credentials.cancel().await;
    let outcome = session.pipeline.reset().await?;
    Ok(command_response(&session, outcome))
}

pub async fn dismiss_error(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let outcome = session.pipeline.dismiss_error().await?;
    Ok(command_response(&session, outcome))
}

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub api_key: String,
}

pub async fn provide_credential(
    path: web::Path<Uuid>,
    body: web::Json<CredentialRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let answered = session
        .credentials
        .provide(body.into_inner().api_key)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "answered_prompt": answered
    })))
}

pub async fn cancel_credential(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let cancelled = session.credentials.cancel().await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "cancelled": cancelled
    })))
}

pub async fn get_media(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let handle = MediaHandle(path.into_inner());

    match data.sessions.media().get(&handle).await? {
        Some(media) => Ok(HttpResponse::Ok()
            .content_type(media.mime_type)
            .body(media.bytes)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Not found",
            "message": format!("No media stored for {}", handle)
        }))),
    }
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "adfusion",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
