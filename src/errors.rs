// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CampaignError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Image synthesis error: {0}")]
    ImageSynthesis(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Video synthesis error: {0}")]
    VideoSynthesis(String),

    #[error("Video fetch error: {0}")]
    VideoFetch(String),

    #[error("Video job did not finish after {attempts} polls")]
    VideoTimedOut { attempts: u32 },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Media store error: {0}")]
    Media(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Campaign pipeline is not running")]
    PipelineStopped,
}

impl CampaignError {
    fn category(&self) -> &'static str {
        match self {
            CampaignError::Validation(_) => "Validation error",
            CampaignError::Analysis(_) => "Analysis failed",
            CampaignError::ImageSynthesis(_) => "Image generation failed",
            CampaignError::Credential(_) => "Credential required",
            CampaignError::VideoSynthesis(_) | CampaignError::VideoTimedOut { .. } => {
                "Video generation failed"
            }
            CampaignError::VideoFetch(_) => "Video download failed",
            CampaignError::ImageProcessing(_) => "Image processing error",
            CampaignError::Media(_) => "Media store error",
            CampaignError::Serialization(_) => "Data processing error",
            CampaignError::SessionNotFound(_) => "Not found",
            CampaignError::Config(_) => "Configuration error",
            CampaignError::PipelineStopped => "Internal error",
        }
    }
}

impl ResponseError for CampaignError {
    fn error_response(&self) -> HttpResponse {
        let body = serde_json::json!({
            "error": self.category(),
            "message": self.to_string()
        });

        match self {
            CampaignError::Validation(_) | CampaignError::ImageProcessing(_) => {
                HttpResponse::BadRequest().json(body)
            }
            CampaignError::SessionNotFound(_) => HttpResponse::NotFound().json(body),
            CampaignError::Credential(_) => HttpResponse::Forbidden().json(body),
            CampaignError::Analysis(_)
            | CampaignError::ImageSynthesis(_)
            | CampaignError::VideoSynthesis(_)
            | CampaignError::VideoFetch(_) => HttpResponse::BadGateway().json(body),
            CampaignError::VideoTimedOut { .. } => HttpResponse::GatewayTimeout().json(body),
            CampaignError::Media(_)
            | CampaignError::Serialization(_)
            | CampaignError::Config(_)
            | CampaignError::PipelineStopped => HttpResponse::InternalServerError().json(body),
        }
    }
}
