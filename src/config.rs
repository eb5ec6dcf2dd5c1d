// src/config.rs
use crate::errors::CampaignError;
use crate::services::poller::PollConfig;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub base_url: String,
    pub analysis_model: String,
    pub image_model: String,
    pub video_model: String,
    pub poll: PollConfig,
    pub video_api_key: Option<String>,
    pub credential_prompt_timeout: Duration,
    pub redis_url: Option<String>,
    pub media_ttl_secs: u64,
    pub bind_addr: String,
    pub max_source_image_dim: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, CampaignError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| CampaignError::Config("GEMINI_API_KEY must be set".to_string()))?;

        Ok(Self {
            api_key,
            base_url: env_or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            analysis_model: env_or("ANALYSIS_MODEL", "gemini-3-flash-preview"),
            image_model: env_or("IMAGE_MODEL", "gemini-2.5-flash-image"),
            video_model: env_or("VIDEO_MODEL", "veo-3.1-fast-generate-preview"),
            poll: PollConfig {
                interval: Duration::from_secs(env_parse("VIDEO_POLL_INTERVAL_SECS", 5)?),
                max_attempts: env_parse("VIDEO_POLL_MAX_ATTEMPTS", 120)?,
            },
            video_api_key: std::env::var("VIDEO_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            credential_prompt_timeout: Duration::from_secs(env_parse(
                "CREDENTIAL_PROMPT_TIMEOUT_SECS",
                300,
            )?),
            redis_url: std::env::var("REDIS_URL").ok(),
            media_ttl_secs: env_parse("MEDIA_TTL_SECS", 86400)?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            max_source_image_dim: env_parse("MAX_SOURCE_IMAGE_DIM", 2048)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, CampaignError> {
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, CampaignError> {
    raw.trim()
        .parse()
        .map_err(|_| CampaignError::Config(format!("{} has an invalid value: {}", key, raw)))
}
