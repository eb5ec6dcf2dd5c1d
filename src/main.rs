// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use adfusion::config::AppConfig;
use adfusion::handlers::{self, AppState};
use adfusion::services::{GeminiClient, ImageProcessor, InMemoryMediaStore, MediaStore, RedisMediaStore};
use adfusion::sessions::SessionRegistry;
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting AdFusion service...");

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Initialize services
    let media: Arc<dyn MediaStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisMediaStore::new(url, config.media_ttl_secs)
                .await
                .context("failed to connect to Redis")?,
        ),
        None => {
            warn!("REDIS_URL not set; keeping generated media in memory");
            Arc::new(InMemoryMediaStore::new())
        }
    };
    let client = Arc::new(GeminiClient::new(&config));

    let app_state = AppState {
        sessions: Arc::new(SessionRegistry::new(
            client,
            media,
            config.video_api_key.clone(),
            config.credential_prompt_timeout,
        )),
        image_processor: Arc::new(ImageProcessor::new(config.max_source_image_dim)),
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
