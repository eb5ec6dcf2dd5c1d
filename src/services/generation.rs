// src/services/generation.rs
use crate::config::AppConfig;
use crate::errors::CampaignError;
use crate::models::*;
use crate::services::poller::{PollConfig, PollOutcome, poll_until_done};
use crate::services::prompts;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Instant;

/// Input for one animation job.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub image: ImageData,
    pub aspect_ratio: AspectRatio,
    pub camera_movement: CameraMovement,
    pub tier: QualityTier,
    /// Selected paid-tier credential; overrides the default key.
    pub credential: Option<String>,
}

/// The external creative-generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn analyze(&self, brief: &CampaignBrief) -> Result<CreativeAnalysis, CampaignError>;

    async fn synthesize_image(
        &self,
        prompt_text: &str,
        style_name: &str,
        source_image: &ImageData,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageData, CampaignError>;

    /// Submits the job, polls it to completion and downloads the result.
    async fn synthesize_video(&self, request: VideoRequest) -> Result<VideoMedia, CampaignError>;
}

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    analysis_model: String,
    image_model: String,
    video_model: String,
    poll: PollConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            analysis_model: config.analysis_model.clone(),
            image_model: config.image_model.clone(),
            video_model: config.video_model.clone(),
            poll: config.poll,
            client: Client::new(),
        }
    }

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    async fn check_operation(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, CampaignError> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", key)
            .send()
            .await
            .map_err(|e| CampaignError::VideoSynthesis(format!("Status request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CampaignError::VideoSynthesis(format!(
                "Status check error: {}",
                error_text
            )));
        }

        let operation: Value = response.json().await.map_err(|e| {
            CampaignError::VideoSynthesis(format!("Failed to parse operation status: {}", e))
        })?;

        finished_video_uri(&operation)
    }

    async fn fetch_video(&self, uri: &str, key: &str) -> Result<VideoMedia, CampaignError> {
        let response = self
            .client
            .get(uri)
            .header("x-goog-api-key", key)
            .send()
            .await
            .map_err(|e| CampaignError::VideoFetch(format!("Download request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CampaignError::VideoFetch(format!(
                "Failed to download generated video ({})",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CampaignError::VideoFetch(format!("Failed to read video body: {}", e)))?;

        if bytes.is_empty() {
            return Err(CampaignError::VideoFetch("Downloaded video is empty".to_string()));
        }

        Ok(VideoMedia { mime_type, bytes })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn analyze(&self, brief: &CampaignBrief) -> Result<CreativeAnalysis, CampaignError> {
        let start = Instant::now();
        let set = prompts::style_set(brief.style_set);

        let response = self
            .client
            .post(self.model_endpoint(&self.analysis_model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "systemInstruction": {
                    "parts": [{ "text": prompts::analysis_system_instruction(&set) }]
                },
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": prompts::analysis_user_prompt(&brief.description, &set) },
                        {
                            "inlineData": {
                                "mimeType": brief.source_image.mime_type,
                                "data": brief.source_image.to_base64()
                            }
                        }
                    ]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": prompts::analysis_response_schema()
                }
            }))
            .send()
            .await
            .map_err(|e| CampaignError::Analysis(format!("Analysis request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CampaignError::Analysis(format!(
                "Analysis error: {}",
                error_text
            )));
        }

        let result: Value = response.json().await.map_err(|e| {
            CampaignError::Analysis(format!("Failed to parse analysis response: {}", e))
        })?;

        let content = response_text(&result)
            .ok_or_else(|| CampaignError::Analysis("No content in analysis response".to_string()))?;

        let analysis = parse_analysis(&content)?;

        info!(
            "Analysis finished in {}ms: category={}, {} prompts",
            start.elapsed().as_millis(),
            analysis.category,
            analysis.prompts.len()
        );
        Ok(analysis)
    }

    async fn synthesize_image(
        &self,
        prompt_text: &str,
        style_name: &str,
        source_image: &ImageData,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageData, CampaignError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.model_endpoint(&self.image_model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": prompts::image_prompt(prompt_text) },
                        {
                            "inlineData": {
                                "mimeType": source_image.mime_type,
                                "data": source_image.to_base64()
                            }
                        }
                    ]
                }],
                "generationConfig": {
                    "responseModalities": ["IMAGE"],
                    "imageConfig": { "aspectRatio": aspect_ratio.as_str() }
                }
            }))
            .send()
            .await
            .map_err(|e| {
                CampaignError::ImageSynthesis(format!("{}: request failed: {}", style_name, e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CampaignError::ImageSynthesis(format!(
                "{}: {}",
                style_name, error_text
            )));
        }

        let result: Value = response.json().await.map_err(|e| {
            CampaignError::ImageSynthesis(format!("{}: failed to parse response: {}", style_name, e))
        })?;

        let image = inline_image(&result).ok_or_else(|| {
            CampaignError::ImageSynthesis(format!("{}: no image generated", style_name))
        })??;

        debug!(
            "Generated {} image in {}ms",
            style_name,
            start.elapsed().as_millis()
        );
        Ok(image)
    }

    async fn synthesize_video(&self, request: VideoRequest) -> Result<VideoMedia, CampaignError> {
        let start = Instant::now();
        let key = request.credential.as_deref().unwrap_or(&self.api_key);

        let response = self
            .client
            .post(self.model_endpoint(&self.video_model, "predictLongRunning"))
            .header("x-goog-api-key", key)
            .json(&json!({
                "instances": [{
                    "prompt": prompts::animation_prompt(request.camera_movement, request.aspect_ratio),
                    "image": {
                        "bytesBase64Encoded": request.image.to_base64(),
                        "mimeType": request.image.mime_type
                    }
                }],
                "parameters": {
                    "aspectRatio": request.aspect_ratio.as_str(),
                    "resolution": request.tier.resolution(),
                    "sampleCount": 1
                }
            }))
            .send()
            .await
            .map_err(|e| CampaignError::VideoSynthesis(format!("Video request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CampaignError::VideoSynthesis(format!(
                "Video generation error: {}",
                error_text
            )));
        }

        let operation: Value = response.json().await.map_err(|e| {
            CampaignError::VideoSynthesis(format!("Failed to parse video job: {}", e))
        })?;

        let name = operation["name"]
            .as_str()
            .ok_or_else(|| CampaignError::VideoSynthesis("No job name in response".to_string()))?
            .to_string();

        info!("Submitted {} video job {}", request.tier, name);

        let uri = match finished_video_uri(&operation)? {
            Some(uri) => uri,
            None => match poll_until_done(&self.poll, |_| self.check_operation(&name, key)).await? {
                PollOutcome::Ready(uri) => uri,
                PollOutcome::TimedOut { attempts } => {
                    warn!("Video job {} still running after {} polls", name, attempts);
                    return Err(CampaignError::VideoTimedOut { attempts });
                }
            },
        };

        let media = self.fetch_video(&uri, key).await?;

        info!(
            "{} video ready in {}ms ({} bytes)",
            request.tier,
            start.elapsed().as_millis(),
            media.bytes.len()
        );
        Ok(media)
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(result: &Value) -> Option<String> {
    let parts = result["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

fn parse_analysis(content: &str) -> Result<CreativeAnalysis, CampaignError> {
    let analysis: CreativeAnalysis = serde_json::from_str(content)
        .map_err(|e| CampaignError::Analysis(format!("Failed to parse analysis JSON: {}", e)))?;
    analysis.validate()?;
    Ok(analysis)
}

/// First inline image part of the first candidate.
fn inline_image(result: &Value) -> Option<Result<ImageData, CampaignError>> {
    let parts = result["candidates"][0]["content"]["parts"].as_array()?;
    parts.iter().find_map(|p| {
        let inline = &p["inlineData"];
        let data = inline["data"].as_str()?;
        let mime_type = inline["mimeType"].as_str().unwrap_or("image/png");
        Some(
            ImageData::from_base64(mime_type, data)
                .map_err(|e| CampaignError::ImageSynthesis(e.to_string())),
        )
    })
}

/// `Ok(None)` while the job runs; the video URI once it is done.
fn finished_video_uri(operation: &Value) -> Result<Option<String>, CampaignError> {
    if !operation["done"].as_bool().unwrap_or(false) {
        return Ok(None);
    }

    if let Some(message) = operation["error"]["message"].as_str() {
        return Err(CampaignError::VideoSynthesis(message.to_string()));
    }

    operation["response"]["generateVideoResponse"]["generatedSamples"][0]["video"]["uri"]
        .as_str()
        .map(|uri| Some(uri.to_string()))
        .ok_or_else(|| {
            CampaignError::VideoSynthesis(
                "Video generation finished without a video URI".to_string(),
            )
        })
}
