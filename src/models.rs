// src/models.rs
use crate::errors::CampaignError;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of styled concepts every analysis must produce.
pub const STYLE_PROMPT_COUNT: usize = 6;

pub const SUPPORTED_MEDIA_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(CampaignError::Validation(format!(
                "Unsupported aspect ratio: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraMovement {
    #[default]
    #[serde(rename = "Dolly In")]
    DollyIn,
    #[serde(rename = "Dolly Out")]
    DollyOut,
    #[serde(rename = "Pan Left")]
    PanLeft,
    #[serde(rename = "Pan Right")]
    PanRight,
    #[serde(rename = "Orbit")]
    Orbit,
    #[serde(rename = "Crane Up")]
    CraneUp,
}

impl CameraMovement {
    pub const ALL: [CameraMovement; 6] = [
        CameraMovement::DollyIn,
        CameraMovement::DollyOut,
        CameraMovement::PanLeft,
        CameraMovement::PanRight,
        CameraMovement::Orbit,
        CameraMovement::CraneUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMovement::DollyIn => "Dolly In",
            CameraMovement::DollyOut => "Dolly Out",
            CameraMovement::PanLeft => "Pan Left",
            CameraMovement::PanRight => "Pan Right",
            CameraMovement::Orbit => "Orbit",
            CameraMovement::CraneUp => "Crane Up",
        }
    }
}

impl FromStr for CameraMovement {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CameraMovement::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                CampaignError::Validation(format!("Unsupported camera movement: {}", wanted))
            })
    }
}

/// Generator ruleset ("filter") that steers the six concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleSetId {
    #[default]
    EcommerceStudio,
    CinematicAd,
    ChibiShop,
    KnollingLayout,
    DynamicForces,
    GlossyLogo,
    TexturedLogo,
    LandmarkInfographic,
    SeasonalCycle,
    CraveCanvas,
    ArtStudio,
}

impl StyleSetId {
    pub const ALL: [StyleSetId; 11] = [
        StyleSetId::EcommerceStudio,
        StyleSetId::CinematicAd,
        StyleSetId::ChibiShop,
        StyleSetId::KnollingLayout,
        StyleSetId::DynamicForces,
        StyleSetId::GlossyLogo,
        StyleSetId::TexturedLogo,
        StyleSetId::LandmarkInfographic,
        StyleSetId::SeasonalCycle,
        StyleSetId::CraveCanvas,
        StyleSetId::ArtStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleSetId::EcommerceStudio => "ecommerce_studio",
            StyleSetId::CinematicAd => "cinematic_ad",
            StyleSetId::ChibiShop => "chibi_shop",
            StyleSetId::KnollingLayout => "knolling_layout",
            StyleSetId::DynamicForces => "dynamic_forces",
            StyleSetId::GlossyLogo => "glossy_logo",
            StyleSetId::TexturedLogo => "textured_logo",
            StyleSetId::LandmarkInfographic => "landmark_infographic",
            StyleSetId::SeasonalCycle => "seasonal_cycle",
            StyleSetId::CraveCanvas => "crave_canvas",
            StyleSetId::ArtStudio => "art_studio",
        }
    }
}

impl FromStr for StyleSetId {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StyleSetId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| CampaignError::Validation(format!("Unknown style set: {}", wanted)))
    }
}

/// Raw image bytes plus their declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn from_base64(mime_type: &str, encoded: &str) -> Result<Self, CampaignError> {
        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CampaignError::Serialization(format!("Invalid base64 image: {}", e)))?;
        Ok(Self::new(mime_type, data))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignBrief {
    pub id: Uuid,
    pub description: String,
    pub source_image: ImageData,
    pub style_set: StyleSetId,
    pub aspect_ratio: AspectRatio,
    pub camera_movement: CameraMovement,
    pub submitted_at: DateTime<Utc>,
}

impl CampaignBrief {
    pub fn new(
        description: impl Into<String>,
        source_image: ImageData,
        style_set: StyleSetId,
        aspect_ratio: AspectRatio,
        camera_movement: CameraMovement,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            source_image,
            style_set,
            aspect_ratio,
            camera_movement,
            submitted_at: Utc::now(),
        }
    }

    /// Rejects a brief before any network call is made.
    pub fn validate(&self) -> Result<(), CampaignError> {
        if self.description.trim().is_empty() {
            return Err(CampaignError::Validation(
                "A product description is required".to_string(),
            ));
        }
        if self.source_image.data.is_empty() {
            return Err(CampaignError::Validation(
                "A product image is required".to_string(),
            ));
        }
        if !SUPPORTED_MEDIA_TYPES.contains(&self.source_image.mime_type.as_str()) {
            return Err(CampaignError::Validation(format!(
                "Unsupported image type: {}",
                self.source_image.mime_type
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> BriefSummary {
        BriefSummary {
            id: self.id,
            description: self.description.clone(),
            source_media_type: self.source_image.mime_type.clone(),
            style_set: self.style_set,
            aspect_ratio: self.aspect_ratio,
            camera_movement: self.camera_movement,
            submitted_at: self.submitted_at,
        }
    }
}

/// Brief as rendered back to the client, without the image bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefSummary {
    pub id: Uuid,
    pub description: String,
    pub source_media_type: String,
    pub style_set: StyleSetId,
    pub aspect_ratio: AspectRatio,
    pub camera_movement: CameraMovement,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingCopy {
    pub instagram_caption: String,
    pub linkedin_post: String,
    pub tiktok_hook: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub one_liner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePrompt {
    pub style_name: String,
    pub prompt_text: String,
    #[serde(default)]
    pub marketing_hook: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeAnalysis {
    pub category: String,
    pub audience: String,
    pub emotion: String,
    pub marketing_copy: MarketingCopy,
    pub prompts: Vec<StylePrompt>,
}

impl CreativeAnalysis {
    /// Every downstream slot is keyed by style name, so the whole set is
    /// checked here rather than trusted.
    pub fn validate(&self) -> Result<(), CampaignError> {
        for (field, value) in [
            ("category", &self.category),
            ("audience", &self.audience),
            ("emotion", &self.emotion),
        ] {
            if value.trim().is_empty() {
                return Err(CampaignError::Analysis(format!(
                    "Missing {} in analysis",
                    field
                )));
            }
        }

        if self.prompts.len() != STYLE_PROMPT_COUNT {
            return Err(CampaignError::Analysis(format!(
                "Expected {} prompts, got {}",
                STYLE_PROMPT_COUNT,
                self.prompts.len()
            )));
        }

        let mut seen = HashSet::new();
        for prompt in &self.prompts {
            if prompt.style_name.trim().is_empty() {
                return Err(CampaignError::Analysis(
                    "Prompt with empty style name".to_string(),
                ));
            }
            if prompt.prompt_text.trim().is_empty() {
                return Err(CampaignError::Analysis(format!(
                    "Prompt for {} has no text",
                    prompt.style_name
                )));
            }
            if !seen.insert(prompt.style_name.as_str()) {
                return Err(CampaignError::Analysis(format!(
                    "Duplicate style name: {}",
                    prompt.style_name
                )));
            }
        }

        Ok(())
    }
}

/// Identity of an image slot: its position in the prompt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Pending,
    Ready(ImageData),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSlot {
    pub id: SlotId,
    pub style_name: String,
    pub prompt: String,
    pub caption: String,
    pub state: SlotState,
}

impl ImageSlot {
    pub fn pending(id: SlotId, prompt: &StylePrompt) -> Self {
        Self {
            id,
            style_name: prompt.style_name.clone(),
            prompt: prompt.prompt_text.clone(),
            caption: prompt.marketing_hook.clone(),
            state: SlotState::Pending,
        }
    }

    pub fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Pending => SlotStatus::Pending,
            SlotState::Ready(_) => SlotStatus::Ready,
            SlotState::Failed { .. } => SlotStatus::Failed,
        }
    }

    pub fn image(&self) -> Option<&ImageData> {
        match &self.state {
            SlotState::Ready(image) => Some(image),
            _ => None,
        }
    }

    pub fn view(&self) -> ImageSlotView {
        ImageSlotView {
            id: self.id,
            style_name: self.style_name.clone(),
            prompt: self.prompt.clone(),
            caption: self.caption.clone(),
            status: self.status(),
            image_url: self.image().map(ImageData::to_data_url),
            error: match &self.state {
                SlotState::Failed { reason } => Some(reason.clone()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSlotView {
    pub id: SlotId,
    pub style_name: String,
    pub prompt: String,
    pub caption: String,
    pub status: SlotStatus,
    pub image_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Preview,
    Final,
}

impl QualityTier {
    pub fn resolution(&self) -> &'static str {
        match self {
            QualityTier::Preview => "720p",
            QualityTier::Final => "1080p",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Preview => write!(f, "preview"),
            QualityTier::Final => write!(f, "final"),
        }
    }
}

/// Downloaded video bytes, before they are given a handle.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMedia {
    pub mime_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(pub Uuid);

impl MediaHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn url(&self) -> String {
        format!("/api/v1/media/{}", self.0)
    }
}

impl Default for MediaHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoArtifact {
    pub handle: MediaHandle,
    pub url: String,
    pub mime_type: String,
    pub tier: QualityTier,
    pub created_at: DateTime<Utc>,
}

impl VideoArtifact {
    pub fn new(handle: MediaHandle, mime_type: impl Into<String>, tier: QualityTier) -> Self {
        Self {
            url: handle.url(),
            handle,
            mime_type: mime_type.into(),
            tier,
            created_at: Utc::now(),
        }
    }
}
