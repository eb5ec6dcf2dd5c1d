// src/services/prompts.rs
use crate::models::{AspectRatio, CameraMovement, STYLE_PROMPT_COUNT, StyleSetId};
use serde_json::{Value, json};

pub struct StyleSet {
    pub id: StyleSetId,
    pub label: &'static str,
    pub directive: &'static str,
}

pub const CONCEPT_THEMES: [&str; STYLE_PROMPT_COUNT] = [
    "Surreal Luxury Metaphor",
    "Futuristic Tech Concept",
    "Cinematic Emotional Impact",
    "Clean Premium Commercial",
    "Abstract Artistic Concept",
    "Symbolic Brand Narrative",
];

pub fn style_set(id: StyleSetId) -> StyleSet {
    let (label, directive) = match id {
        StyleSetId::EcommerceStudio => (
            "E-commerce Studio",
            "Seamless studio sweeps, soft box lighting and catalogue-ready framing.",
        ),
        StyleSetId::CinematicAd => (
            "Cinematic Ad",
            "Anamorphic framing, dramatic rim light and film-grade colour grading.",
        ),
        StyleSetId::ChibiShop => (
            "Chibi Shop",
            "The product lives in a stylized world alongside cute animated characters.",
        ),
        StyleSetId::KnollingLayout => (
            "Knolling Layout",
            "Top-down flat lay with every element arranged at right angles.",
        ),
        StyleSetId::DynamicForces => (
            "Dynamic Forces",
            "Splashes, shattering fragments and motion frozen at high shutter speed.",
        ),
        StyleSetId::GlossyLogo => (
            "Glossy Logo",
            "Polished reflective surfaces and a hero brand mark rendered in gloss.",
        ),
        StyleSetId::TexturedLogo => (
            "Textured Logo",
            "Tactile materials such as embossed paper, stone and woven fabric.",
        ),
        StyleSetId::LandmarkInfographic => (
            "Landmark Infographic",
            "The product placed against a famous landmark with clean infographic callouts.",
        ),
        StyleSetId::SeasonalCycle => (
            "Seasonal Cycle",
            "Seasonal settings, weather and light that tell a time-of-year story.",
        ),
        StyleSetId::CraveCanvas => (
            "Crave Canvas",
            "Appetite appeal: macro detail, steam, condensation and rich warm tones.",
        ),
        StyleSetId::ArtStudio => (
            "Art Studio",
            "Creative, abstract studio settings that appeal to artists.",
        ),
    };

    StyleSet {
        id,
        label,
        directive,
    }
}

pub fn analysis_system_instruction(set: &StyleSet) -> String {
    let themes = CONCEPT_THEMES
        .iter()
        .enumerate()
        .map(|(i, theme)| format!("{}. {}", i + 1, theme))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert Commercial Creative Director.
Analyze the product description and image, then produce {count} distinct, high-end visual prompts for an image generation model.

The user selected the "{label}" generator. {directive}
Tailor ALL {count} prompts to this generator.

The {count} required concepts, adapted to "{label}", are:
{themes}

For each concept return a unique styleName, a detailed English promptText focused on lighting, texture and composition,
and a short marketingHook written for that visual.
Also return the product category, the target audience, the core emotion, and marketing copy:
an Instagram caption, a LinkedIn post, a TikTok hook, a list of hashtags without '#', and a one-line slogan."#,
        count = STYLE_PROMPT_COUNT,
        label = set.label,
        directive = set.directive,
        themes = themes,
    )
}

pub fn analysis_user_prompt(description: &str, set: &StyleSet) -> String {
    format!(
        "Analyze this product: \"{}\". The selected generator is \"{}\". Generate the {} prompts.",
        description, set.label, STYLE_PROMPT_COUNT
    )
}

pub fn analysis_response_schema() -> Value {
    let string = json!({ "type": "STRING" });
    json!({
        "type": "OBJECT",
        "properties": {
            "category": string,
            "audience": string,
            "emotion": string,
            "marketingCopy": {
                "type": "OBJECT",
                "properties": {
                    "instagramCaption": string,
                    "linkedinPost": string,
                    "tiktokHook": string,
                    "hashtags": { "type": "ARRAY", "items": string },
                    "oneLiner": string
                },
                "required": ["instagramCaption", "linkedinPost", "tiktokHook", "hashtags", "oneLiner"]
            },
            "prompts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "styleName": string,
                        "promptText": string,
                        "marketingHook": string
                    },
                    "required": ["styleName", "promptText", "marketingHook"]
                }
            }
        },
        "required": ["category", "audience", "emotion", "marketingCopy", "prompts"]
    })
}

pub fn image_prompt(prompt_text: &str) -> String {
    format!(
        "{}. The product in the image MUST be the central hero. Maintain the product's core identity but place it in this new environment. High fidelity, photorealistic commercial photography.",
        prompt_text.trim_end_matches('.')
    )
}

pub fn camera_directive(movement: CameraMovement) -> &'static str {
    match movement {
        CameraMovement::DollyIn => "slow dolly in towards the product",
        CameraMovement::DollyOut => "slow dolly out revealing the product in its setting",
        CameraMovement::PanLeft => "smooth pan from right to left across the product",
        CameraMovement::PanRight => "smooth pan from left to right across the product",
        CameraMovement::Orbit => "smooth orbit around the product",
        CameraMovement::CraneUp => "crane shot rising up and over the product",
    }
}

pub fn animation_prompt(movement: CameraMovement, aspect_ratio: AspectRatio) -> String {
    let framing = match aspect_ratio {
        AspectRatio::Landscape => "landscape framing",
        AspectRatio::Portrait => "vertical framing for mobile feeds",
    };
    format!(
        "Cinematic camera movement, {}. Subtle dynamic lighting changes. High-end commercial look, {}.",
        camera_directive(movement),
        framing
    )
}
