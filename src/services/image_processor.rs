// src/services/image_processor.rs
use crate::errors::CampaignError;
use crate::models::ImageData;
use image::{GenericImageView, ImageFormat as ImgFormat};
use log::info;

pub struct ImageProcessor {
    max_dimension: u32,
}

impl ImageProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Detected media type of the encoded bytes, limited to the formats the
    /// generation service accepts.
    pub fn detect_media_type(&self, data: &[u8]) -> Result<&'static str, CampaignError> {
        let format = image::guess_format(data)
            .map_err(|e| CampaignError::ImageProcessing(format!("Unrecognised image: {}", e)))?;

        match format {
            ImgFormat::Png => Ok("image/png"),
            ImgFormat::Jpeg => Ok("image/jpeg"),
            ImgFormat::WebP => Ok("image/webp"),
            other => Err(CampaignError::ImageProcessing(format!(
                "Unsupported image format: {:?}",
                other
            ))),
        }
    }

    pub fn validate_image(&self, image: &ImageData) -> Result<(u32, u32), CampaignError> {
        let detected = self.detect_media_type(&image.data)?;
        if detected != image.mime_type {
            return Err(CampaignError::ImageProcessing(format!(
                "Declared type {} does not match image content ({})",
                image.mime_type, detected
            )));
        }

        let img = image::load_from_memory(&image.data)
            .map_err(|e| CampaignError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        Ok(img.dimensions())
    }

    /// Validate the source image and downscale it when either side exceeds
    /// the configured maximum.
    pub fn prepare_source(&self, image: ImageData) -> Result<ImageData, CampaignError> {
        let (width, height) = self.validate_image(&image)?;

        if width <= self.max_dimension && height <= self.max_dimension {
            return Ok(image);
        }

        let img = image::load_from_memory(&image.data)
            .map_err(|e| CampaignError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let ratio = (self.max_dimension as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let (format, mime_type) = if image.mime_type == "image/jpeg" {
            (ImgFormat::Jpeg, "image/jpeg")
        } else {
            (ImgFormat::Png, "image/png")
        };

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), format)
            .map_err(|e| {
                CampaignError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        info!(
            "Downscaled source image from {}x{} to {}x{}",
            width,
            height,
            resized.width(),
            resized.height()
        );

        Ok(ImageData::new(mime_type, output))
    }
}
