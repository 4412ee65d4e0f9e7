//! Nutrition estimate tool
//!
//! Turns a tool request (image size + detector output) into a pipeline run
//! and a timestamped response.

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BoundingBox, Detection, ImageDimensions, Mask, Nutrition, Report};
use crate::pipeline::{NutritionPipeline, Outcome, PipelineError};

/// Errors from the estimate tool
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("{0}")]
    Request(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl EstimateError {
    /// True when the caller sent something the pipeline cannot accept
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EstimateError::Request(_)
                | EstimateError::Pipeline(PipelineError::InvalidInput(_))
                | EstimateError::Pipeline(PipelineError::UnknownClass(_))
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DetectionInput {
    /// Detector class name, e.g. "apple"
    pub class_name: String,
    /// Detector confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Bounding box [x1, y1, x2, y2] in image pixels
    #[serde(alias = "bounding_box")]
    pub bbox: [f64; 4],
    /// Pixels covered by the segmentation mask for this box (optional)
    #[serde(default)]
    pub mask_pixels: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EstimateNutritionParams {
    /// Image width in pixels (required unless image_path is given)
    pub image_width: Option<u32>,
    /// Image height in pixels (required unless image_path is given)
    pub image_height: Option<u32>,
    /// Path to the analysed image; only its dimensions are read
    pub image_path: Option<String>,
    /// Raw detector output
    #[serde(default)]
    pub detections: Vec<DetectionInput>,
    /// Per-call confidence threshold override (0.0 - 1.0)
    pub confidence_threshold: Option<f64>,
}

/// Response for estimate_nutrition
#[derive(Debug, Serialize)]
pub struct EstimateNutritionResponse {
    pub timestamp: String,
    pub status: &'static str,
    pub warning: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    pub confidence_threshold: f64,
    pub report: Report,
    /// Totals rounded to one decimal for display
    pub totals_display: Nutrition,
}

/// Image size from explicit dimensions, or read from the image file header
pub fn resolve_image_dimensions(
    width: Option<u32>,
    height: Option<u32>,
    image_path: Option<&str>,
) -> Result<ImageDimensions, EstimateError> {
    let dims = match (width, height, image_path) {
        (Some(w), Some(h), _) => ImageDimensions::new(w, h),
        (_, _, Some(path)) => {
            let (w, h) = image::image_dimensions(path).map_err(|e| {
                EstimateError::Request(format!("Cannot read image dimensions from {}: {}", path, e))
            })?;
            ImageDimensions::new(w, h)
        }
        _ => {
            return Err(EstimateError::Request(
                "Provide image_width and image_height, or image_path".to_string(),
            ))
        }
    };
    if dims.is_empty() {
        return Err(EstimateError::Request(format!(
            "Image dimensions must be positive, got {}x{}",
            dims.width, dims.height
        )));
    }
    Ok(dims)
}

/// Split tool input into detections and (all-or-nothing) masks
pub fn split_detections(
    inputs: &[DetectionInput],
) -> Result<(Vec<Detection>, Option<Vec<Mask>>), EstimateError> {
    let detections = inputs
        .iter()
        .map(|d| Detection::new(d.class_name.clone(), d.confidence, BoundingBox::from(d.bbox)))
        .collect();

    let with_mask = inputs.iter().filter(|d| d.mask_pixels.is_some()).count();
    let masks = if with_mask == 0 {
        None
    } else if with_mask == inputs.len() {
        Some(
            inputs
                .iter()
                .filter_map(|d| d.mask_pixels.map(Mask::PixelCount))
                .collect(),
        )
    } else {
        return Err(EstimateError::Request(format!(
            "mask_pixels must be given for every detection or none ({} of {} have one)",
            with_mask,
            inputs.len()
        )));
    };

    Ok((detections, masks))
}

/// Run the pipeline for one tool request
pub fn estimate_nutrition(
    pipeline: &NutritionPipeline,
    params: &EstimateNutritionParams,
) -> Result<EstimateNutritionResponse, EstimateError> {
    let image = resolve_image_dimensions(
        params.image_width,
        params.image_height,
        params.image_path.as_deref(),
    )?;
    let (detections, masks) = split_detections(&params.detections)?;
    let threshold = params
        .confidence_threshold
        .unwrap_or(pipeline.config().confidence_threshold);

    let outcome = pipeline.run_with_threshold(image, &detections, masks.as_deref(), threshold)?;
    let (status, warning) = match &outcome {
        Outcome::Estimated { .. } => ("estimated", None),
        Outcome::NoDetections { raw_count, .. } => (
            "no_detections",
            Some(if *raw_count == 0 {
                "No objects detected.".to_string()
            } else {
                format!(
                    "{} objects detected, but none are known food items above the confidence threshold.",
                    raw_count
                )
            }),
        ),
    };
    let report = outcome.into_report();

    Ok(EstimateNutritionResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        status,
        warning,
        image_width: image.width,
        image_height: image.height,
        confidence_threshold: threshold,
        totals_display: report.totals_display(),
        report,
    })
}
