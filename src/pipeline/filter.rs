//! Detection filter and normalizer
//!
//! Validates raw detector output, clamps boxes into the image and keeps the
//! confident detections of known food classes.

use std::collections::BTreeSet;

use super::{invalid, PipelineResult};
use crate::models::{Detection, ImageDimensions};

/// Check that a probability-like threshold lies in `[0, 1]`
pub fn validate_threshold(name: &str, value: f64) -> PipelineResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{} must be within [0, 1], got {}", name, value)));
    }
    Ok(())
}

/// Validate one raw detection and clamp its box to the image.
///
/// Boxes slightly outside the image are clamped; a box with no area left
/// after clamping is rejected.
pub fn normalize_detection(det: &Detection, image: ImageDimensions) -> PipelineResult<Detection> {
    if image.is_empty() {
        return Err(invalid(format!(
            "image dimensions must be positive, got {}x{}",
            image.width, image.height
        )));
    }
    if det.class_name.trim().is_empty() {
        return Err(invalid("detection class_name must not be empty"));
    }
    if !det.confidence.is_finite() || !(0.0..=1.0).contains(&det.confidence) {
        return Err(invalid(format!(
            "confidence for '{}' must be within [0, 1], got {}",
            det.class_name, det.confidence
        )));
    }
    if !det.bbox.is_finite() {
        return Err(invalid(format!("bounding box for '{}' is not finite", det.class_name)));
    }

    let bbox = det.bbox.clamp_to(image);
    if !bbox.is_well_formed() {
        return Err(invalid(format!(
            "bounding box for '{}' is empty after clamping to {}x{}: {:?}",
            det.class_name,
            image.width,
            image.height,
            <[f64; 4]>::from(det.bbox)
        )));
    }
    if bbox != det.bbox {
        tracing::debug!(class = %det.class_name, "Clamped bounding box to image bounds");
    }

    Ok(Detection {
        class_name: det.class_name.clone(),
        confidence: det.confidence,
        bbox,
    })
}

/// Filter, then normalize what was kept.
///
/// Returns the retained indices into `detections` alongside the normalized
/// detections. Dropped detections are never validated, so a malformed box
/// on a low-confidence or non-food detection cannot fail the image.
pub fn select_detections(
    detections: &[Detection],
    image: ImageDimensions,
    known_classes: &BTreeSet<String>,
    confidence_threshold: f64,
) -> PipelineResult<(Vec<usize>, Vec<Detection>)> {
    if image.is_empty() {
        return Err(invalid(format!(
            "image dimensions must be positive, got {}x{}",
            image.width, image.height
        )));
    }

    let kept = retained_indices(detections, known_classes, confidence_threshold);
    tracing::debug!(
        raw = detections.len(),
        retained = kept.len(),
        "Filtered detections"
    );
    let retained = kept
        .iter()
        .map(|&i| normalize_detection(&detections[i], image))
        .collect::<PipelineResult<Vec<_>>>()?;

    Ok((kept, retained))
}

/// Indices of the detections that pass the filter, in input order
pub fn retained_indices(
    detections: &[Detection],
    known_classes: &BTreeSet<String>,
    confidence_threshold: f64,
) -> Vec<usize> {
    detections
        .iter()
        .enumerate()
        .filter(|(_, det)| {
            det.confidence >= confidence_threshold && known_classes.contains(&det.class_name)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Keep detections with `confidence >= threshold` whose class is known.
///
/// Stable and idempotent; an empty result means nothing to report.
pub fn filter_detections(
    detections: &[Detection],
    known_classes: &BTreeSet<String>,
    confidence_threshold: f64,
) -> Vec<Detection> {
    retained_indices(detections, known_classes, confidence_threshold)
        .into_iter()
        .map(|i| detections[i].clone())
        .collect()
}
