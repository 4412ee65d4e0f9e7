//! Vision service seam
//!
//! The detector and segmenter live outside this crate; the orchestrator
//! receives an already-constructed implementation of [`VisionService`].

use image::DynamicImage;
use thiserror::Error;

use crate::models::{BoundingBox, Detection, Mask};

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("detection failed: {0}")]
    Detection(String),

    #[error("segmentation failed: {0}")]
    Segmentation(String),
}

/// Object detector with an optional box-prompted segmenter
pub trait VisionService {
    /// Detect objects in `image`
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, VisionError>;

    /// Segment each box, returning one mask per box in the same order.
    ///
    /// `Ok(None)` means this service has no segmenter.
    fn segment(
        &self,
        _image: &DynamicImage,
        _boxes: &[BoundingBox],
    ) -> Result<Option<Vec<Mask>>, VisionError> {
        Ok(None)
    }
}
