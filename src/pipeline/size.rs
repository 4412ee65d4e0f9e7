//! Heuristic size estimator
//!
//! Maps the fraction of the image covered by an item to a coarse size
//! class and a calorie multiplier.

use serde::{Deserialize, Serialize};

use super::{invalid, PipelineResult};
use crate::models::{SizeEstimate, SizeLabel};

/// Below this area ratio an item is Small
pub const SMALL_THRESHOLD: f64 = 0.05;
/// Above this area ratio an item is Large
pub const LARGE_THRESHOLD: f64 = 0.15;

/// Where the pixel area for sizing comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizeSource {
    /// Segmentation masks; without masks, sizing is skipped
    #[default]
    Mask,
    /// Masks when present, otherwise the bounding box area
    BoundingBox,
    /// Never size, multiplier stays 1.0
    Disabled,
}

impl SizeSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mask" => Some(SizeSource::Mask),
            "bounding_box" | "bbox" => Some(SizeSource::BoundingBox),
            "disabled" | "off" | "none" => Some(SizeSource::Disabled),
            _ => None,
        }
    }
}

/// Thresholds and multipliers of the size heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizePolicy {
    pub small_threshold: f64,
    pub large_threshold: f64,
    pub small_multiplier: f64,
    pub medium_multiplier: f64,
    pub large_multiplier: f64,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            small_threshold: SMALL_THRESHOLD,
            large_threshold: LARGE_THRESHOLD,
            small_multiplier: 0.7,
            medium_multiplier: 1.0,
            large_multiplier: 1.3,
        }
    }
}

impl SizePolicy {
    pub fn validate(&self) -> PipelineResult<()> {
        let thresholds_ok = self.small_threshold.is_finite()
            && self.large_threshold.is_finite()
            && self.small_threshold >= 0.0
            && self.small_threshold <= self.large_threshold;
        if !thresholds_ok {
            return Err(invalid(format!(
                "size thresholds must satisfy 0 <= small <= large, got small={} large={}",
                self.small_threshold, self.large_threshold
            )));
        }
        for (name, m) in [
            ("small_multiplier", self.small_multiplier),
            ("medium_multiplier", self.medium_multiplier),
            ("large_multiplier", self.large_multiplier),
        ] {
            if !m.is_finite() || m <= 0.0 {
                return Err(invalid(format!("{} must be positive, got {}", name, m)));
            }
        }
        Ok(())
    }

    /// Classify an item covering `mask_pixel_count` of `total_image_pixels`.
    ///
    /// `ratio < small` is Small, `ratio > large` is Large, anything else
    /// (both boundaries included) is Medium.
    pub fn estimate(&self, mask_pixel_count: f64, total_image_pixels: f64) -> PipelineResult<SizeEstimate> {
        if !total_image_pixels.is_finite() || total_image_pixels <= 0.0 {
            return Err(invalid(format!(
                "total_image_pixels must be positive, got {}",
                total_image_pixels
            )));
        }
        if !mask_pixel_count.is_finite() || mask_pixel_count < 0.0 {
            return Err(invalid(format!(
                "mask_pixel_count must be non-negative, got {}",
                mask_pixel_count
            )));
        }

        let ratio = mask_pixel_count / total_image_pixels;
        let estimate = if ratio < self.small_threshold {
            SizeEstimate {
                size_label: SizeLabel::Small,
                multiplier: self.small_multiplier,
            }
        } else if ratio > self.large_threshold {
            SizeEstimate {
                size_label: SizeLabel::Large,
                multiplier: self.large_multiplier,
            }
        } else {
            SizeEstimate {
                size_label: SizeLabel::Medium,
                multiplier: self.medium_multiplier,
            }
        };
        Ok(estimate)
    }
}

/// Size estimate with the default thresholds (0.05 / 0.15)
pub fn estimate_size(mask_pixel_count: f64, total_image_pixels: f64) -> PipelineResult<SizeEstimate> {
    SizePolicy::default().estimate(mask_pixel_count, total_image_pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineError;

    fn label(mask: f64, total: f64) -> (SizeLabel, f64) {
        let e = estimate_size(mask, total).unwrap();
        (e.size_label, e.multiplier)
    }

    #[test]
    fn test_small_below_threshold() {
        assert_eq!(label(0.0, 10_000.0), (SizeLabel::Small, 0.7));
        assert_eq!(label(499.0, 10_000.0), (SizeLabel::Small, 0.7));
    }

    #[test]
    fn test_large_above_threshold() {
        assert_eq!(label(1_501.0, 10_000.0), (SizeLabel::Large, 1.3));
        assert_eq!(label(10_000.0, 10_000.0), (SizeLabel::Large, 1.3));
    }

    #[test]
    fn test_boundaries_are_medium() {
        // 5 / 100 and 15 / 100 are exactly the thresholds
        assert_eq!(label(5.0, 100.0), (SizeLabel::Medium, 1.0));
        assert_eq!(label(15.0, 100.0), (SizeLabel::Medium, 1.0));
        assert_eq!(label(1_000.0, 10_000.0), (SizeLabel::Medium, 1.0));
    }

    #[test]
    fn test_rejects_non_positive_total() {
        for total in [0.0, -1.0, f64::NAN] {
            let err = estimate_size(10.0, total).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_rejects_negative_mask() {
        assert!(estimate_size(-1.0, 100.0).is_err());
    }

    #[test]
    fn test_custom_policy_thresholds() {
        let policy = SizePolicy {
            small_threshold: 0.1,
            large_threshold: 0.5,
            ..Default::default()
        };
        let e = policy.estimate(20.0, 100.0).unwrap();
        assert_eq!(e.size_label, SizeLabel::Medium);
        let e = policy.estimate(5.0, 100.0).unwrap();
        assert_eq!(e.size_label, SizeLabel::Small);
    }

    #[test]
    fn test_policy_validation() {
        assert!(SizePolicy::default().validate().is_ok());
        let inverted = SizePolicy {
            small_threshold: 0.2,
            large_threshold: 0.1,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        let zero_mult = SizePolicy {
            large_multiplier: 0.0,
            ..Default::default()
        };
        assert!(zero_mult.validate().is_err());
    }

    #[test]
    fn test_size_source_parse() {
        assert_eq!(SizeSource::parse("bbox"), Some(SizeSource::BoundingBox));
        assert_eq!(SizeSource::parse("Mask"), Some(SizeSource::Mask));
        assert_eq!(SizeSource::parse("volume"), None);
    }
}
