//! Pipeline orchestrator
//!
//! Sequences normalize → filter → size → aggregate for one image. The
//! reference store is injected at construction and only ever read.

use std::collections::BTreeSet;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;

use super::aggregate::aggregate;
use super::filter::{select_detections, validate_threshold};
use super::size::SizeSource;
use super::{invalid, PipelineResult};
use crate::config::PipelineConfig;
use crate::models::{AggregationMode, BoundingBox, Detection, ImageDimensions, Mask, Report, SizeEstimate};
use crate::reference::ReferenceStore;
use crate::vision::VisionService;

/// Result of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Estimated { report: Report },
    /// Nothing survived filtering; a warning, not a failure
    NoDetections {
        mode: AggregationMode,
        raw_count: usize,
    },
}

impl Outcome {
    pub fn is_no_detections(&self) -> bool {
        matches!(self, Outcome::NoDetections { .. })
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Outcome::Estimated { report } => Some(report),
            Outcome::NoDetections { .. } => None,
        }
    }

    /// The report, or an empty one when nothing was detected
    pub fn into_report(self) -> Report {
        match self {
            Outcome::Estimated { report } => report,
            Outcome::NoDetections { mode, .. } => Report::empty(mode),
        }
    }
}

/// Configured pipeline over a shared, read-only reference store
#[derive(Debug, Clone)]
pub struct NutritionPipeline {
    store: Arc<ReferenceStore>,
    config: PipelineConfig,
    known_classes: BTreeSet<String>,
}

impl NutritionPipeline {
    pub fn new(store: Arc<ReferenceStore>, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(|e| invalid(e.to_string()))?;
        if store.kind() != config.mode {
            return Err(invalid(format!(
                "mode {} does not match the {} reference store",
                config.mode,
                store.kind()
            )));
        }
        if store.policy() != config.lookup_policy {
            return Err(invalid(format!(
                "lookup policy {} does not match the store's {}",
                config.lookup_policy.as_str(),
                store.policy().as_str()
            )));
        }

        let known_classes = match &config.known_classes {
            Some(classes) => classes.clone(),
            None => store.class_names().into_iter().collect(),
        };

        Ok(Self {
            store,
            config,
            known_classes,
        })
    }

    pub fn store(&self) -> &ReferenceStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Food classes that pass the filter
    pub fn known_classes(&self) -> &BTreeSet<String> {
        &self.known_classes
    }

    /// Run on precomputed detector output.
    ///
    /// `masks`, when given, holds one mask per entry of `detections`; the
    /// masks of retained detections follow them through filtering.
    pub fn run(
        &self,
        image: ImageDimensions,
        detections: &[Detection],
        masks: Option<&[Mask]>,
    ) -> PipelineResult<Outcome> {
        self.run_with_threshold(image, detections, masks, self.config.confidence_threshold)
    }

    /// Same as [`run`](Self::run) with a per-call confidence threshold
    pub fn run_with_threshold(
        &self,
        image: ImageDimensions,
        detections: &[Detection],
        masks: Option<&[Mask]>,
        confidence_threshold: f64,
    ) -> PipelineResult<Outcome> {
        validate_threshold("confidence_threshold", confidence_threshold)?;
        if let Some(masks) = masks {
            if masks.len() != detections.len() {
                return Err(invalid(format!(
                    "expected one mask per detection ({}), got {}",
                    detections.len(),
                    masks.len()
                )));
            }
        }

        let (kept, retained) =
            select_detections(detections, image, &self.known_classes, confidence_threshold)?;
        if kept.is_empty() {
            return Ok(self.no_detections(detections.len(), confidence_threshold));
        }

        let retained_masks: Option<Vec<Mask>> =
            masks.map(|m| kept.iter().map(|&i| m[i].clone()).collect());

        self.finish(image, &retained, retained_masks.as_deref())
    }

    /// Run the full flow against a vision service
    pub fn estimate(&self, vision: &dyn VisionService, image: &DynamicImage) -> PipelineResult<Outcome> {
        let dims = ImageDimensions::new(image.width(), image.height());
        let detections = vision.detect(image)?;
        tracing::debug!(raw = detections.len(), "Vision service returned detections");

        let (kept, retained) = select_detections(
            &detections,
            dims,
            &self.known_classes,
            self.config.confidence_threshold,
        )?;
        if kept.is_empty() {
            return Ok(self.no_detections(detections.len(), self.config.confidence_threshold));
        }

        let masks = if !self.uses_sizes() || self.config.size_source != SizeSource::Mask {
            None
        } else {
            let boxes: Vec<BoundingBox> = retained.iter().map(|d| d.bbox).collect();
            let masks = vision.segment(image, &boxes)?;
            if let Some(masks) = &masks {
                if masks.len() != boxes.len() {
                    return Err(invalid(format!(
                        "segmenter returned {} masks for {} boxes",
                        masks.len(),
                        boxes.len()
                    )));
                }
            }
            masks
        };

        self.finish(dims, &retained, masks.as_deref())
    }

    /// Only simple mode consumes size estimates
    fn uses_sizes(&self) -> bool {
        self.config.mode == AggregationMode::Simple
    }

    fn no_detections(&self, raw_count: usize, confidence_threshold: f64) -> Outcome {
        tracing::warn!(
            raw_count,
            confidence_threshold,
            "No food items detected above the confidence threshold"
        );
        Outcome::NoDetections {
            mode: self.config.mode,
            raw_count,
        }
    }

    fn finish(
        &self,
        image: ImageDimensions,
        retained: &[Detection],
        masks: Option<&[Mask]>,
    ) -> PipelineResult<Outcome> {
        let sizes = self.size_estimates(image, retained, masks)?;
        let report = aggregate(retained, sizes.as_deref(), &self.store, self.config.mode)?;
        Ok(Outcome::Estimated { report })
    }

    /// Size estimates aligned with `retained`, or `None` when sizing is bypassed
    fn size_estimates(
        &self,
        image: ImageDimensions,
        retained: &[Detection],
        masks: Option<&[Mask]>,
    ) -> PipelineResult<Option<Vec<SizeEstimate>>> {
        if !self.uses_sizes() {
            return Ok(None);
        }
        let total = image.total_pixels();
        let policy = &self.config.size_policy;

        match (self.config.size_source, masks) {
            (SizeSource::Disabled, _) => Ok(None),
            (_, Some(masks)) => {
                let mut sizes = Vec::with_capacity(masks.len());
                for (det, mask) in retained.iter().zip(masks) {
                    if let Some(len) = mask.coverage_len() {
                        if len as u64 != total {
                            return Err(invalid(format!(
                                "mask for '{}' covers {} pixels, image has {}",
                                det.class_name, len, total
                            )));
                        }
                    }
                    sizes.push(policy.estimate(mask.pixel_count() as f64, total as f64)?);
                }
                Ok(Some(sizes))
            }
            (SizeSource::BoundingBox, None) => retained
                .iter()
                .map(|det| policy.estimate(det.bbox.area(), total as f64))
                .collect::<PipelineResult<Vec<_>>>()
                .map(Some),
            (SizeSource::Mask, None) => Ok(None),
        }
    }
}

/// One-shot entry point: build a pipeline for `config` and run it
pub fn estimate_nutrition(
    image: ImageDimensions,
    detections: &[Detection],
    masks: Option<&[Mask]>,
    config: &PipelineConfig,
    store: Arc<ReferenceStore>,
) -> PipelineResult<Outcome> {
    NutritionPipeline::new(store, config.clone())?.run(image, detections, masks)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{Nutrition, SizeLabel};
    use crate::pipeline::PipelineError;
    use crate::reference::LookupPolicy;
    use crate::vision::VisionError;

    const IMAGE: ImageDimensions = ImageDimensions {
        width: 100,
        height: 100,
    };

    fn det(class_name: &str, confidence: f64) -> Detection {
        Detection::new(class_name, confidence, BoundingBox::new(10.0, 10.0, 30.0, 30.0))
    }

    fn simple_store(policy: LookupPolicy) -> Arc<ReferenceStore> {
        let mut rows = BTreeMap::new();
        rows.insert("apple".to_string(), (95.0, "1 medium".to_string()));
        rows.insert("banana".to_string(), (105.0, "1 medium".to_string()));
        rows.insert("default".to_string(), (50.0, "estimated serving".to_string()));
        Arc::new(ReferenceStore::simple(rows, policy, "test").unwrap())
    }

    fn simple_config() -> PipelineConfig {
        PipelineConfig {
            mode: AggregationMode::Simple,
            ..Default::default()
        }
    }

    fn mass_store() -> Arc<ReferenceStore> {
        let mut per_100g = BTreeMap::new();
        per_100g.insert(
            "apple".to_string(),
            Nutrition {
                calories: 50.0,
                carbs: 13.0,
                protein: 0.5,
                fat: 0.2,
                fiber: 2.0,
            },
        );
        let mut weights = BTreeMap::new();
        weights.insert("apple".to_string(), 150.0);
        Arc::new(ReferenceStore::mass_based(per_100g, weights, LookupPolicy::Strict, "test").unwrap())
    }

    struct FakeVision {
        detections: Vec<Detection>,
        masks: Option<Vec<Mask>>,
    }

    impl VisionService for FakeVision {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, VisionError> {
            Ok(self.detections.clone())
        }

        fn segment(
            &self,
            _image: &DynamicImage,
            boxes: &[BoundingBox],
        ) -> Result<Option<Vec<Mask>>, VisionError> {
            Ok(self
                .masks
                .as_ref()
                .map(|m| m.iter().take(boxes.len()).cloned().collect()))
        }
    }

    struct BrokenVision;

    impl VisionService for BrokenVision {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, VisionError> {
            Err(VisionError::Detection("model not loaded".into()))
        }
    }

    struct FailingSegmenter {
        detections: Vec<Detection>,
    }

    impl VisionService for FailingSegmenter {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, VisionError> {
            Ok(self.detections.clone())
        }

        fn segment(
            &self,
            _image: &DynamicImage,
            _boxes: &[BoundingBox],
        ) -> Result<Option<Vec<Mask>>, VisionError> {
            Err(VisionError::Segmentation("out of memory".into()))
        }
    }

    #[test]
    fn test_malformed_dropped_detection_does_not_fail_run() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        let dets = [
            det("apple", 0.9),
            Detection::new("person", 0.2, BoundingBox::new(50.0, 50.0, 50.0, 60.0)),
        ];
        let outcome = pipeline.run(IMAGE, &dets, None).unwrap();
        assert_eq!(outcome.report().unwrap().totals.calories, 75.0);
    }

    #[test]
    fn test_mass_based_ignores_masks() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        // would be rejected by the size estimator: coverage length differs from the image
        let masks = [Mask::Coverage(vec![true; 50])];
        let outcome = pipeline.run(IMAGE, &[det("apple", 0.9)], Some(&masks)).unwrap();
        assert_eq!(outcome.report().unwrap().totals.calories, 75.0);
    }

    #[test]
    fn test_mass_based_estimate_skips_segmentation() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        let vision = FailingSegmenter {
            detections: vec![det("apple", 0.9)],
        };
        let image = DynamicImage::new_rgb8(100, 100);
        let report = pipeline.estimate(&vision, &image).unwrap().into_report();
        assert_eq!(report.totals.calories, 75.0);

        let err = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config())
            .unwrap()
            .estimate(&vision, &image)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Vision(VisionError::Segmentation(_))));
    }

    #[test]
    fn test_no_detections_is_a_warning_outcome() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        let outcome = pipeline
            .run(IMAGE, &[det("apple", 0.1), det("person", 0.9)], None)
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::NoDetections {
                mode: AggregationMode::MassBased,
                raw_count: 2
            }
        );
        let report = outcome.into_report();
        assert!(report.is_empty());
        assert_eq!(report.totals, Nutrition::zero());
    }

    #[test]
    fn test_empty_input_is_no_detections() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        assert!(pipeline.run(IMAGE, &[], None).unwrap().is_no_detections());
    }

    #[test]
    fn test_masks_follow_their_detections() {
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config()).unwrap();
        let dets = [det("apple", 0.9), det("apple", 0.1), det("banana", 0.8)];
        // 10_000 pixel image: 100 -> Small, 5_000 -> Large, 1_000 -> Medium
        let masks = [Mask::PixelCount(100), Mask::PixelCount(5_000), Mask::PixelCount(1_000)];
        let report = pipeline.run(IMAGE, &dets, Some(&masks)).unwrap().into_report();

        assert_eq!(report.line_items.len(), 2);
        assert_eq!(report.line_items[0].size, Some(SizeLabel::Small));
        assert_eq!(report.line_items[0].calories, 67.0);
        assert_eq!(report.line_items[1].size, Some(SizeLabel::Medium));
        assert_eq!(report.line_items[1].calories, 105.0);
        assert_eq!(report.totals.calories, 172.0);
    }

    #[test]
    fn test_without_masks_size_is_unknown() {
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config()).unwrap();
        let report = pipeline.run(IMAGE, &[det("apple", 0.9)], None).unwrap().into_report();
        assert_eq!(report.line_items[0].size, None);
        assert_eq!(report.line_items[0].multiplier, Some(1.0));
        assert_eq!(report.line_items[0].calories, 95.0);
    }

    #[test]
    fn test_bounding_box_size_source() {
        let config = PipelineConfig {
            size_source: SizeSource::BoundingBox,
            ..simple_config()
        };
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), config).unwrap();
        // 20x20 box on a 100x100 image is 4% of the area
        let report = pipeline.run(IMAGE, &[det("banana", 0.9)], None).unwrap().into_report();
        assert_eq!(report.line_items[0].size, Some(SizeLabel::Small));
        assert_eq!(report.line_items[0].calories, 74.0);
    }

    #[test]
    fn test_disabled_size_source_ignores_masks() {
        let config = PipelineConfig {
            size_source: SizeSource::Disabled,
            ..simple_config()
        };
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), config).unwrap();
        let masks = [Mask::PixelCount(9_000)];
        let report = pipeline
            .run(IMAGE, &[det("apple", 0.9)], Some(&masks))
            .unwrap()
            .into_report();
        assert_eq!(report.line_items[0].size, None);
        assert_eq!(report.line_items[0].calories, 95.0);
    }

    #[test]
    fn test_mask_count_mismatch_is_invalid() {
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config()).unwrap();
        let masks = [Mask::PixelCount(100)];
        let err = pipeline
            .run(IMAGE, &[det("apple", 0.9), det("banana", 0.9)], Some(&masks))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_coverage_mask_must_match_image() {
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config()).unwrap();
        let masks = [Mask::Coverage(vec![true; 50])];
        let err = pipeline.run(IMAGE, &[det("apple", 0.9)], Some(&masks)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_strict_unknown_class_fails_through_pipeline() {
        let config = PipelineConfig {
            known_classes: Some(["apple", "pizza"].iter().map(|s| s.to_string()).collect()),
            ..simple_config()
        };
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), config).unwrap();
        let err = pipeline.run(IMAGE, &[det("pizza", 0.9)], None).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownClass(_)));
    }

    #[test]
    fn test_fallback_unknown_class_uses_default() {
        let config = PipelineConfig {
            lookup_policy: LookupPolicy::DefaultFallback,
            known_classes: Some(["apple", "pizza"].iter().map(|s| s.to_string()).collect()),
            ..simple_config()
        };
        let pipeline =
            NutritionPipeline::new(simple_store(LookupPolicy::DefaultFallback), config).unwrap();
        let report = pipeline.run(IMAGE, &[det("pizza", 0.9)], None).unwrap().into_report();
        assert_eq!(report.line_items[0].calories, 50.0);
    }

    #[test]
    fn test_per_call_threshold() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        let dets = [det("apple", 0.3)];
        assert!(pipeline.run(IMAGE, &dets, None).unwrap().is_no_detections());
        let outcome = pipeline.run_with_threshold(IMAGE, &dets, None, 0.25).unwrap();
        assert_eq!(outcome.report().unwrap().totals.calories, 75.0);
        assert!(pipeline.run_with_threshold(IMAGE, &dets, None, 1.5).is_err());
    }

    #[test]
    fn test_new_rejects_mode_mismatch() {
        let err = NutritionPipeline::new(mass_store(), simple_config()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_known_classes_default_to_store() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.known_classes().len(), 1);
        assert!(pipeline.known_classes().contains("apple"));
    }

    #[test]
    fn test_estimate_with_vision_service() {
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config()).unwrap();
        let vision = FakeVision {
            detections: vec![det("apple", 0.9), det("banana", 0.2)],
            masks: Some(vec![Mask::PixelCount(2_000)]),
        };
        let image = DynamicImage::new_rgb8(100, 100);
        let report = pipeline.estimate(&vision, &image).unwrap().into_report();
        assert_eq!(report.line_items.len(), 1);
        assert_eq!(report.line_items[0].size, Some(SizeLabel::Large));
        assert_eq!(report.line_items[0].calories, 124.0);
    }

    #[test]
    fn test_estimate_rejects_short_mask_list() {
        let pipeline = NutritionPipeline::new(simple_store(LookupPolicy::Strict), simple_config()).unwrap();
        let vision = FakeVision {
            detections: vec![det("apple", 0.9), det("banana", 0.9)],
            masks: Some(vec![Mask::PixelCount(2_000)]),
        };
        let image = DynamicImage::new_rgb8(100, 100);
        let err = pipeline.estimate(&vision, &image).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_estimate_propagates_vision_errors() {
        let pipeline = NutritionPipeline::new(mass_store(), PipelineConfig::default()).unwrap();
        let image = DynamicImage::new_rgb8(10, 10);
        let err = pipeline.estimate(&BrokenVision, &image).unwrap_err();
        assert!(matches!(err, PipelineError::Vision(VisionError::Detection(_))));
    }

    #[test]
    fn test_estimate_nutrition_entry_point_is_reproducible() {
        let dets = [det("apple", 0.9), det("apple", 0.8), det("kiwi", 0.9)];
        let config = PipelineConfig {
            known_classes: Some(["apple", "kiwi"].iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        };
        let a = estimate_nutrition(IMAGE, &dets, None, &config, mass_store()).unwrap();
        let b = estimate_nutrition(IMAGE, &dets, None, &config, mass_store()).unwrap();
        assert_eq!(a, b);
        let report = a.into_report();
        assert_eq!(report.totals.calories, 150.0);
        assert_eq!(report.skipped.len(), 1);
    }
}
