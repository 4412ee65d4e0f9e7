//! Nutriscan Status Tool
//!
//! Provides runtime status information about the nutriscan service.

use serde::Serialize;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::pipeline::NutritionPipeline;

/// Estimation instructions for AI assistants
pub const ESTIMATE_INSTRUCTIONS: &str = r#"
# Nutriscan Estimation Instructions

Nutriscan turns object-detector output for one photo into a nutrition report.
It does not run the detector itself: pass the detections you already have.

## Calling estimate_nutrition

- `image_width` / `image_height`: size of the analysed image in pixels.
  Alternatively pass `image_path` and the size is read from the file.
- `detections`: one entry per detected object:
  - `class_name`: detector label, e.g. `"apple"`
  - `confidence`: 0.0 - 1.0
  - `bbox`: `[x1, y1, x2, y2]` in pixels (boxes are clipped to the image)
  - `mask_pixels` (optional): pixel count of the object's segmentation mask.
    Give it for every detection or for none.
- `confidence_threshold` (optional): overrides the configured threshold.

## What comes back

- `status`: `estimated`, or `no_detections` with a `warning` when nothing
  survived filtering (unknown classes or low confidence). That is not an error.
- `report.item_counts`: detections per food class.
- `report.line_items`:
  - simple mode: one row per detection, calories scaled by size
    (small 0.7x, medium 1.0x, large 1.3x) when masks are given
  - mass-based mode: one row per class with estimated grams and macros
- `report.skipped`: classes with no reference data (mass-based mode only).
- `totals_display`: totals rounded to one decimal, for showing to the user.

## Tips

- Call `list_known_classes` to see which labels count as food.
- Call `lookup_food` to see the reference values behind one label.
- Weights are averages per item, not measurements. Present totals as estimates.
"#;

/// Service status information
#[derive(Debug, Serialize)]
pub struct NutriscanStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Reference store information
    pub reference_source: String,
    pub mode: String,
    pub lookup_policy: String,
    pub reference_entries: usize,
    pub known_classes: usize,
    pub confidence_threshold: f64,

    /// Usage since startup
    pub estimates_served: u64,
    pub empty_estimates: u64,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    estimates_served: u64,
    empty_estimates: u64,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            estimates_served: 0,
            empty_estimates: 0,
        }
    }

    /// Count one finished estimate
    pub fn record_estimate(&mut self, empty: bool) {
        self.estimates_served += 1;
        if empty {
            self.empty_estimates += 1;
        }
    }

    /// Get the current status
    pub fn get_status(&self, pipeline: &NutritionPipeline) -> NutriscanStatus {
        let build_info = BuildInfo::current();
        let store = pipeline.store();

        // Get process info
        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        NutriscanStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            reference_source: store.source().to_string(),
            mode: store.kind().to_string(),
            lookup_policy: store.policy().as_str().to_string(),
            reference_entries: store.len(),
            known_classes: pipeline.known_classes().len(),
            confidence_threshold: pipeline.config().confidence_threshold,
            estimates_served: self.estimates_served,
            empty_estimates: self.empty_estimates,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
