//! Nutriscan Library
//!
//! Turns fruit/vegetable detections from one image into a nutrition report.

pub mod build_info;
pub mod config;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod tools;
pub mod vision;

pub use config::PipelineConfig;
pub use pipeline::{estimate_nutrition, NutritionPipeline, Outcome, PipelineError, PipelineResult};
pub use reference::{LookupPolicy, ReferenceStore};
pub use vision::{VisionError, VisionService};
