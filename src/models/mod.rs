//! Data models
//!
//! Plain data types shared by the reference store, the pipeline and the
//! presentation layer.

mod detection;
mod nutrition;
mod report;
mod size;

pub use detection::{BoundingBox, Detection, ImageDimensions, Mask};
pub use nutrition::Nutrition;
pub use report::{AggregationMode, ItemCount, NutritionLineItem, Report, SkippedItem};
pub use size::{SizeEstimate, SizeLabel};
