//! Heuristic size estimate attached to a single detection

use serde::{Deserialize, Serialize};

/// Coarse size class derived from the mask-to-image area ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeLabel {
    Small,
    Medium,
    Large,
}

impl SizeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeLabel::Small => "Small",
            SizeLabel::Medium => "Medium",
            SizeLabel::Large => "Large",
        }
    }
}

impl std::fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size label plus the calorie scaling multiplier it implies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub size_label: SizeLabel,
    pub multiplier: f64,
}
