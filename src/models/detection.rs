//! Detection model
//!
//! Detector output as the core sees it: one object instance per
//! `Detection`, plus the optional segmentation `Mask` for it.

use serde::{Deserialize, Serialize};

/// Width and height of the analysed image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count; zero when either side is zero
    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.total_pixels() == 0
    }
}

/// Axis-aligned box in image pixel coordinates.
///
/// Serialized as `[x1, y1, x2, y2]`, the layout detectors emit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box area in square pixels (zero for degenerate boxes)
    pub fn area(&self) -> f64 {
        (self.width() * self.height()).max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Non-empty in both directions (x1 < x2 and y1 < y2)
    pub fn is_well_formed(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Clamp every corner into `[0, width] x [0, height]`
    pub fn clamp_to(&self, image: ImageDimensions) -> Self {
        let w = image.width as f64;
        let h = image.height as f64;
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detected object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// Detector confidence, 0.0..=1.0
    pub confidence: f64,
    #[serde(alias = "bounding_box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// Segmentation result for one detection.
///
/// Accepts either a bare covered-pixel count or a row-major boolean
/// coverage bitmap over the whole image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mask {
    PixelCount(u64),
    Coverage(Vec<bool>),
}

impl Mask {
    /// Number of pixels covered by the mask
    pub fn pixel_count(&self) -> u64 {
        match self {
            Mask::PixelCount(n) => *n,
            Mask::Coverage(bits) => bits.iter().filter(|b| **b).count() as u64,
        }
    }

    /// Bitmap length when this is a coverage mask
    pub fn coverage_len(&self) -> Option<usize> {
        match self {
            Mask::PixelCount(_) => None,
            Mask::Coverage(bits) => Some(bits.len()),
        }
    }
}
