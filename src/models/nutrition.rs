//! Shared nutrition data structure
//!
//! Used for per-100g reference rows, mass-based line items and report totals.

use serde::{Deserialize, Serialize};

/// Nutritional information
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub carbs: f64,   // grams
    pub protein: f64, // grams
    pub fat: f64,     // grams
    /// Missing in some reference rows; treated as zero
    #[serde(default)]
    pub fiber: f64, // grams
}

impl Nutrition {
    /// Create a new Nutrition with all zeros
    pub fn zero() -> Self {
        Self::default()
    }

    /// Scale nutrition values by a multiplier
    pub fn scale(&self, multiplier: f64) -> Self {
        Self {
            calories: self.calories * multiplier,
            carbs: self.carbs * multiplier,
            protein: self.protein * multiplier,
            fat: self.fat * multiplier,
            fiber: self.fiber * multiplier,
        }
    }

    /// Add another nutrition to this one
    pub fn add(&self, other: &Nutrition) -> Self {
        Self {
            calories: self.calories + other.calories,
            carbs: self.carbs + other.carbs,
            protein: self.protein + other.protein,
            fat: self.fat + other.fat,
            fiber: self.fiber + other.fiber,
        }
    }

    /// Round every field to one decimal place, for display only
    pub fn rounded_for_display(&self) -> Self {
        fn one_decimal(v: f64) -> f64 {
            (v * 10.0).round() / 10.0
        }
        Self {
            calories: one_decimal(self.calories),
            carbs: one_decimal(self.carbs),
            protein: one_decimal(self.protein),
            fat: one_decimal(self.fat),
            fiber: one_decimal(self.fiber),
        }
    }

    /// True when every value is finite and non-negative
    pub fn is_valid(&self) -> bool {
        [self.calories, self.carbs, self.protein, self.fat, self.fiber]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl std::ops::Add for Nutrition {
    type Output = Nutrition;

    fn add(self, other: Nutrition) -> Nutrition {
        Nutrition::add(&self, &other)
    }
}

impl std::ops::Mul<f64> for Nutrition {
    type Output = Nutrition;

    fn mul(self, multiplier: f64) -> Nutrition {
        self.scale(multiplier)
    }
}

impl std::iter::Sum for Nutrition {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Nutrition::zero(), |acc, n| acc + n)
    }
}
