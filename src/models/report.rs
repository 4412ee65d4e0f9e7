//! Nutrition report
//!
//! The structured result of one pipeline run: a flat, ordered list of line
//! items (uniform columns, ready for a table) and a separate totals record.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Nutrition, SizeLabel};

/// Aggregation policy, and the kind of reference data it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One line per detection, base calories scaled by the size multiplier
    Simple,
    /// One line per class, average weight times count, per-100g nutrients
    #[default]
    MassBased,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Simple => "simple",
            AggregationMode::MassBased => "mass_based",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "simple" => Some(AggregationMode::Simple),
            "mass_based" | "mass" => Some(AggregationMode::MassBased),
            _ => None,
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of retained detections of one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub item: String,
    pub count: u32,
}

/// A class that was detected but had no reference data (mass-based mode)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub item: String,
    pub count: u32,
}

/// One row of the report.
///
/// Simple mode fills `size`/`multiplier` and leaves the weight and macro
/// columns empty; mass-based mode does the opposite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionLineItem {
    pub item: String,
    pub count: u32,
    pub size: Option<SizeLabel>,
    pub multiplier: Option<f64>,
    pub estimated_weight_g: Option<f64>,
    pub calories: f64,
    pub carbs_g: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
}

impl NutritionLineItem {
    /// Nutrient values of this row, absent columns counted as zero
    pub fn nutrition(&self) -> Nutrition {
        Nutrition {
            calories: self.calories,
            carbs: self.carbs_g.unwrap_or(0.0),
            protein: self.protein_g.unwrap_or(0.0),
            fat: self.fat_g.unwrap_or(0.0),
            fiber: self.fiber_g.unwrap_or(0.0),
        }
    }
}

/// Result of aggregating one image's detections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub mode: AggregationMode,
    pub item_counts: Vec<ItemCount>,
    pub line_items: Vec<NutritionLineItem>,
    /// Sum of the unrounded line item values
    pub totals: Nutrition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
}

impl Report {
    /// Report with no line items and all-zero totals
    pub fn empty(mode: AggregationMode) -> Self {
        Self {
            mode,
            item_counts: Vec::new(),
            line_items: Vec::new(),
            totals: Nutrition::zero(),
            skipped: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Totals rounded to one decimal, for metric widgets
    pub fn totals_display(&self) -> Nutrition {
        self.totals.rounded_for_display()
    }

    /// Number of detections that contributed to the report
    pub fn detection_count(&self) -> u32 {
        self.item_counts.iter().map(|c| c.count).sum()
    }
}

fn opt_cell(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>5} {:<7} {:>5} {:>10} {:>9} {:>8} {:>8} {:>8} {:>8}",
            "Item", "Count", "Size", "Mult", "Weight(g)", "Calories", "Carbs", "Protein", "Fat",
            "Fiber"
        )?;
        for line in &self.line_items {
            writeln!(
                f,
                "{:<16} {:>5} {:<7} {:>5} {:>10} {:>9.1} {:>8} {:>8} {:>8} {:>8}",
                line.item,
                line.count,
                line.size.map(|s| s.as_str()).unwrap_or("-"),
                line.multiplier
                    .map(|m| format!("{}x", m))
                    .unwrap_or_else(|| "-".to_string()),
                opt_cell(line.estimated_weight_g),
                line.calories,
                opt_cell(line.carbs_g),
                opt_cell(line.protein_g),
                opt_cell(line.fat_g),
                opt_cell(line.fiber_g),
            )?;
        }
        let t = self.totals_display();
        writeln!(
            f,
            "Total: {:.1} kcal | carbs {:.1} g | protein {:.1} g | fat {:.1} g | fiber {:.1} g",
            t.calories, t.carbs, t.protein, t.fat, t.fiber
        )?;
        for skipped in &self.skipped {
            writeln!(f, "Skipped (no reference data): {} x{}", skipped.item, skipped.count)?;
        }
        Ok(())
    }
}
