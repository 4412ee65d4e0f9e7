//! Nutrition aggregator
//!
//! Joins retained detections (and their optional size estimates) against
//! the reference store and builds the report.

use std::collections::HashMap;

use super::{invalid, PipelineResult};
use crate::models::{
    AggregationMode, Detection, ItemCount, Nutrition, NutritionLineItem, Report, SizeEstimate,
    SkippedItem,
};
use crate::reference::{ReferenceEntry, ReferenceStore};

/// Count detections per class, in first-seen order
pub fn count_items(detections: &[Detection]) -> Vec<ItemCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<ItemCount> = Vec::new();

    for det in detections {
        match index.get(det.class_name.as_str()) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(det.class_name.as_str(), counts.len());
                counts.push(ItemCount {
                    item: det.class_name.clone(),
                    count: 1,
                });
            }
        }
    }

    counts
}

/// Aggregate detections into a report.
///
/// `size_estimates`, when given, is aligned by index with `detections`.
/// Zero detections give an empty report, not an error.
pub fn aggregate(
    detections: &[Detection],
    size_estimates: Option<&[SizeEstimate]>,
    store: &ReferenceStore,
    mode: AggregationMode,
) -> PipelineResult<Report> {
    if store.kind() != mode {
        return Err(invalid(format!(
            "aggregation mode {} needs a {} reference store, got {}",
            mode,
            mode,
            store.kind()
        )));
    }
    if let Some(sizes) = size_estimates {
        if sizes.len() != detections.len() {
            return Err(invalid(format!(
                "expected {} size estimates, got {}",
                detections.len(),
                sizes.len()
            )));
        }
    }

    let item_counts = count_items(detections);
    let (line_items, skipped) = match mode {
        AggregationMode::Simple => (simple_line_items(detections, size_estimates, store)?, Vec::new()),
        AggregationMode::MassBased => {
            if size_estimates.is_some() {
                tracing::debug!("Size estimates are not used by mass-based aggregation");
            }
            mass_based_line_items(&item_counts, store)?
        }
    };

    let totals: Nutrition = line_items.iter().map(|line| line.nutrition()).sum();

    tracing::info!(
        mode = %mode,
        detections = detections.len(),
        line_items = line_items.len(),
        skipped = skipped.len(),
        calories = totals.calories,
        "Aggregated nutrition report"
    );

    Ok(Report {
        mode,
        item_counts,
        line_items,
        totals,
        skipped,
    })
}

/// One line per detection: `round(base_calories * multiplier)`
fn simple_line_items(
    detections: &[Detection],
    size_estimates: Option<&[SizeEstimate]>,
    store: &ReferenceStore,
) -> PipelineResult<Vec<NutritionLineItem>> {
    let mut lines = Vec::with_capacity(detections.len());

    for (i, det) in detections.iter().enumerate() {
        let base_calories = match store.lookup(&det.class_name)? {
            ReferenceEntry::Simple { base_calories, .. } => *base_calories,
            ReferenceEntry::MassBased { .. } => {
                return Err(invalid(format!(
                    "reference entry for '{}' has no base calories",
                    det.class_name
                )))
            }
        };
        let size = size_estimates.map(|sizes| sizes[i]);
        let multiplier = size.map(|s| s.multiplier).unwrap_or(1.0);
        let calories = (base_calories * multiplier).round();

        tracing::debug!(
            class = %det.class_name,
            base_calories,
            multiplier,
            calories,
            "Simple line item"
        );

        lines.push(NutritionLineItem {
            item: det.class_name.clone(),
            count: 1,
            size: size.map(|s| s.size_label),
            multiplier: Some(multiplier),
            estimated_weight_g: None,
            calories,
            carbs_g: None,
            protein_g: None,
            fat_g: None,
            fiber_g: None,
        });
    }

    Ok(lines)
}

/// One line per class: `avg_weight * count` grams of the per-100g profile.
///
/// Classes without reference data are skipped and reported separately.
fn mass_based_line_items(
    item_counts: &[ItemCount],
    store: &ReferenceStore,
) -> PipelineResult<(Vec<NutritionLineItem>, Vec<SkippedItem>)> {
    let entries = store.bulk_lookup(item_counts.iter().map(|c| c.item.as_str()));
    let mut lines = Vec::with_capacity(item_counts.len());
    let mut skipped = Vec::new();

    for counted in item_counts {
        let entry = entries.get(&counted.item).copied().flatten();
        let (per_100g, avg_weight_grams) = match entry {
            Some(ReferenceEntry::MassBased {
                per_100g,
                avg_weight_grams,
            }) => (*per_100g, *avg_weight_grams),
            Some(ReferenceEntry::Simple { .. }) => {
                return Err(invalid(format!(
                    "reference entry for '{}' has no per-100g nutrients",
                    counted.item
                )))
            }
            None => {
                tracing::warn!(
                    class = %counted.item,
                    count = counted.count,
                    "No reference data, excluding from report"
                );
                skipped.push(SkippedItem {
                    item: counted.item.clone(),
                    count: counted.count,
                });
                continue;
            }
        };

        let weight = avg_weight_grams * counted.count as f64;
        let nutrition = per_100g.scale(weight / 100.0);

        lines.push(NutritionLineItem {
            item: counted.item.clone(),
            count: counted.count,
            size: None,
            multiplier: None,
            estimated_weight_g: Some(weight),
            calories: nutrition.calories,
            carbs_g: Some(nutrition.carbs),
            protein_g: Some(nutrition.protein),
            fat_g: Some(nutrition.fat),
            fiber_g: Some(nutrition.fiber),
        });
    }

    Ok((lines, skipped))
}
