//! Reference lookup tools

use serde::Serialize;

use crate::pipeline::NutritionPipeline;
use crate::reference::{ReferenceEntry, ReferenceError};

/// Response for lookup_food
#[derive(Debug, Serialize)]
pub struct LookupFoodResponse {
    pub class_name: String,
    /// Passes the known-class filter
    pub known: bool,
    /// The store has a row for this class (as opposed to the fallback)
    pub has_entry: bool,
    pub used_default: bool,
    pub entry: Option<ReferenceEntry>,
    pub message: Option<String>,
}

/// Response for list_known_classes
#[derive(Debug, Serialize)]
pub struct KnownClassesResponse {
    pub mode: String,
    pub lookup_policy: String,
    pub reference_source: String,
    pub known_classes: Vec<String>,
    /// Known classes with no reference row of their own
    pub without_reference: Vec<String>,
    pub has_default: bool,
}

/// Look up one class the way aggregation would
pub fn lookup_food(pipeline: &NutritionPipeline, class_name: &str) -> LookupFoodResponse {
    let class_name = class_name.trim().to_string();
    let store = pipeline.store();
    let known = pipeline.known_classes().contains(&class_name);
    let has_entry = store.contains(&class_name);

    let (entry, message) = match store.lookup(&class_name) {
        Ok(entry) => (Some(entry.clone()), None),
        Err(ReferenceError::UnknownClass(_)) => (
            None,
            Some(format!(
                "No reference data for '{}' ({} lookup)",
                class_name,
                store.policy().as_str()
            )),
        ),
        Err(e) => (None, Some(e.to_string())),
    };
    let used_default = entry.is_some() && !has_entry;

    LookupFoodResponse {
        class_name,
        known,
        has_entry,
        used_default,
        entry,
        message,
    }
}

pub fn list_known_classes(pipeline: &NutritionPipeline) -> KnownClassesResponse {
    let store = pipeline.store();
    let known_classes: Vec<String> = pipeline.known_classes().iter().cloned().collect();
    let without_reference = known_classes
        .iter()
        .filter(|c| !store.contains(c))
        .cloned()
        .collect();

    KnownClassesResponse {
        mode: store.kind().to_string(),
        lookup_policy: store.policy().as_str().to_string(),
        reference_source: store.source().to_string(),
        known_classes,
        without_reference,
        has_default: store.default_entry().is_some(),
    }
}
