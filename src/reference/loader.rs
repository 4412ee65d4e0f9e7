//! Reference table loading
//!
//! Reads the JSON reference tables from a data directory, or from the copies
//! embedded in the binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::store::{LookupPolicy, ReferenceError, ReferenceResult, ReferenceStore};
use crate::models::{AggregationMode, Nutrition};

pub const NUTRITION_PER_100G_FILE: &str = "nutrition_per_100g.json";
pub const AVG_WEIGHTS_FILE: &str = "avg_weights.json";
pub const BASE_CALORIES_FILE: &str = "base_calories.json";

const BUILTIN_NUTRITION_PER_100G: &str = include_str!("../../data/nutrition_per_100g.json");
const BUILTIN_AVG_WEIGHTS: &str = include_str!("../../data/avg_weights.json");
const BUILTIN_BASE_CALORIES: &str = include_str!("../../data/base_calories.json");

/// Where reference tables come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    /// Tables compiled into the binary
    Builtin,
    /// A directory holding the JSON tables
    Directory(PathBuf),
}

impl ReferenceSource {
    pub fn describe(&self) -> String {
        match self {
            ReferenceSource::Builtin => "builtin".to_string(),
            ReferenceSource::Directory(dir) => dir.display().to_string(),
        }
    }
}

/// Row of the simple-mode table
#[derive(Debug, Deserialize)]
struct BaseCaloriesRow {
    base_calories: f64,
    #[serde(default = "default_unit")]
    unit: String,
}

fn default_unit() -> String {
    "estimated serving".to_string()
}

fn parse_table<T: DeserializeOwned>(text: &str, origin: &str) -> ReferenceResult<T> {
    serde_json::from_str(text).map_err(|source| ReferenceError::Json {
        path: origin.to_string(),
        source,
    })
}

fn read_table<T: DeserializeOwned>(path: &Path) -> ReferenceResult<T> {
    let origin = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: origin.clone(),
        source,
    })?;
    parse_table(&text, &origin)
}

/// Per-100g nutrient table: `{class: {calories, carbs, protein, fat, fiber?}}`
pub fn load_per_100g_table(path: &Path) -> ReferenceResult<BTreeMap<String, Nutrition>> {
    read_table(path)
}

/// Average weight table: `{class: grams}`
pub fn load_avg_weights(path: &Path) -> ReferenceResult<BTreeMap<String, f64>> {
    read_table(path)
}

/// Base calories table: `{class: {base_calories, unit}}`
pub fn load_base_calories(path: &Path) -> ReferenceResult<BTreeMap<String, (f64, String)>> {
    let rows: BTreeMap<String, BaseCaloriesRow> = read_table(path)?;
    Ok(flatten_base_rows(rows))
}

fn flatten_base_rows(rows: BTreeMap<String, BaseCaloriesRow>) -> BTreeMap<String, (f64, String)> {
    rows.into_iter()
        .map(|(name, row)| (name, (row.base_calories, row.unit)))
        .collect()
}

/// Load a store of the given kind from `source`
pub fn load_store(
    source: &ReferenceSource,
    mode: AggregationMode,
    policy: LookupPolicy,
) -> ReferenceResult<ReferenceStore> {
    let store = match (source, mode) {
        (ReferenceSource::Directory(dir), AggregationMode::MassBased) => ReferenceStore::mass_based(
            load_per_100g_table(&dir.join(NUTRITION_PER_100G_FILE))?,
            load_avg_weights(&dir.join(AVG_WEIGHTS_FILE))?,
            policy,
            source.describe(),
        )?,
        (ReferenceSource::Directory(dir), AggregationMode::Simple) => ReferenceStore::simple(
            load_base_calories(&dir.join(BASE_CALORIES_FILE))?,
            policy,
            source.describe(),
        )?,
        (ReferenceSource::Builtin, AggregationMode::MassBased) => ReferenceStore::mass_based(
            parse_table(BUILTIN_NUTRITION_PER_100G, "builtin/nutrition_per_100g.json")?,
            parse_table(BUILTIN_AVG_WEIGHTS, "builtin/avg_weights.json")?,
            policy,
            source.describe(),
        )?,
        (ReferenceSource::Builtin, AggregationMode::Simple) => {
            let rows: BTreeMap<String, BaseCaloriesRow> =
                parse_table(BUILTIN_BASE_CALORIES, "builtin/base_calories.json")?;
            ReferenceStore::simple(flatten_base_rows(rows), policy, source.describe())?
        }
    };

    tracing::info!(
        source = %store.source(),
        mode = %store.kind(),
        policy = store.policy().as_str(),
        entries = store.len(),
        "Reference store loaded"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceEntry;
    use std::fs;

    #[test]
    fn test_builtin_mass_based_store() {
        let store =
            load_store(&ReferenceSource::Builtin, AggregationMode::MassBased, LookupPolicy::Strict)
                .unwrap();
        assert!(store.contains("apple"));
        assert!(store.contains("banana"));
        assert_eq!(store.source(), "builtin");

        // lettuce has no fiber column in the table
        match store.lookup("lettuce").unwrap() {
            ReferenceEntry::MassBased { per_100g, .. } => assert_eq!(per_100g.fiber, 0.0),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_builtin_simple_store_has_default() {
        let store = load_store(
            &ReferenceSource::Builtin,
            AggregationMode::Simple,
            LookupPolicy::DefaultFallback,
        )
        .unwrap();
        assert_eq!(store.class_names(), vec!["apple", "banana", "broccoli", "carrot", "orange"]);
        assert!(store.default_entry().is_some());
    }

    #[test]
    fn test_directory_store_joins_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(NUTRITION_PER_100G_FILE),
            r#"{"apple": {"calories": 52, "carbs": 13.8, "protein": 0.3, "fat": 0.2},
                "kiwi": {"calories": 61, "carbs": 14.7, "protein": 1.1, "fat": 0.5}}"#,
        )
        .unwrap();
        fs::write(dir.path().join(AVG_WEIGHTS_FILE), r#"{"apple": 150, "plum": 66}"#).unwrap();

        let source = ReferenceSource::Directory(dir.path().to_path_buf());
        let store = load_store(&source, AggregationMode::MassBased, LookupPolicy::Strict).unwrap();
        assert_eq!(store.class_names(), vec!["apple"]);
    }

    #[test]
    fn test_simple_table_unit_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(BASE_CALORIES_FILE),
            r#"{"apple": {"base_calories": 95}, "default": {"base_calories": 50}}"#,
        )
        .unwrap();
        let rows = load_base_calories(&dir.path().join(BASE_CALORIES_FILE)).unwrap();
        assert_eq!(rows["apple"], (95.0, "estimated serving".to_string()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ReferenceSource::Directory(dir.path().to_path_buf());
        let err = load_store(&source, AggregationMode::Simple, LookupPolicy::Strict).unwrap_err();
        assert!(matches!(err, ReferenceError::Io { .. }));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(AVG_WEIGHTS_FILE), r#"{"apple": "heavy"}"#).unwrap();
        let err = load_avg_weights(&dir.path().join(AVG_WEIGHTS_FILE)).unwrap_err();
        assert!(matches!(err, ReferenceError::Json { .. }));
    }
}
