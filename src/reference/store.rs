//! Nutrition reference store
//!
//! Immutable lookup from food class name to reference nutrition data. A
//! store is built once, in one `AggregationMode`, and shared read-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AggregationMode, Nutrition};

/// Reserved key for the fallback entry
pub const DEFAULT_ENTRY_KEY: &str = "default";

/// Reference store error types
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read reference table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in reference table {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid reference entry for '{class_name}': {reason}")]
    InvalidEntry { class_name: String, reason: String },

    #[error("Lookup policy default_fallback requires a 'default' entry")]
    MissingDefault,

    #[error("Unknown food class: {0}")]
    UnknownClass(String),
}

/// Result type for reference store operations
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// What to do when a class has no row of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LookupPolicy {
    /// Missing classes are an `UnknownClass` error
    #[default]
    Strict,
    /// Missing classes resolve to the `default` entry
    DefaultFallback,
}

impl LookupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupPolicy::Strict => "strict",
            LookupPolicy::DefaultFallback => "default_fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strict" => Some(LookupPolicy::Strict),
            "default_fallback" | "fallback" | "default" => Some(LookupPolicy::DefaultFallback),
            _ => None,
        }
    }
}

/// One row of the reference table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceEntry {
    /// Approximate calories for one typical instance
    Simple { base_calories: f64, unit: String },
    /// Nutrients per 100 g plus the average weight of one instance
    MassBased {
        per_100g: Nutrition,
        avg_weight_grams: f64,
    },
}

impl ReferenceEntry {
    pub fn kind(&self) -> AggregationMode {
        match self {
            ReferenceEntry::Simple { .. } => AggregationMode::Simple,
            ReferenceEntry::MassBased { .. } => AggregationMode::MassBased,
        }
    }

    fn validate(&self, class_name: &str) -> ReferenceResult<()> {
        let reason = match self {
            ReferenceEntry::Simple { base_calories, .. } => {
                if !base_calories.is_finite() || *base_calories < 0.0 {
                    Some(format!("base_calories must be a non-negative number, got {}", base_calories))
                } else {
                    None
                }
            }
            ReferenceEntry::MassBased {
                per_100g,
                avg_weight_grams,
            } => {
                if !avg_weight_grams.is_finite() || *avg_weight_grams <= 0.0 {
                    Some(format!("avg_weight_grams must be positive, got {}", avg_weight_grams))
                } else if !per_100g.is_valid() {
                    Some("per_100g values must be non-negative numbers".to_string())
                } else {
                    None
                }
            }
        };
        match reason {
            Some(reason) => Err(ReferenceError::InvalidEntry {
                class_name: class_name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Read-only nutrition reference table
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    kind: AggregationMode,
    policy: LookupPolicy,
    entries: BTreeMap<String, ReferenceEntry>,
    default: Option<ReferenceEntry>,
    source: String,
}

impl ReferenceStore {
    /// Build a store from already-typed rows.
    ///
    /// A row keyed `default` becomes the fallback entry. Every row must be
    /// of `kind`, and `DefaultFallback` requires a fallback entry.
    pub fn from_entries(
        kind: AggregationMode,
        policy: LookupPolicy,
        rows: BTreeMap<String, ReferenceEntry>,
        source: impl Into<String>,
    ) -> ReferenceResult<Self> {
        let mut entries = BTreeMap::new();
        let mut default = None;

        for (class_name, entry) in rows {
            if entry.kind() != kind {
                return Err(ReferenceError::InvalidEntry {
                    class_name,
                    reason: format!("expected a {} entry, found {}", kind, entry.kind()),
                });
            }
            entry.validate(&class_name)?;
            if class_name == DEFAULT_ENTRY_KEY {
                default = Some(entry);
            } else {
                entries.insert(class_name, entry);
            }
        }

        if policy == LookupPolicy::DefaultFallback && default.is_none() {
            return Err(ReferenceError::MissingDefault);
        }

        Ok(Self {
            kind,
            policy,
            entries,
            default,
            source: source.into(),
        })
    }

    /// Simple-mode store from `{class: (base_calories, unit)}` rows
    pub fn simple(
        rows: BTreeMap<String, (f64, String)>,
        policy: LookupPolicy,
        source: impl Into<String>,
    ) -> ReferenceResult<Self> {
        let rows = rows
            .into_iter()
            .map(|(name, (base_calories, unit))| {
                (name, ReferenceEntry::Simple { base_calories, unit })
            })
            .collect();
        Self::from_entries(AggregationMode::Simple, policy, rows, source)
    }

    /// Mass-based store joining a per-100g table with an average weight table.
    ///
    /// A class is kept only when both tables have it.
    pub fn mass_based(
        per_100g: BTreeMap<String, Nutrition>,
        avg_weights: BTreeMap<String, f64>,
        policy: LookupPolicy,
        source: impl Into<String>,
    ) -> ReferenceResult<Self> {
        let mut rows = BTreeMap::new();
        for (class_name, nutrition) in per_100g {
            match avg_weights.get(&class_name) {
                Some(weight) => {
                    rows.insert(
                        class_name,
                        ReferenceEntry::MassBased {
                            per_100g: nutrition,
                            avg_weight_grams: *weight,
                        },
                    );
                }
                None => tracing::debug!(class = %class_name, "No average weight, dropping reference row"),
            }
        }
        for class_name in avg_weights.keys().filter(|k| !rows.contains_key(*k)) {
            tracing::debug!(class = %class_name, "No per-100g nutrients, dropping reference row");
        }
        Self::from_entries(AggregationMode::MassBased, policy, rows, source)
    }

    /// Look up one class under the store's policy
    pub fn lookup(&self, class_name: &str) -> ReferenceResult<&ReferenceEntry> {
        if let Some(entry) = self.entries.get(class_name) {
            return Ok(entry);
        }
        match (self.policy, &self.default) {
            (LookupPolicy::DefaultFallback, Some(default)) => {
                tracing::debug!(class = %class_name, "Using default reference entry");
                Ok(default)
            }
            _ => Err(ReferenceError::UnknownClass(class_name.to_string())),
        }
    }

    /// Look up many classes; missing classes map to `None` regardless of policy
    pub fn bulk_lookup<I, S>(&self, class_names: I) -> BTreeMap<String, Option<&ReferenceEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        class_names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), self.entries.get(name))
            })
            .collect()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.entries.contains_key(class_name)
    }

    /// Class names with their own row, sorted, `default` excluded
    pub fn class_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn kind(&self) -> AggregationMode {
        self.kind
    }

    pub fn policy(&self) -> LookupPolicy {
        self.policy
    }

    pub fn default_entry(&self) -> Option<&ReferenceEntry> {
        self.default.as_ref()
    }

    /// Where the tables were loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
