//! Pipeline configuration
//!
//! Read from an optional JSON file (`NUTRISCAN_CONFIG`) with environment
//! overrides on top.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AggregationMode;
use crate::pipeline::filter::validate_threshold;
use crate::pipeline::{SizePolicy, SizeSource};
use crate::reference::{self, LookupPolicy, ReferenceResult, ReferenceSource, ReferenceStore};

pub const CONFIG_ENV: &str = "NUTRISCAN_CONFIG";
pub const DATA_DIR_ENV: &str = "NUTRISCAN_DATA_DIR";
pub const THRESHOLD_ENV: &str = "NUTRISCAN_CONFIDENCE_THRESHOLD";
pub const MODE_ENV: &str = "NUTRISCAN_MODE";
pub const LOOKUP_POLICY_ENV: &str = "NUTRISCAN_LOOKUP_POLICY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Options recognized by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detections below this confidence are dropped
    pub confidence_threshold: f64,
    pub mode: AggregationMode,
    pub lookup_policy: LookupPolicy,
    pub size_source: SizeSource,
    #[serde(flatten)]
    pub size_policy: SizePolicy,
    /// Food class allow-list; `None` means every class in the store
    pub known_classes: Option<BTreeSet<String>>,
    /// Directory with the JSON reference tables; `None` uses the built-in tables
    pub reference_store_source: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            mode: AggregationMode::MassBased,
            lookup_policy: LookupPolicy::Strict,
            size_source: SizeSource::Mask,
            size_policy: SizePolicy::default(),
            known_classes: None,
            reference_store_source: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON config file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json { path: origin, source })
    }

    /// Load from `NUTRISCAN_CONFIG` (if set) and apply environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&resolve_path(Path::new(&path)))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.reference_store_source = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(THRESHOLD_ENV) {
            self.confidence_threshold =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: THRESHOLD_ENV.to_string(),
                    reason: format!("'{}' is not a number", value),
                })?;
        }
        if let Some(value) = lookup(MODE_ENV) {
            self.mode = AggregationMode::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: MODE_ENV.to_string(),
                reason: format!("'{}' is not one of simple, mass_based", value),
            })?;
        }
        if let Some(value) = lookup(LOOKUP_POLICY_ENV) {
            self.lookup_policy = LookupPolicy::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: LOOKUP_POLICY_ENV.to_string(),
                reason: format!("'{}' is not one of strict, default_fallback", value),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold("confidence_threshold", self.confidence_threshold).map_err(|e| {
            ConfigError::InvalidValue {
                key: "confidence_threshold".to_string(),
                reason: e.to_string(),
            }
        })?;
        self.size_policy.validate().map_err(|e| ConfigError::InvalidValue {
            key: "size_policy".to_string(),
            reason: e.to_string(),
        })?;
        if let Some(classes) = &self.known_classes {
            if classes.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: "known_classes".to_string(),
                    reason: "class names must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn reference_source(&self) -> ReferenceSource {
        match &self.reference_store_source {
            Some(dir) => ReferenceSource::Directory(resolve_path(dir)),
            None => ReferenceSource::Builtin,
        }
    }

    /// Load the reference store this config describes
    pub fn load_store(&self) -> ReferenceResult<ReferenceStore> {
        reference::load_store(&self.reference_source(), self.mode, self.lookup_policy)
    }
}

/// Project root, derived from the executable location.
///
/// Binaries under `target/release` or `target/debug` resolve to the
/// directory above `target`.
pub fn project_root() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(parent) = path.parent() {
            if let Some(grandparent) = parent.parent() {
                path = grandparent.to_path_buf();
            }
        }
    }
    path
}

/// Relative paths that don't exist from the working directory are taken
/// relative to the project root
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        project_root().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.confidence_threshold, 0.4);
        assert_eq!(config.mode, AggregationMode::MassBased);
        assert_eq!(config.size_policy.small_threshold, 0.05);
        assert_eq!(config.size_policy.large_threshold, 0.15);
        assert_eq!(config.reference_source(), ReferenceSource::Builtin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"mode": "simple", "small_threshold": 0.1, "known_classes": ["apple", "pizza"]}"#,
        )
        .unwrap();
        assert_eq!(config.mode, AggregationMode::Simple);
        assert_eq!(config.size_policy.small_threshold, 0.1);
        assert_eq!(config.size_policy.large_threshold, 0.15);
        assert_eq!(config.confidence_threshold, 0.4);
        assert_eq!(config.known_classes.unwrap().len(), 2);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nutriscan.json");
        std::fs::write(&path, r#"{"lookup_policy": "default_fallback", "size_source": "bounding_box"}"#)
            .unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.lookup_policy, LookupPolicy::DefaultFallback);
        assert_eq!(config.size_source, SizeSource::BoundingBox);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(PipelineConfig::from_file(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (THRESHOLD_ENV, "0.25"),
            (MODE_ENV, "simple"),
            (LOOKUP_POLICY_ENV, "default_fallback"),
            (DATA_DIR_ENV, "/srv/nutrition"),
        ]
        .into_iter()
        .collect();
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.mode, AggregationMode::Simple);
        assert_eq!(config.lookup_policy, LookupPolicy::DefaultFallback);
        assert_eq!(
            config.reference_source(),
            ReferenceSource::Directory(PathBuf::from("/srv/nutrition"))
        );
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(|k| (k == MODE_ENV).then(|| "volumetric".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == MODE_ENV));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = PipelineConfig {
            confidence_threshold: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            known_classes: Some(["".to_string()].into_iter().collect()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
