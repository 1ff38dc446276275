//! Feature Schema - Centralized Feature Definition
//!
//! **This file controls the model's column-order contract.**
//!
//! ## Rules:
//! 1. Add feature → increment the schema version
//! 2. Change order → increment the schema version
//! 3. Remove feature → increment the schema version
//!
//! The model artifact records the layout version and the feature names it
//! was trained on; both are checked against the live schema at startup and
//! every input record carries the layout hash it was built with.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use super::record::InputRecord;

// ============================================================================
// LAYOUT VERSION
// ============================================================================

/// Layout version of the built-in schema
pub const SCHEMA_VERSION: u8 = 1;

// ============================================================================
// ERRORS
// ============================================================================

/// Problems with the schema definition itself (fatal at startup)
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("schema validation failed: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("duplicate feature name '{0}'")]
    DuplicateFeature(String),

    #[error("feature '{name}': {reason}")]
    BadFeature { name: String, reason: String },

    #[error("schema has {schema} features but the model was trained on {model}")]
    FeatureCountMismatch { schema: usize, model: usize },

    #[error("column {index}: schema has '{schema}' but the model expects '{model}'")]
    ColumnMismatch {
        index: usize,
        schema: String,
        model: String,
    },

    #[error("schema layout v{schema} does not match model layout v{model}")]
    VersionMismatch { schema: u8, model: u8 },
}

/// Problems with a submitted value (request-scoped)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("feature '{feature}': '{raw}' is not a number")]
    NotANumber { feature: String, raw: String },

    #[error("feature '{feature}': value must be finite")]
    NonFinite { feature: String },

    #[error("feature '{feature}': '{raw}' is not one of [{options}]")]
    InvalidOption {
        feature: String,
        raw: String,
        options: String,
    },
}

// ============================================================================
// DEFINITIONS
// ============================================================================

/// One selectable value of a categorical feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CategoryOption {
    #[validate(length(min = 1))]
    pub label: String,
    /// Numeric code fed to the model
    pub value: f64,
}

/// Control type and constraints of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    #[serde(alias = "numerical")]
    Numeric {
        min: f64,
        max: f64,
        default: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Categorical {
        options: Vec<CategoryOption>,
        /// Label of the preselected option; first option when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
}

/// A single schema entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeatureSpec {
    /// Column name the model was trained with
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    /// Human readable label for the form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub kind: FeatureKind,
}

/// Untyped value as it arrives from a form or JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(f64),
    Text(String),
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        InputValue::Number(v)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Text(s.to_string())
    }
}

impl std::fmt::Display for InputValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputValue::Number(v) => write!(f, "{}", v),
            InputValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Outcome of resolving one submitted value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub value: f64,
    pub clamped: bool,
}

impl FeatureSpec {
    pub fn numeric(name: &str, label: &str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.to_string(),
            label: Some(label.to_string()),
            kind: FeatureKind::Numeric {
                min,
                max,
                default,
                step: Some(1.0),
            },
        }
    }

    pub fn categorical(name: &str, label: &str, options: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            label: Some(label.to_string()),
            kind: FeatureKind::Categorical {
                options: options
                    .iter()
                    .map(|(label, value)| CategoryOption {
                        label: label.to_string(),
                        value: *value,
                    })
                    .collect(),
                default: None,
            },
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Model value of the control's initial state
    pub fn default_value(&self) -> f64 {
        match &self.kind {
            FeatureKind::Numeric { default, .. } => *default,
            FeatureKind::Categorical { options, default } => default
                .as_deref()
                .and_then(|d| options.iter().find(|o| o.label == d))
                .or_else(|| options.first())
                .map(|o| o.value)
                .unwrap_or(0.0),
        }
    }

    /// Map a submitted value onto the model's numeric domain.
    ///
    /// Numeric values are clamped into `[min, max]`; categorical values must
    /// name an option (by label, or by code).
    pub fn resolve(&self, raw: &InputValue) -> Result<Resolved, InputError> {
        match &self.kind {
            FeatureKind::Numeric { min, max, .. } => {
                let value = match raw {
                    InputValue::Number(v) => *v,
                    InputValue::Text(s) => s.trim().parse::<f64>().map_err(|_| InputError::NotANumber {
                        feature: self.name.clone(),
                        raw: s.clone(),
                    })?,
                };
                if !value.is_finite() {
                    return Err(InputError::NonFinite {
                        feature: self.name.clone(),
                    });
                }
                let bounded = value.clamp(*min, *max);
                Ok(Resolved {
                    value: bounded,
                    clamped: bounded != value,
                })
            }
            FeatureKind::Categorical { options, .. } => {
                let found = match raw {
                    InputValue::Text(s) => {
                        let s = s.trim();
                        options.iter().find(|o| o.label == s).or_else(|| {
                            s.parse::<f64>()
                                .ok()
                                .and_then(|code| options.iter().find(|o| o.value == code))
                        })
                    }
                    InputValue::Number(code) => options.iter().find(|o| o.value == *code),
                };
                found
                    .map(|o| Resolved {
                        value: o.value,
                        clamped: false,
                    })
                    .ok_or_else(|| InputError::InvalidOption {
                        feature: self.name.clone(),
                        raw: raw.to_string(),
                        options: options
                            .iter()
                            .map(|o| o.label.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    }

    fn check(&self) -> Result<(), SchemaError> {
        let bad = |reason: &str| SchemaError::BadFeature {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        match &self.kind {
            FeatureKind::Numeric {
                min,
                max,
                default,
                step,
            } => {
                if !(min.is_finite() && max.is_finite() && default.is_finite()) {
                    return Err(bad("bounds and default must be finite"));
                }
                if min > max {
                    return Err(bad("min is greater than max"));
                }
                if default < min || default > max {
                    return Err(bad("default lies outside [min, max]"));
                }
                if let Some(step) = step {
                    if !step.is_finite() || *step <= 0.0 {
                        return Err(bad("step must be positive"));
                    }
                }
            }
            FeatureKind::Categorical { options, default } => {
                if options.is_empty() {
                    return Err(bad("option set is empty"));
                }
                let mut labels = HashSet::new();
                for (i, option) in options.iter().enumerate() {
                    option.validate()?;
                    // Submitted labels are trimmed before matching
                    if option.label.trim() != option.label {
                        return Err(bad("option labels must not have surrounding whitespace"));
                    }
                    if !option.value.is_finite() {
                        return Err(bad("option codes must be finite"));
                    }
                    if !labels.insert(option.label.as_str()) {
                        return Err(bad("option labels must be unique"));
                    }
                    if options[..i].iter().any(|o| o.value == option.value) {
                        return Err(bad("option codes must be unique"));
                    }
                }
                if let Some(d) = default {
                    if !labels.contains(d.as_str()) {
                        return Err(bad("default is not one of the options"));
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Ordered feature definitions, immutable once constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeatureSchema {
    version: u8,
    #[validate(length(min = 1), nested)]
    features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    pub fn new(version: u8, features: Vec<FeatureSpec>) -> Result<Self, SchemaError> {
        let schema = Self { version, features };
        schema.check()?;
        Ok(schema)
    }

    /// Built-in schema.
    ///
    /// Only age and weight are known; deployments with a fuller model supply
    /// their schema through `SCHEMA_PATH`.
    pub fn builtin() -> Self {
        Self {
            version: SCHEMA_VERSION,
            features: vec![
                FeatureSpec::numeric("age", "Age (years)", 18.0, 42.0, 18.0),
                FeatureSpec::numeric("weight", "Weight (kg)", 52.0, 91.0, 52.0),
            ],
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn check(&self) -> Result<(), SchemaError> {
        self.validate()?;
        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name.as_str()) {
                return Err(SchemaError::DuplicateFeature(feature.name.clone()));
            }
            feature.check()?;
        }
        Ok(())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn layout_hash(&self) -> u32 {
        compute_layout_hash(self.version, &self.feature_names())
    }

    /// Record built from every control's initial state
    pub fn default_record(&self) -> InputRecord {
        InputRecord::new(
            self.features.iter().map(FeatureSpec::default_value).collect(),
            self.layout_hash(),
        )
    }

    /// Assemble a record from submitted values.
    ///
    /// Missing features take their default. Returns the record and the names
    /// of features whose value was clamped into range.
    pub fn resolve(
        &self,
        submitted: &HashMap<String, InputValue>,
    ) -> Result<(InputRecord, Vec<String>), InputError> {
        if let Some(unknown) = submitted.keys().find(|k| self.index_of(k).is_none()) {
            return Err(InputError::UnknownFeature(unknown.clone()));
        }

        let mut values = Vec::with_capacity(self.features.len());
        let mut clamped = Vec::new();

        for feature in &self.features {
            match submitted.get(&feature.name) {
                Some(raw) => {
                    let resolved = feature.resolve(raw)?;
                    if resolved.clamped {
                        tracing::debug!(
                            "Clamped '{}' from {} to {}",
                            feature.name, raw, resolved.value
                        );
                        clamped.push(feature.name.clone());
                    }
                    values.push(resolved.value);
                }
                None => values.push(feature.default_value()),
            }
        }

        Ok((InputRecord::new(values, self.layout_hash()), clamped))
    }

    /// Verify the model was trained on exactly this column layout
    pub fn check_model_layout<S: AsRef<str>>(
        &self,
        model_version: u8,
        model_features: &[S],
    ) -> Result<(), SchemaError> {
        if model_features.len() != self.features.len() {
            return Err(SchemaError::FeatureCountMismatch {
                schema: self.features.len(),
                model: model_features.len(),
            });
        }
        for (index, (spec, model)) in self.features.iter().zip(model_features).enumerate() {
            if spec.name != model.as_ref() {
                return Err(SchemaError::ColumnMismatch {
                    index,
                    schema: spec.name.clone(),
                    model: model.as_ref().to_string(),
                });
            }
        }
        if model_version != self.version {
            return Err(SchemaError::VersionMismatch {
                schema: self.version,
                model: model_version,
            });
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the layout version and the ordered feature names
pub fn compute_layout_hash<S: AsRef<str>>(version: u8, names: &[S]) -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[version]);

    for name in names {
        hasher.update(name.as_ref().as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

// ============================================================================
// TESTS
// ============================================================================
