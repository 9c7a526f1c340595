// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative configuration schemas for trigger templates.
//!
//! Each template declares the editable fields of its configuration payload as
//! an ordered list of [`FieldSpec`]s. A generic form renderer walks the schema;
//! the engine uses it to build default payloads and to validate edits.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of an editable configuration field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Integer with inclusive range
    Int {
        /// Minimum value
        min: i64,
        /// Maximum value
        max: i64,
    },
    /// Floating point with inclusive range
    Double {
        /// Minimum value
        min: f64,
        /// Maximum value
        max: f64,
    },
    /// Boolean toggle
    Bool,
    /// RGBA color
    Color,
    /// Free-form value edited by a custom widget, identified by tag
    Custom(String),
}

impl FieldKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int { .. } => "Int",
            Self::Double { .. } => "Double",
            Self::Bool => "Bool",
            Self::Color => "Color",
            Self::Custom(_) => "Custom",
        }
    }
}

/// A configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    /// Integer value
    Int(i64),
    /// Floating point value
    Double(f64),
    /// Boolean value
    Bool(bool),
    /// Color (RGBA)
    Color([u8; 4]),
    /// Custom payload, serialized by its widget
    Custom(String),
}

impl ConfigValue {
    /// Get as integer if possible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as float if possible
    pub fn as_double(&self) -> Option<f64> {
        match self {
            ConfigValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as color if possible
    pub fn as_color(&self) -> Option<[u8; 4]> {
        match self {
            ConfigValue::Color(v) => Some(*v),
            _ => None,
        }
    }
}

/// One editable field of a configuration schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key in the configuration payload
    pub key: String,
    /// Label shown by the form renderer
    pub label: String,
    /// Field kind
    pub kind: FieldKind,
    /// Default value
    pub default: ConfigValue,
}

impl FieldSpec {
    /// Integer field
    pub fn int(key: impl Into<String>, label: impl Into<String>, min: i64, max: i64, default: i64) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Int { min, max },
            default: ConfigValue::Int(default.clamp(min, max)),
        }
    }

    /// Floating point field
    pub fn double(key: impl Into<String>, label: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Double { min, max },
            default: ConfigValue::Double(default.clamp(min, max)),
        }
    }

    /// Boolean field
    pub fn bool(key: impl Into<String>, label: impl Into<String>, default: bool) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Bool,
            default: ConfigValue::Bool(default),
        }
    }

    /// Color field
    pub fn color(key: impl Into<String>, label: impl Into<String>, default: [u8; 4]) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Color,
            default: ConfigValue::Color(default),
        }
    }

    /// Custom field
    pub fn custom(
        key: impl Into<String>,
        label: impl Into<String>,
        tag: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Custom(tag.into()),
            default: ConfigValue::Custom(default.into()),
        }
    }

    /// Coerce a value into this field, clamping numbers into range
    fn coerce(&self, value: ConfigValue) -> Result<ConfigValue, ConfigError> {
        match (&self.kind, value) {
            (FieldKind::Int { min, max }, ConfigValue::Int(v)) => Ok(ConfigValue::Int(v.clamp(*min, *max))),
            (FieldKind::Double { min, max }, ConfigValue::Double(v)) if v.is_finite() => {
                Ok(ConfigValue::Double(v.clamp(*min, *max)))
            }
            (FieldKind::Bool, v @ ConfigValue::Bool(_))
            | (FieldKind::Color, v @ ConfigValue::Color(_))
            | (FieldKind::Custom(_), v @ ConfigValue::Custom(_)) => Ok(v),
            (kind, _) => Err(ConfigError::TypeMismatch {
                key: self.key.clone(),
                expected: kind.name(),
            }),
        }
    }

    /// Check a stored value without modifying it
    fn check(&self, value: &ConfigValue) -> Result<(), ConfigError> {
        let out_of_range = || ConfigError::OutOfRange { key: self.key.clone() };
        match (&self.kind, value) {
            (FieldKind::Int { min, max }, ConfigValue::Int(v)) => {
                (min..=max).contains(&v).then_some(()).ok_or_else(out_of_range)
            }
            (FieldKind::Double { min, max }, ConfigValue::Double(v)) => {
                (min..=max).contains(&v).then_some(()).ok_or_else(out_of_range)
            }
            (FieldKind::Bool, ConfigValue::Bool(_))
            | (FieldKind::Color, ConfigValue::Color(_))
            | (FieldKind::Custom(_), ConfigValue::Custom(_)) => Ok(()),
            (kind, _) => Err(ConfigError::TypeMismatch {
                key: self.key.clone(),
                expected: kind.name(),
            }),
        }
    }
}

/// Errors raised when editing or validating a configuration payload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Key not declared by the schema
    #[error("Unknown configuration field: {0}")]
    UnknownField(String),

    /// Value kind does not match the field kind
    #[error("Field {key} expects a {expected} value")]
    TypeMismatch {
        /// Field key
        key: String,
        /// Expected kind
        expected: &'static str,
    },

    /// Stored value lies outside the declared range
    #[error("Field {key} is out of range")]
    OutOfRange {
        /// Field key
        key: String,
    },
}

/// Configuration payload of a placed trigger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerConfig {
    values: IndexMap<String, ConfigValue>,
}

impl TriggerConfig {
    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Iterate over `(key, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered list of editable fields declared by a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    fields: Vec<FieldSpec>,
}

impl ConfigSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Get all fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Get a field by key
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Payload holding every field's default
    pub fn defaults(&self) -> TriggerConfig {
        TriggerConfig {
            values: self
                .fields
                .iter()
                .map(|f| (f.key.clone(), f.default.clone()))
                .collect(),
        }
    }

    /// Set a field, clamping numeric values into the declared range
    pub fn set(&self, config: &mut TriggerConfig, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        let field = self
            .field(key)
            .ok_or_else(|| ConfigError::UnknownField(key.to_string()))?;
        let value = field.coerce(value)?;
        config.values.insert(field.key.clone(), value);
        Ok(())
    }

    /// Validate a stored payload, filling in fields it lacks with defaults
    pub fn validate(&self, config: &mut TriggerConfig) -> Result<(), ConfigError> {
        if let Some(key) = config.values.keys().find(|k| self.field(k).is_none()) {
            return Err(ConfigError::UnknownField(key.clone()));
        }

        for field in &self.fields {
            match config.values.get(&field.key) {
                Some(value) => field.check(value)?,
                None => {
                    config.values.insert(field.key.clone(), field.default.clone());
                }
            }
        }
        Ok(())
    }
}
