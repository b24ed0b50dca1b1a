//! Target record schemas
//!
//! An [`EntitySchema`] describes one import target: its canonical fields,
//! the header spellings each field accepts, and the rules rows must pass.
//! Schemas are declared in TOML and never change during a session.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Declared type of a target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Enum,
}

impl FieldType {
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Enum => "enum",
        }
    }
}

/// One target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Canonical field identifier
    pub id: String,
    /// Human-readable label used in messages
    pub display_name: String,
    /// Accepted header spellings
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub business_key: bool,
    /// Lower bound for number fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Permitted values for enum fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

impl FieldSchema {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, field_type: FieldType) -> Self {
        FieldSchema {
            id: id.into(),
            display_name: display_name.into(),
            variants: Vec::new(),
            required: false,
            field_type,
            business_key: false,
            min: None,
            allowed_values: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn business_key(mut self) -> Self {
        self.business_key = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants.extend(variants.into_iter().map(Into::into));
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values.extend(values.into_iter().map(Into::into));
        self
    }

    /// Every label a header may be compared against: variants, then the
    /// canonical id and display name
    pub fn candidate_labels(&self) -> impl Iterator<Item = &str> {
        self.variants
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.id.as_str()))
            .chain(std::iter::once(self.display_name.as_str()))
    }
}

/// Declarative cross-field rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaRule {
    /// `field` is required when `when_field` equals `equals`
    RequiredIf {
        field: String,
        when_field: String,
        equals: String,
    },
    /// `field` is required unless `when_field` equals `equals`
    RequiredUnless {
        field: String,
        when_field: String,
        equals: String,
    },
}

impl SchemaRule {
    fn referenced_fields(&self) -> [&str; 2] {
        match self {
            SchemaRule::RequiredIf {
                field, when_field, ..
            }
            | SchemaRule::RequiredUnless {
                field, when_field, ..
            } => [field.as_str(), when_field.as_str()],
        }
    }
}

/// One import target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SchemaRule>,
}

/// Error building or loading a schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// TOML parse / deserialization error
    Parse(String),
    /// Schema declares no fields
    NoFields { entity: String },
    /// Two fields share a canonical id
    DuplicateField { field: String },
    /// A rule names a field that does not exist
    UnknownField { rule: String, field: String },
    /// An enum field without allowed values
    EmptyEnum { field: String },
    /// `min` declared on a non-number field
    MinOnNonNumber { field: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::Parse(msg) => write!(f, "schema parse error: {}", msg),
            SchemaError::NoFields { entity } => {
                write!(f, "schema '{}' declares no fields", entity)
            }
            SchemaError::DuplicateField { field } => {
                write!(f, "field '{}' is declared more than once", field)
            }
            SchemaError::UnknownField { rule, field } => {
                write!(f, "rule '{}' references unknown field '{}'", rule, field)
            }
            SchemaError::EmptyEnum { field } => {
                write!(f, "enum field '{}' has no allowed_values", field)
            }
            SchemaError::MinOnNonNumber { field } => {
                write!(f, "field '{}' declares min but is not a number field", field)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

impl EntitySchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        EntitySchema {
            name: name.into(),
            fields,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: SchemaRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parse and validate a schema from TOML
    pub fn from_toml(input: &str) -> Result<Self, SchemaError> {
        let schema: EntitySchema =
            toml::from_str(input).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
        let schema = Self::from_toml(&content)
            .with_context(|| format!("Invalid schema file: {}", path.display()))?;
        log::debug!(
            "Loaded schema '{}' with {} fields from {}",
            schema.name,
            schema.fields.len(),
            path.display()
        );
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields {
                entity: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField {
                    field: field.id.clone(),
                });
            }
            if field.field_type == FieldType::Enum && field.allowed_values.is_empty() {
                return Err(SchemaError::EmptyEnum {
                    field: field.id.clone(),
                });
            }
            if field.min.is_some() && field.field_type != FieldType::Number {
                return Err(SchemaError::MinOnNonNumber {
                    field: field.id.clone(),
                });
            }
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            for name in rule.referenced_fields() {
                if !seen.contains(name) {
                    return Err(SchemaError::UnknownField {
                        rule: format!("#{}", idx + 1),
                        field: name.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Find a field by canonical id
    pub fn field(&self, id: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Canonical ids of the business-key fields, in declaration order
    pub fn business_key_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.business_key)
            .map(|f| f.id.as_str())
            .collect()
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Label for messages: display name when the field is known, id otherwise
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.field(id).map(|f| f.display_name.as_str()).unwrap_or(id)
    }
}
