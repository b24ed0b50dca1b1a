//! Row validation against schema rules
//!
//! Validation expects date fields to have been through the date parser
//! already: a date field holding anything but `Value::Date` is reported
//! as unparseable. Every rule runs and all messages are collected.

use crate::schema::{EntitySchema, FieldSchema, FieldType, SchemaRule};
use crate::services::matching::normalize_label;

use super::{ImportRow, Value};

/// A pluggable per-entity row check
pub trait RowRule: Send + Sync {
    /// Return one message per violation, empty when the row passes
    fn check(&self, row: &ImportRow, schema: &EntitySchema) -> Vec<String>;
}

impl<F> RowRule for F
where
    F: Fn(&ImportRow, &EntitySchema) -> Vec<String> + Send + Sync,
{
    fn check(&self, row: &ImportRow, schema: &EntitySchema) -> Vec<String> {
        self(row, schema)
    }
}

/// Built-in field checks, schema rules, then caller-supplied rules
#[derive(Default)]
pub struct RowValidator {
    rules: Vec<Box<dyn RowRule>>,
}

impl RowValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl RowRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn validate(&self, row: &ImportRow, schema: &EntitySchema) -> Vec<String> {
        let mut errors = validate_row(row, schema);
        for rule in &self.rules {
            errors.extend(rule.check(row, schema));
        }
        errors
    }
}

impl std::fmt::Debug for RowValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowValidator")
            .field("custom_rules", &self.rules.len())
            .finish()
    }
}

/// Apply the field checks and declared schema rules to one row
pub fn validate_row(row: &ImportRow, schema: &EntitySchema) -> Vec<String> {
    let mut errors = Vec::new();

    for field in &schema.fields {
        check_field(field, row.get(&field.id), &mut errors);
    }

    for rule in &schema.rules {
        check_schema_rule(rule, row, schema, &mut errors);
    }

    errors
}

fn check_field(field: &FieldSchema, value: &Value, errors: &mut Vec<String>) {
    let name = &field.display_name;

    if value.is_blank() {
        if field.required {
            errors.push(format!("{} is required", name));
        }
        return;
    }

    match field.field_type {
        FieldType::Text => {}
        FieldType::Number => match value.to_number() {
            None => errors.push(format!("{} must be a number (got '{}')", name, value)),
            Some(n) => {
                if let Some(min) = field.min {
                    if n < min {
                        errors.push(format!(
                            "{} must be at least {} (got {})",
                            name,
                            Value::Float(min),
                            Value::Float(n)
                        ));
                    }
                }
            }
        },
        FieldType::Date => {
            if value.as_date().is_none() {
                errors.push(format!("{} is not a valid date (got '{}')", name, value));
            }
        }
        FieldType::Enum => {
            let given = normalize_label(&value.to_string());
            if !field
                .allowed_values
                .iter()
                .any(|allowed| normalize_label(allowed) == given)
            {
                errors.push(format!(
                    "{} must be one of: {} (got '{}')",
                    name,
                    field.allowed_values.join(", "),
                    value
                ));
            }
        }
    }
}

fn check_schema_rule(
    rule: &SchemaRule,
    row: &ImportRow,
    schema: &EntitySchema,
    errors: &mut Vec<String>,
) {
    match rule {
        SchemaRule::RequiredIf {
            field,
            when_field,
            equals,
        } => {
            if value_equals(row.get(when_field), equals) && row.get(field).is_blank() {
                errors.push(format!(
                    "{} is required when {} is '{}'",
                    schema.display_name(field),
                    schema.display_name(when_field),
                    equals
                ));
            }
        }
        SchemaRule::RequiredUnless {
            field,
            when_field,
            equals,
        } => {
            if !value_equals(row.get(when_field), equals) && row.get(field).is_blank() {
                errors.push(format!(
                    "{} is required unless {} is '{}'",
                    schema.display_name(field),
                    schema.display_name(when_field),
                    equals
                ));
            }
        }
    }
}

/// Case- and accent-insensitive comparison of a parsed value with rule text
fn value_equals(value: &Value, expected: &str) -> bool {
    value
        .to_text()
        .is_some_and(|text| normalize_label(&text) == normalize_label(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stages() -> EntitySchema {
        EntitySchema::new(
            "stages",
            vec![
                FieldSchema::new("code", "Code", FieldType::Text)
                    .required()
                    .business_key(),
                FieldSchema::new("order", "Order", FieldType::Number)
                    .required()
                    .min(1.0),
            ],
        )
    }

    fn relatives() -> EntitySchema {
        EntitySchema::new(
            "relatives",
            vec![
                FieldSchema::new("name", "Full name", FieldType::Text).required(),
                FieldSchema::new("relation", "Relationship", FieldType::Enum)
                    .required()
                    .allowed_values(["Cha/Bố", "Mẹ", "Vợ/Chồng"]),
                FieldSchema::new("birth", "Birth date", FieldType::Date),
                FieldSchema::new("phone", "Phone", FieldType::Text),
            ],
        )
        .with_rule(SchemaRule::RequiredIf {
            field: "phone".into(),
            when_field: "relation".into(),
            equals: "Vợ/Chồng".into(),
        })
    }

    #[test]
    fn test_valid_row_has_no_errors() {
        let row = ImportRow::new(1)
            .with_value("code", "GD1")
            .with_value("order", "2");
        assert!(validate_row(&row, &stages()).is_empty());
    }

    #[test]
    fn test_errors_are_collected_not_short_circuited() {
        let row = ImportRow::new(1).with_value("order", "abc");
        let errors = validate_row(&row, &stages());
        assert_eq!(
            errors,
            vec![
                "Code is required".to_string(),
                "Order must be a number (got 'abc')".to_string(),
            ]
        );
    }

    #[test]
    fn test_number_below_minimum() {
        let row = ImportRow::new(1)
            .with_value("code", "GD1")
            .with_value("order", 0i64);
        let errors = validate_row(&row, &stages());
        assert_eq!(errors, vec!["Order must be at least 1 (got 0)".to_string()]);
    }

    #[test]
    fn test_non_finite_number_rejected() {
        for text in ["inf", "-infinity", "1e999"] {
            let row = ImportRow::new(1)
                .with_value("code", "GD1")
                .with_value("order", text);
            assert_eq!(
                validate_row(&row, &stages()),
                vec![format!("Order must be a number (got '{}')", text)]
            );
        }
    }

    #[test]
    fn test_enum_and_date_checks() {
        let row = ImportRow::new(1)
            .with_value("name", "Nguyễn Văn A")
            .with_value("relation", "Hàng xóm")
            .with_value("birth", "31/02/1990");
        let errors = validate_row(&row, &relatives());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Relationship must be one of"));
        assert!(errors[1].starts_with("Birth date is not a valid date"));

        // accents and case are ignored for enum values
        let row = ImportRow::new(1)
            .with_value("name", "Nguyễn Văn A")
            .with_value("relation", "me")
            .with_value("birth", Value::Date(NaiveDate::from_ymd_opt(1990, 1, 2).unwrap()));
        assert!(validate_row(&row, &relatives()).is_empty());
    }

    #[test]
    fn test_conditional_requiredness() {
        let spouse = ImportRow::new(1)
            .with_value("name", "Trần Thị B")
            .with_value("relation", "vợ/chồng");
        assert_eq!(
            validate_row(&spouse, &relatives()),
            vec!["Phone is required when Relationship is 'Vợ/Chồng'".to_string()]
        );

        let with_phone = spouse.clone().with_value("phone", "0901234567");
        assert!(validate_row(&with_phone, &relatives()).is_empty());
    }

    #[test]
    fn test_required_unless() {
        let schema = stages().with_rule(SchemaRule::RequiredUnless {
            field: "order".into(),
            when_field: "code".into(),
            equals: "DRAFT".into(),
        });
        let errors = validate_row(&ImportRow::new(1).with_value("code", "GD1"), &schema);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1], "Order is required unless Code is 'DRAFT'");

        let errors = validate_row(&ImportRow::new(1).with_value("code", "draft"), &schema);
        assert_eq!(errors, vec!["Order is required".to_string()]);
    }

    #[test]
    fn test_custom_rule() {
        let validator = RowValidator::new().with_rule(|row: &ImportRow, _: &EntitySchema| {
            match row.get("code").as_str() {
                Some(code) if !code.starts_with("GD") => {
                    vec![format!("Code '{}' must start with GD", code)]
                }
                _ => Vec::new(),
            }
        });

        let row = ImportRow::new(4)
            .with_value("code", "X1")
            .with_value("order", 1i64);
        assert_eq!(
            validator.validate(&row, &stages()),
            vec!["Code 'X1' must start with GD".to_string()]
        );
    }
}
