use serde_json::{Value, json};
use thiserror::Error;

use super::{FieldConfig, FieldKind};

/// An incoming value does not satisfy its field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldValidationError {
    #[error("a value is required")]
    Required,

    #[error("expected {expected}")]
    ExpectedType { expected: &'static str },

    #[error("'{value}' is not one of the select options")]
    InvalidOption { value: String },

    #[error("'{value}' is not an RFC 3339 date-time")]
    InvalidDate { value: String },

    #[error("{got} groups exceeds the maximum of {max}")]
    TooManyGroups { max: usize, got: usize },

    #[error("group {index}, field '{field}': {source}")]
    Nested {
        index: usize,
        field: String,
        source: Box<FieldValidationError>,
    },
}

fn expected(expected: &'static str) -> FieldValidationError {
    FieldValidationError::ExpectedType { expected }
}

/// Relations accept a bare id or an object carrying one.
fn relation_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => map.get("id").and_then(Value::as_u64),
        _ => None,
    }
}

impl FieldConfig {
    /// Validate an incoming value for this field. `Null` means "absent".
    pub fn validate(&self, value: &Value) -> Result<(), FieldValidationError> {
        if value.is_null() {
            let container = matches!(self.kind, FieldKind::Tab { .. } | FieldKind::Group { .. });
            return if self.required && !container {
                Err(FieldValidationError::Required)
            } else {
                Ok(())
            };
        }
        self.kind.validate(value)
    }

    pub fn format_response_value(&self, value: &Value) -> Value {
        self.kind.format_response_value(value)
    }
}

impl FieldKind {
    /// Validate a non-null value against this kind.
    pub fn validate(&self, value: &Value) -> Result<(), FieldValidationError> {
        match self {
            FieldKind::Text { .. }
            | FieldKind::Textarea { .. }
            | FieldKind::Wysiwyg { .. } => {
                value.as_str().ok_or_else(|| expected("a string"))?;
            }
            FieldKind::Colour { .. } => {
                let s = value.as_str().ok_or_else(|| expected("a colour string"))?;
                let hex = s.strip_prefix('#').ok_or_else(|| expected("a '#'-prefixed colour"))?;
                if !matches!(hex.len(), 3 | 4 | 6 | 8)
                    || !hex.chars().all(|c| c.is_ascii_hexdigit())
                {
                    return Err(expected("a hex colour"));
                }
            }
            FieldKind::Number { .. } => {
                if !value.is_number() {
                    return Err(expected("a number"));
                }
            }
            FieldKind::Checkbox { .. } => match value {
                Value::Bool(_) => {}
                Value::Number(n) if matches!(n.as_u64(), Some(0 | 1)) => {}
                _ => return Err(expected("a boolean")),
            },
            FieldKind::Select { options, .. } => {
                let s = value.as_str().ok_or_else(|| expected("a string"))?;
                if !options.iter().any(|o| o.value == s) {
                    return Err(FieldValidationError::InvalidOption {
                        value: s.to_string(),
                    });
                }
            }
            FieldKind::Datetime => {
                let s = value.as_str().ok_or_else(|| expected("a date-time string"))?;
                chrono::DateTime::parse_from_rfc3339(s).map_err(|_| {
                    FieldValidationError::InvalidDate {
                        value: s.to_string(),
                    }
                })?;
            }
            FieldKind::Link => {
                let url = value.get("url").and_then(Value::as_str);
                if url.is_none() {
                    return Err(expected("a link object with a 'url'"));
                }
            }
            FieldKind::Json { .. } => {}
            FieldKind::Media | FieldKind::User | FieldKind::Document { .. } => {
                relation_id(value).ok_or_else(|| expected("an id"))?;
            }
            FieldKind::Tab { .. } | FieldKind::Group { .. } => {}
            FieldKind::Repeater { fields, max_groups } => {
                let groups = value.as_array().ok_or_else(|| expected("an array of groups"))?;
                if let Some(max) = *max_groups {
                    if groups.len() > max {
                        return Err(FieldValidationError::TooManyGroups {
                            max,
                            got: groups.len(),
                        });
                    }
                }
                for (index, group) in groups.iter().enumerate() {
                    let group = group.as_object().ok_or_else(|| expected("a group object"))?;
                    for field in fields {
                        let value = group.get(&field.key).unwrap_or(&Value::Null);
                        field.validate(value).map_err(|e| FieldValidationError::Nested {
                            index,
                            field: field.key.clone(),
                            source: Box::new(e),
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Shape a stored column value for API responses.
    pub fn format_response_value(&self, value: &Value) -> Value {
        match self {
            FieldKind::Checkbox { default } => match value {
                Value::Bool(b) => Value::Bool(*b),
                Value::Number(n) => Value::Bool(n.as_i64().unwrap_or(0) != 0),
                _ => Value::Bool(*default),
            },
            FieldKind::Json { .. } | FieldKind::Link => match value {
                Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
                _ => value.clone(),
            },
            FieldKind::Media | FieldKind::User | FieldKind::Document { .. } => {
                match relation_id(value) {
                    Some(id) => json!({ "id": id }),
                    None => Value::Null,
                }
            }
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::SelectOption;

    #[test]
    fn required_fields_reject_null() {
        let title = FieldConfig::text("title").required();
        assert_eq!(title.validate(&Value::Null), Err(FieldValidationError::Required));
        assert!(FieldConfig::text("subtitle").validate(&Value::Null).is_ok());
        assert_eq!(
            title.validate(&json!(42)),
            Err(FieldValidationError::ExpectedType { expected: "a string" })
        );
    }

    #[test]
    fn select_checks_options() {
        let status = FieldConfig::new(
            "status",
            FieldKind::Select {
                options: vec![SelectOption {
                    label: "Draft".into(),
                    value: "draft".into(),
                }],
                default: None,
            },
        );
        assert!(status.validate(&json!("draft")).is_ok());
        assert!(matches!(
            status.validate(&json!("published")),
            Err(FieldValidationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn repeater_validates_groups() {
        let links = FieldConfig::new(
            "links",
            FieldKind::Repeater {
                fields: vec![FieldConfig::text("label").required()],
                max_groups: Some(2),
            },
        );
        assert!(links.validate(&json!([{ "label": "a" }, { "label": "b" }])).is_ok());
        assert_eq!(
            links.validate(&json!([{}, {}, {}])),
            Err(FieldValidationError::TooManyGroups { max: 2, got: 3 })
        );
        match links.validate(&json!([{ "label": "a" }, {}])) {
            Err(FieldValidationError::Nested { index, field, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "label");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn misc_kinds() {
        let when = FieldConfig::new("when", FieldKind::Datetime);
        assert!(when.validate(&json!("2026-10-14T09:30:00Z")).is_ok());
        assert!(when.validate(&json!("yesterday")).is_err());

        let colour = FieldConfig::new("accent", FieldKind::Colour { default: None });
        assert!(colour.validate(&json!("#ff8800")).is_ok());
        assert!(colour.validate(&json!("orange")).is_err());

        let thumb = FieldConfig::media("thumbnail");
        assert!(thumb.validate(&json!(7)).is_ok());
        assert!(thumb.validate(&json!({ "id": 7 })).is_ok());
        assert!(thumb.validate(&json!("7")).is_err());
    }

    #[test]
    fn response_values() {
        let featured = FieldConfig::checkbox("featured");
        assert_eq!(featured.format_response_value(&json!(1)), json!(true));
        assert_eq!(featured.format_response_value(&Value::Null), json!(false));

        let data = FieldConfig::new("data", FieldKind::Json { default: None });
        assert_eq!(
            data.format_response_value(&json!("{\"a\":1}")),
            json!({ "a": 1 })
        );

        let thumb = FieldConfig::media("thumbnail");
        assert_eq!(thumb.format_response_value(&json!(3)), json!({ "id": 3 }));
        assert_eq!(thumb.format_response_value(&Value::Null), Value::Null);
    }
}
