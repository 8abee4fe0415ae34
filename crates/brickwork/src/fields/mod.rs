//! Custom fields.
//!
//! Every field kind knows how to map itself to zero or more columns
//! ([`FieldKind::schema_definition`]), how to validate an incoming value
//! ([`FieldKind::validate`]) and how to shape a stored value for responses
//! ([`FieldKind::format_response_value`]). The set of kinds is closed:
//! dispatch is a `match` on [`FieldKind`].
//!
//! Tabs, groups and repeaters hold nested fields. Tabs and groups only
//! organize the editing UI; a repeater's children live in their own table.

mod columns;
mod flatten;
mod values;

pub use columns::ColumnContext;
pub use flatten::{FlatField, flatten};
pub use values::FieldValidationError;

use serde::{Deserialize, Serialize};

/// A field definition within a collection, brick or repeater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub key: String,
    /// Enforced when values are validated, not as a column constraint:
    /// rows exist per locale and drafts may be incomplete.
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// A select option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// The field kinds brickwork knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    Text {
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        unique: bool,
    },
    Textarea {
        #[serde(default)]
        default: Option<String>,
    },
    Wysiwyg {
        #[serde(default)]
        default: Option<String>,
    },
    Number {
        #[serde(default)]
        default: Option<f64>,
    },
    Checkbox {
        #[serde(default)]
        default: bool,
    },
    Select {
        options: Vec<SelectOption>,
        #[serde(default)]
        default: Option<String>,
    },
    Datetime,
    Colour {
        #[serde(default)]
        default: Option<String>,
    },
    Link,
    Json {
        #[serde(default)]
        default: Option<serde_json::Value>,
    },
    /// Reference to a media item
    Media,
    /// Reference to a user
    User,
    /// Reference to a document of another (or the same) collection
    Document { collection: String },
    Tab {
        #[serde(default)]
        fields: Vec<FieldConfig>,
    },
    Group {
        #[serde(default)]
        fields: Vec<FieldConfig>,
    },
    Repeater {
        #[serde(default)]
        fields: Vec<FieldConfig>,
        #[serde(default)]
        max_groups: Option<usize>,
    },
}

impl FieldKind {
    /// The `type` tag this kind serializes as.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Textarea { .. } => "textarea",
            FieldKind::Wysiwyg { .. } => "wysiwyg",
            FieldKind::Number { .. } => "number",
            FieldKind::Checkbox { .. } => "checkbox",
            FieldKind::Select { .. } => "select",
            FieldKind::Datetime => "datetime",
            FieldKind::Colour { .. } => "colour",
            FieldKind::Link => "link",
            FieldKind::Json { .. } => "json",
            FieldKind::Media => "media",
            FieldKind::User => "user",
            FieldKind::Document { .. } => "document",
            FieldKind::Tab { .. } => "tab",
            FieldKind::Group { .. } => "group",
            FieldKind::Repeater { .. } => "repeater",
        }
    }

    /// Nested fields, for tabs, groups and repeaters.
    pub fn children(&self) -> Option<&[FieldConfig]> {
        match self {
            FieldKind::Tab { fields } | FieldKind::Group { fields } => Some(fields),
            FieldKind::Repeater { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn is_repeater(&self) -> bool {
        matches!(self, FieldKind::Repeater { .. })
    }
}

impl FieldConfig {
    pub fn new(key: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            required: false,
            kind,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn text(key: impl Into<String>) -> Self {
        Self::new(
            key,
            FieldKind::Text {
                default: None,
                unique: false,
            },
        )
    }

    pub fn number(key: impl Into<String>) -> Self {
        Self::new(key, FieldKind::Number { default: None })
    }

    pub fn checkbox(key: impl Into<String>) -> Self {
        Self::new(key, FieldKind::Checkbox { default: false })
    }

    pub fn media(key: impl Into<String>) -> Self {
        Self::new(key, FieldKind::Media)
    }

    pub fn document(key: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::new(
            key,
            FieldKind::Document {
                collection: collection.into(),
            },
        )
    }

    pub fn tab(key: impl Into<String>, fields: Vec<FieldConfig>) -> Self {
        Self::new(key, FieldKind::Tab { fields })
    }

    pub fn repeater(key: impl Into<String>, fields: Vec<FieldConfig>) -> Self {
        Self::new(
            key,
            FieldKind::Repeater {
                fields,
                max_groups: None,
            },
        )
    }
}
