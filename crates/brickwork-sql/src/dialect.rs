//! Dialect-specific type and default mapping.

use brickwork_schema::{ColumnType, DefaultValue};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{escape_string, unquote_string};

/// A family of database engines sharing DDL behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// Postgres and wire-compatible engines
    Postgres,
    /// SQLite and its forks (libsql, D1)
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl Dialect {
    /// Whether `ALTER TABLE ... ALTER COLUMN` is available.
    ///
    /// SQLite can only add, drop and rename columns.
    pub fn supports_alter_column(&self) -> bool {
        match self {
            Dialect::Postgres => true,
            Dialect::Sqlite => false,
        }
    }

    /// Whether `ADD COLUMN` accepts a `UNIQUE` constraint.
    ///
    /// SQLite refuses both adding a UNIQUE column and dropping one, so there
    /// uniqueness lives in a separate unique index that can be dropped first.
    pub fn supports_add_unique_column(&self) -> bool {
        match self {
            Dialect::Postgres => true,
            Dialect::Sqlite => false,
        }
    }

    /// Dialect type name for a logical type.
    pub fn data_type(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (Dialect::Postgres, ColumnType::Serial) => "SERIAL",
            (Dialect::Postgres, ColumnType::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnType::Real) => "DOUBLE PRECISION",
            (Dialect::Postgres, ColumnType::Text) => "TEXT",
            (Dialect::Postgres, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, ColumnType::Json) => "JSONB",
            (Dialect::Postgres, ColumnType::Timestamp) => "TIMESTAMPTZ",
            (Dialect::Sqlite, ColumnType::Serial | ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Real) => "REAL",
            (Dialect::Sqlite, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, ColumnType::Json) => "JSON",
            (Dialect::Sqlite, ColumnType::Timestamp) => "TIMESTAMP",
        }
    }

    /// Map an introspected type name back to a logical type.
    ///
    /// `primary` and `raw_default` disambiguate auto-incrementing keys, which
    /// Postgres reports as `integer` with a `nextval(...)` default and SQLite
    /// as an `INTEGER PRIMARY KEY`.
    pub fn column_type_from_sql(
        &self,
        data_type: &str,
        primary: bool,
        raw_default: Option<&str>,
    ) -> Option<ColumnType> {
        let data_type = data_type.trim().to_ascii_lowercase();
        let ty = match self {
            Dialect::Postgres => match data_type.as_str() {
                "serial" | "serial4" => ColumnType::Serial,
                "integer" | "int" | "int4" => {
                    if raw_default.is_some_and(|d| d.trim_start().starts_with("nextval(")) {
                        ColumnType::Serial
                    } else {
                        ColumnType::Integer
                    }
                }
                "double precision" | "float8" | "real" | "float4" => ColumnType::Real,
                "text" | "character varying" | "varchar" => ColumnType::Text,
                "boolean" | "bool" => ColumnType::Boolean,
                "jsonb" | "json" => ColumnType::Json,
                "timestamp with time zone"
                | "timestamptz"
                | "timestamp without time zone"
                | "timestamp" => ColumnType::Timestamp,
                _ => return None,
            },
            Dialect::Sqlite => match data_type.as_str() {
                "integer" | "int" => {
                    if primary {
                        ColumnType::Serial
                    } else {
                        ColumnType::Integer
                    }
                }
                "real" | "double" | "float" => ColumnType::Real,
                "text" | "varchar" => ColumnType::Text,
                "boolean" => ColumnType::Boolean,
                "json" | "jsonb" => ColumnType::Json,
                "timestamp" | "datetime" => ColumnType::Timestamp,
                _ => return None,
            },
        };
        Some(ty)
    }

    /// Render a default value as a literal usable after `DEFAULT`.
    pub fn default_literal(&self, column_type: ColumnType, value: &DefaultValue) -> String {
        match (self, value) {
            (Dialect::Postgres, DefaultValue::Boolean(b)) => b.to_string(),
            (Dialect::Sqlite, DefaultValue::Boolean(b)) => if *b { "1" } else { "0" }.to_string(),
            (_, DefaultValue::Integer(i)) => i.to_string(),
            (_, DefaultValue::Real(r)) => r.to_string(),
            (_, DefaultValue::Text(s)) => escape_string(s),
            (Dialect::Postgres, DefaultValue::Json(v)) => {
                format!("{}::{}", escape_string(&v.to_string()), self.cast_name(column_type))
            }
            (Dialect::Sqlite, DefaultValue::Json(v)) => escape_string(&v.to_string()),
            (Dialect::Postgres, DefaultValue::Now) => "now()".to_string(),
            (Dialect::Sqlite, DefaultValue::Now) => "CURRENT_TIMESTAMP".to_string(),
        }
    }

    fn cast_name(&self, column_type: ColumnType) -> String {
        self.data_type(column_type).to_ascii_lowercase()
    }

    /// Normalize an introspected default literal so it compares equal to the
    /// [`DefaultValue`] that produced it.
    ///
    /// Returns `None` for `NULL` defaults and for auto-increment sequences.
    pub fn parse_default(&self, column_type: ColumnType, raw: &str) -> Option<DefaultValue> {
        let literal = strip_cast(strip_parens(raw.trim()));
        if literal.eq_ignore_ascii_case("null") || column_type == ColumnType::Serial {
            return None;
        }

        let unquoted = unquote_string(literal);
        let text = unquoted.as_deref().unwrap_or(literal);

        match column_type {
            ColumnType::Serial => None,
            ColumnType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(DefaultValue::Boolean(true)),
                "false" | "f" | "0" => Some(DefaultValue::Boolean(false)),
                _ => Some(DefaultValue::Text(text.to_string())),
            },
            ColumnType::Integer => text
                .parse()
                .map(DefaultValue::Integer)
                .ok()
                .or_else(|| Some(DefaultValue::Text(text.to_string()))),
            ColumnType::Real => text
                .parse()
                .map(DefaultValue::Real)
                .ok()
                .or_else(|| Some(DefaultValue::Text(text.to_string()))),
            ColumnType::Text => Some(DefaultValue::Text(text.to_string())),
            ColumnType::Json => serde_json::from_str(text)
                .map(DefaultValue::Json)
                .ok()
                .or_else(|| Some(DefaultValue::Text(text.to_string()))),
            ColumnType::Timestamp => {
                let lower = text.to_ascii_lowercase();
                if unquoted.is_none()
                    && matches!(
                        lower.as_str(),
                        "now()" | "current_timestamp" | "current_timestamp()"
                    )
                {
                    Some(DefaultValue::Now)
                } else {
                    Some(DefaultValue::Text(text.to_string()))
                }
            }
        }
    }
}

/// Strip one level of wrapping parentheses, as SQLite reports `DEFAULT (0)`.
fn strip_parens(raw: &str) -> &str {
    raw.strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(raw)
}

/// Strip a trailing Postgres cast (`'x'::text`, `'{}'::jsonb`).
fn strip_cast(raw: &str) -> &str {
    if raw.starts_with('\'') {
        // Find the closing quote, skipping doubled quotes inside the literal
        let bytes = raw.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                return &raw[..=i];
            }
            i += 1;
        }
        return raw;
    }
    match raw.find("::") {
        Some(idx) => raw[..idx].trim(),
        None => raw,
    }
}
