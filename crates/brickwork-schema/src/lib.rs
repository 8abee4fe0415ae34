//! Schema and migration plan types for brickwork.
//!
//! This crate contains the types shared between the engine (`brickwork`,
//! which compiles content models, diffs them and executes plans) and
//! `brickwork-sql` (which renders DDL for a dialect).
//!
//! Every type serializes with serde: an applied [`MigrationPlan`] is persisted
//! as JSON in the audit table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical column types.
///
/// Adapters map these to dialect type names and back during introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnType {
    /// Auto-incrementing integer primary key
    Serial,
    Integer,
    Real,
    Text,
    Boolean,
    Json,
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Serial => write!(f, "serial"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Real => write!(f, "real"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Json => write!(f, "json"),
            ColumnType::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// A normalized column default.
///
/// Compiled columns carry these directly. Introspected defaults are raw
/// dialect literals and get normalized by the adapter before comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum DefaultValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Json(serde_json::Value),
    /// The current timestamp at insert time
    Now,
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Boolean(b) => write!(f, "{}", b),
            DefaultValue::Integer(i) => write!(f, "{}", i),
            DefaultValue::Real(r) => write!(f, "{}", r),
            DefaultValue::Text(s) => write!(f, "'{}'", s),
            DefaultValue::Json(v) => write!(f, "{}", v),
            DefaultValue::Now => write!(f, "now"),
        }
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForeignKeyAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    #[default]
    NoAction,
}

impl ForeignKeyAction {
    /// Returns the SQL keyword(s) for this action.
    pub fn to_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }

    /// Parse a referential action as reported by a database catalog.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Some(ForeignKeyAction::Cascade),
            "SET NULL" => Some(ForeignKeyAction::SetNull),
            "SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
            "RESTRICT" => Some(ForeignKeyAction::Restrict),
            "NO ACTION" => Some(ForeignKeyAction::NoAction),
            _ => None,
        }
    }
}

/// A single-column foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table
    pub table: String,
    /// Referenced column
    pub column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    /// Reference `table.column` with `NO ACTION` on both sides.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} (on delete {}, on update {})",
            self.table,
            self.column,
            self.on_delete.to_sql(),
            self.on_update.to_sql()
        )
    }
}

/// Where a column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnSource {
    /// Structural column every table of its type carries
    Core,
    /// Column generated by a custom field
    Field,
}

/// Prefix carried by every field-origin column name.
pub const FIELD_COLUMN_PREFIX: &str = "_";

impl ColumnSource {
    /// Source implied by a column name: field columns carry [`FIELD_COLUMN_PREFIX`].
    pub fn from_column_name(name: &str) -> Self {
        if name.starts_with(FIELD_COLUMN_PREFIX) {
            ColumnSource::Field
        } else {
            ColumnSource::Core
        }
    }
}

impl fmt::Display for ColumnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSource::Core => write!(f, "core"),
            ColumnSource::Field => write!(f, "field"),
        }
    }
}

/// A fully normalized target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchemaColumn {
    pub name: String,
    pub source: ColumnSource,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub foreign_key: Option<ForeignKey>,
    pub unique: bool,
    pub primary: bool,
    /// Key of the field that produced this column, for field-origin columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field: Option<String>,
}

impl CollectionSchemaColumn {
    /// A non-null core column with no default or constraints.
    pub fn core(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            source: ColumnSource::Core,
            column_type,
            nullable: false,
            default: None,
            foreign_key: None,
            unique: false,
            primary: false,
            custom_field: None,
        }
    }

    /// A nullable field-origin column produced by the field `field_key`.
    pub fn field(field_key: &str, column_name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: column_name.into(),
            source: ColumnSource::Field,
            column_type,
            nullable: true,
            default: None,
            foreign_key: None,
            unique: false,
            primary: false,
            custom_field: Some(field_key.to_string()),
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default_value(mut self, default: Option<DefaultValue>) -> Self {
        self.default = default;
        self
    }

    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }
}

/// Role of a table within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableType {
    Document,
    Versions,
    DocumentFields,
    Brick,
    Repeater,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableType::Document => write!(f, "document"),
            TableType::Versions => write!(f, "versions"),
            TableType::DocumentFields => write!(f, "document-fields"),
            TableType::Brick => write!(f, "brick"),
            TableType::Repeater => write!(f, "repeater"),
        }
    }
}

/// The key path a table was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TableKey {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brick: Option<String>,
    /// Repeater keys from the outermost to this table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repeater: Vec<String>,
}

/// A compiled target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchemaTable {
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: TableType,
    pub key: TableKey,
    pub columns: Vec<CollectionSchemaColumn>,
}

impl CollectionSchemaTable {
    pub fn column(&self, name: &str) -> Option<&CollectionSchemaColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The compiled target schema for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub key: String,
    /// Tables in dependency order: parents before the tables referencing them
    pub tables: Vec<CollectionSchemaTable>,
}

impl CollectionSchema {
    pub fn table(&self, name: &str) -> Option<&CollectionSchemaTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// A live column as reported by introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Raw dialect default literal, normalized by the adapter when compared
    pub default: Option<String>,
    pub foreign_key: Option<ForeignKey>,
    pub unique: bool,
    pub primary: bool,
}

/// A live table as reported by introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredTable {
    pub name: String,
    pub columns: Vec<InferredColumn>,
}

impl InferredTable {
    pub fn column(&self, name: &str) -> Option<&InferredColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A `{from, to}` pair for a changed attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange<T> {
    pub from: T,
    pub to: T,
}

impl<T> ValueChange<T> {
    pub fn new(from: T, to: T) -> Self {
        Self { from, to }
    }
}

/// The attributes that differ between an existing column and its target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnChanges {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ValueChange<ColumnType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<ValueChange<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ValueChange<Option<DefaultValue>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ValueChange<Option<ForeignKey>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<ValueChange<bool>>,
}

impl ColumnChanges {
    pub fn is_empty(&self) -> bool {
        self.column_type.is_none()
            && self.nullable.is_none()
            && self.default.is_none()
            && self.foreign_key.is_none()
            && self.unique.is_none()
    }
}

/// A single column-level change within a table migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ColumnOperation {
    Add {
        column: CollectionSchemaColumn,
    },
    Modify {
        column: CollectionSchemaColumn,
        changes: ColumnChanges,
    },
    Remove {
        column_name: String,
    },
}

impl ColumnOperation {
    pub fn column_name(&self) -> &str {
        match self {
            ColumnOperation::Add { column } | ColumnOperation::Modify { column, .. } => {
                &column.name
            }
            ColumnOperation::Remove { column_name } => column_name,
        }
    }
}

fn fmt_default(default: &Option<DefaultValue>) -> String {
    default
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "(none)".to_string())
}

impl fmt::Display for ColumnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnOperation::Add { column } => {
                let nullable = if column.nullable { " (nullable)" } else { "" };
                write!(f, "+ {}: {}{}", column.name, column.column_type, nullable)
            }
            ColumnOperation::Remove { column_name } => write!(f, "- {}", column_name),
            ColumnOperation::Modify { column, changes } => {
                let mut parts = Vec::new();
                if let Some(c) = &changes.column_type {
                    parts.push(format!("type {} -> {}", c.from, c.to));
                }
                if let Some(c) = &changes.nullable {
                    let label = |n: bool| if n { "nullable" } else { "not null" };
                    parts.push(format!("{} -> {}", label(c.from), label(c.to)));
                }
                if let Some(c) = &changes.default {
                    parts.push(format!(
                        "default {} -> {}",
                        fmt_default(&c.from),
                        fmt_default(&c.to)
                    ));
                }
                if let Some(c) = &changes.foreign_key {
                    let label = |fk: &Option<ForeignKey>| {
                        fk.as_ref()
                            .map(|fk| format!("{}.{}", fk.table, fk.column))
                            .unwrap_or_else(|| "(none)".to_string())
                    };
                    parts.push(format!("foreign key {} -> {}", label(&c.from), label(&c.to)));
                }
                if let Some(c) = &changes.unique {
                    parts.push(format!("unique {} -> {}", c.from, c.to));
                }
                write!(f, "~ {}: {}", column.name, parts.join(", "))
            }
        }
    }
}

/// Kind of table-level migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationType {
    Create,
    Modify,
    Remove,
}

/// Changes to a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMigration {
    #[serde(rename = "type")]
    pub migration_type: MigrationType,
    /// Lower runs first
    pub priority: u32,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<TableType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<TableKey>,
    pub column_operations: Vec<ColumnOperation>,
}

impl fmt::Display for TableMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.migration_type {
            MigrationType::Create => '+',
            MigrationType::Modify => '~',
            MigrationType::Remove => '-',
        };
        write!(f, "{} table {} [{}]", sign, self.table_name, self.priority)?;
        for op in &self.column_operations {
            write!(f, "\n    {}", op)?;
        }
        Ok(())
    }
}

/// The ordered table migrations converging one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub collection_key: String,
    pub tables: Vec<TableMigration>,
}

impl MigrationPlan {
    pub fn new(collection_key: impl Into<String>) -> Self {
        Self {
            collection_key: collection_key.into(),
            tables: Vec::new(),
        }
    }

    /// Returns true if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Count column operations across all tables.
    pub fn operation_count(&self) -> usize {
        self.tables.iter().map(|t| t.column_operations.len()).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableMigration> {
        self.tables.iter().find(|t| t.table_name == name)
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.collection_key)?;
        for table in &self.tables {
            write!(f, "\n  {}", table)?;
        }
        Ok(())
    }
}

/// Audit row persisted for every applied plan. Never replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub collection_key: String,
    pub migration_plans: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl MigrationRecord {
    pub fn new(plan: &MigrationPlan, created_at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            collection_key: plan.collection_key.clone(),
            migration_plans: serde_json::to_value(plan)?,
            created_at,
        })
    }
}
