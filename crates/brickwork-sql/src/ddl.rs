//! DDL statements.

use brickwork_schema::ForeignKey;
use serde::{Deserialize, Serialize};

/// A column as it appears in DDL, with dialect type and default already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Dialect type name, e.g. `TIMESTAMPTZ`
    pub data_type: String,
    pub nullable: bool,
    /// Dialect default literal, e.g. `'draft'` or `now()`
    pub default: Option<String>,
    pub primary: bool,
    pub unique: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            primary: false,
            unique: false,
            foreign_key: None,
        }
    }
}

/// A single change applied by `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlterAction {
    AddColumn(ColumnDef),
    DropColumn(String),
    SetNullable { column: String, nullable: bool },
    /// `None` drops the default
    SetDefault {
        column: String,
        default: Option<String>,
    },
}

/// A DDL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DdlStatement {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
    },
    AlterTable {
        table: String,
        action: AlterAction,
    },
    /// Always rendered as `DROP TABLE IF EXISTS`
    DropTable { table: String },
    /// A single-column unique index
    CreateUniqueIndex {
        table: String,
        column: String,
        name: String,
    },
    /// Always rendered as `DROP INDEX IF EXISTS`
    DropIndex { table: String, name: String },
}

impl DdlStatement {
    /// The table this statement targets.
    pub fn table(&self) -> &str {
        match self {
            DdlStatement::CreateTable { table, .. }
            | DdlStatement::AlterTable { table, .. }
            | DdlStatement::DropTable { table }
            | DdlStatement::CreateUniqueIndex { table, .. }
            | DdlStatement::DropIndex { table, .. } => table,
        }
    }

    pub fn add_column(table: impl Into<String>, column: ColumnDef) -> Self {
        DdlStatement::AlterTable {
            table: table.into(),
            action: AlterAction::AddColumn(column),
        }
    }

    pub fn drop_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        DdlStatement::AlterTable {
            table: table.into(),
            action: AlterAction::DropColumn(column.into()),
        }
    }

    /// Unique index on `column`, named with [`unique_index_name`].
    pub fn create_unique_index(table: &str, column: &str) -> Self {
        DdlStatement::CreateUniqueIndex {
            table: table.to_string(),
            column: column.to_string(),
            name: unique_index_name(table, column),
        }
    }

    /// Drop the index [`create_unique_index`](Self::create_unique_index) made.
    pub fn drop_unique_index(table: &str, column: &str) -> Self {
        DdlStatement::DropIndex {
            table: table.to_string(),
            name: unique_index_name(table, column),
        }
    }
}

/// Name of the unique index backing a column.
///
/// Uses the convention `uq_{table}_{column}`.
///
/// # Example
/// ```
/// use brickwork_sql::unique_index_name;
/// assert_eq!(
///     unique_index_name("bw_document__news__fields", "_slug"),
///     "uq_bw_document__news__fields__slug"
/// );
/// ```
pub fn unique_index_name(table: &str, column: &str) -> String {
    format!("uq_{}_{}", table, column)
}
