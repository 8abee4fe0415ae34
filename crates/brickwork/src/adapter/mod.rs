//! Database adapters.
//!
//! The engine only talks to the database through [`DatabaseAdapter`]. The
//! sync half, [`AdapterCapabilities`], is everything the differ and
//! classifier need; it defaults to the adapter's [`Dialect`] and is
//! implemented for `Dialect` itself.

mod memory;
mod postgres;

pub use memory::{MemoryAdapter, MemoryError};
pub use postgres::PostgresAdapter;

use std::future::Future;

use brickwork_schema::{
    CollectionSchemaColumn, ColumnType, DefaultValue, InferredTable, MigrationRecord,
};
use brickwork_sql::{ColumnDef, DdlStatement, Dialect};

use crate::error::AdapterError;

/// Optional DDL features an adapter may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Capability {
    /// `ALTER TABLE ... ALTER COLUMN` for nullability and defaults
    AlterColumn,
}

/// Type mapping and feature support of a database.
pub trait AdapterCapabilities {
    fn dialect(&self) -> Dialect;

    /// Dialect type name for a logical type.
    fn data_type(&self, column_type: ColumnType) -> String {
        self.dialect().data_type(column_type).to_string()
    }

    /// Dialect literal for a default value.
    fn default_literal(&self, column_type: ColumnType, value: &DefaultValue) -> String {
        self.dialect().default_literal(column_type, value)
    }

    /// Normalize an introspected default so it compares against a target default.
    fn format_default_value(&self, column_type: ColumnType, raw: &str) -> Option<DefaultValue> {
        self.dialect().parse_default(column_type, raw)
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::AlterColumn => self.dialect().supports_alter_column(),
        }
    }

    /// Build the DDL column for a target column.
    fn column_def(&self, column: &CollectionSchemaColumn) -> ColumnDef {
        ColumnDef {
            name: column.name.clone(),
            data_type: self.data_type(column.column_type),
            nullable: column.nullable,
            default: column
                .default
                .as_ref()
                .map(|d| self.default_literal(column.column_type, d)),
            primary: column.primary,
            unique: column.unique,
            foreign_key: column.foreign_key.clone(),
        }
    }
}

impl AdapterCapabilities for Dialect {
    fn dialect(&self) -> Dialect {
        *self
    }
}

/// A live database the engine can introspect and migrate.
pub trait DatabaseAdapter: AdapterCapabilities {
    /// Every table whose name starts with `table_prefix`, with its columns.
    fn inferred_schema(
        &mut self,
        table_prefix: &str,
    ) -> impl Future<Output = Result<Vec<InferredTable>, AdapterError>> + Send;

    /// Execute one DDL statement.
    fn execute(
        &mut self,
        statement: &DdlStatement,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Persist the audit row for an applied plan.
    fn record_migration(
        &mut self,
        record: &MigrationRecord,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;
}
