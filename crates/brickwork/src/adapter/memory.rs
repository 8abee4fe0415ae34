//! In-memory adapter.
//!
//! Keeps tables as lists of [`ColumnDef`]s and applies statements with the
//! same preconditions a real database enforces: tables and columns must (or
//! must not) exist, foreign keys must target existing tables, and a table
//! still referenced by another cannot be dropped. Every statement is rendered
//! with the adapter's dialect, so unsupported DDL fails exactly as it would
//! against the real engine. In SQLite mode a column with a UNIQUE constraint
//! or a covering index cannot be dropped.

use std::collections::HashSet;

use brickwork_schema::{InferredColumn, InferredTable, MigrationRecord};
use brickwork_sql::{AlterAction, ColumnDef, DdlStatement, Dialect, render};
use indexmap::IndexMap;
use thiserror::Error;

use super::{AdapterCapabilities, Capability, DatabaseAdapter};
use crate::error::AdapterError;

/// A statement's precondition does not hold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("table '{table}' does not exist")]
    TableNotFound { table: String },
    #[error("table '{table}' already exists")]
    TableAlreadyExists { table: String },
    #[error("column '{table}.{column}' does not exist")]
    ColumnNotFound { table: String, column: String },
    #[error("column '{table}.{column}' already exists")]
    ColumnAlreadyExists { table: String, column: String },
    #[error("foreign key from '{table}' references non-existent table '{target}'")]
    ForeignKeyTargetNotFound { table: String, target: String },
    /// Another table still has a foreign key to this one
    #[error("cannot drop '{table}': still referenced by '{by}'")]
    TableReferenced { table: String, by: String },
    #[error("index '{name}' already exists")]
    IndexAlreadyExists { name: String },
    /// SQLite cannot drop a column with a UNIQUE constraint
    #[error("cannot drop UNIQUE column '{table}.{column}'")]
    UniqueColumnDropped { table: String, column: String },
    /// SQLite cannot drop a column an index still covers
    #[error("cannot drop column '{table}.{column}': indexed by '{index}'")]
    IndexedColumnDropped {
        table: String,
        column: String,
        index: String,
    },
    /// Failure injected with [`MemoryAdapter::fail_on`]
    #[error("injected failure on '{table}'")]
    Injected { table: String },
}

#[derive(Debug, Clone)]
struct UniqueIndex {
    table: String,
    column: String,
}

/// A database held in memory.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    dialect: Dialect,
    alter_column: bool,
    tables: IndexMap<String, Vec<ColumnDef>>,
    indexes: IndexMap<String, UniqueIndex>,
    executed: Vec<String>,
    records: Vec<MigrationRecord>,
    fail_tables: HashSet<String>,
}

impl MemoryAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            alter_column: dialect.supports_alter_column(),
            tables: IndexMap::new(),
            indexes: IndexMap::new(),
            executed: Vec::new(),
            records: Vec::new(),
            fail_tables: HashSet::new(),
        }
    }

    /// Override whether `ALTER COLUMN` is reported as supported.
    pub fn with_alter_column(mut self, supported: bool) -> Self {
        self.alter_column = supported;
        self
    }

    /// Make every statement on `table` fail.
    pub fn fail_on(&mut self, table: impl Into<String>) {
        self.fail_tables.insert(table.into());
    }

    pub fn clear_failures(&mut self) {
        self.fail_tables.clear();
    }

    /// Seed a table without going through DDL, e.g. the users and media tables.
    pub fn insert_table(&mut self, name: impl Into<String>, columns: Vec<ColumnDef>) {
        self.tables.insert(name.into(), columns);
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn columns(&self, table: &str) -> Option<&[ColumnDef]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Rendered SQL of every statement that succeeded, in order.
    pub fn executed_sql(&self) -> &[String] {
        &self.executed
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    /// Names of the unique indexes on `table`.
    pub fn index_names(&self, table: &str) -> Vec<&str> {
        self.indexes
            .iter()
            .filter(|(_, index)| index.table == table)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn is_indexed(&self, table: &str, column: &str) -> bool {
        self.indexes
            .values()
            .any(|index| index.table == table && index.column == column)
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut Vec<ColumnDef>, MemoryError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| MemoryError::TableNotFound {
                table: table.to_string(),
            })
    }

    fn check_references(&self, table: &str, column: &ColumnDef) -> Result<(), MemoryError> {
        if let Some(fk) = &column.foreign_key {
            if fk.table != table && !self.tables.contains_key(&fk.table) {
                return Err(MemoryError::ForeignKeyTargetNotFound {
                    table: table.to_string(),
                    target: fk.table.clone(),
                });
            }
        }
        Ok(())
    }

    fn column_mut<'a>(
        columns: &'a mut [ColumnDef],
        table: &str,
        column: &str,
    ) -> Result<&'a mut ColumnDef, MemoryError> {
        columns
            .iter_mut()
            .find(|c| c.name == column)
            .ok_or_else(|| MemoryError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    fn check_droppable(&self, table: &str, column: &str) -> Result<(), MemoryError> {
        let unique = self
            .tables
            .get(table)
            .and_then(|columns| columns.iter().find(|c| c.name == column))
            .is_some_and(|c| c.unique);
        if unique {
            return Err(MemoryError::UniqueColumnDropped {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        let index = self
            .indexes
            .iter()
            .find(|(_, index)| index.table == table && index.column == column);
        if let Some((name, _)) = index {
            return Err(MemoryError::IndexedColumnDropped {
                table: table.to_string(),
                column: column.to_string(),
                index: name.clone(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, statement: &DdlStatement) -> Result<(), MemoryError> {
        match statement {
            DdlStatement::CreateTable { table, columns } => {
                if self.tables.contains_key(table) {
                    return Err(MemoryError::TableAlreadyExists {
                        table: table.clone(),
                    });
                }
                let mut seen = HashSet::new();
                for column in columns {
                    if !seen.insert(column.name.as_str()) {
                        return Err(MemoryError::ColumnAlreadyExists {
                            table: table.clone(),
                            column: column.name.clone(),
                        });
                    }
                    self.check_references(table, column)?;
                }
                self.tables.insert(table.clone(), columns.clone());
            }
            DdlStatement::DropTable { table } => {
                let referencing = self.tables.iter().find(|(name, columns)| {
                    name.as_str() != table.as_str()
                        && columns
                            .iter()
                            .any(|c| c.foreign_key.as_ref().is_some_and(|fk| fk.table == *table))
                });
                if let Some((by, _)) = referencing {
                    return Err(MemoryError::TableReferenced {
                        table: table.clone(),
                        by: by.clone(),
                    });
                }
                self.tables.shift_remove(table);
                self.indexes.retain(|_, index| index.table != *table);
            }
            DdlStatement::CreateUniqueIndex {
                table,
                column,
                name,
            } => {
                let columns = self.table_mut(table)?;
                Self::column_mut(columns, table, column)?;
                if self.indexes.contains_key(name) {
                    return Err(MemoryError::IndexAlreadyExists { name: name.clone() });
                }
                self.indexes.insert(
                    name.clone(),
                    UniqueIndex {
                        table: table.clone(),
                        column: column.clone(),
                    },
                );
            }
            DdlStatement::DropIndex { name, .. } => {
                self.indexes.shift_remove(name);
            }
            DdlStatement::AlterTable { table, action } => match action {
                AlterAction::AddColumn(column) => {
                    self.check_references(table, column)?;
                    let columns = self.table_mut(table)?;
                    if columns.iter().any(|c| c.name == column.name) {
                        return Err(MemoryError::ColumnAlreadyExists {
                            table: table.clone(),
                            column: column.name.clone(),
                        });
                    }
                    columns.push(column.clone());
                }
                AlterAction::DropColumn(column) => {
                    if self.dialect == Dialect::Sqlite {
                        self.check_droppable(table, column)?;
                    }
                    let columns = self.table_mut(table)?;
                    let before = columns.len();
                    columns.retain(|c| &c.name != column);
                    if columns.len() == before {
                        return Err(MemoryError::ColumnNotFound {
                            table: table.clone(),
                            column: column.clone(),
                        });
                    }
                    self.indexes
                        .retain(|_, index| index.table != *table || index.column != *column);
                }
                AlterAction::SetNullable { column, nullable } => {
                    let columns = self.table_mut(table)?;
                    Self::column_mut(columns, table, column)?.nullable = *nullable;
                }
                AlterAction::SetDefault { column, default } => {
                    let columns = self.table_mut(table)?;
                    Self::column_mut(columns, table, column)?.default = default.clone();
                }
            },
        }
        Ok(())
    }

    fn infer_column(
        &self,
        table: &str,
        column: &ColumnDef,
    ) -> Result<InferredColumn, AdapterError> {
        let column_type = self
            .dialect
            .column_type_from_sql(&column.data_type, column.primary, column.default.as_deref())
            .ok_or_else(|| AdapterError::UnsupportedType {
                table: table.to_string(),
                column: column.name.clone(),
                data_type: column.data_type.clone(),
            })?;

        Ok(InferredColumn {
            name: column.name.clone(),
            column_type,
            nullable: column.nullable && !column.primary,
            default: column.default.clone(),
            foreign_key: column.foreign_key.clone(),
            unique: column.unique || self.is_indexed(table, &column.name),
            primary: column.primary,
        })
    }
}

impl AdapterCapabilities for MemoryAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::AlterColumn => self.alter_column,
        }
    }
}

impl DatabaseAdapter for MemoryAdapter {
    async fn inferred_schema(
        &mut self,
        table_prefix: &str,
    ) -> Result<Vec<InferredTable>, AdapterError> {
        self.tables
            .iter()
            .filter(|(name, _)| name.starts_with(table_prefix))
            .map(|(name, columns)| {
                Ok(InferredTable {
                    name: name.clone(),
                    columns: columns
                        .iter()
                        .map(|c| self.infer_column(name, c))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect()
    }

    async fn execute(&mut self, statement: &DdlStatement) -> Result<(), AdapterError> {
        let sql = render(self.dialect, statement)?;
        if self.fail_tables.contains(statement.table()) {
            return Err(MemoryError::Injected {
                table: statement.table().to_string(),
            }
            .into());
        }
        self.apply(statement)?;
        self.executed.push(sql);
        Ok(())
    }

    async fn record_migration(&mut self, record: &MigrationRecord) -> Result<(), AdapterError> {
        self.records.push(record.clone());
        Ok(())
    }
}
