use brickwork_schema::ColumnSource;
use brickwork_sql::RenderError;

use crate::adapter::MemoryError;
use std::fmt;
use thiserror::Error;

/// What kind of key a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Collection,
    Brick,
    Field,
    Repeater,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Collection => write!(f, "collection"),
            KeyKind::Brick => write!(f, "brick"),
            KeyKind::Field => write!(f, "field"),
            KeyKind::Repeater => write!(f, "repeater"),
        }
    }
}

/// The content model cannot be compiled. Raised before any database access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("duplicate field key '{key}' in {scope}")]
    DuplicateFieldKey { scope: String, key: String },

    #[error("duplicate brick key '{brick}' in collection '{collection}'")]
    DuplicateBrickKey { collection: String, brick: String },

    #[error("duplicate collection key '{0}'")]
    DuplicateCollectionKey(String),

    #[error("{kind} key '{key}' contains reserved sequence '{reserved}'")]
    ReservedKey {
        kind: KeyKind,
        key: String,
        reserved: &'static str,
    },

    #[error("invalid {kind} key '{key}': {reason}")]
    InvalidKey {
        kind: KeyKind,
        key: String,
        reason: &'static str,
    },

    #[error("table '{table}' would be produced by both {first} and {second}")]
    TableNameCollision {
        table: String,
        first: String,
        second: String,
    },

    /// Postgres would silently truncate the name
    #[error("identifier '{identifier}' is {len} bytes, longer than the {max} allowed")]
    IdentifierTooLong {
        identifier: String,
        len: usize,
        max: usize,
    },

    #[error("field '{field}' in {scope}: {reason}")]
    InvalidField {
        scope: String,
        field: String,
        reason: String,
    },
}

/// The target and existing schemas cannot be reconciled automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error(
        "column '{column}' of table '{table}' is a {existing} column in the database \
         but a {target} column in the target schema"
    )]
    SourceConflict {
        table: String,
        column: String,
        existing: ColumnSource,
        target: ColumnSource,
    },
}

/// Failure reported by a database adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("unsupported column type '{data_type}' for {table}.{column}")]
    UnsupportedType {
        table: String,
        column: String,
        data_type: String,
    },

    #[error("failed to serialize migration record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A statement or audit write failed while applying a plan.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("collection '{collection}': statement on '{table}' failed: {source}\n    {statement}")]
    Statement {
        collection: String,
        table: String,
        statement: String,
        #[source]
        source: AdapterError,
    },

    #[error("collection '{collection}': failed to record applied migration: {source}")]
    Record {
        collection: String,
        #[source]
        source: AdapterError,
    },
}

impl ExecutionError {
    pub fn collection(&self) -> &str {
        match self {
            ExecutionError::Statement { collection, .. }
            | ExecutionError::Record { collection, .. } => collection,
        }
    }
}

/// Any failure of a migration pass.
///
/// Anything other than `Ok` means the migration is incomplete; fix the cause
/// and re-run, converged tables produce no further work.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error("introspection failed: {0}")]
    Introspection(#[source] AdapterError),

    #[error(
        "migration incomplete: {} plan(s) failed, {} applied; first failure: {}",
        .failures.len(),
        .applied.len(),
        first_failure(.failures)
    )]
    Incomplete {
        /// One entry per plan that stopped early
        failures: Vec<ExecutionError>,
        /// Collections whose plans were applied completely
        applied: Vec<String>,
    },
}

fn first_failure(failures: &[ExecutionError]) -> String {
    failures
        .first()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "migration failed".to_string())
}
