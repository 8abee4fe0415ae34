//! Collection schema migrations for brick-based content models.
//!
//! Collections, their bricks and their fields are compiled into a
//! [`CollectionSchema`](brickwork_schema::CollectionSchema): one table per
//! document, versions, document fields, brick and repeater. The engine
//! introspects the live database, diffs it against the compiled target and
//! applies the resulting plans in foreign key order:
//!
//! ```text
//! compile ─▶ introspect ─▶ diff ─▶ order ─▶ apply ─▶ record
//! ```
//!
//! Each stage is available on its own ([`compile`], [`diff`], [`classify`],
//! [`order`], [`apply`]) or through [`Engine`], which adds schema and plan
//! caching.
//!
//! # Example
//!
//! ```ignore
//! use brickwork::{CollectionConfig, Engine, EngineConfig, FieldConfig, MemoryAdapter};
//! use brickwork_sql::Dialect;
//!
//! let news = CollectionConfig::new("news")
//!     .field(FieldConfig::text("title").required())
//!     .field(FieldConfig::media("thumbnail"));
//!
//! let mut engine = Engine::new(MemoryAdapter::new(Dialect::Sqlite), EngineConfig::default());
//! let plans = engine.plan(&[news]).await?;
//! engine.apply(&plans).await?;
//! ```
//!
//! # Data loss
//!
//! A column whose type, foreign key or uniqueness changes, or any changed
//! column on a database without `ALTER COLUMN`, is dropped and re-added.
//! Its values are lost. Every such column is logged with `tracing::warn!`
//! before execution and listed in [`ApplyReport::recreated_columns`].

pub mod adapter;
pub mod cache;
mod classifier;
mod compiler;
pub mod config;
mod differ;
mod engine;
mod error;
pub mod fields;
mod executor;
mod model;
pub mod naming;
mod planner;

pub use adapter::{
    AdapterCapabilities, Capability, DatabaseAdapter, MemoryAdapter, MemoryError, PostgresAdapter,
};
pub use cache::SchemaCache;
pub use classifier::{ModifyStrategy, RecreatedColumn, classify, recreated_columns};
pub use compiler::{compile, compile_collection};
pub use config::{ConfigError, EngineConfig, ProjectConfig};
pub use differ::{column_changes, diff};
pub use engine::Engine;
pub use error::{AdapterError, CompileError, DiffError, ExecutionError, KeyKind, MigrationError};
pub use executor::{ApplyReport, apply, table_statements};
pub use fields::{FieldConfig, FieldKind, FieldValidationError, SelectOption};
pub use model::{BrickConfig, BrickKind, CollectionConfig, CollectionMode};
pub use planner::{REMOVAL_PRIORITY_BASE, order, order_all, priority, tier};

pub use brickwork_schema as schema;
pub use brickwork_sql as sql;
