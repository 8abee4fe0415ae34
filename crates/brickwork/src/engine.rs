//! The migration engine facade.

use brickwork_schema::{CollectionSchema, MigrationPlan};

use crate::adapter::DatabaseAdapter;
use crate::cache::{SchemaCache, fingerprint};
use crate::compiler::{compile_collection, compile_with};
use crate::config::EngineConfig;
use crate::error::{CompileError, MigrationError};
use crate::executor::{self, ApplyReport};
use crate::model::CollectionConfig;
use crate::{differ, naming};

/// Compiles content models and converges a database to them.
///
/// ```ignore
/// let adapter = PostgresAdapter::connect(&url, config.migration_table()).await?;
/// let mut engine = Engine::new(adapter, config);
/// let report = engine.migrate(&collections).await?;
/// for column in &report.recreated_columns {
///     eprintln!("recreated {}.{}", column.table, column.column);
/// }
/// ```
pub struct Engine<A> {
    adapter: A,
    cache: SchemaCache,
    config: EngineConfig,
}

impl<A: DatabaseAdapter> Engine<A> {
    pub fn new(adapter: A, config: EngineConfig) -> Self {
        Self::with_cache(adapter, config, SchemaCache::new())
    }

    /// Use an existing cache, e.g. one kept across engine instances.
    pub fn with_cache(adapter: A, config: EngineConfig, cache: SchemaCache) -> Self {
        Self {
            adapter,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn into_parts(self) -> (A, SchemaCache) {
        (self.adapter, self.cache)
    }

    /// Compile collections, reusing cached schemas whose config is unchanged.
    pub fn compile(
        &mut self,
        collections: &[CollectionConfig],
    ) -> Result<Vec<CollectionSchema>, CompileError> {
        let config = &self.config;
        let cache = &mut self.cache;
        let mut changed = false;

        let schemas = compile_with(collections, |collection| {
            let Ok(fp) = fingerprint(&(config, collection)) else {
                return compile_collection(config, collection);
            };
            if let Some(schema) = cache.get_schema(&collection.key, &fp) {
                tracing::debug!(collection = %collection.key, "schema cache hit");
                return Ok(schema.clone());
            }
            tracing::debug!(collection = %collection.key, "schema cache miss");
            let schema = compile_collection(config, collection)?;
            cache.set_schema(fp, schema.clone());
            changed = true;
            Ok(schema)
        })?;

        if changed {
            self.cache.clear_plans();
        }
        Ok(schemas)
    }

    /// Compile, introspect, diff and order. Plans are cached until
    /// [`apply`](Self::apply) or [`reload`](Self::reload).
    pub async fn plan(
        &mut self,
        collections: &[CollectionConfig],
    ) -> Result<Vec<MigrationPlan>, MigrationError> {
        let schemas = self.compile(collections)?;

        let fp = fingerprint(&(&self.config, collections)).ok();
        if let Some(plans) = fp.as_ref().and_then(|fp| self.cache.get_plans(fp)) {
            tracing::debug!(plans = plans.len(), "plan cache hit");
            return Ok(plans.to_vec());
        }

        let prefix = naming::document_table_prefix(&self.config.table_prefix);
        let existing = self
            .adapter
            .inferred_schema(&prefix)
            .await
            .map_err(MigrationError::Introspection)?;

        let plans = differ::diff(&self.config.table_prefix, &schemas, &existing, &self.adapter)?;
        tracing::info!(
            collections = schemas.len(),
            plans = plans.len(),
            operations = plans.iter().map(MigrationPlan::operation_count).sum::<usize>(),
            "planned migrations"
        );
        for plan in &plans {
            tracing::debug!("{}", plan);
        }

        if let Some(fp) = fp {
            self.cache.set_plans(fp, plans.clone());
        }
        Ok(plans)
    }

    /// Apply plans. The plan cache is cleared whatever the outcome, since
    /// the database may have changed.
    pub async fn apply(&mut self, plans: &[MigrationPlan]) -> Result<ApplyReport, MigrationError> {
        let result = executor::apply(&mut self.adapter, plans).await;
        self.cache.clear_plans();
        result
    }

    /// Plan and apply in one go.
    pub async fn migrate(
        &mut self,
        collections: &[CollectionConfig],
    ) -> Result<ApplyReport, MigrationError> {
        let plans = self.plan(collections).await?;
        if plans.is_empty() {
            tracing::info!("schema is up to date");
            return Ok(ApplyReport::default());
        }
        self.apply(&plans).await
    }

    /// Forget cached plans after a configuration reload.
    pub fn reload(&mut self) {
        self.cache.clear_plans();
    }

    /// Forget the cached schema of one collection.
    pub fn invalidate(&mut self, key: &str) {
        self.cache.clear_schema(key);
        self.cache.clear_plans();
    }
}
