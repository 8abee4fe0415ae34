//! Compiled schema and migration plan caches.
//!
//! Entries are keyed by a blake3 fingerprint of the configuration that
//! produced them, so a changed collection misses without explicit
//! invalidation. The cache is owned by an [`Engine`](crate::Engine); tests
//! get their own.

use std::collections::HashMap;

use brickwork_schema::{CollectionSchema, MigrationPlan};
use serde::Serialize;

/// Hash of a serialized configuration value.
pub type Fingerprint = blake3::Hash;

/// Fingerprint `value` through its JSON serialization.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, value)?;
    Ok(hasher.finalize())
}

#[derive(Debug, Clone)]
struct CachedSchema {
    fingerprint: Fingerprint,
    schema: CollectionSchema,
}

#[derive(Debug, Clone)]
struct CachedPlans {
    fingerprint: Fingerprint,
    plans: Vec<MigrationPlan>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    schemas: HashMap<String, CachedSchema>,
    plans: Option<CachedPlans>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached schema for `key`, if it was compiled from the same config.
    pub fn get_schema(&self, key: &str, fingerprint: &Fingerprint) -> Option<&CollectionSchema> {
        self.schemas
            .get(key)
            .filter(|cached| cached.fingerprint == *fingerprint)
            .map(|cached| &cached.schema)
    }

    /// Store a schema, replacing any entry for the same collection key.
    pub fn set_schema(&mut self, fingerprint: Fingerprint, schema: CollectionSchema) {
        self.schemas.insert(
            schema.key.clone(),
            CachedSchema {
                fingerprint,
                schema,
            },
        );
    }

    /// Drop the schema for `key`. Returns whether there was one.
    pub fn clear_schema(&mut self, key: &str) -> bool {
        self.schemas.remove(key).is_some()
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    pub fn get_plans(&self, fingerprint: &Fingerprint) -> Option<&[MigrationPlan]> {
        self.plans
            .as_ref()
            .filter(|cached| cached.fingerprint == *fingerprint)
            .map(|cached| cached.plans.as_slice())
    }

    pub fn set_plans(&mut self, fingerprint: Fingerprint, plans: Vec<MigrationPlan>) {
        self.plans = Some(CachedPlans { fingerprint, plans });
    }

    pub fn clear_plans(&mut self) {
        self.plans = None;
    }

    pub fn clear(&mut self) {
        self.schemas.clear();
        self.plans = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(key: &str) -> CollectionSchema {
        CollectionSchema {
            key: key.to_string(),
            tables: Vec::new(),
        }
    }

    #[test]
    fn fingerprints_follow_content() {
        let a = fingerprint(&serde_json::json!({ "key": "news" })).unwrap();
        let b = fingerprint(&serde_json::json!({ "key": "news" })).unwrap();
        let c = fingerprint(&serde_json::json!({ "key": "page" })).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn schema_entries_are_per_key_and_fingerprint() {
        let mut cache = SchemaCache::new();
        let v1 = fingerprint("v1").unwrap();
        let v2 = fingerprint("v2").unwrap();

        cache.set_schema(v1, schema("news"));
        cache.set_schema(v1, schema("page"));
        assert!(cache.get_schema("news", &v1).is_some());
        assert!(cache.get_schema("news", &v2).is_none());

        cache.set_schema(v2, schema("news"));
        assert!(cache.get_schema("news", &v1).is_none());
        assert_eq!(cache.schema_count(), 2);

        assert!(cache.clear_schema("news"));
        assert!(!cache.clear_schema("news"));
        assert!(cache.get_schema("page", &v1).is_some());
    }

    #[test]
    fn plans_are_cleared_wholesale() {
        let mut cache = SchemaCache::new();
        let fp = fingerprint("all").unwrap();
        cache.set_plans(fp, vec![MigrationPlan::new("news")]);
        assert_eq!(cache.get_plans(&fp).map(<[_]>::len), Some(1));

        cache.clear_plans();
        assert!(cache.get_plans(&fp).is_none());

        cache.set_schema(fp, schema("news"));
        cache.set_plans(fp, Vec::new());
        cache.clear();
        assert_eq!(cache.schema_count(), 0);
        assert!(cache.get_plans(&fp).is_none());
    }
}
