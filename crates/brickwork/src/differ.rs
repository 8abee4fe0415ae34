//! Schema diffing: compiled target schemas against the live database.
//!
//! Produces one [`MigrationPlan`] per collection that needs work. Tables are
//! matched by name, columns by name within a table:
//!
//! ```text
//! news:
//!   ~ table bw_document__news__fields [2]
//!     + _subtitle: text (nullable)
//!     - _thumbnail_id
//!     ~ _title: default (none) -> 'Untitled'
//! ```
//!
//! Live tables the engine owns but no longer targets are removed, whether a
//! single brick went away or the whole collection did. Tables outside the
//! engine's prefix are never touched.

use std::collections::{HashMap, HashSet};

use brickwork_schema::{
    CollectionSchema, CollectionSchemaColumn, CollectionSchemaTable, ColumnChanges,
    ColumnOperation, ColumnSource, InferredColumn, InferredTable, MigrationPlan, MigrationType,
    TableMigration, ValueChange,
};
use indexmap::IndexMap;

use crate::adapter::AdapterCapabilities;
use crate::error::DiffError;
use crate::{naming, planner};

/// Diff every target collection against the live tables.
///
/// `prefix` is the engine table prefix, used to recognize owned tables among
/// `existing`. Only non-empty plans are returned, each already ordered.
pub fn diff<C: AdapterCapabilities + ?Sized>(
    prefix: &str,
    target: &[CollectionSchema],
    existing: &[InferredTable],
    caps: &C,
) -> Result<Vec<MigrationPlan>, DiffError> {
    let live: HashMap<&str, &InferredTable> =
        existing.iter().map(|t| (t.name.as_str(), t)).collect();
    let targeted: HashSet<&str> = target
        .iter()
        .flat_map(|s| s.tables.iter().map(|t| t.name.as_str()))
        .collect();

    let mut plans: IndexMap<String, MigrationPlan> = IndexMap::new();

    for schema in target {
        let plan = plans
            .entry(schema.key.clone())
            .or_insert_with(|| MigrationPlan::new(&schema.key));
        for table in &schema.tables {
            let migration = match live.get(table.name.as_str()) {
                None => Some(create_table(table)),
                Some(live) => modify_table(table, live, caps)?,
            };
            plan.tables.extend(migration);
        }
    }

    for table in existing {
        if targeted.contains(table.name.as_str()) {
            continue;
        }
        let Some((table_type, key)) = naming::parse_table_name(prefix, &table.name) else {
            continue;
        };
        plans
            .entry(key.collection.clone())
            .or_insert_with(|| MigrationPlan::new(&key.collection))
            .tables
            .push(TableMigration {
                migration_type: MigrationType::Remove,
                priority: 0,
                table_name: table.name.clone(),
                table_type: Some(table_type),
                key: Some(key),
                column_operations: Vec::new(),
            });
    }

    Ok(plans
        .into_values()
        .filter(|plan| !plan.is_empty())
        .map(|mut plan| {
            planner::order(&mut plan);
            plan
        })
        .collect())
}

fn table_migration(
    migration_type: MigrationType,
    table: &CollectionSchemaTable,
    column_operations: Vec<ColumnOperation>,
) -> TableMigration {
    TableMigration {
        migration_type,
        priority: 0,
        table_name: table.name.clone(),
        table_type: Some(table.table_type),
        key: Some(table.key.clone()),
        column_operations,
    }
}

fn create_table(table: &CollectionSchemaTable) -> TableMigration {
    let operations = table
        .columns
        .iter()
        .map(|column| ColumnOperation::Add {
            column: column.clone(),
        })
        .collect();
    table_migration(MigrationType::Create, table, operations)
}

fn modify_table<C: AdapterCapabilities + ?Sized>(
    table: &CollectionSchemaTable,
    live: &InferredTable,
    caps: &C,
) -> Result<Option<TableMigration>, DiffError> {
    let mut adds = Vec::new();
    let mut modifies = Vec::new();

    for column in &table.columns {
        match live.column(&column.name) {
            None => adds.push(ColumnOperation::Add {
                column: column.clone(),
            }),
            Some(existing) => {
                let existing_source = ColumnSource::from_column_name(&existing.name);
                if existing_source != column.source {
                    return Err(DiffError::SourceConflict {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        existing: existing_source,
                        target: column.source,
                    });
                }
                let changes = column_changes(column, existing, caps);
                if !changes.is_empty() {
                    modifies.push(ColumnOperation::Modify {
                        column: column.clone(),
                        changes,
                    });
                }
            }
        }
    }

    let removes = live
        .columns
        .iter()
        .filter(|c| table.column(&c.name).is_none())
        .map(|c| ColumnOperation::Remove {
            column_name: c.name.clone(),
        });

    let mut operations = adds;
    operations.extend(removes);
    operations.extend(modifies);

    Ok((!operations.is_empty()).then(|| table_migration(MigrationType::Modify, table, operations)))
}

/// Attributes of `existing` that differ from `target`, as `{from, to}` pairs.
pub fn column_changes<C: AdapterCapabilities + ?Sized>(
    target: &CollectionSchemaColumn,
    existing: &InferredColumn,
    caps: &C,
) -> ColumnChanges {
    let mut changes = ColumnChanges::default();

    if existing.column_type != target.column_type {
        changes.column_type = Some(ValueChange::new(existing.column_type, target.column_type));
    }
    if existing.nullable != target.nullable {
        changes.nullable = Some(ValueChange::new(existing.nullable, target.nullable));
    }

    let existing_default = existing
        .default
        .as_deref()
        .and_then(|raw| caps.format_default_value(existing.column_type, raw));
    if existing_default != target.default {
        changes.default = Some(ValueChange::new(existing_default, target.default.clone()));
    }

    if existing.foreign_key != target.foreign_key {
        changes.foreign_key = Some(ValueChange::new(
            existing.foreign_key.clone(),
            target.foreign_key.clone(),
        ));
    }
    if existing.unique != target.unique {
        changes.unique = Some(ValueChange::new(existing.unique, target.unique));
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickwork_schema::{ColumnType, DefaultValue, ForeignKey, TableKey, TableType};
    use brickwork_sql::Dialect;

    fn inferred(column: &CollectionSchemaColumn, dialect: Dialect) -> InferredColumn {
        InferredColumn {
            name: column.name.clone(),
            column_type: column.column_type,
            nullable: column.nullable,
            default: column
                .default
                .as_ref()
                .map(|d| dialect.default_literal(column.column_type, d)),
            foreign_key: column.foreign_key.clone(),
            unique: column.unique,
            primary: column.primary,
        }
    }

    fn fields_table(columns: Vec<CollectionSchemaColumn>) -> CollectionSchemaTable {
        let key = TableKey {
            collection: "news".into(),
            ..Default::default()
        };
        CollectionSchemaTable {
            name: naming::fields_table("bw", "news"),
            table_type: TableType::DocumentFields,
            key,
            columns,
        }
    }

    fn schema(tables: Vec<CollectionSchemaTable>) -> CollectionSchema {
        CollectionSchema {
            key: "news".into(),
            tables,
        }
    }

    fn live(table: &CollectionSchemaTable, dialect: Dialect) -> InferredTable {
        InferredTable {
            name: table.name.clone(),
            columns: table.columns.iter().map(|c| inferred(c, dialect)).collect(),
        }
    }

    fn title() -> CollectionSchemaColumn {
        CollectionSchemaColumn::field("title", "_title", ColumnType::Text)
    }

    #[test]
    fn new_tables_are_created_with_every_column() {
        let table = fields_table(vec![
            CollectionSchemaColumn::core("id", ColumnType::Serial).primary(),
            title(),
        ]);
        let plans = diff("bw", &[schema(vec![table])], &[], &Dialect::Postgres).unwrap();
        assert_eq!(plans.len(), 1);
        let migration = &plans[0].tables[0];
        assert_eq!(migration.migration_type, MigrationType::Create);
        assert!(
            migration
                .column_operations
                .iter()
                .all(|op| matches!(op, ColumnOperation::Add { .. }))
        );
        assert_eq!(migration.column_operations.len(), 2);
    }

    #[test]
    fn identical_tables_produce_no_plan() {
        for dialect in [Dialect::Postgres, Dialect::Sqlite] {
            let table = fields_table(vec![
                CollectionSchemaColumn::core("id", ColumnType::Serial).primary(),
                CollectionSchemaColumn::core("position", ColumnType::Integer)
                    .default_value(Some(DefaultValue::Integer(0))),
                CollectionSchemaColumn::core("created_at", ColumnType::Timestamp)
                    .default_value(Some(DefaultValue::Now)),
                CollectionSchemaColumn::field("featured", "_featured", ColumnType::Boolean)
                    .default_value(Some(DefaultValue::Boolean(false))),
                CollectionSchemaColumn::field("data", "_data", ColumnType::Json)
                    .default_value(Some(DefaultValue::Json(serde_json::json!({ "a": [1, 2] })))),
                title().default_value(Some(DefaultValue::Text("it's".into()))),
            ]);
            let existing = [live(&table, dialect)];
            let plans = diff("bw", &[schema(vec![table])], &existing, &dialect).unwrap();
            assert!(plans.is_empty(), "{dialect}: {plans:?}");
        }
    }

    #[test]
    fn modify_carries_only_changed_attributes() {
        let before = fields_table(vec![
            title(),
            CollectionSchemaColumn::field("thumb", "_thumb_id", ColumnType::Integer),
        ]);
        let existing = [live(&before, Dialect::Postgres)];

        let target = fields_table(vec![
            title().default_value(Some(DefaultValue::Text("Untitled".into()))),
            CollectionSchemaColumn::field("subtitle", "_subtitle", ColumnType::Text),
        ]);
        let plans = diff("bw", &[schema(vec![target])], &existing, &Dialect::Postgres).unwrap();
        let ops = &plans[0].tables[0].column_operations;

        insta::assert_snapshot!(plans[0].to_string(), @r"
        news:
          ~ table bw_document__news__fields [2]
            + _subtitle: text (nullable)
            - _thumb_id
            ~ _title: default (none) -> 'Untitled'
        ");
        match &ops[2] {
            ColumnOperation::Modify { changes, .. } => {
                assert!(changes.default.is_some());
                assert!(changes.column_type.is_none());
                assert!(changes.nullable.is_none());
                assert!(changes.foreign_key.is_none());
                assert!(changes.unique.is_none());
            }
            other => panic!("expected modify, got {other:?}"),
        }
    }

    #[test]
    fn foreign_key_changes_are_structural() {
        let column = CollectionSchemaColumn::field("thumb", "_thumb_id", ColumnType::Integer)
            .references(ForeignKey::new("bw_media", "id"));
        let mut existing = inferred(&column, Dialect::Postgres);
        existing.foreign_key = Some(ForeignKey::new("old_media", "id"));

        let changes = column_changes(&column, &existing, &Dialect::Postgres);
        let fk = changes.foreign_key.unwrap();
        assert_eq!(fk.from.unwrap().table, "old_media");
        assert_eq!(fk.to.unwrap().table, "bw_media");
    }

    #[test]
    fn source_flip_is_a_conflict() {
        let mut column = title();
        column.source = ColumnSource::Core;
        let target = fields_table(vec![column]);
        let existing = [live(&fields_table(vec![title()]), Dialect::Postgres)];

        let err = diff("bw", &[schema(vec![target])], &existing, &Dialect::Postgres).unwrap_err();
        assert_eq!(
            err,
            DiffError::SourceConflict {
                table: "bw_document__news__fields".into(),
                column: "_title".into(),
                existing: ColumnSource::Field,
                target: ColumnSource::Core,
            }
        );
    }

    #[test]
    fn untargeted_owned_tables_are_removed() {
        let existing = [
            InferredTable {
                name: "bw_document__gone".into(),
                columns: vec![],
            },
            InferredTable {
                name: "bw_document__gone__hero".into(),
                columns: vec![],
            },
            InferredTable {
                name: "bw_users".into(),
                columns: vec![],
            },
        ];
        let plans = diff("bw", &[], &existing, &Dialect::Sqlite).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].collection_key, "gone");

        let names: Vec<_> = plans[0].tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(names, vec!["bw_document__gone__hero", "bw_document__gone"]);
        assert!(
            plans[0]
                .tables
                .iter()
                .all(|t| t.migration_type == MigrationType::Remove)
        );
    }
}
