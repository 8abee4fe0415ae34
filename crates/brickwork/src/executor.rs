//! Applies migration plans through an adapter.

use brickwork_schema::{
    CollectionSchemaColumn, ColumnChanges, ColumnOperation, MigrationPlan, MigrationRecord,
    MigrationType, TableMigration,
};
use brickwork_sql::{AlterAction, ColumnDef, DdlStatement, render};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::Instrument;

use crate::adapter::{AdapterCapabilities, DatabaseAdapter};
use crate::classifier::{ModifyStrategy, RecreatedColumn, classify, recreated_columns};
use crate::error::{AdapterError, ExecutionError, MigrationError};
use crate::planner;

/// Outcome of a successful [`apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    /// Collections whose plans were applied and recorded
    pub applied: Vec<String>,
    /// Columns dropped and re-added, losing their data
    pub recreated_columns: Vec<RecreatedColumn>,
    /// Number of statements executed
    pub statements: usize,
}

/// DDL statements for one table migration, in execution order.
///
/// Where the dialect cannot add a UNIQUE column, unique columns are
/// created plain and backed by a unique index, which is dropped before the
/// column is.
pub fn table_statements<C: AdapterCapabilities + ?Sized>(
    table: &TableMigration,
    caps: &C,
) -> Vec<DdlStatement> {
    let name = &table.table_name;
    let indexed = !caps.dialect().supports_add_unique_column();
    match table.migration_type {
        MigrationType::Create => {
            let mut indexes = Vec::new();
            let columns = table
                .column_operations
                .iter()
                .filter_map(|op| match op {
                    ColumnOperation::Add { column } => Some(column),
                    _ => None,
                })
                .map(|column| {
                    let (def, index) = split_unique(name, caps.column_def(column), indexed);
                    indexes.extend(index);
                    def
                })
                .collect();
            let mut statements = vec![DdlStatement::CreateTable {
                table: name.clone(),
                columns,
            }];
            statements.extend(indexes);
            statements
        }
        MigrationType::Remove => vec![DdlStatement::DropTable {
            table: name.clone(),
        }],
        MigrationType::Modify => table
            .column_operations
            .iter()
            .flat_map(|op| match op {
                ColumnOperation::Add { column } => {
                    add_statements(name, caps.column_def(column), indexed)
                }
                // A remove does not carry the column's uniqueness
                ColumnOperation::Remove { column_name } => {
                    drop_statements(name, column_name, indexed)
                }
                ColumnOperation::Modify { column, changes } => match classify(changes, caps) {
                    ModifyStrategy::Alter => alter_statements(name, column, changes, caps),
                    ModifyStrategy::DropAndAdd => {
                        let was_unique = changes.unique.as_ref().map_or(column.unique, |c| c.from);
                        let mut statements =
                            drop_statements(name, &column.name, indexed && was_unique);
                        statements.extend(add_statements(name, caps.column_def(column), indexed));
                        statements
                    }
                },
            })
            .collect(),
    }
}

/// Move a column's uniqueness into a separate index when `indexed`.
fn split_unique(
    table: &str,
    mut def: ColumnDef,
    indexed: bool,
) -> (ColumnDef, Option<DdlStatement>) {
    if indexed && def.unique && !def.primary {
        def.unique = false;
        let index = DdlStatement::create_unique_index(table, &def.name);
        return (def, Some(index));
    }
    (def, None)
}

fn add_statements(table: &str, def: ColumnDef, indexed: bool) -> Vec<DdlStatement> {
    let (def, index) = split_unique(table, def, indexed);
    let mut statements = vec![DdlStatement::add_column(table, def)];
    statements.extend(index);
    statements
}

fn drop_statements(table: &str, column: &str, indexed: bool) -> Vec<DdlStatement> {
    let mut statements = Vec::new();
    if indexed {
        statements.push(DdlStatement::drop_unique_index(table, column));
    }
    statements.push(DdlStatement::drop_column(table, column));
    statements
}

fn alter_statements<C: AdapterCapabilities + ?Sized>(
    table: &str,
    column: &CollectionSchemaColumn,
    changes: &ColumnChanges,
    caps: &C,
) -> Vec<DdlStatement> {
    let mut statements = Vec::new();
    if let Some(change) = &changes.nullable {
        statements.push(DdlStatement::AlterTable {
            table: table.to_string(),
            action: AlterAction::SetNullable {
                column: column.name.clone(),
                nullable: change.to,
            },
        });
    }
    if let Some(change) = &changes.default {
        statements.push(DdlStatement::AlterTable {
            table: table.to_string(),
            action: AlterAction::SetDefault {
                column: column.name.clone(),
                default: change
                    .to
                    .as_ref()
                    .map(|d| caps.default_literal(column.column_type, d)),
            },
        });
    }
    statements
}

/// Apply plans in one global priority order.
///
/// A failing statement stops the rest of its collection's plan; other
/// collections continue. Nothing already executed is rolled back. Every
/// fully applied plan gets an audit record. If any plan stopped early the
/// result is [`MigrationError::Incomplete`].
pub async fn apply<A: DatabaseAdapter>(
    adapter: &mut A,
    plans: &[MigrationPlan],
) -> Result<ApplyReport, MigrationError> {
    let recreated = recreated_columns(plans, &*adapter);
    for column in &recreated {
        tracing::warn!(
            collection = %column.collection,
            table = %column.table,
            column = %column.column,
            "column will be dropped and re-added, existing values are lost"
        );
    }

    let dialect = adapter.dialect();
    let mut failures: IndexMap<&str, ExecutionError> = IndexMap::new();
    let mut executed = 0;

    for (plan, table) in planner::order_all(plans) {
        let collection = plan.collection_key.as_str();
        if failures.contains_key(collection) {
            continue;
        }

        for statement in table_statements(table, &*adapter) {
            let sql = render(dialect, &statement).unwrap_or_else(|e| format!("-- {}", e));
            let span = tracing::debug_span!(
                "db.execute",
                collection = %collection,
                table = %table.table_name,
                sql = %sql,
            );
            if let Err(source) = adapter.execute(&statement).instrument(span).await {
                tracing::error!(
                    collection = %collection,
                    table = %table.table_name,
                    error = %source,
                    "migration statement failed"
                );
                failures.insert(
                    collection,
                    ExecutionError::Statement {
                        collection: collection.to_string(),
                        table: table.table_name.clone(),
                        statement: sql,
                        source,
                    },
                );
                break;
            }
            executed += 1;
        }
    }

    let mut applied = Vec::new();
    for plan in plans {
        let collection = plan.collection_key.as_str();
        if failures.contains_key(collection) {
            continue;
        }
        if let Err(source) = record(adapter, plan).await {
            failures.insert(
                collection,
                ExecutionError::Record {
                    collection: collection.to_string(),
                    source,
                },
            );
            continue;
        }
        tracing::info!(
            collection = %collection,
            tables = plan.tables.len(),
            operations = plan.operation_count(),
            "applied migration plan"
        );
        applied.push(plan.collection_key.clone());
    }

    if !failures.is_empty() {
        return Err(MigrationError::Incomplete {
            failures: failures.into_values().collect(),
            applied,
        });
    }

    Ok(ApplyReport {
        applied,
        recreated_columns: recreated,
        statements: executed,
    })
}

async fn record<A: DatabaseAdapter>(
    adapter: &mut A,
    plan: &MigrationPlan,
) -> Result<(), AdapterError> {
    let record = MigrationRecord::new(plan, Utc::now())?;
    adapter.record_migration(&record).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickwork_schema::{ColumnType, DefaultValue, TableKey, TableType, ValueChange};
    use brickwork_sql::Dialect;

    fn modify(changes: ColumnChanges) -> TableMigration {
        TableMigration {
            migration_type: MigrationType::Modify,
            priority: 2,
            table_name: "bw_document__news__fields".into(),
            table_type: Some(TableType::DocumentFields),
            key: Some(TableKey {
                collection: "news".into(),
                ..Default::default()
            }),
            column_operations: vec![ColumnOperation::Modify {
                column: CollectionSchemaColumn::field("views", "_views", ColumnType::Real)
                    .default_value(Some(DefaultValue::Real(0.0))),
                changes,
            }],
        }
    }

    fn sql(dialect: Dialect, table: &TableMigration) -> Vec<String> {
        table_statements(table, &dialect)
            .iter()
            .map(|s| render(dialect, s).unwrap())
            .collect()
    }

    #[test]
    fn default_change_alters_in_place_on_postgres() {
        let table = modify(ColumnChanges {
            default: Some(ValueChange::new(None, Some(DefaultValue::Real(0.0)))),
            ..Default::default()
        });
        assert_eq!(
            sql(Dialect::Postgres, &table),
            vec![
                "ALTER TABLE \"bw_document__news__fields\" ALTER COLUMN \"_views\" SET DEFAULT 0;"
                    .to_string()
            ]
        );
    }

    #[test]
    fn sqlite_recreates_the_column() {
        let table = modify(ColumnChanges {
            default: Some(ValueChange::new(None, Some(DefaultValue::Real(0.0)))),
            ..Default::default()
        });
        insta::assert_snapshot!(sql(Dialect::Sqlite, &table).join("\n"), @r#"
        ALTER TABLE "bw_document__news__fields" DROP COLUMN "_views";
        ALTER TABLE "bw_document__news__fields" ADD COLUMN "_views" REAL DEFAULT 0;
        "#);
    }

    #[test]
    fn type_change_recreates_everywhere() {
        let table = modify(ColumnChanges {
            column_type: Some(ValueChange::new(ColumnType::Text, ColumnType::Real)),
            ..Default::default()
        });
        let statements = table_statements(&table, &Dialect::Postgres);
        assert_eq!(statements.len(), 2);
        assert!(matches!(
            &statements[0],
            DdlStatement::AlterTable {
                action: AlterAction::DropColumn(c),
                ..
            } if c == "_views"
        ));
    }

    fn slug(unique: bool) -> CollectionSchemaColumn {
        CollectionSchemaColumn::field("slug", "_slug", ColumnType::Text).unique(unique)
    }

    fn fields_table(migration_type: MigrationType, ops: Vec<ColumnOperation>) -> TableMigration {
        TableMigration {
            migration_type,
            column_operations: ops,
            ..modify(ColumnChanges::default())
        }
    }

    #[test]
    fn unique_columns_are_indexed_on_sqlite() {
        let create = fields_table(
            MigrationType::Create,
            vec![ColumnOperation::Add { column: slug(true) }],
        );
        insta::assert_snapshot!(sql(Dialect::Sqlite, &create).join("\n"), @r#"
        CREATE TABLE "bw_document__news__fields" (
            "_slug" TEXT
        );
        CREATE UNIQUE INDEX "uq_bw_document__news__fields__slug" ON "bw_document__news__fields" ("_slug");
        "#);

        let add = fields_table(
            MigrationType::Modify,
            vec![ColumnOperation::Add { column: slug(true) }],
        );
        insta::assert_snapshot!(sql(Dialect::Sqlite, &add).join("\n"), @r#"
        ALTER TABLE "bw_document__news__fields" ADD COLUMN "_slug" TEXT;
        CREATE UNIQUE INDEX "uq_bw_document__news__fields__slug" ON "bw_document__news__fields" ("_slug");
        "#);
        assert_eq!(
            sql(Dialect::Postgres, &add),
            vec![r#"ALTER TABLE "bw_document__news__fields" ADD COLUMN "_slug" TEXT UNIQUE;"#]
        );
    }

    #[test]
    fn unique_toggles_drop_the_index_first_on_sqlite() {
        let toggle_off = fields_table(
            MigrationType::Modify,
            vec![ColumnOperation::Modify {
                column: slug(false),
                changes: ColumnChanges {
                    unique: Some(ValueChange::new(true, false)),
                    ..Default::default()
                },
            }],
        );
        insta::assert_snapshot!(sql(Dialect::Sqlite, &toggle_off).join("\n"), @r#"
        DROP INDEX IF EXISTS "uq_bw_document__news__fields__slug";
        ALTER TABLE "bw_document__news__fields" DROP COLUMN "_slug";
        ALTER TABLE "bw_document__news__fields" ADD COLUMN "_slug" TEXT;
        "#);

        let toggle_on = fields_table(
            MigrationType::Modify,
            vec![ColumnOperation::Modify {
                column: slug(true),
                changes: ColumnChanges {
                    unique: Some(ValueChange::new(false, true)),
                    ..Default::default()
                },
            }],
        );
        insta::assert_snapshot!(sql(Dialect::Sqlite, &toggle_on).join("\n"), @r#"
        ALTER TABLE "bw_document__news__fields" DROP COLUMN "_slug";
        ALTER TABLE "bw_document__news__fields" ADD COLUMN "_slug" TEXT;
        CREATE UNIQUE INDEX "uq_bw_document__news__fields__slug" ON "bw_document__news__fields" ("_slug");
        "#);
    }

    #[test]
    fn removed_columns_drop_their_index_on_sqlite() {
        let remove = fields_table(
            MigrationType::Modify,
            vec![ColumnOperation::Remove {
                column_name: "_slug".into(),
            }],
        );
        assert_eq!(table_statements(&remove, &Dialect::Sqlite).len(), 2);
        assert_eq!(table_statements(&remove, &Dialect::Postgres).len(), 1);
    }
}
