//! Postgres adapter over `tokio_postgres`.

use std::collections::HashMap;

use brickwork_schema::{
    ForeignKey, ForeignKeyAction, InferredColumn, InferredTable, MigrationRecord,
};
use brickwork_sql::{DdlStatement, Dialect, Ident, render};
use indexmap::IndexMap;
use tokio_postgres::{Client, NoTls};
use tracing::Instrument;

use super::{AdapterCapabilities, DatabaseAdapter};
use crate::error::AdapterError;

/// Columns of every table whose name starts with `$1`.
///
/// `LIKE` would treat the `_` in table prefixes as a wildcard, hence `left()`.
const COLUMNS_QUERY: &str = "\
SELECT c.table_name::text, c.column_name::text, c.data_type::text,
       c.is_nullable::text, c.column_default::text
FROM information_schema.columns c
WHERE c.table_schema = current_schema()
  AND left(c.table_name::text, length($1::text)) = $1::text
ORDER BY c.table_name, c.ordinal_position";

/// Single-column primary key, unique and foreign key constraints.
const CONSTRAINTS_QUERY: &str = "\
SELECT tc.table_name::text, kcu.column_name::text, tc.constraint_type::text,
       ccu.table_name::text, ccu.column_name::text,
       rc.delete_rule::text, rc.update_rule::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
LEFT JOIN information_schema.referential_constraints rc
  ON tc.constraint_name = rc.constraint_name
 AND tc.table_schema = rc.constraint_schema
LEFT JOIN information_schema.constraint_column_usage ccu
  ON rc.unique_constraint_name = ccu.constraint_name
 AND rc.unique_constraint_schema = ccu.constraint_schema
WHERE tc.table_schema = current_schema()
  AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY')
  AND left(tc.table_name::text, length($1::text)) = $1::text";

/// A Postgres database.
pub struct PostgresAdapter {
    client: Client,
    migration_table: String,
}

impl PostgresAdapter {
    /// Wrap a connected client. Audit rows go to `migration_table`.
    pub fn new(client: Client, migration_table: impl Into<String>) -> Self {
        Self {
            client,
            migration_table: migration_table.into(),
        }
    }

    /// Connect without TLS and drive the connection on the tokio runtime.
    pub async fn connect(
        url: &str,
        migration_table: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });
        Ok(Self::new(client, migration_table))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             \"id\" SERIAL PRIMARY KEY,\n    \
             \"collection_key\" TEXT NOT NULL,\n    \
             \"migration_plans\" JSONB NOT NULL,\n    \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT now()\n);",
            Ident(&self.migration_table)
        )
    }

    fn insert_migration_sql(&self) -> String {
        format!(
            "INSERT INTO {} (\"collection_key\", \"migration_plans\", \"created_at\") \
             VALUES ($1, $2::text::jsonb, $3)",
            Ident(&self.migration_table)
        )
    }
}

#[derive(Debug, Default)]
struct ColumnConstraints {
    primary: bool,
    unique: bool,
    foreign_key: Option<ForeignKey>,
}

fn parse_action(rule: Option<String>) -> ForeignKeyAction {
    rule.as_deref()
        .and_then(ForeignKeyAction::parse)
        .unwrap_or_default()
}

impl AdapterCapabilities for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }
}

impl DatabaseAdapter for PostgresAdapter {
    async fn inferred_schema(
        &mut self,
        table_prefix: &str,
    ) -> Result<Vec<InferredTable>, AdapterError> {
        let span = tracing::debug_span!("db.introspect", prefix = %table_prefix);
        let (columns, constraints) = async {
            let columns = self.client.query(COLUMNS_QUERY, &[&table_prefix]).await?;
            let constraints = self.client.query(CONSTRAINTS_QUERY, &[&table_prefix]).await?;
            Ok::<_, tokio_postgres::Error>((columns, constraints))
        }
        .instrument(span)
        .await?;

        let mut by_column: HashMap<(String, String), ColumnConstraints> = HashMap::new();
        for row in constraints {
            let table: String = row.get(0);
            let column: String = row.get(1);
            let kind: String = row.get(2);
            let entry = by_column.entry((table, column)).or_default();
            match kind.as_str() {
                "PRIMARY KEY" => entry.primary = true,
                "UNIQUE" => entry.unique = true,
                "FOREIGN KEY" => {
                    let target_table: Option<String> = row.get(3);
                    let target_column: Option<String> = row.get(4);
                    if let (Some(target_table), Some(target_column)) =
                        (target_table, target_column)
                    {
                        entry.foreign_key = Some(ForeignKey {
                            table: target_table,
                            column: target_column,
                            on_delete: parse_action(row.get(5)),
                            on_update: parse_action(row.get(6)),
                        });
                    }
                }
                _ => {}
            }
        }

        let mut tables: IndexMap<String, Vec<InferredColumn>> = IndexMap::new();
        for row in columns {
            let table: String = row.get(0);
            let name: String = row.get(1);
            let data_type: String = row.get(2);
            let is_nullable: String = row.get(3);
            let default: Option<String> = row.get(4);

            let constraints = by_column
                .remove(&(table.clone(), name.clone()))
                .unwrap_or_default();
            let column_type = Dialect::Postgres
                .column_type_from_sql(&data_type, constraints.primary, default.as_deref())
                .ok_or_else(|| AdapterError::UnsupportedType {
                    table: table.clone(),
                    column: name.clone(),
                    data_type: data_type.clone(),
                })?;

            tables.entry(table).or_default().push(InferredColumn {
                name,
                column_type,
                nullable: is_nullable == "YES",
                default,
                foreign_key: constraints.foreign_key,
                unique: constraints.unique,
                primary: constraints.primary,
            });
        }

        tracing::debug!(tables = tables.len(), "introspected live schema");

        Ok(tables
            .into_iter()
            .map(|(name, columns)| InferredTable { name, columns })
            .collect())
    }

    async fn execute(&mut self, statement: &DdlStatement) -> Result<(), AdapterError> {
        let sql = render(Dialect::Postgres, statement)?;
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn record_migration(&mut self, record: &MigrationRecord) -> Result<(), AdapterError> {
        let plans = serde_json::to_string(&record.migration_plans)?;
        self.client
            .batch_execute(&self.create_migration_table_sql())
            .await?;
        self.client
            .execute(
                &self.insert_migration_sql(),
                &[&record.collection_key, &plans, &record.created_at],
            )
            .await?;
        Ok(())
    }
}
