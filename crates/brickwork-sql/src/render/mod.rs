//! Render DDL statements to SQL strings.

use thiserror::Error;

use crate::{AlterAction, ColumnDef, DdlStatement, Dialect, Ident};

#[cfg(test)]
mod tests;

/// The dialect cannot express a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{dialect} does not support {operation} (table {table})")]
pub struct RenderError {
    pub dialect: Dialect,
    pub table: String,
    pub operation: &'static str,
}

/// Render a statement for a dialect.
pub fn render(dialect: Dialect, stmt: &DdlStatement) -> Result<String, RenderError> {
    match stmt {
        DdlStatement::CreateTable { table, columns } => {
            Ok(create_table_sql(dialect, table, columns))
        }
        DdlStatement::AlterTable { table, action } => alter_table_sql(dialect, table, action),
        DdlStatement::DropTable { table } => Ok(format!("DROP TABLE IF EXISTS {};", Ident(table))),
        DdlStatement::CreateUniqueIndex {
            table,
            column,
            name,
        } => Ok(format!(
            "CREATE UNIQUE INDEX {} ON {} ({});",
            Ident(name),
            Ident(table),
            Ident(column)
        )),
        DdlStatement::DropIndex { name, .. } => {
            Ok(format!("DROP INDEX IF EXISTS {};", Ident(name)))
        }
    }
}

fn create_table_sql(dialect: Dialect, table: &str, columns: &[ColumnDef]) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", Ident(table));
    let parts: Vec<String> = columns
        .iter()
        .map(|col| format!("    {}", column_def_sql(dialect, col)))
        .collect();
    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n);");
    sql
}

/// Render a column definition as used in `CREATE TABLE` and `ADD COLUMN`.
pub fn column_def_sql(dialect: Dialect, col: &ColumnDef) -> String {
    let mut def = format!("{} {}", Ident(&col.name), col.data_type);

    if col.primary {
        def.push_str(" PRIMARY KEY");
        // SQLite only auto-increments INTEGER PRIMARY KEY columns, and only
        // guarantees monotonic ids with AUTOINCREMENT.
        if dialect == Dialect::Sqlite && col.data_type.eq_ignore_ascii_case("integer") {
            def.push_str(" AUTOINCREMENT");
        }
    }

    // PK columns are implicitly NOT NULL
    if !col.nullable && !col.primary {
        def.push_str(" NOT NULL");
    }

    if col.unique && !col.primary {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = &col.default {
        def.push_str(&format!(" DEFAULT {}", default));
    }

    if let Some(fk) = &col.foreign_key {
        def.push_str(&format!(
            " REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            Ident(&fk.table),
            Ident(&fk.column),
            fk.on_delete.to_sql(),
            fk.on_update.to_sql()
        ));
    }

    def
}

fn alter_table_sql(
    dialect: Dialect,
    table: &str,
    action: &AlterAction,
) -> Result<String, RenderError> {
    let unsupported = |operation| RenderError {
        dialect,
        table: table.to_string(),
        operation,
    };

    let sql = match action {
        AlterAction::AddColumn(col) => {
            if col.unique && !dialect.supports_add_unique_column() {
                return Err(unsupported("ADD COLUMN ... UNIQUE"));
            }
            format!(
                "ALTER TABLE {} ADD COLUMN {};",
                Ident(table),
                column_def_sql(dialect, col)
            )
        }
        AlterAction::DropColumn(name) => {
            format!("ALTER TABLE {} DROP COLUMN {};", Ident(table), Ident(name))
        }
        AlterAction::SetNullable { column, nullable } => {
            if !dialect.supports_alter_column() {
                return Err(unsupported("ALTER COLUMN ... NOT NULL"));
            }
            let op = if *nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
            format!(
                "ALTER TABLE {} ALTER COLUMN {} {};",
                Ident(table),
                Ident(column),
                op
            )
        }
        AlterAction::SetDefault { column, default } => {
            if !dialect.supports_alter_column() {
                return Err(unsupported("ALTER COLUMN ... DEFAULT"));
            }
            match default {
                Some(default) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    Ident(table),
                    Ident(column),
                    default
                ),
                None => format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    Ident(table),
                    Ident(column)
                ),
            }
        }
    };
    Ok(sql)
}
