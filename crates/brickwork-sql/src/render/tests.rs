use crate::*;
use brickwork_schema::{ColumnType, DefaultValue, ForeignKey, ForeignKeyAction};

fn document_columns(dialect: Dialect) -> Vec<ColumnDef> {
    vec![
        ColumnDef {
            primary: true,
            nullable: false,
            ..ColumnDef::new("id", dialect.data_type(ColumnType::Serial))
        },
        ColumnDef {
            nullable: false,
            ..ColumnDef::new("collection_key", dialect.data_type(ColumnType::Text))
        },
        ColumnDef {
            nullable: false,
            default: Some(
                dialect.default_literal(ColumnType::Boolean, &DefaultValue::Boolean(false)),
            ),
            ..ColumnDef::new("is_deleted", dialect.data_type(ColumnType::Boolean))
        },
        ColumnDef {
            foreign_key: Some(
                ForeignKey::new("bw_users", "id").on_delete(ForeignKeyAction::SetNull),
            ),
            ..ColumnDef::new("created_by", dialect.data_type(ColumnType::Integer))
        },
        ColumnDef {
            nullable: false,
            default: Some(dialect.default_literal(ColumnType::Timestamp, &DefaultValue::Now)),
            ..ColumnDef::new("created_at", dialect.data_type(ColumnType::Timestamp))
        },
    ]
}

#[test]
fn test_create_table_postgres() {
    let stmt = DdlStatement::CreateTable {
        table: "bw_document__page".into(),
        columns: document_columns(Dialect::Postgres),
    };
    insta::assert_snapshot!(render(Dialect::Postgres, &stmt).unwrap(), @r#"
    CREATE TABLE "bw_document__page" (
        "id" SERIAL PRIMARY KEY,
        "collection_key" TEXT NOT NULL,
        "is_deleted" BOOLEAN NOT NULL DEFAULT false,
        "created_by" INTEGER REFERENCES "bw_users" ("id") ON DELETE SET NULL ON UPDATE NO ACTION,
        "created_at" TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    "#);
}

#[test]
fn test_create_table_sqlite() {
    let stmt = DdlStatement::CreateTable {
        table: "bw_document__page".into(),
        columns: document_columns(Dialect::Sqlite),
    };
    insta::assert_snapshot!(render(Dialect::Sqlite, &stmt).unwrap(), @r#"
    CREATE TABLE "bw_document__page" (
        "id" INTEGER PRIMARY KEY AUTOINCREMENT,
        "collection_key" TEXT NOT NULL,
        "is_deleted" BOOLEAN NOT NULL DEFAULT 0,
        "created_by" INTEGER REFERENCES "bw_users" ("id") ON DELETE SET NULL ON UPDATE NO ACTION,
        "created_at" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    "#);
}

#[test]
fn test_add_and_drop_column() {
    let add = DdlStatement::add_column(
        "bw_document__page__seo",
        ColumnDef {
            unique: true,
            default: Some(escape_string("home")),
            ..ColumnDef::new("_slug", "TEXT")
        },
    );
    assert_eq!(
        render(Dialect::Postgres, &add).unwrap(),
        r#"ALTER TABLE "bw_document__page__seo" ADD COLUMN "_slug" TEXT UNIQUE DEFAULT 'home';"#
    );

    let drop = DdlStatement::drop_column("bw_document__page__seo", "_slug");
    assert_eq!(
        render(Dialect::Postgres, &drop).unwrap(),
        r#"ALTER TABLE "bw_document__page__seo" DROP COLUMN "_slug";"#
    );
}

#[test]
fn test_add_unique_column_unsupported_on_sqlite() {
    let add = DdlStatement::add_column(
        "bw_document__news__fields",
        ColumnDef {
            unique: true,
            ..ColumnDef::new("_slug", "TEXT")
        },
    );
    let err = render(Dialect::Sqlite, &add).unwrap_err();
    assert_eq!(err.operation, "ADD COLUMN ... UNIQUE");
    assert_eq!(err.table, "bw_document__news__fields");

    let plain =
        DdlStatement::add_column("bw_document__news__fields", ColumnDef::new("_slug", "TEXT"));
    assert_eq!(
        render(Dialect::Sqlite, &plain).unwrap(),
        r#"ALTER TABLE "bw_document__news__fields" ADD COLUMN "_slug" TEXT;"#
    );
}

#[test]
fn test_unique_index() {
    let create = DdlStatement::create_unique_index("bw_document__news__fields", "_slug");
    insta::assert_snapshot!(
        render(Dialect::Sqlite, &create).unwrap(),
        @r#"CREATE UNIQUE INDEX "uq_bw_document__news__fields__slug" ON "bw_document__news__fields" ("_slug");"#
    );

    let drop = DdlStatement::drop_unique_index("bw_document__news__fields", "_slug");
    assert_eq!(drop.table(), "bw_document__news__fields");
    assert_eq!(
        render(Dialect::Sqlite, &drop).unwrap(),
        r#"DROP INDEX IF EXISTS "uq_bw_document__news__fields__slug";"#
    );
}

#[test]
fn test_alter_column_postgres() {
    let set_not_null = DdlStatement::AlterTable {
        table: "t".into(),
        action: AlterAction::SetNullable {
            column: "locale".into(),
            nullable: false,
        },
    };
    assert_eq!(
        render(Dialect::Postgres, &set_not_null).unwrap(),
        r#"ALTER TABLE "t" ALTER COLUMN "locale" SET NOT NULL;"#
    );

    let drop_default = DdlStatement::AlterTable {
        table: "t".into(),
        action: AlterAction::SetDefault {
            column: "_title".into(),
            default: None,
        },
    };
    assert_eq!(
        render(Dialect::Postgres, &drop_default).unwrap(),
        r#"ALTER TABLE "t" ALTER COLUMN "_title" DROP DEFAULT;"#
    );
}

#[test]
fn test_alter_column_unsupported_on_sqlite() {
    let stmt = DdlStatement::AlterTable {
        table: "t".into(),
        action: AlterAction::SetDefault {
            column: "_title".into(),
            default: Some("'x'".into()),
        },
    };
    let err = render(Dialect::Sqlite, &stmt).unwrap_err();
    assert_eq!(err.dialect, Dialect::Sqlite);
    assert_eq!(err.table, "t");
}

#[test]
fn test_drop_table() {
    let stmt = DdlStatement::DropTable {
        table: "bw_document__page__hero__links".into(),
    };
    assert_eq!(
        render(Dialect::Postgres, &stmt).unwrap(),
        r#"DROP TABLE IF EXISTS "bw_document__page__hero__links";"#
    );
}
