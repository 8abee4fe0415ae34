#![allow(dead_code)]

use brickwork::schema::{CollectionSchema, ColumnType, InferredTable};
use brickwork::sql::{ColumnDef, Dialect};
use brickwork::{BrickConfig, CollectionConfig, Engine, EngineConfig, FieldConfig, MemoryAdapter};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A memory database with the users and media tables fields point at.
pub fn database(dialect: Dialect) -> MemoryAdapter {
    let mut db = MemoryAdapter::new(dialect);
    for table in ["bw_users", "bw_media"] {
        db.insert_table(
            table,
            vec![ColumnDef {
                nullable: false,
                primary: true,
                ..ColumnDef::new("id", dialect.data_type(ColumnType::Serial))
            }],
        );
    }
    db
}

pub fn engine(dialect: Dialect) -> Engine<MemoryAdapter> {
    init_tracing();
    Engine::new(database(dialect), EngineConfig::default())
}

pub fn news() -> CollectionConfig {
    CollectionConfig::new("news")
        .field(FieldConfig::text("title").required())
        .field(FieldConfig::media("thumbnail"))
}

pub fn page() -> CollectionConfig {
    CollectionConfig::new("page")
        .use_revisions(true)
        .field(FieldConfig::text("title").required())
        .fixed_brick(
            BrickConfig::new("seo")
                .field(FieldConfig::text("meta_title"))
                .field(FieldConfig::checkbox("noindex")),
        )
        .builder_brick(
            BrickConfig::new("hero").field(FieldConfig::repeater(
                "links",
                vec![
                    FieldConfig::text("label"),
                    FieldConfig::document("target", "page"),
                    FieldConfig::repeater("tags", vec![FieldConfig::text("tag")]),
                ],
            )),
        )
}

/// Every compiled table exists with the same columns, types and flags.
pub fn assert_converged(schemas: &[CollectionSchema], live: &[InferredTable]) {
    for schema in schemas {
        for table in &schema.tables {
            let existing = live
                .iter()
                .find(|t| t.name == table.name)
                .unwrap_or_else(|| panic!("missing table {}", table.name));
            let names: Vec<_> = existing.columns.iter().map(|c| c.name.as_str()).collect();
            let expected: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, expected, "{}", table.name);

            for column in &table.columns {
                let live = existing.column(&column.name).unwrap();
                assert_eq!(live.column_type, column.column_type, "{}.{}", table.name, column.name);
                assert_eq!(live.nullable, column.nullable, "{}.{}", table.name, column.name);
                assert_eq!(live.foreign_key, column.foreign_key, "{}.{}", table.name, column.name);
                assert_eq!(live.unique, column.unique, "{}.{}", table.name, column.name);
            }
        }
    }
}
