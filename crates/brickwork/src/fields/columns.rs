use brickwork_schema::{
    CollectionSchemaColumn, ColumnType, DefaultValue, FIELD_COLUMN_PREFIX, ForeignKey,
    ForeignKeyAction,
};

use super::{FieldConfig, FieldKind};
use crate::config::EngineConfig;
use crate::naming;

/// What a field needs to know about its surroundings to produce columns.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub config: &'a EngineConfig,
}

impl<'a> ColumnContext<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }
}

/// Column name for a value-storing field.
pub fn value_column_name(key: &str) -> String {
    format!("{}{}", FIELD_COLUMN_PREFIX, key)
}

/// Column name for a relation field.
pub fn relation_column_name(key: &str) -> String {
    format!("{}{}_id", FIELD_COLUMN_PREFIX, key)
}

fn text_default(default: &Option<String>) -> Option<DefaultValue> {
    default.clone().map(DefaultValue::Text)
}

impl FieldKind {
    /// The columns this field contributes to its table.
    ///
    /// Field columns are always nullable: rows are created per locale and
    /// for drafts before every required value exists.
    pub fn schema_definition(
        &self,
        key: &str,
        ctx: &ColumnContext<'_>,
    ) -> Vec<CollectionSchemaColumn> {
        let value = |column_type| {
            CollectionSchemaColumn::field(key, value_column_name(key), column_type)
        };
        let relation = |table: String| {
            CollectionSchemaColumn::field(key, relation_column_name(key), ColumnType::Integer)
                .references(ForeignKey::new(table, "id").on_delete(ForeignKeyAction::SetNull))
        };

        let column = match self {
            FieldKind::Text { default, unique } => value(ColumnType::Text)
                .default_value(text_default(default))
                .unique(*unique),
            FieldKind::Textarea { default }
            | FieldKind::Wysiwyg { default }
            | FieldKind::Colour { default } => {
                value(ColumnType::Text).default_value(text_default(default))
            }
            FieldKind::Select { default, .. } => {
                value(ColumnType::Text).default_value(text_default(default))
            }
            FieldKind::Number { default } => {
                value(ColumnType::Real).default_value(default.map(DefaultValue::Real))
            }
            FieldKind::Checkbox { default } => {
                value(ColumnType::Boolean).default_value(Some(DefaultValue::Boolean(*default)))
            }
            FieldKind::Datetime => value(ColumnType::Timestamp),
            FieldKind::Link => value(ColumnType::Json),
            FieldKind::Json { default } => {
                value(ColumnType::Json).default_value(default.clone().map(DefaultValue::Json))
            }
            FieldKind::Media => relation(ctx.config.media_table()),
            FieldKind::User => relation(ctx.config.users_table()),
            FieldKind::Document { collection } => {
                relation(naming::document_table(&ctx.config.table_prefix, collection))
            }
            FieldKind::Tab { .. } | FieldKind::Group { .. } | FieldKind::Repeater { .. } => {
                return Vec::new();
            }
        };

        vec![column]
    }
}

impl FieldConfig {
    pub fn schema_definition(&self, ctx: &ColumnContext<'_>) -> Vec<CollectionSchemaColumn> {
        self.kind.schema_definition(&self.key, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickwork_schema::ColumnSource;

    #[test]
    fn value_and_relation_columns() {
        let config = EngineConfig::default();
        let ctx = ColumnContext::new(&config);

        let title = FieldConfig::text("title").schema_definition(&ctx);
        assert_eq!(title.len(), 1);
        assert_eq!(title[0].name, "_title");
        assert_eq!(title[0].source, ColumnSource::Field);
        assert_eq!(title[0].custom_field.as_deref(), Some("title"));
        assert!(title[0].nullable);

        let thumbnail = FieldConfig::media("thumbnail").schema_definition(&ctx);
        assert_eq!(thumbnail[0].name, "_thumbnail_id");
        assert_eq!(thumbnail[0].column_type, ColumnType::Integer);
        let fk = thumbnail[0].foreign_key.as_ref().unwrap();
        assert_eq!(fk.table, "bw_media");
        assert_eq!(fk.on_delete, ForeignKeyAction::SetNull);

        let related = FieldConfig::document("related", "news").schema_definition(&ctx);
        assert_eq!(
            related[0].foreign_key.as_ref().unwrap().table,
            "bw_document__news"
        );
    }

    #[test]
    fn containers_have_no_columns() {
        let config = EngineConfig::default();
        let ctx = ColumnContext::new(&config);
        let links = FieldConfig::repeater("links", vec![FieldConfig::text("url")]);
        assert!(links.schema_definition(&ctx).is_empty());
        let tab = FieldConfig::tab("content", vec![FieldConfig::text("intro")]);
        assert!(tab.schema_definition(&ctx).is_empty());
    }

    #[test]
    fn defaults_follow_field_config() {
        let config = EngineConfig::default();
        let ctx = ColumnContext::new(&config);

        let featured = FieldConfig::checkbox("featured").schema_definition(&ctx);
        assert_eq!(featured[0].default, Some(DefaultValue::Boolean(false)));

        let slug = FieldConfig::new(
            "slug",
            FieldKind::Text {
                default: Some("home".into()),
                unique: true,
            },
        )
        .schema_definition(&ctx);
        assert_eq!(slug[0].default, Some(DefaultValue::Text("home".into())));
        assert!(slug[0].unique);
    }
}
