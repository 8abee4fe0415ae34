//! Content model compiler.
//!
//! Turns [`CollectionConfig`]s into [`CollectionSchema`]s. Every collection
//! yields a document table, a versions table when revisions are enabled, a
//! document-fields table, one table per brick and one per repeater.
//!
//! All validation happens here, so a model that compiles never fails the
//! migration for structural reasons.

use std::collections::{HashMap, HashSet};

use brickwork_schema::{
    CollectionSchema, CollectionSchemaColumn, CollectionSchemaTable, ColumnType, DefaultValue,
    ForeignKey, ForeignKeyAction, TableKey, TableType,
};

use crate::config::EngineConfig;
use crate::error::{CompileError, KeyKind};
use crate::fields::{ColumnContext, FieldKind, FlatField, flatten};
use crate::model::{BrickKind, CollectionConfig};
use crate::naming;

/// Compile every collection, checking keys and table names across all of them.
pub fn compile(
    config: &EngineConfig,
    collections: &[CollectionConfig],
) -> Result<Vec<CollectionSchema>, CompileError> {
    compile_with(collections, |c| compile_collection(config, c))
}

/// [`compile`] with a custom per-collection step, e.g. one consulting a cache.
/// Checks spanning several collections always run.
pub(crate) fn compile_with(
    collections: &[CollectionConfig],
    mut compile_one: impl FnMut(&CollectionConfig) -> Result<CollectionSchema, CompileError>,
) -> Result<Vec<CollectionSchema>, CompileError> {
    let mut keys = HashSet::new();
    for collection in collections {
        if !keys.insert(collection.key.as_str()) {
            return Err(CompileError::DuplicateCollectionKey(collection.key.clone()));
        }
    }

    let schemas = collections
        .iter()
        .map(&mut compile_one)
        .collect::<Result<Vec<_>, _>>()?;

    check_relations(collections, &keys)?;
    check_table_names(&schemas)?;

    Ok(schemas)
}

/// Compile a single collection.
///
/// Relations to other collections are not checked here; [`compile`] does that
/// once it knows every collection key.
pub fn compile_collection(
    config: &EngineConfig,
    collection: &CollectionConfig,
) -> Result<CollectionSchema, CompileError> {
    naming::check_table_key(KeyKind::Collection, &collection.key)?;

    let core = CoreColumns::new(config, collection);
    let ctx = ColumnContext::new(config);
    let prefix = config.table_prefix.as_str();
    let key = collection.key.as_str();

    let mut tables = vec![core.table(
        TableType::Document,
        TableKey {
            collection: key.to_string(),
            ..Default::default()
        },
        core.document(),
    )];

    if collection.use_revisions {
        tables.push(core.table(
            TableType::Versions,
            TableKey {
                collection: key.to_string(),
                ..Default::default()
            },
            core.versions(),
        ));
    }

    // Collection-level fields behave like a brick stored in `__fields`
    let scope = format!("collection '{}'", key);
    let flat = flatten(&collection.fields);
    check_fields(&scope, &flat)?;
    let fields_key = TableKey {
        collection: key.to_string(),
        ..Default::default()
    };
    let mut columns = core.document_fields();
    columns.extend(field_columns(&scope, &ctx, &flat, &[], &columns)?);
    tables.push(core.table(TableType::DocumentFields, fields_key, columns));
    tables.extend(repeater_tables(&core, &ctx, &scope, None, &flat)?);

    let mut brick_keys = HashSet::new();
    for (kind, brick) in collection.bricks() {
        naming::check_table_key(KeyKind::Brick, &brick.key)?;
        if !brick_keys.insert(brick.key.as_str()) {
            return Err(CompileError::DuplicateBrickKey {
                collection: key.to_string(),
                brick: brick.key.clone(),
            });
        }

        let kind = match kind {
            BrickKind::Fixed => "fixed",
            BrickKind::Builder => "builder",
        };
        let scope = format!("{} brick '{}' of collection '{}'", kind, brick.key, key);
        let flat = flatten(&brick.fields);
        check_fields(&scope, &flat)?;

        let mut columns = core.brick();
        columns.extend(field_columns(&scope, &ctx, &flat, &[], &columns)?);
        tables.push(core.table(
            TableType::Brick,
            TableKey {
                collection: key.to_string(),
                brick: Some(brick.key.clone()),
                repeater: Vec::new(),
            },
            columns,
        ));
        tables.extend(repeater_tables(&core, &ctx, &scope, Some(&brick.key), &flat)?);
    }

    for table in &tables {
        naming::check_identifier_length(&table.name)?;
        for column in &table.columns {
            naming::check_identifier_length(&column.name)?;
        }
    }

    tracing::debug!(
        collection = key,
        prefix,
        tables = tables.len(),
        "compiled collection schema"
    );

    Ok(CollectionSchema {
        key: key.to_string(),
        tables,
    })
}

/// Key and config checks over one flattened scope.
fn check_fields(scope: &str, flat: &[FlatField<'_>]) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for FlatField { field, .. } in flat {
        if field.kind.is_repeater() {
            naming::check_table_key(KeyKind::Repeater, &field.key)?;
        } else {
            naming::check_identifier(KeyKind::Field, &field.key)?;
        }

        if !seen.insert(field.key.as_str()) {
            return Err(CompileError::DuplicateFieldKey {
                scope: scope.to_string(),
                key: field.key.clone(),
            });
        }

        let invalid = |reason: String| CompileError::InvalidField {
            scope: scope.to_string(),
            field: field.key.clone(),
            reason,
        };

        match &field.kind {
            FieldKind::Select { options, default } => {
                if options.is_empty() {
                    return Err(invalid("select has no options".to_string()));
                }
                let mut values = HashSet::new();
                for option in options {
                    if !values.insert(option.value.as_str()) {
                        return Err(invalid(format!("duplicate option '{}'", option.value)));
                    }
                }
                if let Some(default) = default {
                    if !values.contains(default.as_str()) {
                        return Err(invalid(format!(
                            "default '{}' is not one of the options",
                            default
                        )));
                    }
                }
            }
            FieldKind::Repeater {
                max_groups: Some(0),
                ..
            } => {
                return Err(invalid("max_groups must be at least 1".to_string()));
            }
            FieldKind::Document { collection } if collection.is_empty() => {
                return Err(invalid("document relation has no collection".to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Field columns stored in the table for `path`, checked against the
/// table's existing column names.
fn field_columns(
    scope: &str,
    ctx: &ColumnContext<'_>,
    flat: &[FlatField<'_>],
    path: &[&str],
    existing: &[CollectionSchemaColumn],
) -> Result<Vec<CollectionSchemaColumn>, CompileError> {
    let mut names: HashMap<String, String> = existing
        .iter()
        .map(|c| (c.name.clone(), c.name.clone()))
        .collect();
    let mut columns = Vec::new();

    for flat_field in flat.iter().filter(|f| f.is_in(path)) {
        let field = flat_field.field;
        for column in field.schema_definition(ctx) {
            if let Some(other) = names.insert(column.name.clone(), field.key.clone()) {
                return Err(CompileError::InvalidField {
                    scope: scope.to_string(),
                    field: field.key.clone(),
                    reason: format!("column '{}' collides with '{}'", column.name, other),
                });
            }
            columns.push(column);
        }
    }

    Ok(columns)
}

/// One table per repeater in a scope, parents before their nested repeaters.
fn repeater_tables(
    core: &CoreColumns<'_>,
    ctx: &ColumnContext<'_>,
    scope: &str,
    brick: Option<&str>,
    flat: &[FlatField<'_>],
) -> Result<Vec<CollectionSchemaTable>, CompileError> {
    let mut tables = Vec::new();

    for flat_field in flat.iter().filter(|f| f.field.kind.is_repeater()) {
        let parent = &flat_field.repeaters;
        let mut path = parent.clone();
        path.push(flat_field.field.key.as_str());

        let parent_table = (!parent.is_empty())
            .then(|| naming::repeater_table(core.prefix, core.collection, brick, parent));
        let mut columns = core.repeater(brick, parent_table);
        columns.extend(field_columns(scope, ctx, flat, &path, &columns)?);

        tables.push(core.table(
            TableType::Repeater,
            TableKey {
                collection: core.collection.to_string(),
                brick: brick.map(str::to_string),
                repeater: path.iter().map(|p| p.to_string()).collect(),
            },
            columns,
        ));
    }

    Ok(tables)
}

/// Relation targets must be known collections.
fn check_relations(
    collections: &[CollectionConfig],
    keys: &HashSet<&str>,
) -> Result<(), CompileError> {
    for collection in collections {
        let scopes = std::iter::once((
            format!("collection '{}'", collection.key),
            &collection.fields,
        ))
        .chain(collection.bricks().map(|(_, brick)| {
            (
                format!("brick '{}' of collection '{}'", brick.key, collection.key),
                &brick.fields,
            )
        }));

        for (scope, fields) in scopes {
            for FlatField { field, .. } in flatten(fields) {
                if let FieldKind::Document { collection: target } = &field.kind {
                    if !keys.contains(target.as_str()) {
                        return Err(CompileError::InvalidField {
                            scope,
                            field: field.key.clone(),
                            reason: format!("references unknown collection '{}'", target),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_table_names(schemas: &[CollectionSchema]) -> Result<(), CompileError> {
    let mut seen: HashMap<&str, String> = HashMap::new();
    for schema in schemas {
        for table in &schema.tables {
            let origin = format!("{} table of collection '{}'", table.table_type, schema.key);
            if let Some(first) = seen.insert(&table.name, origin.clone()) {
                return Err(CompileError::TableNameCollision {
                    table: table.name.clone(),
                    first,
                    second: origin,
                });
            }
        }
    }
    Ok(())
}

/// Structural columns for each table type of one collection.
struct CoreColumns<'a> {
    prefix: &'a str,
    collection: &'a str,
    users_table: String,
    revisions: bool,
}

impl<'a> CoreColumns<'a> {
    fn new(config: &'a EngineConfig, collection: &'a CollectionConfig) -> Self {
        Self {
            prefix: &config.table_prefix,
            collection: &collection.key,
            users_table: config.users_table(),
            revisions: collection.use_revisions,
        }
    }

    fn table(
        &self,
        table_type: TableType,
        key: TableKey,
        columns: Vec<CollectionSchemaColumn>,
    ) -> CollectionSchemaTable {
        CollectionSchemaTable {
            name: naming::table_name(self.prefix, table_type, &key),
            table_type,
            key,
            columns,
        }
    }

    fn id() -> CollectionSchemaColumn {
        CollectionSchemaColumn::core("id", ColumnType::Serial).primary()
    }

    fn collection_key() -> CollectionSchemaColumn {
        CollectionSchemaColumn::core("collection_key", ColumnType::Text)
    }

    fn reference(name: &str, table: String, on_delete: ForeignKeyAction) -> CollectionSchemaColumn {
        CollectionSchemaColumn::core(name, ColumnType::Integer)
            .references(ForeignKey::new(table, "id").on_delete(on_delete))
    }

    fn user_reference(&self, name: &str) -> CollectionSchemaColumn {
        Self::reference(name, self.users_table.clone(), ForeignKeyAction::SetNull).nullable(true)
    }

    fn timestamp(name: &str) -> CollectionSchemaColumn {
        CollectionSchemaColumn::core(name, ColumnType::Timestamp)
            .default_value(Some(DefaultValue::Now))
    }

    fn flag(name: &str) -> CollectionSchemaColumn {
        CollectionSchemaColumn::core(name, ColumnType::Boolean)
            .default_value(Some(DefaultValue::Boolean(false)))
    }

    fn position() -> CollectionSchemaColumn {
        CollectionSchemaColumn::core("position", ColumnType::Integer)
            .default_value(Some(DefaultValue::Integer(0)))
    }

    fn locale() -> CollectionSchemaColumn {
        CollectionSchemaColumn::core("locale", ColumnType::Text)
    }

    fn document_table(&self) -> String {
        naming::document_table(self.prefix, self.collection)
    }

    fn versions_table(&self) -> String {
        naming::versions_table(self.prefix, self.collection)
    }

    /// `document_id` and, with revisions, `document_version_id`.
    fn owner_references(&self) -> Vec<CollectionSchemaColumn> {
        let mut columns = vec![Self::reference(
            "document_id",
            self.document_table(),
            ForeignKeyAction::Cascade,
        )];
        if self.revisions {
            columns.push(Self::reference(
                "document_version_id",
                self.versions_table(),
                ForeignKeyAction::Cascade,
            ));
        }
        columns
    }

    fn document(&self) -> Vec<CollectionSchemaColumn> {
        vec![
            Self::id(),
            Self::collection_key(),
            Self::flag("is_deleted"),
            CollectionSchemaColumn::core("deleted_at", ColumnType::Timestamp).nullable(true),
            self.user_reference("created_by"),
            self.user_reference("updated_by"),
            Self::timestamp("created_at"),
            Self::timestamp("updated_at"),
        ]
    }

    fn versions(&self) -> Vec<CollectionSchemaColumn> {
        vec![
            Self::id(),
            Self::collection_key(),
            Self::reference("document_id", self.document_table(), ForeignKeyAction::Cascade),
            CollectionSchemaColumn::core("version_type", ColumnType::Text)
                .default_value(Some(DefaultValue::Text("latest".to_string()))),
            Self::reference("promoted_from", self.versions_table(), ForeignKeyAction::SetNull)
                .nullable(true),
            self.user_reference("created_by"),
            Self::timestamp("created_at"),
        ]
    }

    fn document_fields(&self) -> Vec<CollectionSchemaColumn> {
        let mut columns = vec![Self::id(), Self::collection_key()];
        columns.extend(self.owner_references());
        columns.push(Self::locale());
        columns
    }

    fn brick(&self) -> Vec<CollectionSchemaColumn> {
        let mut columns = vec![
            Self::id(),
            Self::collection_key(),
            CollectionSchemaColumn::core("brick_type", ColumnType::Text),
        ];
        columns.extend(self.owner_references());
        columns.extend([Self::locale(), Self::position(), Self::flag("is_open")]);
        columns
    }

    /// Repeater rows point at their brick (or the document-fields row) and,
    /// when nested, at their immediate parent repeater row.
    fn repeater(
        &self,
        brick: Option<&str>,
        parent_table: Option<String>,
    ) -> Vec<CollectionSchemaColumn> {
        let owner = match brick {
            Some(brick) => naming::brick_table(self.prefix, self.collection, brick),
            None => naming::fields_table(self.prefix, self.collection),
        };

        let mut columns = vec![Self::id(), Self::collection_key()];
        columns.extend(self.owner_references());
        columns.push(Self::locale());
        columns.push(Self::reference("brick_id", owner, ForeignKeyAction::Cascade));
        if let Some(parent) = parent_table {
            columns.push(Self::reference("parent_id", parent, ForeignKeyAction::Cascade));
        }
        columns.extend([Self::position(), Self::flag("is_open")]);
        columns
    }
}
